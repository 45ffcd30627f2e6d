// Aggregates the split model files
pub mod adapter;
pub mod collection;
pub mod parser;
pub mod record;

pub use collection::{DueBound, TagQuery, TaskCollection};
pub use parser::string_to_datetime;
pub use record::{Due, STATUS_COMPLETED, STATUS_NEEDS_ACTION, TaskRecord};
