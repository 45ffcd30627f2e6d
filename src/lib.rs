//! A convenience layer over CalDAV `VTODO` tasks.
//!
//! [`TaskRecord`] wraps a single task and exposes optional-safe accessors
//! for summary, due date, priority, status, completion and tags. A field
//! that was never set is truly absent: getters return `None` and the ICS
//! serialization omits the property entirely.
//!
//! [`TaskCollection`] holds an ordered sequence of records, populates them
//! from a CalDAV calendar and offers tag-set and date-range filtering with
//! correct date/datetime mixing semantics.
//!
//! The CalDAV transport itself lives in [`client`] and is treated as a
//! collaborator: save and delete failures surface as `false`, never as a
//! panic or a propagated error.

pub mod client;
pub mod config;
pub mod model;

pub use client::{DavTransport, RawTodo};
pub use config::Config;
pub use model::{Due, DueBound, TagQuery, TaskCollection, TaskRecord};
