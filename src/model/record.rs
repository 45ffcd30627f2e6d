// A single VTODO task with optional-safe accessors.
use crate::client::DavTransport;
use crate::model::parser::localize;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;
use uuid::Uuid;

/// The STATUS value marking a task as done.
pub const STATUS_COMPLETED: &str = "COMPLETED";
/// The STATUS value set when a completed task is reopened.
pub const STATUS_NEEDS_ACTION: &str = "NEEDS-ACTION";

/// A due value is either a whole calendar day or a concrete instant.
/// The distinction matters for rendering and for day-only filtering,
/// so it is kept instead of collapsing everything to a timestamp.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Due {
    Date(NaiveDate),
    DateTime(DateTime<Local>),
}

impl Due {
    /// The due value as a local instant. Date-only values count as
    /// local midnight of that day.
    pub fn as_local(&self) -> DateTime<Local> {
        match self {
            Due::Date(day) => localize(day.and_time(NaiveTime::MIN)),
            Due::DateTime(dt) => *dt,
        }
    }

    /// Local midnight of the due day, used for day-only comparisons.
    pub fn day_start(&self) -> DateTime<Local> {
        match self {
            Due::Date(day) => localize(day.and_time(NaiveTime::MIN)),
            Due::DateTime(dt) => localize(dt.date_naive().and_time(NaiveTime::MIN)),
        }
    }

    pub fn is_date_only(&self) -> bool {
        matches!(self, Due::Date(_))
    }
}

impl From<NaiveDate> for Due {
    fn from(day: NaiveDate) -> Self {
        Due::Date(day)
    }
}

impl From<DateTime<Local>> for Due {
    fn from(dt: DateTime<Local>) -> Self {
        Due::DateTime(dt)
    }
}

impl From<NaiveDateTime> for Due {
    /// A naive timestamp gets the local offset attached.
    fn from(naive: NaiveDateTime) -> Self {
        Due::DateTime(localize(naive))
    }
}

/// One VTODO task.
///
/// Every payload field is independently optional; `None` means the
/// property is absent from the underlying component, there is no
/// "present but null" state. `href`/`etag` locate the resource on the
/// server and stay empty for tasks that only exist locally.
#[derive(Clone, Debug)]
pub struct TaskRecord {
    pub(crate) uid: String,
    pub href: String,
    pub etag: String,
    pub calendar_href: String,
    pub(crate) summary: Option<String>,
    pub(crate) due: Option<Due>,
    pub(crate) priority: Option<u8>,
    pub(crate) status: Option<String>,
    pub(crate) completed: Option<DateTime<Local>>,
    pub(crate) tags: Vec<String>,
    pub(crate) rrule: Option<String>,
    pub(crate) transport: Option<DavTransport>,
}

impl TaskRecord {
    /// A brand new, empty task with a fresh UUID. It is not bound to any
    /// server until a collection persists it.
    pub fn new() -> Self {
        Self {
            uid: Uuid::new_v4().to_string(),
            href: String::new(),
            etag: String::new(),
            calendar_href: String::new(),
            summary: None,
            due: None,
            priority: None,
            status: None,
            completed: None,
            tags: Vec::new(),
            rrule: None,
            transport: None,
        }
    }

    /// Attach the transport used by [`save`](Self::save) and
    /// [`delete`](Self::delete).
    pub fn bind_transport(&mut self, transport: DavTransport) {
        self.transport = Some(transport);
    }

    pub fn get_uid(&self) -> &str {
        &self.uid
    }

    pub fn set_uid(&mut self, uid: &str) {
        self.uid = uid.to_string();
    }

    pub fn get_summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// `None` removes the SUMMARY property entirely.
    pub fn set_summary(&mut self, summary: Option<String>) {
        self.summary = summary;
    }

    pub fn get_due(&self) -> Option<Due> {
        self.due
    }

    pub fn has_due(&self) -> bool {
        self.due.is_some()
    }

    /// `None` removes the DUE property. Date values stay date-only,
    /// naive timestamps get the local offset via [`Due::from`].
    pub fn set_due(&mut self, due: Option<Due>) {
        self.due = due;
    }

    pub fn get_priority(&self) -> Option<u8> {
        self.priority
    }

    /// True iff a priority is present and non-zero. Since
    /// [`set_priority`](Self::set_priority) never stores zero, presence
    /// alone is enough.
    pub fn has_priority(&self) -> bool {
        self.priority.is_some()
    }

    /// Zero and `None` both clear the field; RFC5545 treats
    /// `PRIORITY:0` as "undefined" anyway.
    pub fn set_priority(&mut self, priority: Option<u8>) {
        self.priority = priority.filter(|p| *p != 0);
    }

    pub fn get_status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn set_status(&mut self, status: Option<String>) {
        self.status = status;
    }

    pub fn is_done(&self) -> bool {
        self.status.as_deref() == Some(STATUS_COMPLETED)
    }

    pub fn get_completed(&self) -> Option<DateTime<Local>> {
        self.completed
    }

    pub fn set_completed(&mut self, completed: Option<DateTime<Local>>) {
        self.completed = completed;
    }

    /// Mark the task as done. No-op when it already is; the completion
    /// timestamp defaults to now.
    pub fn complete(&mut self, at: Option<DateTime<Local>>) {
        if self.is_done() {
            return;
        }
        self.status = Some(STATUS_COMPLETED.to_string());
        self.completed = Some(at.unwrap_or_else(Local::now));
    }

    /// Reopen a done task: status becomes NEEDS-ACTION and the
    /// completion timestamp is removed. No-op when not done.
    pub fn uncomplete(&mut self) {
        if !self.is_done() {
            return;
        }
        self.status = Some(STATUS_NEEDS_ACTION.to_string());
        self.completed = None;
    }

    pub fn get_tags(&self) -> &[String] {
        &self.tags
    }

    pub fn has_tags(&self) -> bool {
        !self.tags.is_empty()
    }

    /// Append a tag. Empty strings and duplicates are ignored, so the
    /// list behaves like an insertion-ordered set.
    pub fn add_tag(&mut self, tag: &str) {
        if tag.is_empty() || self.tags.iter().any(|t| t == tag) {
            return;
        }
        self.tags.push(tag.to_string());
    }

    /// Remove the first exact match; no-op when the tag is absent.
    pub fn remove_tag(&mut self, tag: &str) {
        if let Some(idx) = self.tags.iter().position(|t| t == tag) {
            self.tags.remove(idx);
        }
    }

    /// Whether an RRULE is present. Expansion of the rule is left to
    /// external schedulers.
    pub fn has_recurrence(&self) -> bool {
        self.rrule.is_some()
    }

    /// Push this task to the server. `false` when no transport is bound
    /// or the request failed; errors never propagate past here.
    pub async fn save(&mut self) -> bool {
        let Some(transport) = self.transport.clone() else {
            log::warn!("task {} has no transport bound, cannot save", self.uid);
            return false;
        };
        match transport.put_task(self).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("saving task {} failed: {}", self.uid, e);
                false
            }
        }
    }

    /// Delete this task on the server. Tasks that were never persisted
    /// have nothing to delete remotely and report success.
    pub async fn delete(&self) -> bool {
        if self.href.is_empty() {
            return true;
        }
        let Some(transport) = self.transport.clone() else {
            log::warn!("task {} has no transport bound, cannot delete", self.uid);
            return false;
        };
        match transport.delete_task(self).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("deleting task {} failed: {}", self.uid, e);
                false
            }
        }
    }
}

impl Default for TaskRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskRecord {
    /// `"{summary}: due=.., priority=.., tags=[..], DONE"` with each
    /// clause present only when the field is, and no colon at all when
    /// none apply.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut clauses = Vec::new();
        if let Some(due) = &self.due {
            let rendered = match due {
                Due::Date(day) => day.format("%Y-%m-%d").to_string(),
                Due::DateTime(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
            };
            clauses.push(format!("due={rendered}"));
        }
        if let Some(priority) = self.priority {
            clauses.push(format!("priority={priority}"));
        }
        if self.has_tags() {
            clauses.push(format!("tags=[{}]", self.tags.join(",")));
        }
        if self.is_done() {
            clauses.push("DONE".to_string());
        }
        let summary = self.summary.as_deref().unwrap_or("");
        if clauses.is_empty() {
            write!(f, "{summary}")
        } else {
            write!(f, "{summary}: {}", clauses.join(", "))
        }
    }
}
