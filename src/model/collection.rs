// An ordered collection of task records with tag and due-date filtering.
use crate::client::{DavTransport, RawTodo};
use crate::config::Config;
use crate::model::parser::{localize, string_to_datetime};
use crate::model::record::{Due, TaskRecord};
use chrono::{DateTime, Local, NaiveDate, NaiveTime};

/// One bound of a due-date range query.
///
/// Strings go through [`string_to_datetime`]; empty or unparseable ones
/// leave the bound open. A plain [`NaiveDate`] keeps its day-only nature
/// and is promoted to day start or day end depending on which side of
/// the range it ends up on.
#[derive(Clone, Copy, Debug)]
pub enum DueBound {
    Open,
    Day(NaiveDate),
    Instant(DateTime<Local>),
}

impl DueBound {
    /// The bound as an inclusive lower limit. Day bounds start at local
    /// midnight.
    fn lower(&self) -> Option<DateTime<Local>> {
        match self {
            DueBound::Open => None,
            DueBound::Day(day) => Some(localize(day.and_time(NaiveTime::MIN))),
            DueBound::Instant(dt) => Some(*dt),
        }
    }

    /// The bound as an exclusive upper limit. Day bounds cover their
    /// whole day, so the limit is the following midnight.
    fn upper(&self) -> Option<DateTime<Local>> {
        match self {
            DueBound::Open => None,
            DueBound::Day(day) => day
                .succ_opt()
                .map(|next| localize(next.and_time(NaiveTime::MIN))),
            DueBound::Instant(dt) => Some(*dt),
        }
    }
}

impl From<&str> for DueBound {
    fn from(value: &str) -> Self {
        match string_to_datetime(value) {
            Some(dt) => DueBound::Instant(dt),
            None => DueBound::Open,
        }
    }
}

impl From<NaiveDate> for DueBound {
    fn from(day: NaiveDate) -> Self {
        DueBound::Day(day)
    }
}

impl From<DateTime<Local>> for DueBound {
    fn from(dt: DateTime<Local>) -> Self {
        DueBound::Instant(dt)
    }
}

/// The tag side of a tag filter: one tag or any sequence of them,
/// converted from the shapes callers actually hold.
#[derive(Clone, Debug, Default)]
pub struct TagQuery(Vec<String>);

impl TagQuery {
    fn matches(&self, tags: &[String]) -> bool {
        tags.iter().any(|t| self.0.contains(t))
    }
}

impl From<&str> for TagQuery {
    fn from(tag: &str) -> Self {
        Self(vec![tag.to_string()])
    }
}

impl From<String> for TagQuery {
    fn from(tag: String) -> Self {
        Self(vec![tag])
    }
}

impl From<&[&str]> for TagQuery {
    fn from(tags: &[&str]) -> Self {
        Self(tags.iter().map(|t| t.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for TagQuery {
    fn from(tags: [&str; N]) -> Self {
        Self(tags.iter().map(|t| t.to_string()).collect())
    }
}

impl From<&[String]> for TagQuery {
    fn from(tags: &[String]) -> Self {
        Self(tags.to_vec())
    }
}

impl From<Vec<String>> for TagQuery {
    fn from(tags: Vec<String>) -> Self {
        Self(tags)
    }
}

/// An insertion-ordered collection of [`TaskRecord`]s bound to one
/// calendar. Filtering never mutates the collection; query results
/// borrow the records in their original order.
#[derive(Debug, Default)]
pub struct TaskCollection {
    config: Config,
    transport: Option<DavTransport>,
    calendar_href: Option<String>,
    tasks: Vec<TaskRecord>,
}

impl TaskCollection {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            transport: None,
            calendar_href: None,
            tasks: Vec::new(),
        }
    }

    pub fn tasks(&self) -> &[TaskRecord] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some() && self.calendar_href.is_some()
    }

    /// Build the transport from the configuration, resolve the
    /// configured calendar and pull its tasks.
    pub async fn connect(&mut self) -> Result<(), String> {
        let transport = DavTransport::new(
            &self.config.url,
            &self.config.username,
            &self.config.password,
            self.config.allow_insecure_certs,
        )?;
        let calendar_href = match &self.config.calendar {
            Some(name) => transport.find_calendar(name).await?,
            None => transport.discover_calendar().await?,
        };
        self.transport = Some(transport);
        self.calendar_href = Some(calendar_href);
        if !self.populate(None).await {
            return Err("could not fetch tasks from the server".to_string());
        }
        Ok(())
    }

    /// Bind an already-built transport and calendar instead of going
    /// through [`connect`](Self::connect).
    pub fn bind(&mut self, transport: DavTransport, calendar_href: String) {
        self.transport = Some(transport);
        self.calendar_href = Some(calendar_href);
    }

    /// Replace the task sequence. With `Some(records)` each raw body is
    /// wrapped into a [`TaskRecord`]; with `None` the records are fetched
    /// from the bound calendar. `false` when no source was available.
    /// Bodies that fail to parse are skipped with a warning.
    pub async fn populate(&mut self, records: Option<Vec<RawTodo>>) -> bool {
        let raw = match records {
            Some(raw) => raw,
            None => {
                let (Some(transport), Some(href)) = (&self.transport, &self.calendar_href) else {
                    return false;
                };
                match transport.fetch_raw(href).await {
                    Ok(raw) => raw,
                    Err(e) => {
                        log::warn!("fetching tasks failed: {}", e);
                        return false;
                    }
                }
            }
        };

        let calendar_href = self.calendar_href.clone().unwrap_or_default();
        self.tasks.clear();
        for record in raw {
            match TaskRecord::from_ics(&record.data, record.etag, record.href, calendar_href.clone())
            {
                Ok(mut task) => {
                    if let Some(transport) = &self.transport {
                        task.bind_transport(transport.clone());
                    }
                    self.tasks.push(task);
                }
                Err(e) => log::warn!("skipping unparseable VTODO: {}", e),
            }
        }
        log::debug!("collection populated with {} tasks", self.tasks.len());
        true
    }

    /// Create a new task, persist it right away when connected, append
    /// it and hand back a reference to the stored record. Without a
    /// connection the task stays local.
    pub async fn add(
        &mut self,
        summary: &str,
        due: Option<Due>,
        priority: Option<u8>,
        tags: Vec<String>,
    ) -> &TaskRecord {
        let mut task = TaskRecord::new();
        task.set_summary(Some(summary.to_string()));
        task.set_due(due);
        task.set_priority(priority);
        for tag in &tags {
            task.add_tag(tag);
        }

        if let (Some(transport), Some(href)) = (&self.transport, &self.calendar_href) {
            task.calendar_href = href.clone();
            task.bind_transport(transport.clone());
            if !task.save().await {
                log::warn!("new task {} was not persisted, keeping it local", task.get_uid());
            }
        }

        let idx = self.tasks.len();
        self.tasks.push(task);
        &self.tasks[idx]
    }

    /// Append an existing record; no-op when a record with the same UID
    /// is already present.
    pub fn add_existing(&mut self, task: TaskRecord) {
        if self.tasks.iter().any(|t| t.get_uid() == task.get_uid()) {
            return;
        }
        self.tasks.push(task);
    }

    /// Delete the first record with this UID (remotely, when bound) and
    /// drop it from the sequence. `false` when no record matches.
    pub async fn remove_by_uid(&mut self, uid: &str) -> bool {
        let Some(idx) = self.tasks.iter().position(|t| t.get_uid() == uid) else {
            return false;
        };
        let task = self.tasks.remove(idx);
        if !task.delete().await {
            log::warn!("remote delete of task {} failed, removed locally anyway", uid);
        }
        true
    }

    pub fn find_by_uid(&self, uid: &str) -> Option<&TaskRecord> {
        self.tasks.iter().find(|t| t.get_uid() == uid)
    }

    pub fn find_by_uid_mut(&mut self, uid: &str) -> Option<&mut TaskRecord> {
        self.tasks.iter_mut().find(|t| t.get_uid() == uid)
    }

    /// Records matching the predicate, in their original order.
    pub fn filter<P>(&self, predicate: P) -> Vec<&TaskRecord>
    where
        P: Fn(&TaskRecord) -> bool,
    {
        self.tasks.iter().filter(|task| predicate(task)).collect()
    }

    /// Records whose tag set intersects the query, or, with `exclude`,
    /// the ones whose tag set does not. Takes a single tag or a sequence
    /// of them, see [`TagQuery`].
    pub fn filter_by_tags(&self, tags: impl Into<TagQuery>, exclude: bool) -> Vec<&TaskRecord> {
        let query = tags.into();
        self.filter(|task| !exclude == query.matches(task.get_tags()))
    }

    /// Records due at the parsed query instant. A query that parses to
    /// plain midnight compares by day only, so a due of 10:45 on that
    /// day still matches. An empty or unparseable query passes every
    /// record that has a due at all; records without one never match.
    pub fn filter_by_date(&self, date_str: &str) -> Vec<&TaskRecord> {
        let query = string_to_datetime(date_str);
        self.filter(|task| {
            let Some(due) = task.get_due() else {
                return false;
            };
            match query {
                None => true,
                Some(q) if q.time() == NaiveTime::MIN => due.day_start() == q,
                Some(q) => due.as_local() == q,
            }
        })
    }

    /// Records with `start <= due < end`. The start is inclusive and the
    /// end exclusive; that asymmetry is deliberate and kept as-is. Each
    /// bound is independently optional, date-only dues count as local
    /// midnight.
    pub fn filter_by_daterange(
        &self,
        start: impl Into<DueBound>,
        end: impl Into<DueBound>,
    ) -> Vec<&TaskRecord> {
        let start = start.into().lower();
        let end = end.into().upper();
        self.filter(|task| {
            let Some(due) = task.get_due() else {
                return false;
            };
            let due = due.as_local();
            if let Some(start) = start
                && due < start
            {
                return false;
            }
            if let Some(end) = end
                && due >= end
            {
                return false;
            }
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(summary: &str, due: Option<Due>, tags: &[&str]) -> TaskRecord {
        let mut task = TaskRecord::new();
        task.set_summary(Some(summary.to_string()));
        task.set_due(due);
        for tag in tags {
            task.add_tag(tag);
        }
        task
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> TaskCollection {
        let mut collection = TaskCollection::default();
        collection.add_existing(record(
            "a test task",
            Some(day(2025, 4, 7).into()),
            &["tag1", "tag2"],
        ));
        collection.add_existing(record(
            "another test task",
            Some(day(2025, 4, 8).into()),
            &["tag1"],
        ));
        collection.add_existing(record(
            "the third test task",
            Some(day(2025, 5, 3).and_hms_opt(10, 45, 0).unwrap().into()),
            &[],
        ));
        collection
    }

    fn summaries(tasks: &[&TaskRecord]) -> Vec<String> {
        tasks
            .iter()
            .map(|t| t.get_summary().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn add_existing_is_idempotent_by_uid() {
        let mut collection = TaskCollection::default();
        let task = record("once", None, &[]);
        let duplicate = task.clone();
        collection.add_existing(task);
        collection.add_existing(duplicate);
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn find_by_uid_hits_and_misses() {
        let collection = sample();
        let uid = collection.tasks()[1].get_uid().to_string();
        assert_eq!(
            collection.find_by_uid(&uid).and_then(|t| t.get_summary()),
            Some("another test task")
        );
        assert!(collection.find_by_uid("no-such-uid").is_none());
    }

    #[test]
    fn filter_keeps_original_order() {
        let collection = sample();
        let due_bearing = collection.filter(|t| t.has_due());
        assert_eq!(
            summaries(&due_bearing),
            ["a test task", "another test task", "the third test task"]
        );
    }

    #[test]
    fn filter_by_tags_intersects() {
        let collection = sample();
        assert_eq!(
            summaries(&collection.filter_by_tags("tag1", false)),
            ["a test task", "another test task"]
        );
        assert_eq!(
            summaries(&collection.filter_by_tags("tag1", true)),
            ["the third test task"]
        );
        assert_eq!(
            summaries(&collection.filter_by_tags(["tag2", "nope"], false)),
            ["a test task"]
        );
        assert_eq!(
            summaries(&collection.filter_by_tags(vec!["tag2".to_string()], false)),
            ["a test task"]
        );
    }

    #[test]
    fn daterange_end_is_exclusive() {
        let collection = sample();
        // 2025-04-08 parses to midnight, so the task due that day falls
        // outside the range
        assert_eq!(
            summaries(&collection.filter_by_daterange("", "2025-04-08")),
            ["a test task"]
        );
    }

    #[test]
    fn daterange_start_is_inclusive() {
        let collection = sample();
        assert_eq!(
            summaries(&collection.filter_by_daterange("2025-04-08", "")),
            ["another test task", "the third test task"]
        );
    }

    #[test]
    fn daterange_day_bound_covers_its_whole_day() {
        let collection = sample();
        // a date-only end bound is promoted to day end, unlike the
        // midnight instant a string bound parses to
        assert_eq!(
            summaries(&collection.filter_by_daterange(DueBound::Open, day(2025, 4, 8))),
            ["a test task", "another test task"]
        );
    }

    #[test]
    fn daterange_ignores_records_without_due() {
        let mut collection = sample();
        collection.add_existing(record("a dateless task", None, &["tag2"]));
        assert_eq!(
            summaries(&collection.filter_by_daterange("", "")),
            ["a test task", "another test task", "the third test task"]
        );
    }

    #[test]
    fn date_filter_matches_day_only_queries_against_timestamps() {
        let collection = sample();
        assert_eq!(
            summaries(&collection.filter_by_date("2025-05-03")),
            ["the third test task"]
        );
    }

    #[test]
    fn date_filter_matches_full_timestamps_exactly() {
        let collection = sample();
        assert_eq!(
            summaries(&collection.filter_by_date("2025-05-03 10:45")),
            ["the third test task"]
        );
        assert!(collection.filter_by_date("2025-05-03 10:46").is_empty());
    }

    #[test]
    fn date_filter_with_empty_query_passes_due_bearing_records() {
        let mut collection = sample();
        collection.add_existing(record("a dateless task", None, &[]));
        assert_eq!(collection.filter_by_date("").len(), 3);
    }

    #[tokio::test]
    async fn populate_without_any_source_fails() {
        let mut collection = TaskCollection::default();
        assert!(!collection.populate(None).await);
    }

    #[tokio::test]
    async fn add_without_connection_stays_local() {
        let mut collection = TaskCollection::default();
        let uid = {
            let task = collection
                .add("a local task", Some(day(2025, 4, 7).into()), Some(2), vec![])
                .await;
            assert_eq!(task.get_summary(), Some("a local task"));
            assert!(task.href.is_empty());
            task.get_uid().to_string()
        };
        assert!(collection.find_by_uid(&uid).is_some());
    }

    #[tokio::test]
    async fn remove_by_uid_drops_the_record() {
        let mut collection = sample();
        let uid = collection.tasks()[0].get_uid().to_string();
        assert!(collection.remove_by_uid(&uid).await);
        assert_eq!(collection.len(), 2);
        assert!(!collection.remove_by_uid(&uid).await);
    }
}
