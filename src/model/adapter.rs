// Handles ICS serialization/deserialization for task records
use crate::model::parser::localize;
use crate::model::record::{Due, TaskRecord};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use icalendar::{Calendar, CalendarComponent, Component, Property, Todo};

fn format_utc_stamp(dt: &DateTime<Local>) -> String {
    dt.with_timezone(&Utc).format("%Y%m%dT%H%M%SZ").to_string()
}

/// Parse a DATE-TIME property value. Z-suffixed values are UTC and get
/// converted to the local offset, floating values are taken as local.
fn parse_datetime_value(val: &str) -> Option<DateTime<Local>> {
    if val.ends_with('Z') {
        NaiveDateTime::parse_from_str(val, "%Y%m%dT%H%M%SZ")
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive).with_timezone(&Local))
    } else {
        NaiveDateTime::parse_from_str(val, "%Y%m%dT%H%M%S")
            .ok()
            .map(localize)
    }
}

impl TaskRecord {
    /// Serialize back to the calendar wire format. Only present fields
    /// are emitted, so a cleared field stays absent on the server too.
    pub fn to_ics(&self) -> String {
        let mut todo = Todo::new();
        todo.uid(&self.uid);
        if let Some(summary) = &self.summary {
            todo.summary(summary);
        }
        todo.timestamp(Utc::now());

        match &self.due {
            Some(Due::Date(day)) => {
                let mut prop = Property::new("DUE", day.format("%Y%m%d").to_string().as_str());
                prop.add_parameter("VALUE", "DATE");
                todo.append_property(prop);
            }
            Some(Due::DateTime(dt)) => {
                let formatted = format_utc_stamp(dt);
                todo.add_property("DUE", &formatted);
            }
            None => {}
        }

        if let Some(priority) = self.priority {
            todo.priority(priority.into());
        }
        if let Some(status) = &self.status {
            todo.add_property("STATUS", status.as_str());
        }
        if let Some(completed) = &self.completed {
            let formatted = format_utc_stamp(completed);
            todo.add_property("COMPLETED", &formatted);
        }
        if let Some(rrule) = &self.rrule {
            todo.add_property("RRULE", rrule.as_str());
        }

        let mut calendar = Calendar::new();
        calendar.push(todo);
        let mut ics = calendar.to_string();

        // The icalendar crate escapes all commas in CATEGORIES, turning
        // "A,B" into one tag. Inject the correctly separated line by hand
        // instead, escaping only commas inside tag names.
        if !self.tags.is_empty() {
            let escaped: Vec<String> = self.tags.iter().map(|t| t.replace(',', "\\,")).collect();
            let cat_line = format!("CATEGORIES:{}", escaped.join(","));
            if let Some(idx) = ics.rfind("END:VTODO") {
                let (start, end) = ics.split_at(idx);
                ics = format!("{}{}\r\n{}", start, cat_line, end);
            }
        }

        ics
    }

    /// Wrap one fetched VTODO body into a record. `etag` and `href` are
    /// the server coordinates of the resource, `calendar_href` the
    /// collection it came from.
    pub fn from_ics(
        raw_ics: &str,
        etag: String,
        href: String,
        calendar_href: String,
    ) -> Result<Self, String> {
        let calendar: Calendar = raw_ics.parse().map_err(|e| format!("Parse: {}", e))?;
        let todo = calendar
            .components
            .iter()
            .find_map(|c| match c {
                CalendarComponent::Todo(t) => Some(t),
                _ => None,
            })
            .ok_or("No VTODO")?;

        let uid = todo.get_uid().unwrap_or_default().to_string();
        let summary = todo.get_summary().map(|s| s.to_string());
        let status = todo
            .properties()
            .get("STATUS")
            .map(|p| p.value().trim().to_string());
        let priority = todo
            .properties()
            .get("PRIORITY")
            .and_then(|p| p.value().parse::<u8>().ok())
            .filter(|p| *p != 0);

        // An 8-character value is a date-only due (DUE;VALUE=DATE),
        // anything else is a timestamp.
        let due = todo.properties().get("DUE").and_then(|p| {
            let val = p.value();
            if val.len() == 8 {
                NaiveDate::parse_from_str(val, "%Y%m%d").ok().map(Due::Date)
            } else {
                parse_datetime_value(val).map(Due::DateTime)
            }
        });

        let completed = todo
            .properties()
            .get("COMPLETED")
            .and_then(|p| parse_datetime_value(p.value()));

        let rrule = todo
            .properties()
            .get("RRULE")
            .map(|p| p.value().to_string());

        // CATEGORIES may show up as one property or several; collect all
        // of them, preserving order and dropping duplicates.
        let mut tags: Vec<String> = Vec::new();
        let mut collect = |value: &str| {
            for part in value.split(',') {
                let tag = part.trim().to_string();
                if !tag.is_empty() && !tags.contains(&tag) {
                    tags.push(tag);
                }
            }
        };
        if let Some(multi) = todo.multi_properties().get("CATEGORIES") {
            for prop in multi {
                collect(prop.value());
            }
        }
        if let Some(prop) = todo.properties().get("CATEGORIES") {
            collect(prop.value());
        }

        Ok(TaskRecord {
            uid,
            href,
            etag,
            calendar_href,
            summary,
            due,
            priority,
            status,
            completed,
            tags,
            rrule,
            transport: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//Nextcloud Tasks v0.16.1\r\n\
BEGIN:VTODO\r\n\
CATEGORIES:tag1,tag2\r\n\
CREATED:20250404T143018Z\r\n\
DTSTAMP:20250405T054613Z\r\n\
DUE;VALUE=DATE:20250407\r\n\
LAST-MODIFIED:20250405T054613Z\r\n\
SUMMARY:a test task\r\n\
UID:93cf66e2-9a70-4a7b-b350-0feddb9cf37a\r\n\
END:VTODO\r\n\
END:VCALENDAR\r\n";

    #[test]
    fn from_ics_reads_all_fields() {
        let task = TaskRecord::from_ics(
            FIXTURE,
            "\"etag-1\"".to_string(),
            "/cal/a.ics".to_string(),
            "/cal/".to_string(),
        )
        .unwrap();

        assert_eq!(task.get_uid(), "93cf66e2-9a70-4a7b-b350-0feddb9cf37a");
        assert_eq!(task.get_summary(), Some("a test task"));
        assert_eq!(task.get_tags(), ["tag1", "tag2"]);
        assert_eq!(
            task.get_due(),
            Some(Due::Date(NaiveDate::from_ymd_opt(2025, 4, 7).unwrap()))
        );
        assert!(!task.has_priority());
        assert!(task.get_status().is_none());
        assert!(!task.is_done());
        assert!(!task.has_recurrence());
        assert_eq!(task.etag, "\"etag-1\"");
        assert_eq!(task.href, "/cal/a.ics");
    }

    #[test]
    fn from_ics_without_vtodo_is_an_error() {
        let event = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:x\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        assert!(
            TaskRecord::from_ics(event, String::new(), String::new(), String::new()).is_err()
        );
    }

    #[test]
    fn to_ics_emits_only_present_fields() {
        let mut task = TaskRecord::new();
        task.set_uid("fixed-uid");
        task.set_summary(Some("a test task".to_string()));
        let ics = task.to_ics();

        assert!(ics.contains("UID:fixed-uid"));
        assert!(ics.contains("SUMMARY:a test task"));
        assert!(!ics.contains("DUE"));
        assert!(!ics.contains("PRIORITY"));
        assert!(!ics.contains("STATUS"));
        assert!(!ics.contains("CATEGORIES"));
    }

    #[test]
    fn to_ics_renders_date_only_due_as_date_value() {
        let mut task = TaskRecord::new();
        task.set_due(Some(NaiveDate::from_ymd_opt(2025, 4, 7).unwrap().into()));
        let ics = task.to_ics();
        assert!(ics.contains("DUE;VALUE=DATE:20250407"));
    }

    #[test]
    fn to_ics_keeps_tags_comma_separated() {
        let mut task = TaskRecord::new();
        task.add_tag("tag1");
        task.add_tag("tag2");
        let ics = task.to_ics();
        assert!(ics.contains("CATEGORIES:tag1,tag2"));
    }

    #[test]
    fn cleared_field_disappears_from_the_wire_format() {
        let mut task = TaskRecord::from_ics(
            FIXTURE,
            String::new(),
            String::new(),
            String::new(),
        )
        .unwrap();
        task.set_due(None);
        task.set_summary(None);
        let ics = task.to_ics();
        assert!(!ics.contains("DUE"));
        assert!(!ics.contains("SUMMARY"));
    }
}
