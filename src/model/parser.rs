// Handles date-string parsing for the filter queries
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

/// Attach the local offset to a naive timestamp. Instants that fall
/// into a DST gap resolve to the earliest valid interpretation.
pub(crate) fn localize(naive: NaiveDateTime) -> DateTime<Local> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| Local.from_utc_datetime(&naive))
}

/// Parse a user-supplied date string into a local timestamp.
///
/// Formats are tried in order, first match wins:
/// `%Y-%m-%d`, `%Y-%m-%d %H:%M`, `%Y%m%d`, `%Y%m%dT%H%MZ`.
/// Date-only formats yield local midnight. Empty or unparseable input
/// yields `None`; it is not an error.
pub fn string_to_datetime(value: &str) -> Option<DateTime<Local>> {
    const FORMATS: &[(&str, bool)] = &[
        ("%Y-%m-%d", true),
        ("%Y-%m-%d %H:%M", false),
        ("%Y%m%d", true),
        ("%Y%m%dT%H%MZ", false),
    ];
    for (format, date_only) in FORMATS {
        let parsed = if *date_only {
            NaiveDate::parse_from_str(value, format)
                .ok()
                .map(|day| day.and_time(NaiveTime::MIN))
        } else {
            NaiveDateTime::parse_from_str(value, format).ok()
        };
        if let Some(naive) = parsed {
            return Some(localize(naive));
        }
    }
    None
}
