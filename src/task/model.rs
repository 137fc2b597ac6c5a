#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use time::format_description::OwnedFormatItem;
use time::{Date, OffsetDateTime, UtcOffset};
use uuid::Uuid;

use crate::error::TodoError;

/// A single to-do entry.
///
/// Field names follow the persisted blob (`isCompleted` is camelCase on disk).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "iso8601")]
    pub date: OffsetDateTime,
    #[serde(default)]
    pub is_completed: bool,
}

impl Task {
    /// Builds an open task with a fresh id. The date is normalized to UTC at
    /// millisecond precision so it survives a trip through the blob unchanged.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        date: OffsetDateTime,
    ) -> Self {
        Self {
            id: Self::new_id(),
            title: title.into(),
            description: description.into(),
            date: normalize_date(date),
            is_completed: false,
        }
    }

    #[must_use]
    pub fn new_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    #[must_use]
    pub fn short_id(&self) -> &str {
        self.id.get(..8).unwrap_or(&self.id)
    }
}

#[must_use]
pub fn normalize_date(date: OffsetDateTime) -> OffsetDateTime {
    let utc = date.to_offset(UtcOffset::UTC);
    utc.replace_millisecond(utc.millisecond()).unwrap_or(utc)
}

pub fn encode_tasks(tasks: &[Task]) -> serde_json::Result<String> {
    serde_json::to_string(tasks)
}

pub fn decode_tasks(blob: &str) -> serde_json::Result<Vec<Task>> {
    serde_json::from_str(blob)
}

/// Default display format, the same shape as `Date.toDateString()`
/// (`Mon Jan 01 2024`).
pub const DEFAULT_DATE_FORMAT: &str = "[weekday repr:short] [month repr:short] [day] [year]";

pub fn parse_date_format(spec: &str) -> anyhow::Result<OwnedFormatItem> {
    time::format_description::parse_owned::<2>(spec)
        .map_err(|e| anyhow::anyhow!("invalid date format '{spec}': {e}"))
}

#[must_use]
pub fn format_date(date: OffsetDateTime, format: &OwnedFormatItem) -> String {
    date.format(format)
        .unwrap_or_else(|_| date.date().to_string())
}

/// Parses a `YYYY-MM-DD` calendar date into midnight UTC.
pub fn parse_day(input: &str) -> Result<OffsetDateTime, TodoError> {
    let fmt = time::macros::format_description!("[year]-[month]-[day]");
    let day = Date::parse(input.trim(), fmt).map_err(|_| TodoError::InvalidDate(input.to_owned()))?;
    Ok(day.midnight().assume_utc())
}

/// RFC 3339 on the way out (UTC, millisecond precision, `Z` suffix), any
/// RFC 3339 timestamp on the way in.
mod iso8601 {
    use serde::{Deserialize as _, Deserializer, Serializer};
    use time::format_description::well_known::Rfc3339;
    use time::{OffsetDateTime, UtcOffset};

    const OUT: &[time::format_description::BorrowedFormatItem<'static>] = time::macros::format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    );

    pub fn serialize<S: Serializer>(date: &OffsetDateTime, s: S) -> Result<S::Ok, S::Error> {
        let out = date
            .to_offset(UtcOffset::UTC)
            .format(OUT)
            .map_err(serde::ser::Error::custom)?;
        s.serialize_str(&out)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<OffsetDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        OffsetDateTime::parse(&raw, &Rfc3339).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn blob_round_trip_keeps_every_field() {
        let described = Task::new("Write report", "Quarterly numbers", datetime!(2024-03-10 9:30 UTC));
        let mut completed = Task::new("Call mom", "", datetime!(2024-01-01 0:00 UTC));
        completed.is_completed = true;
        let title_only = Task::new("Buy milk", "", datetime!(2023-12-31 23:59:59 UTC));
        let tasks = vec![described, completed, title_only];

        let blob = encode_tasks(&tasks).unwrap();
        let decoded = decode_tasks(&blob).unwrap();

        assert_eq!(decoded, tasks);
        assert_eq!(decoded[0].date, datetime!(2024-03-10 9:30 UTC));
    }

    #[test]
    fn dates_are_written_as_iso_strings() {
        let mut task = Task::new("Buy milk", "", datetime!(2024-01-01 0:00 UTC));
        task.id = "abc".to_owned();
        let blob = encode_tasks(std::slice::from_ref(&task)).unwrap();
        assert_eq!(
            blob,
            r#"[{"id":"abc","title":"Buy milk","description":"","date":"2024-01-01T00:00:00.000Z","isCompleted":false}]"#
        );
    }

    #[test]
    fn decodes_offsets_and_missing_optional_fields() {
        let blob = r#"[{"id":"1","title":"t","date":"2024-01-01T02:00:00+02:00"}]"#;
        let tasks = decode_tasks(blob).unwrap();
        assert_eq!(tasks[0].date, datetime!(2024-01-01 0:00 UTC));
        assert!(tasks[0].description.is_empty());
        assert!(!tasks[0].is_completed);

        assert!(decode_tasks(r#"[{"id":"1","title":"t","date":"yesterday"}]"#).is_err());
    }

    #[test]
    fn new_task_normalizes_date_and_starts_open() {
        let task = Task::new("x", "", datetime!(2024-05-05 10:00:00.123456789 +03:00));
        assert_eq!(task.date, datetime!(2024-05-05 7:00:00.123 UTC));
        assert!(!task.is_completed);
        assert_eq!(task.id.len(), 32);
    }

    #[test]
    fn formats_like_to_date_string() {
        let fmt = parse_date_format(DEFAULT_DATE_FORMAT).unwrap();
        assert_eq!(format_date(datetime!(2024-01-01 0:00 UTC), &fmt), "Mon Jan 01 2024");
        assert!(parse_date_format("[nonsense").is_err());
    }

    #[test]
    fn parses_calendar_days() {
        assert_eq!(parse_day("2024-01-01").unwrap(), datetime!(2024-01-01 0:00 UTC));
        assert!(matches!(parse_day("01/02/2024"), Err(TodoError::InvalidDate(_))));
    }
}
