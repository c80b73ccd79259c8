//! Event-file export to iCalendar.
//!
//! The same plain-text file the renderer consumes can be exported as an
//! `.ics` document: lines are parsed leniently (`parse`), begin/end pairs
//! are folded into multi-day events, and the result is emitted with the
//! `icalendar` crate (`generate`).

pub mod generate;
pub mod parse;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;

/// Start or end of an exported event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventTime {
    /// All-day and multi-day events; DTEND is exclusive.
    Date(NaiveDate),
    /// Timed events in the configured timezone.
    Zoned(DateTime<Tz>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcsEvent {
    pub start: EventTime,
    pub end: EventTime,
    pub summary: String,
    pub url: Option<String>,
    pub description: Option<String>,
}

impl IcsEvent {
    /// Calendar date the event starts on, in its own timezone.
    pub fn start_date(&self) -> NaiveDate {
        match &self.start {
            EventTime::Date(d) => *d,
            EventTime::Zoned(dt) => dt.date_naive(),
        }
    }

    pub(crate) fn sort_key(&self) -> NaiveDateTime {
        match &self.start {
            EventTime::Date(d) => d.and_time(NaiveTime::MIN),
            EventTime::Zoned(dt) => dt.naive_local(),
        }
    }
}

/// Reduce a summary to a UID-safe slug: lower case, single underscores for
/// whitespace runs, `[a-z0-9_@-]` only, at most 80 bytes, never empty.
pub fn slugify(s: &str) -> String {
    let lowered = s.trim().to_lowercase();
    let joined = lowered.split_whitespace().collect::<Vec<_>>().join("_");
    let mut slug: String = joined
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '@' | '-'))
        .collect();
    slug.truncate(80);
    if slug.is_empty() {
        "event".to_string()
    } else {
        slug
    }
}
