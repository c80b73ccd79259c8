//! Multi-day grouping and iCalendar generation.

use super::parse::{Marker, ParsedLine};
use super::{slugify, EventTime, IcsEvent};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use icalendar::{Calendar, Component, Event as VEvent, EventLike, Property, ValueType};
use std::collections::HashMap;

/// Fold parsed lines into events.
///
/// `begin` lines open a multi-day event keyed by the slugified summary and
/// the matching `end` closes it (inclusive dates, exclusive DTEND); every
/// same-summary line in between is swallowed. An unmatched `end` degrades
/// to a single all-day event, an unmatched `begin` produces nothing.
/// Remaining lines become timed or all-day events on their own.
pub fn group_events(mut lines: Vec<ParsedLine>, tz: Tz) -> Vec<IcsEvent> {
    lines.sort_by_key(|l| l.date);

    let mut events = Vec::new();
    let mut consumed = vec![false; lines.len()];
    let mut ongoing: HashMap<String, Vec<usize>> = HashMap::new();

    for i in 0..lines.len() {
        match lines[i].marker {
            Marker::Begin => {
                consumed[i] = true;
                ongoing
                    .entry(slugify(&lines[i].summary))
                    .or_default()
                    .push(i);
            }
            Marker::End => {
                let key = slugify(&lines[i].summary);
                let opened = ongoing
                    .get_mut(&key)
                    .filter(|open| !open.is_empty())
                    .map(|open| open.remove(0));

                if let Some(start_idx) = opened {
                    for (j, line) in lines.iter().enumerate().take(i + 1).skip(start_idx) {
                        if slugify(&line.summary) == key {
                            consumed[j] = true;
                        }
                    }
                    let first = &lines[start_idx];
                    let last = &lines[i];
                    let summary = if first.summary.is_empty() {
                        last.summary.clone()
                    } else {
                        first.summary.clone()
                    };
                    events.push(IcsEvent {
                        start: EventTime::Date(first.date),
                        end: EventTime::Date(last.date + Duration::days(1)),
                        summary,
                        url: first.url.clone().or_else(|| last.url.clone()),
                        description: first.description.clone().or_else(|| last.description.clone()),
                    });
                } else {
                    consumed[i] = true;
                    events.push(all_day(&lines[i]));
                }
            }
            Marker::None => {}
        }
    }

    for (i, line) in lines.iter().enumerate() {
        if consumed[i] {
            continue;
        }
        if line.start.is_some() || line.end.is_some() {
            match timed_event(line, tz) {
                Some(event) => events.push(event),
                None => eprintln!(
                    "Warning: skipping {:?}, its local time does not exist in {}",
                    line.summary, tz
                ),
            }
        } else {
            events.push(all_day(line));
        }
    }

    events.sort_by_key(|e| e.sort_key());
    events
}

fn all_day(line: &ParsedLine) -> IcsEvent {
    IcsEvent {
        start: EventTime::Date(line.date),
        end: EventTime::Date(line.date + Duration::days(1)),
        summary: line.summary.clone(),
        url: line.url.clone(),
        description: line.description.clone(),
    }
}

fn timed_event(line: &ParsedLine, tz: Tz) -> Option<IcsEvent> {
    let start_time = line.start.unwrap_or(NaiveTime::MIN);
    let start_naive = (line.date + Duration::days(line.start_offset)).and_time(start_time);

    let mut end_naive = match line.end {
        Some(t) => (line.date + Duration::days(line.end_offset)).and_time(t),
        // default 1 hour duration
        None => start_naive + Duration::hours(1),
    };
    // an end at or before the start belongs to the next day
    if end_naive <= start_naive {
        end_naive += Duration::days(1);
    }

    Some(IcsEvent {
        start: EventTime::Zoned(localize(start_naive, tz)?),
        end: EventTime::Zoned(localize(end_naive, tz)?),
        summary: line.summary.clone(),
        url: line.url.clone(),
        description: line.description.clone(),
    })
}

fn localize(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => Some(dt),
        chrono::LocalResult::Ambiguous(earliest, _) => Some(earliest),
        chrono::LocalResult::None => None,
    }
}

/// Keep only events starting on or after `min_date` (inclusive).
pub fn filter_from(events: Vec<IcsEvent>, min_date: NaiveDate) -> Vec<IcsEvent> {
    events
        .into_iter()
        .filter(|e| e.start_date() >= min_date)
        .collect()
}

/// Render the events as an iCalendar document.
pub fn to_ics(events: &[IcsEvent], calendar_name: &str, tz: Tz, owner: &str) -> String {
    let dtstamp = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();

    let mut cal = Calendar::new();
    cal.append_property(Property::new("X-WR-CALNAME", calendar_name));
    cal.append_property(Property::new("X-WR-TIMEZONE", tz.name()));

    for event in events {
        cal.push(vevent(event, tz, owner, &dtstamp));
    }

    cal.to_string()
}

fn vevent(event: &IcsEvent, tz: Tz, owner: &str, dtstamp: &str) -> VEvent {
    let mut out = VEvent::new();
    out.uid(&uid(event, owner));
    out.summary(&event.summary);
    out.add_property("DTSTAMP", dtstamp);

    add_event_time(&mut out, "DTSTART", &event.start, tz);
    add_event_time(&mut out, "DTEND", &event.end, tz);

    if let Some(ref desc) = event.description {
        out.description(desc);
    }
    if let Some(ref url) = event.url {
        out.add_property("URL", url);
    }

    out.done()
}

/// Add a date or zoned datetime property with the matching parameters.
fn add_event_time(out: &mut VEvent, name: &str, time: &EventTime, tz: Tz) {
    match time {
        EventTime::Date(d) => {
            let mut prop = Property::new(name, d.format("%Y%m%d").to_string());
            prop.append_parameter(ValueType::Date);
            out.append_property(prop);
        }
        EventTime::Zoned(dt) => {
            let mut prop = Property::new(name, dt.format("%Y%m%dT%H%M%S").to_string());
            prop.add_parameter("TZID", tz.name());
            out.append_property(prop);
        }
    }
}

/// Deterministic UID: slug, start stamp, owner.
fn uid(event: &IcsEvent, owner: &str) -> String {
    match &event.start {
        EventTime::Zoned(dt) => format!(
            "{}-{}-{}",
            slugify(&event.summary),
            dt.format("%Y%m%dT%H%M%S"),
            owner
        ),
        EventTime::Date(d) => {
            format!("{}-{}-{}", slugify(&event.summary), d.format("%Y%m%d"), owner)
        }
    }
}
