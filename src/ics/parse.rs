//! Plain-text event line parsing.
//!
//! The grammar is line-oriented and lenient: a line starts with an ISO
//! date, anything that does not is silently skipped. An ill-formed time
//! gets a warning on stderr and the line is dropped; nothing rejects the
//! file as a whole.

use anyhow::{anyhow, Result};
use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use std::sync::LazyLock;

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2})\s+(.*)$").expect("hardcoded regex"));

static TIME_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2}:\d{2})(?:-(\d{1,2}:\d{2}))?\s+(.*)$").expect("hardcoded regex")
});

static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s+href="([^"]+)">([^<]+)</a>"#).expect("hardcoded regex")
});

static AMOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*\S)\s+(\d{2,})\s*$").expect("hardcoded regex"));

/// Multi-day grouping marker carried by a line's summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    None,
    Begin,
    End,
}

/// One successfully parsed event line.
#[derive(Debug, Clone)]
pub struct ParsedLine {
    pub date: NaiveDate,
    pub start: Option<NaiveTime>,
    /// Days to add to `date` for the start ("24:00" rolls over)
    pub start_offset: i64,
    pub end: Option<NaiveTime>,
    pub end_offset: i64,
    pub summary: String,
    pub url: Option<String>,
    pub description: Option<String>,
    pub marker: Marker,
}

/// Parse a `HH:MM` token.
///
/// Returns the time plus a day offset: "24:00" means midnight of the
/// following day.
pub fn parse_time(t: &str) -> Result<(NaiveTime, i64)> {
    let (h, m) = t
        .split_once(':')
        .ok_or_else(|| anyhow!("invalid time format: {:?}", t))?;
    let h: u32 = h
        .parse()
        .map_err(|_| anyhow!("invalid time numbers: {:?}", t))?;
    let m: u32 = m
        .parse()
        .map_err(|_| anyhow!("invalid time numbers: {:?}", t))?;

    if h == 24 && m == 0 {
        return Ok((NaiveTime::MIN, 1));
    }

    NaiveTime::from_hms_opt(h, m, 0)
        .map(|time| (time, 0))
        .ok_or_else(|| anyhow!("hour must be in 0..23 and minutes in 0..59, got {:?}", t))
}

/// Parse every event line in `text`, skipping what the grammar cannot read.
pub fn parse_lines(text: &str) -> Vec<ParsedLine> {
    let mut parsed = Vec::new();

    'lines: for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        // ignore code fences if present
        if line.starts_with("```") || line.ends_with("```") {
            continue;
        }
        let Some(caps) = DATE_RE.captures(line) else {
            continue;
        };
        let Ok(date) = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d") else {
            continue;
        };
        let rest = caps[2].trim();

        // split comment after '#'
        let (main, comment) = match rest.split_once('#') {
            Some((m, c)) => (m.trim(), Some(c.trim())),
            None => (rest, None),
        };

        let (main, url) = extract_anchor(main);

        // detect a time range at the beginning of the entry
        let mut start = None;
        let mut start_offset = 0;
        let mut end = None;
        let mut end_offset = 0;
        let mut summary_part = main.clone();
        if let Some(tcaps) = TIME_RANGE_RE.captures(&main) {
            match parse_time(&tcaps[1]) {
                Ok((t, off)) => {
                    start = Some(t);
                    start_offset = off;
                }
                Err(err) => {
                    eprintln!("Warning: invalid start time on line {:?}: {}", raw, err);
                    continue 'lines;
                }
            }
            if let Some(end_match) = tcaps.get(2) {
                match parse_time(end_match.as_str()) {
                    Ok((t, off)) => {
                        end = Some(t);
                        end_offset = off;
                    }
                    Err(err) => {
                        eprintln!("Warning: invalid end time on line {:?}: {}", raw, err);
                        continue 'lines;
                    }
                }
            }
            summary_part = tcaps[3].trim().to_string();
        }

        // trailing numeric token becomes an amount note
        let mut amount = None;
        if comment.is_none() {
            if let Some(acaps) = AMOUNT_RE.captures(&summary_part) {
                amount = Some(format!("Amount: {}", &acaps[2]));
                summary_part = acaps[1].to_string();
            }
        }

        // begin/end markers close the summary
        let mut marker = Marker::None;
        let n = summary_part.len();
        if n >= 6
            && summary_part
                .get(n - 6..)
                .is_some_and(|s| s.eq_ignore_ascii_case(" begin"))
        {
            marker = Marker::Begin;
            summary_part.truncate(n - 6);
        } else if n >= 4
            && summary_part
                .get(n - 4..)
                .is_some_and(|s| s.eq_ignore_ascii_case(" end"))
        {
            marker = Marker::End;
            summary_part.truncate(n - 4);
        }

        let summary = unescape_entities(summary_part.trim());

        let mut desc_parts = Vec::new();
        if let Some(comment) = comment {
            desc_parts.push(unescape_entities(comment));
        }
        if let Some(amount) = amount {
            desc_parts.push(amount);
        }
        let description = if desc_parts.is_empty() {
            None
        } else {
            Some(desc_parts.join("; "))
        };

        parsed.push(ParsedLine {
            date,
            start,
            start_offset,
            end,
            end_offset,
            summary,
            url,
            description,
            marker,
        });
    }

    parsed
}

/// Replace the first anchor with its label; its href becomes the URL.
fn extract_anchor(text: &str) -> (String, Option<String>) {
    let Some(caps) = ANCHOR_RE.captures(text) else {
        return (text.to_string(), None);
    };
    let href = caps[1].to_string();
    let label = caps[2].to_string();
    let replaced = ANCHOR_RE.replacen(text, 1, regex::NoExpand(&label));
    let url = if href.starts_with('/') {
        format!("file://{}", href)
    } else {
        href
    };
    (replaced.into_owned(), Some(url))
}

fn unescape_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
