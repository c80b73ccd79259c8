//! The per-run substitution rule set.
//!
//! The renderer's raw HTML page is decorated by a small ordered set of
//! text-replacement rules, recomputed from the current date on every run,
//! written to an ephemeral script, handed to the stream editor once, and
//! discarded. Rules must always emit syntactically valid stream-editor
//! script lines, whatever text they carry.

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use std::io::Write;
use tempfile::NamedTempFile;

/// Two-digit month followed by two-digit year: June 2025 -> "0625".
///
/// The event file labels each month with an anchor named by this tag.
pub fn month_tag(date: NaiveDate) -> String {
    format!("{:02}{:02}", date.month(), date.year() % 100)
}

/// A single text-replacement rule, in application order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Replace the first occurrence of `pattern` on each matching line.
    Replace { pattern: String, replacement: String },
    /// Insert a line of text before each line matching `pattern`.
    InsertBefore { pattern: String, text: String },
    /// Append a line of text after each line matching `pattern`.
    InsertAfter { pattern: String, text: String },
}

impl Rule {
    /// Emit the rule as one stream-editor script fragment.
    pub fn to_sed(&self) -> String {
        match self {
            Rule::Replace { pattern, replacement } => format!(
                "s|{}|{}|",
                escape_pattern(pattern, '|'),
                escape_replacement(replacement)
            ),
            Rule::InsertBefore { pattern, text } => {
                format!("/{}/i\\\n{}", escape_pattern(pattern, '/'), escape_text(text))
            }
            Rule::InsertAfter { pattern, text } => {
                format!("/{}/a\\\n{}", escape_pattern(pattern, '/'), escape_text(text))
            }
        }
    }
}

/// Escape a literal string for use as a basic-regex pattern with `delim`.
fn escape_pattern(literal: &str, delim: char) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '\\' | '.' | '*' | '[' | ']' | '^' | '$') || c == delim {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape a literal replacement for the right-hand side of `s|..|..|`.
fn escape_replacement(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '\\' | '&' | '|') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape inserted text (a single line following `i\` or `a\`).
fn escape_text(literal: &str) -> String {
    literal.replace('\\', "\\\\")
}

/// Build the ordered rule set decorating a rendered page for `now`.
///
/// The renderer writes its structural tags in upper case; the month
/// anchors come from the event file itself and are lower case.
pub fn page_rules(now: NaiveDate) -> Vec<Rule> {
    let tag = month_tag(now);
    vec![
        // Jump to the current month when the page loads
        Rule::Replace {
            pattern: "<BODY".to_string(),
            replacement: format!("<BODY onload=\"location.href='#{}'\"", tag),
        },
        // Attribution link below the month the page jumps to
        Rule::InsertAfter {
            pattern: format!("<a name=\"{}\">", tag),
            text: "<p class=\"attribution\">Rendered by <a href=\"https://pcal.sourceforge.net/\">pcal</a></p>".to_string(),
        },
        // Declare the encoding ahead of the document title
        Rule::InsertBefore {
            pattern: "<TITLE>".to_string(),
            text: "<meta http-equiv=\"Content-Type\" content=\"text/html; charset=utf-8\">".to_string(),
        },
    ]
}

/// Write the rule set to an ephemeral script file.
///
/// The file lives as long as the returned handle; it is deleted on drop.
pub fn write_script(rules: &[Rule]) -> Result<NamedTempFile> {
    let mut script = NamedTempFile::new().context("Failed to create substitution script")?;
    for rule in rules {
        writeln!(script, "{}", rule.to_sed()).context("Failed to write substitution script")?;
    }
    script.flush().context("Failed to flush substitution script")?;
    Ok(script)
}
