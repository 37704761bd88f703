//! Server-side search expression construction.
//!
//! Builds the Gmail `q` parameter from filter settings. Only subject-area
//! status matching can be pushed to the server; body-only status areas are
//! matched client-side after fetch and never appear in the query.

use chrono::NaiveDate;

use crate::settings::model::StatusArea;

/// Escape backslashes and double quotes inside a quoted query term.
fn escape_term(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Build the remote search expression.
///
/// - A parenthesized OR of `subject:"…"` status terms, only when the
///   subject area is selected and statuses are non-empty.
/// - A `subject:"…"` term for the title filter when non-empty,
///   independent of status areas (also re-checked client-side).
/// - An `after:YYYY/MM/DD` lower bound when `start_date` is a valid
///   `YYYY-MM-DD` calendar date; anything else is ignored.
///
/// An empty result means "no server-side filtering" — the fetch is then
/// bounded only by the paging limits. Rejecting an empty status list is
/// the caller's job, before any fetch happens.
pub fn build_query(
    statuses: &[String],
    title_filter: &str,
    start_date: Option<&str>,
    status_areas: &[StatusArea],
) -> String {
    let mut parts: Vec<String> = Vec::new();

    let statuses: Vec<&str> = statuses
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if status_areas.contains(&StatusArea::Subject) && !statuses.is_empty() {
        let terms: Vec<String> = statuses
            .iter()
            .map(|s| format!("subject:\"{}\"", escape_term(s)))
            .collect();
        parts.push(format!("({})", terms.join(" OR ")));
    }

    let title_filter = title_filter.trim();
    if !title_filter.is_empty() {
        parts.push(format!("subject:\"{}\"", escape_term(title_filter)));
    }

    if let Some(date) = start_date
        && let Ok(parsed) = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
    {
        parts.push(format!("after:{}", parsed.format("%Y/%m/%d")));
    }

    parts.join(" ")
}
