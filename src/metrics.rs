//! Deterministic formatting over a run response.
//!
//! Every function here is total: missing or zero inputs produce a placeholder
//! or a zero value, never a panic.

use crate::model::{CiTimelineEntry, RunResponse, DEFAULT_RETRY_LIMIT};
use std::fmt;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// Shown wherever a value is missing.
pub const PLACEHOLDER: &str = "—";

/// Highest attainable score: base 100 plus the maximum speed bonus of 10.
pub const MAX_SCORE: f64 = 110.0;

/// Total run time with two decimals, e.g. `42.10s`.
pub fn format_elapsed(seconds: Option<f64>) -> String {
    match seconds {
        Some(s) if s.is_finite() => format!("{s:.2}s"),
        _ => PLACEHOLDER.to_string(),
    }
}

/// Score as a percentage of [`MAX_SCORE`], clamped to `[0, 100]`.
pub fn score_percent(total: f64) -> f64 {
    if total.is_nan() {
        return 0.0;
    }
    (total / MAX_SCORE * 100.0).clamp(0.0, 100.0)
}

/// Render a score component without a trailing `.0` for whole numbers.
pub fn format_score_value(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 {
        format!("{}", v as i64)
    } else if v.is_finite() {
        format!("{v:.1}")
    } else {
        PLACEHOLDER.to_string()
    }
}

/// CI attempts used out of the retry limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationUsage {
    pub used: usize,
    pub limit: i64,
}

impl IterationUsage {
    pub fn new(timeline: &[CiTimelineEntry], retry_limit: Option<i64>) -> Self {
        Self {
            used: timeline.len(),
            limit: retry_limit.unwrap_or(DEFAULT_RETRY_LIMIT),
        }
    }

    pub fn of(response: &RunResponse) -> Self {
        Self::new(&response.ci_timeline, Some(response.retry_limit))
    }

    /// `used / limit`, or `None` when the limit is not positive.
    pub fn ratio(&self) -> Option<f64> {
        (self.limit > 0).then(|| self.used as f64 / self.limit as f64)
    }
}

impl fmt::Display for IterationUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.used, self.limit)
    }
}

/// `Attempt 2 — FAILED (14:03:07)`. Time of day is shown for failed attempts only,
/// in `offset`, and omitted when the timestamp does not parse.
pub fn attempt_label(entry: &CiTimelineEntry, offset: UtcOffset) -> String {
    let status = if entry.status.is_empty() {
        PLACEHOLDER
    } else {
        entry.status.as_str()
    };
    let mut label = format!("Attempt {} — {}", entry.iteration, status);
    if entry.is_failed() {
        if let Some(t) = time_of_day(&entry.timestamp, offset) {
            label.push_str(&format!(" ({t})"));
        }
    }
    label
}

fn time_of_day(timestamp: &str, offset: UtcOffset) -> Option<String> {
    let parsed = OffsetDateTime::parse(timestamp.trim(), &Rfc3339).ok()?;
    parsed
        .to_offset(offset)
        .format(format_description!("[hour]:[minute]:[second]"))
        .ok()
}

/// Offset used for wall-clock display; UTC when the local offset is unknown.
pub fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

/// True iff there is at least one attempt and none of them passed.
pub fn all_attempts_failed(timeline: &[CiTimelineEntry]) -> bool {
    !timeline.is_empty() && timeline.iter().all(CiTimelineEntry::is_failed)
}

/// Number of fixes whose status is "Fixed".
pub fn fixed_count(response: &RunResponse) -> usize {
    response.fixes.iter().filter(|f| f.is_fixed()).count()
}

/// `1 fix` / `3 fixes`.
pub fn pluralize(count: i64, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{count} {singular}")
    } else {
        format!("{count} {plural}")
    }
}
