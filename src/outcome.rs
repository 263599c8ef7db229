//! Outcome classification.
//!
//! `classify` is the only place that turns the raw status fields of a response
//! into a verdict. Every view consumes the resulting [`Outcome`] instead of
//! re-testing `ci_status`, `error` or `total_fixes_applied` itself.

use crate::model::RunResponse;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    /// No response, or the agent reported an error. Downstream fields are not trusted.
    Error,
    /// CI passed.
    Success,
    /// CI still fails, but fixes were pushed to a branch.
    PartialFix,
    /// CI still fails and nothing usable was pushed.
    Unfixed,
}

impl Outcome {
    pub fn label(self) -> &'static str {
        match self {
            Outcome::Error => "Error",
            Outcome::Success => "Success",
            Outcome::PartialFix => "Partial fix",
            Outcome::Unfixed => "Unfixed",
        }
    }
}

/// First matching rule wins.
pub fn classify(response: Option<&RunResponse>) -> Outcome {
    let Some(r) = response else {
        return Outcome::Error;
    };
    if r.embedded_error().is_some() {
        return Outcome::Error;
    }
    if r.ci_status.is_passed() {
        return Outcome::Success;
    }
    if r.total_fixes_applied > 0 && !r.branch_name.trim().is_empty() {
        return Outcome::PartialFix;
    }
    Outcome::Unfixed
}
