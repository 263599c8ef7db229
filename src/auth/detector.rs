//! Heuristic check for failures caused by missing push authorization.
//!
//! The agent reports these as free text, so this matches on substrings. An
//! unrelated error that happens to mention "403" will also match.

use crate::model::RunResponse;
use crate::outcome::Outcome;

const AUTH_MARKERS: [&str; 2] = ["403", "unable to access"];

/// True if `message` looks like a missing-write-authorization failure.
pub fn requires_authorization(message: &str) -> bool {
    let lower = message.to_lowercase();
    AUTH_MARKERS.iter().any(|m| lower.contains(m))
}

/// Whether the operator should be prompted to (re)acquire a credential.
///
/// Only Error and PartialFix results are inspected. The agent's embedded error
/// is checked first; without one, the session's transport or response error
/// text is checked instead.
pub fn should_prompt_reauthorization(
    response: Option<&RunResponse>,
    outcome: Outcome,
    session_error: Option<&str>,
) -> bool {
    if !matches!(outcome, Outcome::Error | Outcome::PartialFix) {
        return false;
    }
    let embedded = response.and_then(RunResponse::embedded_error);
    embedded.or(session_error).is_some_and(requires_authorization)
}
