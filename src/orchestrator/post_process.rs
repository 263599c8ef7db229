//! Post-run processing.
//!
//! Classifies the settled run, decides whether to ask for re-authorization, and
//! performs the optional JSON export.

use crate::auth::should_prompt_reauthorization;
use crate::error::RunError;
use crate::model::RunResponse;
use crate::outcome::{classify, Outcome};
use crate::storage;
use std::path::Path;

/// Result of post-run processing, ready for presentation layers.
#[derive(Debug)]
pub(crate) struct ProcessedRun {
    pub outcome: Outcome,
    pub reauthorize: bool,
    pub export_messages: Vec<String>,
}

/// Process a settled run. `error` is the session's error, if any.
pub(crate) fn process_run_completion(
    export_json: Option<&Path>,
    response: Option<&RunResponse>,
    error: Option<&RunError>,
) -> ProcessedRun {
    let outcome = classify(response);
    let reauthorize =
        should_prompt_reauthorization(response, outcome, error.map(RunError::message));

    let mut export_messages = Vec::new();
    if let (Some(export_path), Some(r)) = (export_json, response) {
        match storage::export_json(export_path, r) {
            Ok(()) => export_messages.push(format!("Exported JSON: {}", export_path.display())),
            Err(e) => export_messages.push(format!("Export JSON failed: {e:#}")),
        }
    }

    ProcessedRun {
        outcome,
        reauthorize,
        export_messages,
    }
}
