//! Error taxonomy surfaced to the operator.
//!
//! Every variant displays as plain text with no prefix so presentation layers can
//! print it as-is.

use thiserror::Error;

/// Message shown when neither the server nor the transport gave anything better.
pub const GENERIC_FAILURE: &str = "Request failed";

/// Why a run did not produce a clean result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    /// The request never reached the server or no response came back.
    #[error("{0}")]
    Transport(String),
    /// Non-success HTTP status with a `detail` payload.
    #[error("{message}")]
    Response { status: u16, message: String },
    /// Success envelope whose body carries a non-empty `error`.
    #[error("{0}")]
    Embedded(String),
}

impl RunError {
    pub fn transport(err: &reqwest::Error) -> Self {
        let msg = err.to_string();
        if msg.trim().is_empty() {
            RunError::Transport(GENERIC_FAILURE.to_string())
        } else {
            RunError::Transport(msg)
        }
    }

    pub fn message(&self) -> &str {
        match self {
            RunError::Transport(m) | RunError::Embedded(m) => m,
            RunError::Response { message, .. } => message,
        }
    }
}

/// The authorization redirect came back with `error=...` instead of a token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct AuthCallbackError(pub String);
