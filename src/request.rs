//! Run request assembly.

use crate::model::{CredentialSource, RunRequest};
use thiserror::Error;

/// Operator-entered fields, as typed.
#[derive(Debug, Clone, Default)]
pub struct RunForm {
    pub repo_url: String,
    pub team_name: String,
    pub team_leader_name: String,
    /// Optional per-run token. Blank means "use the stored one".
    pub github_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("repository URL must be an http(s) URL: {0}")]
    InvalidRepoUrl(String),
}

impl RunForm {
    /// Validate and trim the form into a request. The credential carried is the
    /// explicit one only; the stored credential is resolved at submission.
    pub fn build(&self) -> Result<RunRequest, FormError> {
        let repo_url = required(&self.repo_url, "repository URL")?;
        let team_name = required(&self.team_name, "team name")?;
        let team_leader_name = required(&self.team_leader_name, "team leader name")?;

        match reqwest::Url::parse(&repo_url) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => {}
            _ => return Err(FormError::InvalidRepoUrl(repo_url)),
        }

        Ok(RunRequest {
            repo_url,
            team_name,
            team_leader_name,
            credential: self
                .github_token
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        })
    }
}

fn required(value: &str, name: &'static str) -> Result<String, FormError> {
    let v = value.trim();
    if v.is_empty() {
        Err(FormError::Missing(name))
    } else {
        Ok(v.to_string())
    }
}

/// Pick the credential for a submission: the request's own, else the stored one.
pub fn resolve_credential(
    explicit: Option<String>,
    stored: Option<&str>,
) -> (Option<String>, CredentialSource) {
    match (explicit, stored) {
        (Some(c), _) => (Some(c), CredentialSource::Explicit),
        (None, Some(s)) => (Some(s.to_string()), CredentialSource::Stored),
        (None, None) => (None, CredentialSource::Absent),
    }
}
