use crate::error::RunError;
use serde::{Deserialize, Deserializer, Serialize};

/// Retry limit assumed when the backend omits `retry_limit`.
pub const DEFAULT_RETRY_LIMIT: i64 = 5;

/// Payload for `POST {api_base}/run`. Built fresh for every submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub repo_url: String,
    pub team_name: String,
    pub team_leader_name: String,
    #[serde(
        rename = "github_token",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub credential: Option<String>,
}

/// CI verdict reported by the agent. Anything other than the two known
/// strings is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CiStatus {
    Passed,
    #[default]
    Failed,
    Other(String),
}

impl CiStatus {
    pub fn as_str(&self) -> &str {
        match self {
            CiStatus::Passed => "PASSED",
            CiStatus::Failed => "FAILED",
            CiStatus::Other(s) => s,
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, CiStatus::Passed)
    }
}

impl From<String> for CiStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "PASSED" => CiStatus::Passed,
            "FAILED" => CiStatus::Failed,
            _ => CiStatus::Other(s),
        }
    }
}

impl From<CiStatus> for String {
    fn from(s: CiStatus) -> Self {
        match s {
            CiStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for CiStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score breakdown. Display-only: `total` is not required to equal
/// `base + speed_bonus - efficiency_penalty`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreResult {
    #[serde(deserialize_with = "null_as_default")]
    pub base: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub speed_bonus: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub efficiency_penalty: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub file: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bug_type: String,
    #[serde(default)]
    pub line_number: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub commit_message: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_fix_status", deserialize_with = "null_as_fix_status")]
    pub status: String,
}

impl FixResult {
    pub fn is_fixed(&self) -> bool {
        self.status.eq_ignore_ascii_case("fixed")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiTimelineEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub iteration: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: String,
}

impl CiTimelineEntry {
    pub fn is_passed(&self) -> bool {
        self.status == "PASSED"
    }

    pub fn is_failed(&self) -> bool {
        self.status.eq_ignore_ascii_case("FAILED")
    }
}

/// Immutable snapshot of one completed run as reported by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunResponse {
    #[serde(deserialize_with = "null_as_default")]
    pub repo_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub team_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub team_leader_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub branch_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub total_failures: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub total_fixes_applied: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub ci_status: CiStatus,
    pub total_time_seconds: Option<f64>,
    #[serde(deserialize_with = "null_as_default")]
    pub score: ScoreResult,
    #[serde(deserialize_with = "null_as_default")]
    pub fixes: Vec<FixResult>,
    #[serde(deserialize_with = "null_as_default")]
    pub ci_timeline: Vec<CiTimelineEntry>,
    #[serde(deserialize_with = "null_as_retry_limit")]
    pub retry_limit: i64,
    pub error: Option<String>,
}

impl Default for RunResponse {
    fn default() -> Self {
        Self {
            repo_url: String::new(),
            team_name: String::new(),
            team_leader_name: String::new(),
            branch_name: String::new(),
            total_failures: 0,
            total_fixes_applied: 0,
            ci_status: CiStatus::default(),
            total_time_seconds: None,
            score: ScoreResult::default(),
            fixes: Vec::new(),
            ci_timeline: Vec::new(),
            retry_limit: DEFAULT_RETRY_LIMIT,
            error: None,
        }
    }
}

impl RunResponse {
    /// The embedded application error, if the agent reported a non-empty one.
    pub fn embedded_error(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.trim().is_empty())
    }
}

fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

fn null_as_retry_limit<'de, D>(d: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<i64>::deserialize(d)?.unwrap_or(DEFAULT_RETRY_LIMIT))
}

fn default_fix_status() -> String {
    "Fixed".to_string()
}

fn null_as_fix_status<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(d)?.unwrap_or_else(default_fix_status))
}

/// Where the credential attached to a submission came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Explicit,
    Stored,
    Absent,
}

/// Events emitted by the run controller and consumed by presentation layers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Submitting {
        generation: u64,
    },
    Phase {
        generation: u64,
        label: &'static str,
    },
    Completed {
        generation: u64,
        // Boxed to keep the enum small; a response can carry long fix lists.
        response: Box<RunResponse>,
    },
    Failed {
        generation: u64,
        error: RunError,
    },
    Info(InfoEvent),
}

/// Structured info events emitted by the controller and consumed by UI/CLI layers.
#[derive(Debug, Clone)]
pub enum InfoEvent {
    Message(String),
    Credential(CredentialSource),
}

impl InfoEvent {
    /// Render a human-readable message for UI/CLI layers.
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Message(msg) => msg.clone(),
            InfoEvent::Credential(CredentialSource::Explicit) => {
                "Using the GitHub token supplied for this run".to_string()
            }
            InfoEvent::Credential(CredentialSource::Stored) => {
                "Using the stored GitHub token".to_string()
            }
            InfoEvent::Credential(CredentialSource::Absent) => {
                "No GitHub token; the agent will use its server token".to_string()
            }
        }
    }
}
