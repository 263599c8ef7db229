//! Client configuration resolved from CLI arguments and environment.

use std::time::Duration;

/// Backend address used when neither `--base-url` nor `HEAL_API_URL` is set.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

pub const DEFAULT_NARRATOR_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Root of the run API, e.g. `http://localhost:8000/api`.
    pub api_base: String,
    /// Root of the backend serving `/auth/login` and `/health`.
    pub backend_base: String,
    pub narrator_interval: Duration,
    pub request_timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, None)
    }
}

impl ClientConfig {
    /// Resolve API and backend roots. The backend defaults to the API host.
    pub fn new(base_url: &str, backend_url: Option<&str>) -> Self {
        let base = trim_base(base_url);
        let backend = backend_url
            .map(trim_base)
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| base.clone());
        Self {
            api_base: format!("{base}/api"),
            backend_base: backend,
            narrator_interval: DEFAULT_NARRATOR_INTERVAL,
            request_timeout: None,
            user_agent: format!("heal-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn run_url(&self) -> String {
        format!("{}/run", self.api_base)
    }

    pub fn login_url(&self) -> String {
        format!("{}/auth/login", self.backend_base)
    }

    pub fn health_url(&self) -> String {
        format!("{}/health", self.backend_base)
    }
}

fn trim_base(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
