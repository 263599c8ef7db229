//! HTTP client for the healing agent backend.

use crate::config::ClientConfig;
use crate::error::{RunError, GENERIC_FAILURE};
use crate::model::{RunRequest, RunResponse};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct HealClient {
    http: reqwest::Client,
    cfg: ClientConfig,
}

/// `GET /health` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub backend_version: Option<String>,
    #[serde(default)]
    pub llm_required: Option<bool>,
}

impl HealClient {
    pub fn new(cfg: &ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(cfg.user_agent.clone());
        if let Some(timeout) = cfg.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("build http client")?;
        Ok(Self {
            http,
            cfg: cfg.clone(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.cfg
    }

    /// `POST {api_base}/run`. The only network call a run session waits on.
    pub async fn submit_run(&self, req: &RunRequest) -> Result<RunResponse, RunError> {
        let resp = self
            .http
            .post(self.cfg.run_url())
            .json(req)
            .send()
            .await
            .map_err(|e| RunError::transport(&e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| RunError::transport(&e))?;

        if !status.is_success() {
            let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            return Err(RunError::Response {
                status: status.as_u16(),
                message: extract_detail(&parsed),
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| RunError::Transport(format!("invalid run response: {e}")))
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        let url = self.cfg.health_url();
        self.http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .context("health check failed")?
            .json()
            .await
            .context("decode health response")
    }
}

/// Human-readable message from a non-success `{ detail: ... }` body.
///
/// A list of `{msg}` objects is joined with `"; "`, a string is used verbatim,
/// anything else falls back to a generic message.
pub fn extract_detail(body: &Value) -> String {
    let msg = match body.get("detail") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.get("msg").and_then(Value::as_str))
            .filter(|m| !m.is_empty())
            .collect::<Vec<_>>()
            .join("; "),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };
    if msg.is_empty() {
        GENERIC_FAILURE.to_string()
    } else {
        msg
    }
}
