//! Run session state machine.
//!
//! `Idle → Submitting → (Succeeded | Failed)`. Every `submit` bumps the
//! generation; a result whose generation is not the active one is dropped on
//! arrival. The in-flight request itself is never aborted.

use crate::api::HealClient;
use crate::error::RunError;
use crate::model::{CredentialSource, RunRequest, RunResponse};
use crate::narrator::Narrator;
use crate::outcome::{self, Outcome};
use crate::request::resolve_credential;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Submitting { generation: u64 },
    Succeeded(Box<RunResponse>),
    Failed(RunError),
}

/// What `submit` started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub generation: u64,
    pub credential: CredentialSource,
    /// Narrator label to show immediately.
    pub phase: &'static str,
}

/// Something the presentation layer should react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionUpdate {
    Phase { generation: u64, label: &'static str },
    /// The active submission reached `Succeeded` or `Failed`.
    Settled { generation: u64 },
}

#[derive(Debug)]
struct Settled {
    generation: u64,
    result: Result<RunResponse, RunError>,
}

pub struct RunSession {
    client: HealClient,
    generation: u64,
    state: SessionState,
    narrator: Narrator,
    settled_tx: mpsc::UnboundedSender<Settled>,
    settled_rx: mpsc::UnboundedReceiver<Settled>,
}

impl RunSession {
    pub fn new(client: HealClient) -> Self {
        let narrator = Narrator::new(client.config().narrator_interval);
        let (settled_tx, settled_rx) = mpsc::unbounded_channel();
        Self {
            client,
            generation: 0,
            state: SessionState::Idle,
            narrator,
            settled_tx,
            settled_rx,
        }
    }

    /// Start a run. The request's own credential wins over `stored`; the resolved
    /// value replaces whatever the request carried. Any outstanding submission is
    /// superseded. Must be called inside a tokio runtime.
    pub fn submit(&mut self, mut request: RunRequest, stored: Option<&str>) -> Submission {
        let (credential, source) = resolve_credential(request.credential.take(), stored);
        request.credential = credential;

        self.generation += 1;
        let generation = self.generation;
        if let SessionState::Submitting { generation: previous } = self.state {
            tracing::debug!(previous, generation, "superseding outstanding run");
        }
        self.state = SessionState::Submitting { generation };
        let phase = self.narrator.start();

        let client = self.client.clone();
        let settled_tx = self.settled_tx.clone();
        tokio::spawn(async move {
            let result = client.submit_run(&request).await;
            // The session may already be gone; nothing is waiting then.
            let _ = settled_tx.send(Settled { generation, result });
        });

        tracing::debug!(generation, credential = ?source, "run submitted");
        Submission {
            generation,
            credential: source,
            phase,
        }
    }

    /// Wait for the next narrator label or the active submission's result.
    /// Superseded results are consumed and skipped. While idle this never resolves.
    ///
    /// Cancel safe, so it can sit in a `select!` next to a command channel.
    pub async fn next_update(&mut self) -> SessionUpdate {
        loop {
            tokio::select! {
                Some(settled) = self.settled_rx.recv() => {
                    if let Some(generation) = self.apply(settled) {
                        return SessionUpdate::Settled { generation };
                    }
                }
                label = self.narrator.tick() => {
                    return SessionUpdate::Phase { generation: self.generation, label };
                }
            }
        }
    }

    fn apply(&mut self, settled: Settled) -> Option<u64> {
        let active = matches!(
            self.state,
            SessionState::Submitting { generation } if generation == settled.generation
        );
        if !active {
            tracing::debug!(
                stale = settled.generation,
                active = self.generation,
                "discarding superseded run result"
            );
            return None;
        }

        self.narrator.stop();
        self.state = match settled.result {
            Ok(response) => {
                if let Some(err) = response.embedded_error() {
                    tracing::info!(
                        generation = settled.generation,
                        error = err,
                        "agent reported an error"
                    );
                }
                SessionState::Succeeded(Box::new(response))
            }
            Err(e) => {
                tracing::info!(generation = settled.generation, error = %e, "run request failed");
                SessionState::Failed(e)
            }
        };
        Some(settled.generation)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Generation of the most recent submission; 0 before the first one.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.state, SessionState::Submitting { .. })
    }

    /// Current narrator label while submitting.
    pub fn phase(&self) -> Option<&'static str> {
        self.is_submitting().then(|| self.narrator.current())
    }

    pub fn response(&self) -> Option<&RunResponse> {
        match &self.state {
            SessionState::Succeeded(r) => Some(r),
            _ => None,
        }
    }

    /// The error to show, including one the agent embedded in a successful envelope.
    pub fn error(&self) -> Option<RunError> {
        match &self.state {
            SessionState::Failed(e) => Some(e.clone()),
            SessionState::Succeeded(r) => r
                .embedded_error()
                .map(|e| RunError::Embedded(e.to_string())),
            _ => None,
        }
    }

    /// Classification of a settled session; `None` while idle or submitting.
    pub fn outcome(&self) -> Option<Outcome> {
        match self.state {
            SessionState::Succeeded(_) | SessionState::Failed(_) => {
                Some(outcome::classify(self.response()))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::model::CiStatus;

    fn session() -> RunSession {
        let client = HealClient::new(&ClientConfig::new("http://127.0.0.1:9", None)).unwrap();
        RunSession::new(client)
    }

    fn passed() -> RunResponse {
        RunResponse {
            ci_status: CiStatus::Passed,
            ..Default::default()
        }
    }

    #[test]
    fn starts_idle() {
        let s = session();
        assert_eq!(s.state(), &SessionState::Idle);
        assert_eq!(s.generation(), 0);
        assert_eq!(s.outcome(), None);
        assert_eq!(s.phase(), None);
    }

    #[tokio::test]
    async fn stale_generation_is_discarded() {
        let mut s = session();
        s.generation = 2;
        s.state = SessionState::Submitting { generation: 2 };
        s.narrator.start();

        let stale = Settled {
            generation: 1,
            result: Ok(passed()),
        };
        assert_eq!(s.apply(stale), None);
        assert!(s.is_submitting());
        assert!(s.narrator.is_running());

        let current = Settled {
            generation: 2,
            result: Err(RunError::Transport("connection refused".into())),
        };
        assert_eq!(s.apply(current), Some(2));
        assert!(!s.narrator.is_running());
        assert_eq!(s.outcome(), Some(Outcome::Error));
        assert_eq!(
            s.error(),
            Some(RunError::Transport("connection refused".into()))
        );
    }

    #[test]
    fn late_result_after_settling_is_discarded() {
        let mut s = session();
        s.generation = 1;
        s.state = SessionState::Submitting { generation: 1 };
        assert_eq!(
            s.apply(Settled {
                generation: 1,
                result: Ok(passed())
            }),
            Some(1)
        );
        assert_eq!(
            s.apply(Settled {
                generation: 1,
                result: Err(RunError::Transport("late".into()))
            }),
            None
        );
        assert_eq!(s.outcome(), Some(Outcome::Success));
    }

    #[test]
    fn embedded_error_is_reported_without_dropping_response() {
        let mut s = session();
        s.generation = 1;
        s.state = SessionState::Submitting { generation: 1 };
        let response = RunResponse {
            error: Some("Push failed: 403".into()),
            total_fixes_applied: 2,
            ..passed()
        };
        s.apply(Settled {
            generation: 1,
            result: Ok(response),
        });
        assert_eq!(s.outcome(), Some(Outcome::Error));
        assert_eq!(s.error(), Some(RunError::Embedded("Push failed: 403".into())));
        assert_eq!(s.response().map(|r| r.total_fixes_applied), Some(2));
    }

    #[tokio::test]
    async fn submit_resolves_stored_credential_and_starts_narrator() {
        let mut s = session();
        let request = RunRequest {
            repo_url: "https://github.com/o/r".into(),
            team_name: "t".into(),
            team_leader_name: "l".into(),
            credential: None,
        };
        let first = s.submit(request.clone(), Some("stored"));
        assert_eq!(first.generation, 1);
        assert_eq!(first.credential, CredentialSource::Stored);
        assert_eq!(s.phase(), Some(crate::narrator::PHASE_LABELS[0]));

        let second = s.submit(request, None);
        assert_eq!(second.generation, 2);
        assert_eq!(second.credential, CredentialSource::Absent);
        assert_eq!(s.state(), &SessionState::Submitting { generation: 2 });
    }

    #[tokio::test(start_paused = true)]
    async fn resubmitting_restarts_the_narrator_at_the_first_phase() {
        use crate::narrator::PHASE_LABELS;
        let mut s = session();
        let request = RunRequest {
            repo_url: "https://github.com/o/r".into(),
            team_name: "t".into(),
            team_leader_name: "l".into(),
            credential: None,
        };
        s.submit(request.clone(), None);
        assert_eq!(s.narrator.tick().await, PHASE_LABELS[1]);
        assert_eq!(s.phase(), Some(PHASE_LABELS[1]));

        let again = s.submit(request, None);
        assert_eq!(again.phase, PHASE_LABELS[0]);
        assert_eq!(s.phase(), Some(PHASE_LABELS[0]));
    }
}
