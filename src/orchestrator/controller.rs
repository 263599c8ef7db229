//! Run lifecycle controller.
//!
//! Owns the run session and the credential manager, and emits events for
//! presentation layers.

use crate::auth::{CredentialManager, CredentialStore};
use crate::model::{InfoEvent, RunRequest, SessionEvent};
use crate::session::{RunSession, SessionState, SessionUpdate};
use anyhow::Result;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Commands emitted by UI layers to drive the session.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    /// Start a run, superseding any outstanding one.
    Submit(RunRequest),
    SignOut,
    Quit,
}

/// Drive `session` from UI commands and forward its progress as events.
///
/// Quit does not wait for an outstanding request; its result is simply never read.
pub(crate) async fn run_controller<S: CredentialStore>(
    mut session: RunSession,
    mut credentials: CredentialManager<S>,
    event_tx: UnboundedSender<SessionEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Submit(request)) => {
                        let sub = session.submit(request, credentials.credential());
                        let _ = event_tx.send(SessionEvent::Info(InfoEvent::Credential(sub.credential)));
                        let _ = event_tx.send(SessionEvent::Submitting { generation: sub.generation });
                        let _ = event_tx.send(SessionEvent::Phase {
                            generation: sub.generation,
                            label: sub.phase,
                        });
                    }
                    Some(UiCommand::SignOut) => {
                        credentials.sign_out();
                        let _ = event_tx.send(SessionEvent::Info(InfoEvent::Message(
                            "Signed out".into(),
                        )));
                    }
                    Some(UiCommand::Quit) | None => break,
                }
            }
            update = session.next_update() => {
                match update {
                    SessionUpdate::Phase { generation, label } => {
                        let _ = event_tx.send(SessionEvent::Phase { generation, label });
                    }
                    SessionUpdate::Settled { generation } => {
                        let event = match session.state() {
                            SessionState::Succeeded(response) => SessionEvent::Completed {
                                generation,
                                response: response.clone(),
                            },
                            SessionState::Failed(error) => SessionEvent::Failed {
                                generation,
                                error: error.clone(),
                            },
                            SessionState::Idle | SessionState::Submitting { .. } => continue,
                        };
                        let _ = event_tx.send(event);
                    }
                }
            }
        }
    }

    Ok(())
}
