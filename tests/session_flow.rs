use heal_client::api::HealClient;
use heal_client::config::ClientConfig;
use heal_client::error::{RunError, GENERIC_FAILURE};
use heal_client::model::{CredentialSource, RunRequest};
use heal_client::narrator::PHASE_LABELS;
use heal_client::outcome::Outcome;
use heal_client::session::{RunSession, SessionState, SessionUpdate};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session_for(base: &str, narrator_interval: Duration) -> RunSession {
    let mut cfg = ClientConfig::new(base, None);
    cfg.narrator_interval = narrator_interval;
    RunSession::new(HealClient::new(&cfg).unwrap())
}

fn request(repo: &str) -> RunRequest {
    RunRequest {
        repo_url: repo.to_string(),
        team_name: "CodeCrew".into(),
        team_leader_name: "Nirmal Goyal".into(),
        credential: None,
    }
}

async fn settle(session: &mut RunSession) -> u64 {
    loop {
        if let SessionUpdate::Settled { generation } = session.next_update().await {
            return generation;
        }
    }
}

#[tokio::test]
async fn passed_run_settles_as_success_with_stored_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/run"))
        .and(body_partial_json(json!({
            "repo_url": "https://github.com/octo/widgets",
            "github_token": "gho_stored"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "repo_url": "https://github.com/octo/widgets",
            "branch_name": "CODECREW_NIRMAL_GOYAL_AI_Fix",
            "total_failures": 1,
            "total_fixes_applied": 1,
            "ci_status": "PASSED",
            "total_time_seconds": 42.1,
            "score": {"base": 100, "speed_bonus": 10, "efficiency_penalty": 0, "total": 110},
            "fixes": [{"file": "app.py", "bug_type": "SYNTAX", "line_number": 3,
                       "commit_message": "[AI-AGENT] Fix SYNTAX", "status": "Fixed"}],
            "ci_timeline": [
                {"iteration": 1, "status": "FAILED", "timestamp": "2026-02-19T10:00:00+00:00"},
                {"iteration": 2, "status": "PASSED", "timestamp": "2026-02-19T10:01:00+00:00"}
            ],
            "retry_limit": 5,
            "error": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = session_for(&server.uri(), Duration::from_secs(60));
    let sub = session.submit(request("https://github.com/octo/widgets"), Some("gho_stored"));
    assert_eq!(sub.credential, CredentialSource::Stored);
    assert_eq!(sub.phase, PHASE_LABELS[0]);

    assert_eq!(settle(&mut session).await, 1);
    assert_eq!(session.outcome(), Some(Outcome::Success));
    assert_eq!(session.error(), None);
    assert_eq!(session.phase(), None);
    let r = session.response().unwrap();
    assert_eq!(r.ci_timeline.len(), 2);
    assert_eq!(r.score.total, 110.0);
}

#[tokio::test]
async fn absent_credential_is_not_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/run"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ci_status": "FAILED"})))
        .mount(&server)
        .await;

    let mut session = session_for(&server.uri(), Duration::from_secs(60));
    let sub = session.submit(request("https://github.com/o/r"), None);
    assert_eq!(sub.credential, CredentialSource::Absent);
    settle(&mut session).await;
    assert_eq!(session.outcome(), Some(Outcome::Unfixed));

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert!(body.get("github_token").is_none());
    assert_eq!(body["team_name"], "CodeCrew");
}

#[tokio::test]
async fn explicit_credential_overrides_stored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/run"))
        .and(body_partial_json(json!({"github_token": "ghp_explicit"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ci_status": "PASSED"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = session_for(&server.uri(), Duration::from_secs(60));
    let mut req = request("https://github.com/o/r");
    req.credential = Some("ghp_explicit".into());
    let sub = session.submit(req, Some("gho_stored"));
    assert_eq!(sub.credential, CredentialSource::Explicit);
    settle(&mut session).await;
    assert_eq!(session.outcome(), Some(Outcome::Success));
}

#[tokio::test]
async fn validation_detail_list_is_joined() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/run"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "detail": [
                {"loc": ["body", "team_name"], "msg": "field required", "type": "missing"},
                {"loc": ["body", "repo_url"], "msg": "invalid url", "type": "url_parsing"}
            ]
        })))
        .mount(&server)
        .await;

    let mut session = session_for(&server.uri(), Duration::from_secs(60));
    session.submit(request("https://github.com/o/r"), None);
    settle(&mut session).await;

    assert_eq!(
        session.error(),
        Some(RunError::Response {
            status: 422,
            message: "field required; invalid url".into()
        })
    );
    assert_eq!(session.outcome(), Some(Outcome::Error));
    assert!(session.response().is_none());
}

#[tokio::test]
async fn detail_string_is_used_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/run"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "detail": "Clone failed: repository not found"
        })))
        .mount(&server)
        .await;

    let mut session = session_for(&server.uri(), Duration::from_secs(60));
    session.submit(request("https://github.com/o/r"), None);
    settle(&mut session).await;
    assert_eq!(
        session.error().map(|e| e.to_string()),
        Some("Clone failed: repository not found".into())
    );
}

#[tokio::test]
async fn non_json_error_body_falls_back_to_generic_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/run"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&server)
        .await;

    let mut session = session_for(&server.uri(), Duration::from_secs(60));
    session.submit(request("https://github.com/o/r"), None);
    settle(&mut session).await;
    assert_eq!(
        session.error(),
        Some(RunError::Response {
            status: 502,
            message: GENERIC_FAILURE.into()
        })
    );
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let mut session = session_for(&format!("http://127.0.0.1:{port}"), Duration::from_secs(60));
    session.submit(request("https://github.com/o/r"), None);
    settle(&mut session).await;

    match session.error() {
        Some(RunError::Transport(msg)) => assert!(!msg.is_empty()),
        other => panic!("expected transport error, got {other:?}"),
    }
    assert_eq!(session.outcome(), Some(Outcome::Error));
    assert!(!session.is_submitting());
}

#[tokio::test]
async fn embedded_error_keeps_response_visible() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/run"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ci_status": "FAILED",
            "total_fixes_applied": 2,
            "branch_name": "fix/abc",
            "ci_timeline": [{"iteration": 1, "status": "FAILED", "timestamp": ""}],
            "error": "Push failed: remote: Permission denied (403)"
        })))
        .mount(&server)
        .await;

    let mut session = session_for(&server.uri(), Duration::from_secs(60));
    session.submit(request("https://github.com/o/r"), None);
    settle(&mut session).await;

    assert!(matches!(session.state(), SessionState::Succeeded(_)));
    assert_eq!(session.outcome(), Some(Outcome::Error));
    assert_eq!(
        session.error(),
        Some(RunError::Embedded(
            "Push failed: remote: Permission denied (403)".into()
        ))
    );
    assert_eq!(session.response().map(|r| r.ci_timeline.len()), Some(1));
}

#[tokio::test]
async fn superseded_response_is_never_exposed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/run"))
        .and(body_partial_json(json!({"repo_url": "https://github.com/o/slow"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"repo_url": "https://github.com/o/slow", "ci_status": "FAILED"}))
                .set_delay(Duration::from_millis(400)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/run"))
        .and(body_partial_json(json!({"repo_url": "https://github.com/o/fast"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"repo_url": "https://github.com/o/fast", "ci_status": "PASSED"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut session = session_for(&server.uri(), Duration::from_secs(60));
    let first = session.submit(request("https://github.com/o/slow"), None);
    let second = session.submit(request("https://github.com/o/fast"), None);
    assert_eq!((first.generation, second.generation), (1, 2));

    assert_eq!(settle(&mut session).await, 2);
    assert_eq!(
        session.response().map(|r| r.repo_url.as_str()),
        Some("https://github.com/o/fast")
    );

    // The slow response lands after this and must be swallowed.
    let late = tokio::time::timeout(Duration::from_secs(1), session.next_update()).await;
    assert!(late.is_err(), "stale result surfaced: {late:?}");
    assert_eq!(session.outcome(), Some(Outcome::Success));
    assert_eq!(
        session.response().map(|r| r.repo_url.as_str()),
        Some("https://github.com/o/fast")
    );
}

#[tokio::test]
async fn narrator_advances_while_outstanding_and_stops_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/run"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"ci_status": "PASSED"}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let mut session = session_for(&server.uri(), Duration::from_millis(100));
    session.submit(request("https://github.com/o/r"), None);

    assert_eq!(
        session.next_update().await,
        SessionUpdate::Phase {
            generation: 1,
            label: PHASE_LABELS[1]
        }
    );
    assert_eq!(session.phase(), Some(PHASE_LABELS[1]));

    settle(&mut session).await;
    assert_eq!(session.phase(), None);
    let after = tokio::time::timeout(Duration::from_millis(400), session.next_update()).await;
    assert!(after.is_err(), "narrator kept ticking: {after:?}");
}

#[tokio::test]
async fn health_reports_backend_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "llm_required": false,
            "backend_version": "0.1.0"
        })))
        .mount(&server)
        .await;

    let client = HealClient::new(&ClientConfig::new(&server.uri(), None)).unwrap();
    let health = client.health().await.unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.backend_version.as_deref(), Some("0.1.0"));
    assert_eq!(health.llm_required, Some(false));
}
