use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::StatusCode;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use optout_core::config::AppConfig;
use optout_core::merkle::sha256_hex;
use optout_core::profile::ControllerProfile;
use optout_core::subject::Subject;
use optout_core::transport::{
    DeliveryError, FormClient, FormReceipt, Mailer, PresenceProbe, PresenceSignal,
};
use optout_core::types::ErrorCode;

use optout_server::auth::CronAuth;
use optout_server::state::AppState;
use optout_server::build_router;

// ---------------------------------------------------------------------------
// Scripted transports
// ---------------------------------------------------------------------------

struct OkMailer;

impl Mailer for OkMailer {
    fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<String, DeliveryError> {
        Ok("msg-100".to_string())
    }
}

struct DownMailer;

impl Mailer for DownMailer {
    fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<String, DeliveryError> {
        Err(DeliveryError::transient(
            ErrorCode::SendTimeout,
            "relay timed out",
        ))
    }
}

struct OkForms;

impl FormClient for OkForms {
    fn submit(
        &self,
        _url: &str,
        _fields: &BTreeMap<String, String>,
    ) -> Result<FormReceipt, DeliveryError> {
        Ok(FormReceipt {
            status: 200,
            provider_id: Some("form-1".to_string()),
        })
    }

    fn call(&self, _url: &str, _body: &serde_json::Value) -> Result<FormReceipt, DeliveryError> {
        Ok(FormReceipt {
            status: 202,
            provider_id: Some("api-1".to_string()),
        })
    }
}

/// Probe that always reports the data gone.
struct GoneProbe;

impl PresenceProbe for GoneProbe {
    fn probe(
        &self,
        _profile: &ControllerProfile,
        _subject: &Subject,
    ) -> Result<PresenceSignal, DeliveryError> {
        Ok(PresenceSignal {
            data_found: false,
            confidence: 0.8,
            capture_hash: sha256_hex(b"absence capture"),
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn test_state(dir: &TempDir, mailer: Arc<dyn Mailer>) -> AppState {
    let mut config = AppConfig::default();
    // No sleeping in tests beyond the first try.
    config.backoff.tries = 2;
    config.backoff.base_ms = 1;
    AppState::with_transports(
        dir.path().to_path_buf(),
        config,
        mailer,
        Arc::new(OkForms),
        Arc::new(GoneProbe),
    )
    .unwrap()
}

fn subject_json() -> serde_json::Value {
    serde_json::json!({
        "name": "Rahul Verma",
        "email": "rahul@example.com"
    })
}

/// Send a GET via `oneshot` and return (status, parsed JSON body).
async fn get(app: &axum::Router, uri: &str, secret: Option<&str>) -> (StatusCode, serde_json::Value) {
    let mut builder = axum::http::Request::builder().uri(uri);
    if let Some(secret) = secret {
        builder = builder.header("x-secure-cron", secret);
    }
    let req = builder.body(axum::body::Body::empty()).unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Send a POST with a JSON body via `oneshot` and return (status, parsed JSON body).
async fn post_json(
    app: &axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[tokio::test]
async fn healthz_is_reachable_without_the_secret() {
    let dir = TempDir::new().unwrap();
    let app = build_router(
        test_state(&dir, Arc::new(OkMailer)),
        CronAuth::with_secret("cron-pass"),
    );

    let (status, body) = get(&app, "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn api_routes_require_the_secret() {
    let dir = TempDir::new().unwrap();
    let app = build_router(
        test_state(&dir, Arc::new(OkMailer)),
        CronAuth::with_secret("cron-pass"),
    );

    let (status, body) = get(&app, "/api/status", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, body) = get(&app, "/api/status", Some("cron-pass")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["actions"].is_object());
    assert_eq!(body["dlq_open"], 0);
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dispatch_send_creates_a_sent_action() {
    let dir = TempDir::new().unwrap();
    let app = build_router(test_state(&dir, Arc::new(OkMailer)), CronAuth::none());

    let (status, body) = post_json(
        &app,
        "/api/dispatch/send",
        serde_json::json!({
            "controller_key": "naukri",
            "subject": subject_json(),
            "locale": "en-IN"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["channel"], "email");
    assert_eq!(body["provider_id"], "msg-100");

    let (status, listed) = get(&app, "/api/actions?status=sent", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["controller_key"], "naukri");
}

#[tokio::test]
async fn dispatch_rejects_an_empty_subject() {
    let dir = TempDir::new().unwrap();
    let app = build_router(test_state(&dir, Arc::new(OkMailer)), CronAuth::none());

    let (status, body) = post_json(
        &app,
        "/api/dispatch/send",
        serde_json::json!({
            "controller_key": "naukri",
            "subject": {}
        }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("invalid subject"));
}

#[tokio::test]
async fn dispatch_unknown_controller_is_404() {
    let dir = TempDir::new().unwrap();
    let app = build_router(test_state(&dir, Arc::new(OkMailer)), CronAuth::none());

    let (status, _) = post_json(
        &app,
        "/api/dispatch/send",
        serde_json::json!({
            "controller_key": "nobody-home",
            "subject": subject_json()
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bad_status_filter_is_400() {
    let dir = TempDir::new().unwrap();
    let app = build_router(test_state(&dir, Arc::new(OkMailer)), CronAuth::none());

    let (status, _) = get(&app, "/api/actions?status=sentish", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// DLQ
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_dispatch_parks_in_the_dlq_and_retry_recovers() {
    let dir = TempDir::new().unwrap();
    let parked_state = test_state(&dir, Arc::new(DownMailer));
    let app = build_router(parked_state.clone(), CronAuth::none());

    let (status, body) = post_json(
        &app,
        "/api/dispatch/send",
        serde_json::json!({
            "controller_key": "naukri",
            "subject": subject_json()
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "queued");

    let (status, entries) = get(&app, "/api/dlq", None).await;
    assert_eq!(status, StatusCode::OK);
    let entries = entries.as_array().unwrap().clone();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["error_code"], "send_timeout");
    let entry_id = entries[0]["id"].as_str().unwrap().to_string();

    // Same store, recovered relay.
    let recovered_state = AppState {
        mailer: Arc::new(OkMailer),
        ..parked_state
    };
    let recovered = build_router(recovered_state, CronAuth::none());

    let (status, receipt) =
        post_json(&recovered, &format!("/api/dlq/{entry_id}/retry"), serde_json::json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["ok"], true);

    let (_, entries) = get(&recovered, "/api/dlq", None).await;
    assert_eq!(entries.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn dlq_export_is_csv() {
    let dir = TempDir::new().unwrap();
    let app = build_router(test_state(&dir, Arc::new(DownMailer)), CronAuth::none());

    post_json(
        &app,
        "/api/dispatch/send",
        serde_json::json!({
            "controller_key": "naukri",
            "subject": subject_json()
        }),
    )
    .await;

    let req = axum::http::Request::builder()
        .uri("/api/dlq/export")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ct = response
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(ct.starts_with("text/csv"));

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let csv = String::from_utf8(body.to_vec()).unwrap();
    assert!(csv.starts_with(
        "id,created_at,channel,controller_key,subject_id,error_code,error_note,retries,payload_json"
    ));
    assert!(csv.contains("naukri"));
}

// ---------------------------------------------------------------------------
// Sweeps
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sla_tick_reports_counts() {
    let dir = TempDir::new().unwrap();
    let app = build_router(test_state(&dir, Arc::new(OkMailer)), CronAuth::none());

    let (status, body) = post_json(&app, "/api/sla/tick", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scanned"], 0);
    assert_eq!(body["flagged"], 0);
}

#[tokio::test]
async fn verify_sweep_settles_sent_actions() {
    let dir = TempDir::new().unwrap();
    let app = build_router(test_state(&dir, Arc::new(OkMailer)), CronAuth::none());

    post_json(
        &app,
        "/api/dispatch/send",
        serde_json::json!({
            "controller_key": "naukri",
            "subject": subject_json()
        }),
    )
    .await;

    let (status, report) =
        post_json(&app, "/api/verify/sweep", serde_json::json!({ "limit": 10 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["checked"], 1);
    assert_eq!(report["verified"], 1);
    assert_eq!(report["needs_review"], 0);

    let (_, listed) = get(&app, "/api/actions?status=verified", None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Proofs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn proof_commit_verify_and_export_round_trip() {
    let dir = TempDir::new().unwrap();
    let app = build_router(test_state(&dir, Arc::new(OkMailer)), CronAuth::none());

    let (status, record) = post_json(
        &app,
        "/api/proof/commit",
        serde_json::json!({
            "subject_id": "subj-42",
            "evidence_hashes": [sha256_hex(b"capture one"), sha256_hex(b"capture two")],
            "controller_key": "naukri"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let proof_id = record["id"].as_str().unwrap().to_string();
    assert_eq!(record["root"].as_str().unwrap().len(), 64);

    let (status, check) = get(&app, &format!("/api/proof/{proof_id}/verify"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(check["ok"], true);
    assert_eq!(check["root_matches"], true);

    let req = axum::http::Request::builder()
        .uri("/api/proof/export/subj-42")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ct = response
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(ct, "application/zip");
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..2], b"PK");
}

#[tokio::test]
async fn empty_evidence_commit_is_422() {
    let dir = TempDir::new().unwrap();
    let app = build_router(test_state(&dir, Arc::new(OkMailer)), CronAuth::none());

    let (status, _) = post_json(
        &app,
        "/api/proof/commit",
        serde_json::json!({ "subject_id": "subj-42", "evidence_hashes": [] }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_stops_a_parked_action_and_is_terminal() {
    let dir = TempDir::new().unwrap();
    let app = build_router(test_state(&dir, Arc::new(DownMailer)), CronAuth::none());

    post_json(
        &app,
        "/api/dispatch/send",
        serde_json::json!({
            "controller_key": "naukri",
            "subject": subject_json()
        }),
    )
    .await;

    let (_, listed) = get(&app, "/api/actions?status=prepared", None).await;
    let action_id = listed[0]["id"].as_str().unwrap().to_string();

    let (status, cancelled) =
        post_json(&app, &format!("/api/actions/{action_id}/cancel"), serde_json::json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");

    let (status, _) =
        post_json(&app, &format!("/api/actions/{action_id}/cancel"), serde_json::json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
}
