//! GitHub webhook receiver.
//!
//! Accepts `release` and tag `push` events and runs the pipeline for the
//! tag they name, synchronously, within the request.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/webhook` | GitHub event delivery |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Events
//!
//! | `X-GitHub-Event` | Condition | Tag |
//! |------------------|-----------|-----|
//! | `release` | `action` is `created` (or absent) | `release.tag_name` |
//! | `push` | `ref` starts with `refs/tags/` and the ref was not deleted | `ref` without the prefix |
//!
//! Anything else is acknowledged with `{"status": "ignored"}`. The payload
//! may be a JSON object or a JSON string nested under a `payload` field.
//!
//! When a webhook secret is configured, `X-Hub-Signature-256` must carry a
//! valid HMAC-SHA256 of the raw body, otherwise the request is rejected
//! with 401.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "pipeline_failed", "message": "failed to list commits: ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `pipeline_failed` (502).

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::models::RunOutcome;
use crate::pipeline::{Pipeline, Trigger};

type HmacSha256 = Hmac<Sha256>;

const TAG_REF_PREFIX: &str = "refs/tags/";

/// Shared state for the webhook handlers.
pub struct WebhookState {
    pub pipeline: Pipeline,
    /// Secret for `X-Hub-Signature-256`; `None` disables verification.
    pub secret: Option<String>,
}

/// Build the webhook router.
pub fn router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind to `bind` and serve until Ctrl-C.
pub async fn run_server(bind: &str, state: WebhookState) -> anyhow::Result<()> {
    let app = router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(bind).await?;
    println!("Webhook receiver listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;
    Ok(())
}

// ============ Event parsing ============

/// Parse a delivery body, unwrapping a nested `payload` JSON string.
pub fn decode_payload(body: &[u8]) -> Result<Value, serde_json::Error> {
    let value: Value = serde_json::from_slice(body)?;
    match value.get("payload").and_then(Value::as_str) {
        Some(nested) => serde_json::from_str(nested),
        None => Ok(value),
    }
}

/// The tag an event asks us to publish, if any.
pub fn tag_for_event(event: &str, payload: &Value) -> Option<String> {
    match event {
        "release" => {
            let action = payload.get("action").and_then(Value::as_str);
            if !matches!(action, None | Some("created")) {
                return None;
            }
            payload
                .pointer("/release/tag_name")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        }
        "push" => {
            if payload.get("deleted").and_then(Value::as_bool) == Some(true) {
                return None;
            }
            payload
                .get("ref")
                .and_then(Value::as_str)
                .and_then(|r| r.strip_prefix(TAG_REF_PREFIX))
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        }
        _ => None,
    }
}

/// Check a `sha256=<hex>` signature against the raw body.
pub fn verify_signature(secret: &str, body: &[u8], header: Option<&str>) -> bool {
    let Some(hex_sig) = header.and_then(|h| h.strip_prefix("sha256=")) else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

// ============ Responses ============

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// `published`, `dry_run`, `no_changes`, or `ignored`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// `created` or `updated` when a release was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized",
        message: message.into(),
    }
}

fn pipeline_failed(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "pipeline_failed",
        message: message.into(),
    }
}

// ============ Handlers ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_webhook(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, AppError> {
    if let Some(secret) = &state.secret {
        let sig = headers
            .get("x-hub-signature-256")
            .and_then(|v| v.to_str().ok());
        if !verify_signature(secret, &body, sig) {
            return Err(unauthorized("invalid or missing X-Hub-Signature-256"));
        }
    }

    let event = headers
        .get("x-github-event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let payload =
        decode_payload(&body).map_err(|e| bad_request(format!("invalid JSON payload: {}", e)))?;

    let Some(tag) = tag_for_event(&event, &payload) else {
        info!(event = %event, "webhook received but no relevant action");
        return Ok(Json(WebhookResponse {
            status: "ignored".to_string(),
            tag: None,
            action: None,
            message: "Webhook received".to_string(),
        }));
    };

    info!(event = %event, tag = %tag, "generating release notes from webhook");
    match state.pipeline.run_now(&Trigger::Tag(tag)).await {
        RunOutcome::Published {
            tag,
            publish: Some(outcome),
            ..
        } => Ok(Json(WebhookResponse {
            status: "published".to_string(),
            message: format!("Release {} {}", tag, outcome.verb()),
            tag: Some(tag),
            action: Some(outcome.verb().to_string()),
        })),
        RunOutcome::Published {
            tag, publish: None, ..
        } => Ok(Json(WebhookResponse {
            status: "dry_run".to_string(),
            message: format!("Release notes for {} composed (dry run)", tag),
            tag: Some(tag),
            action: None,
        })),
        RunOutcome::NoChanges { tag, .. } => Ok(Json(WebhookResponse {
            status: "no_changes".to_string(),
            message: "No commits found in this period.".to_string(),
            tag: Some(tag),
            action: None,
        })),
        RunOutcome::Failed { reason } => Err(pipeline_failed(reason)),
    }
}
