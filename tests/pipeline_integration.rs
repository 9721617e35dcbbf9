//! End-to-end tests for the release-note pipeline.
//!
//! A small axum server stands in for both the GitHub REST API and the
//! OpenAI chat-completions endpoint, so these tests exercise the real
//! HTTP clients, the full pipeline, and the webhook receiver.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use release_herald::compose::no_changes_document;
use release_herald::config::{CompositionKind, Config};
use release_herald::github::{GitHubClient, SourceHost};
use release_herald::models::ReleaseWindow;
use release_herald::publish::publish;
use release_herald::models::{PublishOutcome, RunOutcome};
use release_herald::pipeline::{Pipeline, Trigger};
use release_herald::rewrite::DETAILS_UNAVAILABLE;
use release_herald::webhook::{router, WebhookState};
use serde_json::{json, Value};
use sha2::Sha256;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ─── Fake GitHub + OpenAI ───────────────────────────────────────────

#[derive(Default)]
struct Fake {
    releases: Vec<Value>,
    commits: Vec<Value>,
    files: HashMap<String, Value>,
    failing_details: HashSet<String>,
    /// Answered with 429 on the first request only.
    rate_limited_once: HashSet<String>,
    /// Answered with 403 and an exhausted quota on the first request only.
    quota_exhausted_once: HashSet<String>,
    /// Always answered with 403 and quota to spare.
    forbidden_details: HashSet<String>,
    detail_calls: HashMap<String, usize>,
    chat_rate_limited_once: bool,
    chat_calls: usize,
    fail_commit_list: bool,
    since_seen: Vec<String>,
    created: Vec<Value>,
    patched: Vec<(u64, Value)>,
    next_id: u64,
}

type Shared = Arc<Mutex<Fake>>;

impl Fake {
    fn with_commits(commits: &[(&str, &str)]) -> Self {
        let mut fake = Fake {
            next_id: 100,
            ..Default::default()
        };
        for (sha, message) in commits {
            fake.commits
                .push(json!({ "sha": sha, "commit": { "message": message } }));
            fake.files.insert(
                sha.to_string(),
                json!([{
                    "filename": format!("src/{}.rs", sha),
                    "patch": "@@ -1 +1 @@\n-old\n+new"
                }]),
            );
        }
        fake
    }

    fn release(mut self, id: u64, tag: &str, published_at: &str) -> Self {
        self.releases.push(json!({
            "id": id,
            "tag_name": tag,
            "published_at": published_at,
            "body": "old notes",
        }));
        self
    }
}

/// Slice `items` the way GitHub pages a list endpoint.
fn page_of(items: &[Value], q: &HashMap<String, String>) -> Value {
    let per_page: usize = q.get("per_page").and_then(|v| v.parse().ok()).unwrap_or(30);
    let page: usize = q.get("page").and_then(|v| v.parse().ok()).unwrap_or(1);
    Value::Array(
        items
            .iter()
            .skip((page.max(1) - 1) * per_page)
            .take(per_page)
            .cloned()
            .collect(),
    )
}

async fn list_releases(
    State(s): State<Shared>,
    Query(q): Query<HashMap<String, String>>,
) -> Json<Value> {
    Json(page_of(&s.lock().unwrap().releases, &q))
}

async fn create_release(
    State(s): State<Shared>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut fake = s.lock().unwrap();
    fake.next_id += 1;
    let release = json!({
        "id": fake.next_id,
        "tag_name": body["tag_name"],
        "published_at": "2025-06-15T09:00:00Z",
        "body": body["body"],
    });
    fake.created.push(body);
    fake.releases.insert(0, release.clone());
    (StatusCode::CREATED, Json(release))
}

async fn update_release(
    State(s): State<Shared>,
    Path((_owner, _repo, id)): Path<(String, String, u64)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    let mut fake = s.lock().unwrap();
    fake.patched.push((id, body.clone()));
    let release = fake
        .releases
        .iter_mut()
        .find(|r| r["id"] == id)
        .ok_or(StatusCode::NOT_FOUND)?;
    release["body"] = body["body"].clone();
    Ok(Json(release.clone()))
}

async fn list_commits(
    State(s): State<Shared>,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    let mut fake = s.lock().unwrap();
    if let Some(since) = q.get("since") {
        fake.since_seen.push(since.clone());
    }
    if fake.fail_commit_list {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    Ok(Json(page_of(&fake.commits, &q)))
}

async fn commit_detail(
    State(s): State<Shared>,
    Path((_owner, _repo, sha)): Path<(String, String, String)>,
) -> Response {
    let mut fake = s.lock().unwrap();
    *fake.detail_calls.entry(sha.clone()).or_default() += 1;
    if fake.failing_details.contains(&sha) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    if fake.rate_limited_once.remove(&sha) {
        return (StatusCode::TOO_MANY_REQUESTS, "slow down").into_response();
    }
    if fake.quota_exhausted_once.remove(&sha) {
        return (
            StatusCode::FORBIDDEN,
            [("x-ratelimit-remaining", "0")],
            "API rate limit exceeded",
        )
            .into_response();
    }
    if fake.forbidden_details.contains(&sha) {
        return (
            StatusCode::FORBIDDEN,
            [("x-ratelimit-remaining", "4999")],
            "Resource not accessible",
        )
            .into_response();
    }
    let files = fake.files.get(&sha).cloned().unwrap_or(json!([]));
    Json(json!({ "sha": sha, "files": files })).into_response()
}

/// Rewrites echo the original first line; anything else is a summary.
async fn chat(State(s): State<Shared>, Json(req): Json<Value>) -> Response {
    {
        let mut fake = s.lock().unwrap();
        fake.chat_calls += 1;
        if fake.chat_rate_limited_once {
            fake.chat_rate_limited_once = false;
            return (StatusCode::TOO_MANY_REQUESTS, "rate limited").into_response();
        }
    }
    let prompt = req["messages"][1]["content"].as_str().unwrap_or("");
    let text = match prompt
        .lines()
        .find_map(|l| l.strip_prefix("Original message: "))
    {
        Some(original) => format!("Rewritten: {}", original),
        None => "Summary of the period.".to_string(),
    };
    Json(json!({ "choices": [{ "message": { "role": "assistant", "content": text } }] }))
        .into_response()
}

async fn spawn_fake(state: Shared) -> String {
    let app = Router::new()
        .route(
            "/repos/{owner}/{repo}/releases",
            get(list_releases).post(create_release),
        )
        .route("/repos/{owner}/{repo}/releases/{id}", patch(update_release))
        .route("/repos/{owner}/{repo}/commits", get(list_commits))
        .route("/repos/{owner}/{repo}/commits/{sha}", get(commit_detail))
        .route("/chat/completions", post(chat))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn test_config(base: &str) -> Config {
    let mut cfg = Config::for_repo("acme", "widgets");
    cfg.github.api_base = base.to_string();
    cfg.github.token = Some("gh-test-token".into());
    cfg.llm.base_url = base.to_string();
    cfg.llm.api_key = Some("sk-test-key".into());
    cfg.fetch.retry_backoff_ms = 10;
    cfg
}

fn pipeline_for(cfg: &Config) -> Pipeline {
    let credentials = cfg.resolve_credentials(|_| None).unwrap();
    Pipeline::from_config(cfg, &credentials).unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 15, 9, 0, 0).unwrap()
}

// ─── Pipeline ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_creates_release_from_commits_since_previous() {
    let state: Shared = Arc::new(Mutex::new(
        Fake::with_commits(&[
            ("aaaaaaa1", "Fix login redirect"),
            ("bbbbbbb2", "Add CSV export\n\nlong body"),
            ("ccccccc3", "Bump deps"),
        ])
        .release(1, "v1.0.0", "2025-06-01T00:00:00Z"),
    ));
    let base = spawn_fake(state.clone()).await;
    let pipeline = pipeline_for(&test_config(&base));

    let outcome = pipeline.run(&Trigger::Tag("v1.1.0".into()), now()).await;

    let (tag, id, document) = match outcome {
        RunOutcome::Published {
            tag,
            publish: Some(PublishOutcome::Created { id }),
            document,
        } => (tag, id, document),
        other => panic!("expected a created release, got {:?}", other),
    };
    assert_eq!(tag, "v1.1.0");
    assert_eq!(id, 101);

    let texts: Vec<&str> = document.entries.iter().map(|e| e.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "Rewritten: Fix login redirect",
            "Rewritten: Add CSV export",
            "Rewritten: Bump deps"
        ]
    );
    assert!(document
        .body
        .starts_with("### Release Notes (2025-06-01T00:00:00Z to 2025-06-15T09:00:00Z)"));
    assert!(document.body.contains("Summary of the period."));

    let fake = state.lock().unwrap();
    assert_eq!(fake.since_seen, vec!["2025-06-01T00:00:00Z"]);
    assert_eq!(fake.created.len(), 1);
    assert_eq!(fake.created[0]["tag_name"], "v1.1.0");
    assert_eq!(fake.created[0]["name"], "Release v1.1.0");
    assert_eq!(fake.created[0]["draft"], false);
    assert_eq!(fake.created[0]["body"], document.body.as_str());
    assert!(fake.patched.is_empty());
}

#[tokio::test]
async fn test_first_release_uses_default_lookback() {
    let state: Shared = Arc::new(Mutex::new(Fake::with_commits(&[(
        "aaaaaaa1",
        "Initial import",
    )])));
    let base = spawn_fake(state.clone()).await;
    let pipeline = pipeline_for(&test_config(&base));

    let outcome = pipeline
        .run(&Trigger::Manual { tag: None }, now())
        .await;

    match outcome {
        RunOutcome::Published { tag, publish, .. } => {
            assert_eq!(tag, "v20250615090000");
            assert!(matches!(publish, Some(PublishOutcome::Created { .. })));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(
        state.lock().unwrap().since_seen,
        vec!["2025-05-16T09:00:00Z"]
    );
}

#[tokio::test]
async fn test_existing_tag_updates_body_only() {
    let state: Shared = Arc::new(Mutex::new(
        Fake::with_commits(&[("aaaaaaa1", "Fix crash on save")])
            .release(7, "v1.1.0", "2025-06-10T00:00:00Z")
            .release(1, "v1.0.0", "2025-06-01T00:00:00Z"),
    ));
    let base = spawn_fake(state.clone()).await;
    let pipeline = pipeline_for(&test_config(&base));

    let trigger = Trigger::Tag("v1.1.0".into());
    let first = pipeline.run(&trigger, now()).await;
    let second = pipeline.run(&trigger, now()).await;

    for outcome in [&first, &second] {
        assert!(matches!(
            outcome,
            RunOutcome::Published {
                publish: Some(PublishOutcome::Updated { id: 7 }),
                ..
            }
        ));
    }

    let fake = state.lock().unwrap();
    // The release being published is not its own predecessor.
    assert_eq!(
        fake.since_seen,
        vec!["2025-06-01T00:00:00Z", "2025-06-01T00:00:00Z"]
    );
    assert!(fake.created.is_empty());
    assert_eq!(fake.patched.len(), 2);
    let (id, body) = &fake.patched[0];
    assert_eq!(*id, 7);
    assert_eq!(body.as_object().unwrap().len(), 1);
    assert!(body["body"]
        .as_str()
        .unwrap()
        .contains("Rewritten: Fix crash on save"));
}

#[tokio::test]
async fn test_empty_window_skips_publish_and_writes_artifact() {
    let state: Shared = Arc::new(Mutex::new(
        Fake::with_commits(&[]).release(1, "v1.0.0", "2025-06-01T00:00:00Z"),
    ));
    let base = spawn_fake(state.clone()).await;
    let tmp = TempDir::new().unwrap();
    let notes = tmp.path().join("out").join("NOTES.md");

    let mut cfg = test_config(&base);
    cfg.output.path = Some(notes.clone());
    let pipeline = pipeline_for(&cfg);

    let outcome = pipeline.run(&Trigger::Tag("v1.2.0".into()), now()).await;

    let (tag, document) = match outcome {
        RunOutcome::NoChanges { tag, document } => (tag, document),
        other => panic!("expected no changes, got {:?}", other),
    };
    assert_eq!(tag, "v1.2.0");
    assert!(document.is_empty());
    assert!(document
        .body
        .contains("No changes were committed in this period."));

    let fake = state.lock().unwrap();
    assert!(fake.created.is_empty());
    assert!(fake.patched.is_empty());

    let written = std::fs::read_to_string(&notes).unwrap();
    assert!(written.starts_with("## v1.2.0\n\n"));
    assert!(written.contains("No changes were committed in this period."));
}

#[tokio::test]
async fn test_failed_detail_fetch_yields_placeholder() {
    let mut fake = Fake::with_commits(&[
        ("aaaaaaa1", "First"),
        ("bbbbbbb2", "Second"),
        ("ccccccc3", "Third"),
    ]);
    fake.failing_details.insert("bbbbbbb2".into());
    let state: Shared = Arc::new(Mutex::new(fake));
    let base = spawn_fake(state.clone()).await;
    let pipeline = pipeline_for(&test_config(&base));

    let outcome = pipeline.run(&Trigger::Tag("v2.0.0".into()), now()).await;
    assert!(outcome.is_success());

    let document = outcome.document().unwrap();
    assert_eq!(document.entries.len(), 3);
    assert_eq!(document.entries[0].text, "Rewritten: First");
    assert!(document.entries[1].is_placeholder());
    assert_eq!(document.entries[1].text, DETAILS_UNAVAILABLE);
    assert_eq!(document.entries[2].text, "Rewritten: Third");
    assert!(document.body.contains("- [unavailable] "));
    assert_eq!(state.lock().unwrap().created.len(), 1);
}

#[tokio::test]
async fn test_commit_list_failure_reports_failed() {
    let mut fake = Fake::with_commits(&[("aaaaaaa1", "First")]);
    fake.fail_commit_list = true;
    let state: Shared = Arc::new(Mutex::new(fake));
    let base = spawn_fake(state.clone()).await;
    let pipeline = pipeline_for(&test_config(&base));

    let outcome = pipeline.run(&Trigger::Tag("v2.0.0".into()), now()).await;

    match outcome {
        RunOutcome::Failed { reason } => {
            assert!(reason.contains("failed to list commits"), "{}", reason);
            assert!(!reason.contains("gh-test-token"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(state.lock().unwrap().created.is_empty());
}

#[tokio::test]
async fn test_dry_run_composes_without_publishing() {
    let state: Shared = Arc::new(Mutex::new(Fake::with_commits(&[(
        "aaaaaaa1",
        "Tidy README -bf",
    )])));
    let base = spawn_fake(state.clone()).await;
    let mut cfg = test_config(&base);
    cfg.compose.policy = CompositionKind::Categorized;
    let mut pipeline = pipeline_for(&cfg);
    pipeline.settings_mut().dry_run = true;

    let outcome = pipeline.run(&Trigger::Tag("v3.0.0".into()), now()).await;

    let document = match outcome {
        RunOutcome::Published {
            publish: None,
            document,
            ..
        } => document,
        other => panic!("expected dry run, got {:?}", other),
    };
    let sections = document.category_sections.unwrap();
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0].name, "Bug Fixes");
    assert!(document.body.contains("#### Bug Fixes"));
    assert!(state.lock().unwrap().created.is_empty());
}

// ─── Paging and rate limits ─────────────────────────────────────────

fn client_for(base: &str) -> GitHubClient {
    GitHubClient::new(
        base,
        "acme",
        "widgets",
        "gh-test-token",
        std::time::Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn test_publish_finds_release_beyond_first_page() {
    let mut fake = Fake::with_commits(&[]);
    for i in 0..150u64 {
        fake = fake.release(i + 1, &format!("v0.{}", i), "2025-01-01T00:00:00Z");
    }
    let state: Shared = Arc::new(Mutex::new(fake));
    let base = spawn_fake(state.clone()).await;
    let client = client_for(&base);

    assert_eq!(client.list_releases().await.unwrap().len(), 150);

    let window = ReleaseWindow::new(now() - chrono::Duration::days(1), now());
    let document = no_changes_document(&window);
    for _ in 0..2 {
        let outcome = publish(&client, "v0.120", &document).await.unwrap();
        assert_eq!(outcome, PublishOutcome::Updated { id: 121 });
    }

    let fake = state.lock().unwrap();
    assert!(fake.created.is_empty());
    assert_eq!(fake.patched.len(), 2);
    assert!(fake.patched.iter().all(|(id, _)| *id == 121));
}

#[tokio::test]
async fn test_commit_listing_follows_every_page() {
    let commits: Vec<(String, String)> = (0..1500)
        .map(|i| (format!("{:08x}", i), format!("Change {}", i)))
        .collect();
    let refs: Vec<(&str, &str)> = commits
        .iter()
        .map(|(sha, msg)| (sha.as_str(), msg.as_str()))
        .collect();
    let state: Shared = Arc::new(Mutex::new(Fake::with_commits(&refs)));
    let base = spawn_fake(state.clone()).await;
    let client = client_for(&base);

    let window = ReleaseWindow::new(now() - chrono::Duration::days(30), now());
    let listed = client.list_commits(&window).await.unwrap();

    assert_eq!(listed.len(), 1500);
    assert_eq!(listed[0].sha, "00000000");
    assert_eq!(listed[1499].raw_message, "Change 1499");
    // 15 full pages plus the empty page that ends the listing.
    assert_eq!(state.lock().unwrap().since_seen.len(), 16);
}

#[tokio::test]
async fn test_rate_limited_detail_fetch_is_retried_once() {
    let mut fake = Fake::with_commits(&[
        ("aaaaaaa1", "Throttled detail"),
        ("bbbbbbb2", "Quota detail"),
        ("ccccccc3", "Forbidden detail"),
    ]);
    fake.rate_limited_once.insert("aaaaaaa1".into());
    fake.quota_exhausted_once.insert("bbbbbbb2".into());
    fake.forbidden_details.insert("ccccccc3".into());
    let state: Shared = Arc::new(Mutex::new(fake));
    let base = spawn_fake(state.clone()).await;
    let pipeline = pipeline_for(&test_config(&base));

    let outcome = pipeline.run(&Trigger::Tag("v4.0.0".into()), now()).await;
    let document = outcome.document().unwrap();

    assert_eq!(document.entries[0].text, "Rewritten: Throttled detail");
    assert_eq!(document.entries[1].text, "Rewritten: Quota detail");
    assert!(document.entries[2].is_placeholder());
    assert_eq!(document.entries[2].text, DETAILS_UNAVAILABLE);

    let fake = state.lock().unwrap();
    assert_eq!(fake.detail_calls["aaaaaaa1"], 2);
    assert_eq!(fake.detail_calls["bbbbbbb2"], 2);
    // A plain 403 is not a rate limit.
    assert_eq!(fake.detail_calls["ccccccc3"], 1);
}

#[tokio::test]
async fn test_rate_limited_rewrite_is_retried_once() {
    let mut fake = Fake::with_commits(&[("aaaaaaa1", "Speed up startup")]);
    fake.chat_rate_limited_once = true;
    let state: Shared = Arc::new(Mutex::new(fake));
    let base = spawn_fake(state.clone()).await;
    let pipeline = pipeline_for(&test_config(&base));

    let outcome = pipeline.run(&Trigger::Tag("v4.1.0".into()), now()).await;
    let document = outcome.document().unwrap();

    assert!(!document.entries[0].is_placeholder());
    assert_eq!(document.entries[0].text, "Rewritten: Speed up startup");
    // rewrite, its retry, then the summary
    assert_eq!(state.lock().unwrap().chat_calls, 3);
}

// ─── Webhook ────────────────────────────────────────────────────────

const SECRET: &str = "hook-secret";

fn sign(body: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
    mac.update(body.as_bytes());
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

async fn spawn_webhook(pipeline: Pipeline) -> String {
    let app = router(Arc::new(WebhookState {
        pipeline,
        secret: Some(SECRET.to_string()),
    }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_webhook_end_to_end() {
    let state: Shared = Arc::new(Mutex::new(
        Fake::with_commits(&[("aaaaaaa1", "Add dark mode")])
            .release(1, "v1.0.0", "2025-06-01T00:00:00Z"),
    ));
    let base = spawn_fake(state.clone()).await;
    let hook = spawn_webhook(pipeline_for(&test_config(&base))).await;
    let client = reqwest::Client::new();
    let url = format!("{}/webhook", hook);

    let health: Value = client
        .get(format!("{}/health", hook))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    // Unsigned deliveries are rejected.
    let body = json!({ "action": "created", "release": { "tag_name": "v1.1.0" } }).to_string();
    let resp = client
        .post(&url)
        .header("X-GitHub-Event", "release")
        .body(body.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["error"]["code"], "unauthorized");

    // Irrelevant events are acknowledged and ignored.
    let ping = json!({ "zen": "Design for failure." }).to_string();
    let resp = client
        .post(&url)
        .header("X-GitHub-Event", "ping")
        .header("X-Hub-Signature-256", sign(&ping))
        .body(ping)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let ack: Value = resp.json().await.unwrap();
    assert_eq!(ack["status"], "ignored");
    assert!(state.lock().unwrap().since_seen.is_empty());

    // A created release triggers a publish for its tag.
    let resp = client
        .post(&url)
        .header("X-GitHub-Event", "release")
        .header("X-Hub-Signature-256", sign(&body))
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let published: Value = resp.json().await.unwrap();
    assert_eq!(published["status"], "published");
    assert_eq!(published["tag"], "v1.1.0");
    assert_eq!(published["action"], "created");

    let fake = state.lock().unwrap();
    assert_eq!(fake.created.len(), 1);
    assert!(fake.created[0]["body"]
        .as_str()
        .unwrap()
        .contains("Rewritten: Add dark mode"));
}

#[tokio::test]
async fn test_webhook_pipeline_failure_is_bad_gateway() {
    let mut fake = Fake::with_commits(&[]);
    fake.fail_commit_list = true;
    let state: Shared = Arc::new(Mutex::new(fake));
    let base = spawn_fake(state).await;
    let hook = spawn_webhook(pipeline_for(&test_config(&base))).await;

    let body = json!({ "ref": "refs/tags/v9.9.9" }).to_string();
    let resp = reqwest::Client::new()
        .post(format!("{}/webhook", hook))
        .header("X-GitHub-Event", "push")
        .header("X-Hub-Signature-256", sign(&body))
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["error"]["code"], "pipeline_failed");
}

#[tokio::test]
async fn test_webhook_tag_push_and_nested_payload() {
    let state: Shared = Arc::new(Mutex::new(
        Fake::with_commits(&[("aaaaaaa1", "Add search filters")])
            .release(1, "v1.0.0", "2025-06-01T00:00:00Z"),
    ));
    let base = spawn_fake(state.clone()).await;
    let hook = spawn_webhook(pipeline_for(&test_config(&base))).await;
    let client = reqwest::Client::new();
    let url = format!("{}/webhook", hook);

    let push = json!({ "ref": "refs/tags/v1.2.0", "deleted": false }).to_string();
    let resp = client
        .post(&url)
        .header("X-GitHub-Event", "push")
        .header("X-Hub-Signature-256", sign(&push))
        .body(push)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let published: Value = resp.json().await.unwrap();
    assert_eq!(published["status"], "published");
    assert_eq!(published["tag"], "v1.2.0");
    assert_eq!(published["action"], "created");

    let inner = json!({ "action": "created", "release": { "tag_name": "v1.3.0" } }).to_string();
    let nested = json!({ "payload": inner }).to_string();
    let resp = client
        .post(&url)
        .header("X-GitHub-Event", "release")
        .header("X-Hub-Signature-256", sign(&nested))
        .body(nested)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let published: Value = resp.json().await.unwrap();
    assert_eq!(published["status"], "published");
    assert_eq!(published["tag"], "v1.3.0");

    let fake = state.lock().unwrap();
    let tags: Vec<&str> = fake
        .created
        .iter()
        .map(|r| r["tag_name"].as_str().unwrap())
        .collect();
    assert_eq!(tags, vec!["v1.2.0", "v1.3.0"]);
}
