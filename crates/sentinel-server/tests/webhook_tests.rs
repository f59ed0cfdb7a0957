// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end webhook delivery through the axum router.

use axum::{
	body::Body,
	http::{Request, StatusCode},
	Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use sentinel_common_secret::SecretString;
use sentinel_server::{create_app_state, create_router, ServerConfig};
use sentinel_server_db::{create_pool, run_migrations};
use sentinel_server_github_app::compute_webhook_signature;

const SECRET: &str = "It's a Secret to Everybody";

async fn setup(secret: Option<&str>) -> (Router, TempDir) {
	let dir = tempfile::tempdir().unwrap();
	let url = format!("sqlite:{}?mode=rwc", dir.path().join("test.db").display());
	let pool = create_pool(&url).await.unwrap();
	run_migrations(&pool).await.unwrap();

	let mut config = ServerConfig::default();
	config.github_app.webhook_secret = secret.map(SecretString::from);
	let state = create_app_state(pool, &config).await;
	(create_router(state), dir)
}

fn delivery(event: &str, body: &[u8], signature: Option<String>) -> Request<Body> {
	let mut builder = Request::builder()
		.method("POST")
		.uri("/webhook/github")
		.header("content-type", "application/json")
		.header("x-github-event", event)
		.header("x-github-delivery", "72d3162e-cc78-11e3-81ab-4c9367dc0958");
	if let Some(signature) = signature {
		builder = builder.header("x-hub-signature-256", signature);
	}
	builder.body(Body::from(body.to_vec())).unwrap()
}

fn signed(event: &str, body: &Value) -> Request<Body> {
	let bytes = serde_json::to_vec(body).unwrap();
	let signature = compute_webhook_signature(SECRET, &bytes);
	delivery(event, &bytes, Some(signature))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
	let response = app.clone().oneshot(request).await.unwrap();
	let status = response.status();
	let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
		.await
		.unwrap();
	let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
	(status, body)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
	send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

fn installation_created(installation_id: i64) -> Value {
	json!({
		"action": "created",
		"installation": {
			"id": installation_id,
			"account": {"id": 1001, "login": "acme", "type": "Organization"},
			"repository_selection": "selected",
			"app_id": 12,
			"permissions": {"contents": "read"},
			"events": ["push"]
		},
		"repositories": [
			{"id": 1, "name": "infra", "full_name": "acme/infra", "private": true}
		]
	})
}

#[tokio::test]
async fn installation_lifecycle() {
	let (app, _dir) = setup(Some(SECRET)).await;

	let (status, body) = send(&app, signed("installation", &installation_created(42))).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["message"], "Event processed successfully");

	let (status, body) = get(&app, "/github/installations").await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body.as_array().unwrap().len(), 1);
	assert_eq!(body[0]["installation_id"], 42);
	assert_eq!(body[0]["account_login"], "acme");

	let added = json!({
		"action": "added",
		"installation": {"id": 42},
		"repositories_added": [
			{"id": 2, "name": "modules", "full_name": "acme/modules", "private": false}
		],
		"repositories_removed": [
			{"id": 1, "name": "infra", "full_name": "acme/infra"}
		]
	});
	let (status, _) = send(&app, signed("installation_repositories", &added)).await;
	assert_eq!(status, StatusCode::OK);

	let (status, body) = get(&app, "/github/installations/42/repositories").await;
	assert_eq!(status, StatusCode::OK);
	let repos = body.as_array().unwrap();
	assert_eq!(repos.len(), 1);
	assert_eq!(repos[0]["full_name"], "acme/modules");

	let deleted = json!({"action": "deleted", "installation": {"id": 42}});
	let (status, _) = send(&app, signed("installation", &deleted)).await;
	assert_eq!(status, StatusCode::OK);

	let (status, _) = get(&app, "/github/installations/42/repositories").await;
	assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn redelivered_created_event_is_accepted_once() {
	let (app, _dir) = setup(Some(SECRET)).await;

	for _ in 0..2 {
		let (status, _) = send(&app, signed("installation", &installation_created(7))).await;
		assert_eq!(status, StatusCode::OK);
	}

	let (_, body) = get(&app, "/github/installations").await;
	assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn repositories_for_unknown_installation_is_404() {
	let (app, _dir) = setup(Some(SECRET)).await;

	let event = json!({
		"action": "added",
		"installation": {"id": 999},
		"repositories_added": [{"id": 5, "name": "x", "full_name": "acme/x"}]
	});
	let (status, body) = send(&app, signed("installation_repositories", &event)).await;
	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(body["error"], "not_found");

	let (_, body) = get(&app, "/github/installations").await;
	assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_event_type_is_acknowledged() {
	let (app, _dir) = setup(Some(SECRET)).await;

	let (status, body) = send(&app, signed("push", &json!({"ref": "refs/heads/main"}))).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["message"], "Event type not handled");
}

#[tokio::test]
async fn bad_signature_is_401() {
	let (app, _dir) = setup(Some(SECRET)).await;
	let body = serde_json::to_vec(&installation_created(1)).unwrap();

	let wrong = compute_webhook_signature("another secret", &body);
	let (status, _) = send(&app, delivery("installation", &body, Some(wrong))).await;
	assert_eq!(status, StatusCode::UNAUTHORIZED);

	let unprefixed = compute_webhook_signature(SECRET, &body)
		.trim_start_matches("sha256=")
		.to_string();
	let (status, _) = send(&app, delivery("installation", &body, Some(unprefixed))).await;
	assert_eq!(status, StatusCode::UNAUTHORIZED);

	let (_, installations) = get(&app, "/github/installations").await;
	assert!(installations.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unconfigured_secret_rejects_everything() {
	let (app, _dir) = setup(None).await;
	let body = serde_json::to_vec(&installation_created(1)).unwrap();
	let signature = compute_webhook_signature(SECRET, &body);

	let (status, _) = send(&app, delivery("installation", &body, Some(signature))).await;
	assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_headers_are_400() {
	let (app, _dir) = setup(Some(SECRET)).await;
	let body = serde_json::to_vec(&installation_created(1)).unwrap();

	let (status, _) = send(&app, delivery("installation", &body, None)).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);

	let request = Request::builder()
		.method("POST")
		.uri("/webhook/github")
		.header("x-hub-signature-256", compute_webhook_signature(SECRET, &body))
		.body(Body::from(body))
		.unwrap();
	let (status, _) = send(&app, request).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_is_400() {
	let (app, _dir) = setup(Some(SECRET)).await;
	let body = b"{\"action\": \"created\", \"installation\": ";
	let signature = compute_webhook_signature(SECRET, body);

	let (status, body) = send(&app, delivery("installation", body, Some(signature))).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error"], "bad_request");
}
