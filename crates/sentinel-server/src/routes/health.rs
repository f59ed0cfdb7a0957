// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Liveness and health HTTP handlers.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::time::Instant;
use utoipa::ToSchema;

use super::MessageResponse;
use crate::api::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
	Healthy,
	Unhealthy,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DatabaseHealth {
	pub status: HealthStatus,
	pub latency_ms: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GithubAppHealth {
	/// App credentials loaded; installation tokens can be minted.
	pub configured: bool,
	pub webhook_secret_configured: bool,
	pub scanning_enabled: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
	pub status: HealthStatus,
	pub timestamp: String,
	pub version: String,
	pub database: DatabaseHealth,
	pub github_app: GithubAppHealth,
}

async fn check_database(pool: &SqlitePool) -> DatabaseHealth {
	let start = Instant::now();
	let result = sqlx::query("SELECT 1").execute(pool).await;
	let latency_ms = start.elapsed().as_millis() as u64;

	match result {
		Ok(_) => DatabaseHealth {
			status: HealthStatus::Healthy,
			latency_ms,
			error: None,
		},
		Err(e) => {
			tracing::warn!(error = %e, "Database health check failed");
			DatabaseHealth {
				status: HealthStatus::Unhealthy,
				latency_ms,
				error: Some(e.to_string()),
			}
		}
	}
}

#[utoipa::path(
    get,
    path = "/ping",
    responses((status = 200, description = "Server is up", body = MessageResponse)),
    tag = "health"
)]
/// GET /ping - Liveness check.
pub async fn ping() -> Json<MessageResponse> {
	Json(MessageResponse::new("pong"))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System is healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    ),
    tag = "health"
)]
/// GET /health - Database reachability and GitHub App status.
///
/// An unconfigured GitHub App does not make the server unhealthy.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
	let database = check_database(&state.pool).await;
	let status = database.status;

	let response = HealthResponse {
		status,
		timestamp: chrono::Utc::now().to_rfc3339(),
		version: env!("CARGO_PKG_VERSION").to_string(),
		database,
		github_app: GithubAppHealth {
			configured: state.github_app.is_some(),
			webhook_secret_configured: state.webhook_secret.is_some(),
			scanning_enabled: state.scan_service.is_some(),
		},
	};

	let http_status = match status {
		HealthStatus::Healthy => StatusCode::OK,
		HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
	};

	(http_status, Json(response))
}
