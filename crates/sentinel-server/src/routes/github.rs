// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! GitHub App installation and trace endpoints.

use axum::{
	extract::{Path, State},
	http::StatusCode,
	Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use sentinel_server_db::{InstallationRecord, RepositoryRecord};

use super::MessageResponse;
use crate::{api::AppState, error::ServerError, scan::ScanJob};

#[derive(Debug, Serialize, ToSchema)]
pub struct InstallUrlResponse {
	pub url: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TraceRequest {
	/// `owner/name`, matched case-insensitively.
	pub repository_full_name: String,
	pub pull_request_number: u64,
}

#[utoipa::path(
    get,
    path = "/github/app/install-url",
    responses(
        (status = 200, description = "Where to install the GitHub App", body = InstallUrlResponse),
        (status = 503, description = "GitHub App not configured", body = crate::error::ErrorResponse)
    ),
    tag = "github"
)]
/// GET /github/app/install-url
pub async fn install_url(
	State(state): State<AppState>,
) -> Result<Json<InstallUrlResponse>, ServerError> {
	let app = state
		.github_app
		.as_ref()
		.ok_or_else(|| ServerError::ServiceUnavailable("GitHub App is not configured".to_string()))?;
	Ok(Json(InstallUrlResponse {
		url: app.installation_url(),
	}))
}

#[utoipa::path(
    get,
    path = "/github/installations",
    responses(
        (status = 200, description = "Stored installations", body = Vec<InstallationRecord>),
        (status = 500, description = "Storage failure", body = crate::error::ErrorResponse)
    ),
    tag = "github"
)]
/// GET /github/installations
pub async fn list_installations(
	State(state): State<AppState>,
) -> Result<Json<Vec<InstallationRecord>>, ServerError> {
	Ok(Json(state.github_store.list_installations().await?))
}

#[utoipa::path(
    get,
    path = "/github/installations/{installation_id}/repositories",
    params(("installation_id" = i64, Path, description = "GitHub installation id")),
    responses(
        (status = 200, description = "Repositories granted to the installation", body = Vec<RepositoryRecord>),
        (status = 404, description = "Installation not found", body = crate::error::ErrorResponse)
    ),
    tag = "github"
)]
/// GET /github/installations/{installation_id}/repositories
pub async fn list_installation_repositories(
	State(state): State<AppState>,
	Path(installation_id): Path<i64>,
) -> Result<Json<Vec<RepositoryRecord>>, ServerError> {
	if state
		.github_store
		.get_installation(installation_id)
		.await?
		.is_none()
	{
		return Err(ServerError::NotFound(format!(
			"installation {installation_id} not found"
		)));
	}
	Ok(Json(
		state.github_store.list_repositories(installation_id).await?,
	))
}

#[utoipa::path(
    post,
    path = "/github/trace",
    request_body = TraceRequest,
    responses(
        (status = 202, description = "Pull request scan queued", body = MessageResponse),
        (status = 400, description = "Malformed repository name", body = crate::error::ErrorResponse),
        (status = 404, description = "No installation covers the repository", body = crate::error::ErrorResponse),
        (status = 503, description = "Scanning unavailable or queue full", body = crate::error::ErrorResponse)
    ),
    tag = "github"
)]
/// POST /github/trace - Queue a scan of one pull request's changed files.
pub async fn trace_pull_request(
	State(state): State<AppState>,
	Json(req): Json<TraceRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ServerError> {
	let (owner, repo) = req
		.repository_full_name
		.split_once('/')
		.filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty())
		.ok_or_else(|| {
			ServerError::BadRequest("repository_full_name must be owner/name".to_string())
		})?;

	let scans = state
		.scan_service
		.as_ref()
		.ok_or_else(|| ServerError::ServiceUnavailable("Scanning is not available".to_string()))?;

	let installation = state
		.github_store
		.get_installation_for_repository(&req.repository_full_name)
		.await?
		.ok_or_else(|| {
			ServerError::NotFound(format!(
				"no installation covers {}",
				req.repository_full_name
			))
		})?;

	let queued = scans.submit(ScanJob::PullRequest {
		installation_id: installation.installation_id,
		owner: owner.to_string(),
		repo: repo.to_string(),
		number: req.pull_request_number,
	});
	if !queued {
		return Err(ServerError::ServiceUnavailable(
			"Scan queue is full".to_string(),
		));
	}

	info!(
		installation_id = installation.installation_id,
		repository = %req.repository_full_name,
		pull_request = req.pull_request_number,
		"Trace queued"
	);
	Ok((StatusCode::ACCEPTED, Json(MessageResponse::new("Trace queued"))))
}
