// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! OpenAPI document for the Sentinel server, served at `/api/openapi.json`.

use utoipa::OpenApi;

use crate::error::ErrorResponse;
use crate::routes::{self, MessageResponse};
use sentinel_server_db::{InstallationRecord, RepositoryRecord};

#[derive(OpenApi)]
#[openapi(
	info(
		title = "Sentinel Server API",
		description = "GitHub App webhook receiver and installation registry",
		license(name = "Proprietary")
	),
	servers(
		(url = "/", description = "Local server")
	),
	paths(
		routes::health::ping,
		routes::health::health_check,
		routes::webhook::github_webhook,
		routes::github::install_url,
		routes::github::list_installations,
		routes::github::list_installation_repositories,
		routes::github::trace_pull_request,
	),
	components(schemas(
		ErrorResponse,
		MessageResponse,
		routes::health::HealthStatus,
		routes::health::HealthResponse,
		routes::health::DatabaseHealth,
		routes::health::GithubAppHealth,
		routes::github::InstallUrlResponse,
		routes::github::TraceRequest,
		InstallationRecord,
		RepositoryRecord,
	)),
	tags(
		(name = "health", description = "Liveness and health checks"),
		(name = "webhooks", description = "GitHub App webhook deliveries"),
		(name = "github", description = "GitHub App installations")
	)
)]
pub struct ApiDoc;
