// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use axum::{
	routing::{get, post},
	Router,
};
use sqlx::SqlitePool;
use tracing::{info, warn};

use sentinel_common_secret::SecretString;
use sentinel_server_config::ServerConfig;
use sentinel_server_db::{GithubRepository, GithubStore};
use sentinel_server_github_app::{AppAuthenticator, GithubAppConfig, GithubAppError, RetryConfig};

use crate::processor::WebhookProcessor;
use crate::routes;
use crate::scan::{GithubScanner, ScanService};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
	pub pool: SqlitePool,
	pub github_store: Arc<dyn GithubStore>,
	pub processor: Arc<WebhookProcessor>,
	pub github_app: Option<AppAuthenticator>,
	pub webhook_secret: Option<SecretString>,
	pub scan_service: Option<ScanService>,
}

/// Build the state from configuration.
///
/// A GitHub App that fails to initialize is logged and left disabled; webhook
/// handling works without it, follow-up scanning does not.
pub async fn create_app_state(pool: SqlitePool, config: &ServerConfig) -> AppState {
	let github_store: Arc<dyn GithubStore> = Arc::new(GithubRepository::new(pool.clone()));

	let github_app = match initialize_github_app(config) {
		Ok(app) => app,
		Err(e) => {
			warn!(error = %e, "GitHub App disabled");
			None
		}
	};

	if config.github_app.webhook_secret.is_none() {
		warn!("no webhook secret configured, GitHub webhooks will be rejected");
	}

	let scan_service = match (&github_app, config.scan.enabled) {
		(Some(app), true) => {
			let scanner = GithubScanner::new(Arc::new(app.clone()), config.scan.extensions.clone());
			info!(
				extensions = ?config.scan.extensions,
				queue_capacity = config.scan.queue_capacity,
				max_concurrent = config.scan.max_concurrent,
				"follow-up scanning enabled"
			);
			Some(ScanService::spawn(
				Arc::new(scanner),
				config.scan.queue_capacity,
				config.scan.max_concurrent,
				config.scan.job_timeout,
			))
		}
		_ => None,
	};

	let mut processor = WebhookProcessor::new(Arc::clone(&github_store));
	if let Some(credentials) = &config.github_app.credentials {
		processor = processor.with_app_id(credentials.app_id as i64);
	}
	if let Some(scans) = &scan_service {
		processor = processor.with_scan_service(scans.clone());
	}

	AppState {
		pool,
		github_store,
		processor: Arc::new(processor),
		github_app,
		webhook_secret: config.github_app.webhook_secret.clone(),
		scan_service,
	}
}

fn initialize_github_app(config: &ServerConfig) -> Result<Option<AppAuthenticator>, GithubAppError> {
	let Some(credentials) = &config.github_app.credentials else {
		info!("GitHub App credentials not configured");
		return Ok(None);
	};

	let app_config = GithubAppConfig::new(credentials.app_id, credentials.private_key_pem.clone())?
		.with_base_url(&config.github_app.base_url)?
		.with_app_slug(config.github_app.app_slug.clone())
		.with_request_timeout(config.github_app.request_timeout)
		.with_retry_config(RetryConfig {
			max_attempts: config.github_app.max_attempts,
			..RetryConfig::default()
		});

	AppAuthenticator::new(app_config).map(Some)
}

pub fn create_router(state: AppState) -> Router {
	Router::new()
		.route("/ping", get(routes::health::ping))
		.route("/health", get(routes::health::health_check))
		// Signature verified in the handler against the raw body
		.route("/webhook/github", post(routes::webhook::github_webhook))
		.route("/github/app/install-url", get(routes::github::install_url))
		.route("/github/installations", get(routes::github::list_installations))
		.route(
			"/github/installations/{installation_id}/repositories",
			get(routes::github::list_installation_repositories),
		)
		.route("/github/trace", post(routes::github::trace_pull_request))
		.route("/api/openapi.json", get(routes::docs::openapi_json))
		.with_state(state)
}
