// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Installation-scoped GitHub REST calls.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use sentinel_common_http::retry;
use tracing::{debug, error, info, instrument, warn};

use crate::auth::AppAuthenticator;
use crate::error::GithubAppError;
use crate::types::{PullRequestFile, RepoContents};

const API_VERSION: &str = "2022-11-28";
const PER_PAGE: usize = 100;
/// GitHub stops listing pull request files after this many.
const MAX_PULL_REQUEST_FILES: usize = 3000;

/// The slice of the GitHub API Sentinel consumes.
#[async_trait]
pub trait GithubApi: Send + Sync {
	/// Every changed file in a pull request, across all pages.
	async fn list_pull_request_files(
		&self,
		owner: &str,
		repo: &str,
		number: u64,
	) -> Result<Vec<PullRequestFile>, GithubAppError>;

	/// A file (with base64 content) or a directory listing. `""` is the
	/// repository root.
	async fn get_contents(&self, owner: &str, repo: &str, path: &str) -> Result<RepoContents, GithubAppError>;
}

/// [`GithubApi`] backed by an installation token from an [`AppAuthenticator`].
///
/// Every request is retried per the App's retry policy. A 401 invalidates the
/// cached token and the request is repeated once with a fresh one.
#[derive(Clone)]
pub struct InstallationClient {
	auth: AppAuthenticator,
	installation_id: i64,
}

impl InstallationClient {
	pub(crate) fn new(auth: AppAuthenticator, installation_id: i64) -> Self {
		Self {
			auth,
			installation_id,
		}
	}

	pub fn installation_id(&self) -> i64 {
		self.installation_id
	}

	async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, GithubAppError> {
		retry(&self.auth.config().retry_config, || self.get_json_with_refresh(url)).await
	}

	async fn get_json_with_refresh<T: DeserializeOwned>(&self, url: &Url) -> Result<T, GithubAppError> {
		let token = self.auth.installation_token(self.installation_id).await?;

		match self.get_json_inner(token.expose(), url).await {
			Err(GithubAppError::Unauthorized) => {
				info!(
					installation_id = self.installation_id,
					"Got 401, refreshing installation token"
				);
				self.auth.invalidate(self.installation_id).await;
				let fresh = self.auth.installation_token(self.installation_id).await?;
				self.get_json_inner(fresh.expose(), url).await
			}
			other => other,
		}
	}

	async fn get_json_inner<T: DeserializeOwned>(&self, token: &str, url: &Url) -> Result<T, GithubAppError> {
		debug!(url = %url, "GitHub GET");

		let response = github_request(self.auth.http_client(), Method::GET, url.clone(), token)
			.send()
			.await
			.map_err(map_send_error)?;

		let status = response.status();
		if status == StatusCode::NOT_FOUND {
			return Err(GithubAppError::not_found(url.path()));
		}
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(map_github_error(status, &body));
		}

		response.json().await.map_err(|e| {
			error!(error = %e, url = %url, "Failed to parse GitHub response");
			GithubAppError::InvalidResponse(format!("JSON parse error: {e}"))
		})
	}
}

#[async_trait]
impl GithubApi for InstallationClient {
	#[instrument(skip(self), fields(installation_id = self.installation_id))]
	async fn list_pull_request_files(
		&self,
		owner: &str,
		repo: &str,
		number: u64,
	) -> Result<Vec<PullRequestFile>, GithubAppError> {
		let base = self.auth.config().endpoint(&format!(
			"repos/{}/{}/pulls/{number}/files",
			urlencoding::encode(owner),
			urlencoding::encode(repo)
		))?;

		let mut files = Vec::new();
		for page in 1.. {
			let mut url = base.clone();
			url
				.query_pairs_mut()
				.append_pair("per_page", &PER_PAGE.to_string())
				.append_pair("page", &page.to_string());

			let batch: Vec<PullRequestFile> = self.get_json(&url).await?;
			let done = batch.len() < PER_PAGE;
			files.extend(batch);
			if done || files.len() >= MAX_PULL_REQUEST_FILES {
				break;
			}
		}

		debug!(count = files.len(), "Listed pull request files");
		Ok(files)
	}

	#[instrument(skip(self), fields(installation_id = self.installation_id))]
	async fn get_contents(&self, owner: &str, repo: &str, path: &str) -> Result<RepoContents, GithubAppError> {
		let url = self.auth.config().endpoint(&contents_path(owner, repo, path))?;
		self.get_json(&url).await
	}
}

/// `repos/{owner}/{repo}/contents[/{path}]` with each segment escaped.
fn contents_path(owner: &str, repo: &str, path: &str) -> String {
	let mut out = format!(
		"repos/{}/{}/contents",
		urlencoding::encode(owner),
		urlencoding::encode(repo)
	);
	for segment in path.split('/').filter(|s| !s.is_empty()) {
		out.push('/');
		out.push_str(&urlencoding::encode(segment));
	}
	out
}

/// A request carrying the headers GitHub expects on every call.
pub(crate) fn github_request(client: &Client, method: Method, url: Url, bearer: &str) -> RequestBuilder {
	client
		.request(method, url)
		.bearer_auth(bearer)
		.header("Accept", "application/vnd.github+json")
		.header("X-GitHub-Api-Version", API_VERSION)
}

pub(crate) fn map_send_error(e: reqwest::Error) -> GithubAppError {
	if e.is_timeout() {
		warn!("GitHub request timed out");
		GithubAppError::Timeout
	} else {
		error!(error = %e, "Network error calling GitHub");
		GithubAppError::Network(e)
	}
}

/// Map a non-success GitHub status to an error.
pub(crate) fn map_github_error(status: StatusCode, body: &str) -> GithubAppError {
	let code = status.as_u16();
	match code {
		401 => {
			warn!(status = code, "Unauthorized request to GitHub");
			GithubAppError::Unauthorized
		}
		403 | 429 if code == 429 || body.to_lowercase().contains("rate limit") => {
			warn!(status = code, "GitHub rate limit exceeded");
			GithubAppError::RateLimited
		}
		403 => {
			warn!(status = code, "Forbidden request to GitHub");
			GithubAppError::Forbidden
		}
		_ => {
			error!(status = code, body = %body, "GitHub API error");
			GithubAppError::api_error(code, body)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn contents_path_escapes_segments_and_handles_root() {
		assert_eq!(contents_path("acme", "infra", ""), "repos/acme/infra/contents");
		assert_eq!(
			contents_path("acme", "infra", "envs/prod east/main.tf"),
			"repos/acme/infra/contents/envs/prod%20east/main.tf"
		);
		assert_eq!(
			contents_path("acme", "infra", "/modules/"),
			"repos/acme/infra/contents/modules"
		);
	}

	#[test]
	fn status_mapping() {
		assert!(matches!(
			map_github_error(StatusCode::UNAUTHORIZED, "Bad credentials"),
			GithubAppError::Unauthorized
		));
		assert!(matches!(
			map_github_error(StatusCode::FORBIDDEN, "API rate limit exceeded for installation"),
			GithubAppError::RateLimited
		));
		assert!(matches!(
			map_github_error(StatusCode::TOO_MANY_REQUESTS, ""),
			GithubAppError::RateLimited
		));
		assert!(matches!(
			map_github_error(StatusCode::FORBIDDEN, "Resource not accessible by integration"),
			GithubAppError::Forbidden
		));
		assert!(matches!(
			map_github_error(StatusCode::BAD_GATEWAY, "oops"),
			GithubAppError::ApiError { status: 502, .. }
		));
	}
}
