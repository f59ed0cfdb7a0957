// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! GitHub App identity, webhook secret and outbound request policy.

use std::time::Duration;

use sentinel_common_config::SecretString;
use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const DEFAULT_APP_SLUG: &str = "sentinel";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// App ID and signing key. Present only when both are configured.
#[derive(Debug, Clone)]
pub struct GitHubAppCredentials {
	pub app_id: u64,
	pub private_key_pem: SecretString,
}

#[derive(Debug, Clone)]
pub struct GitHubAppConfig {
	pub credentials: Option<GitHubAppCredentials>,
	/// Webhooks are rejected with 401 while this is unset.
	pub webhook_secret: Option<SecretString>,
	pub app_slug: String,
	pub base_url: String,
	/// Per-request timeout for calls to the GitHub API.
	pub request_timeout: Duration,
	/// Attempts per GitHub call, including the first.
	pub max_attempts: u32,
}

impl Default for GitHubAppConfig {
	fn default() -> Self {
		Self {
			credentials: None,
			webhook_secret: None,
			app_slug: DEFAULT_APP_SLUG.to_string(),
			base_url: DEFAULT_BASE_URL.to_string(),
			request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
			max_attempts: DEFAULT_MAX_ATTEMPTS,
		}
	}
}

impl GitHubAppConfig {
	/// True when installation tokens can be minted.
	pub fn is_configured(&self) -> bool {
		self.credentials.is_some()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitHubAppConfigLayer {
	#[serde(default)]
	pub app_id: Option<u64>,
	#[serde(default)]
	pub private_key_pem: Option<SecretString>,
	#[serde(default)]
	pub webhook_secret: Option<SecretString>,
	#[serde(default)]
	pub app_slug: Option<String>,
	#[serde(default)]
	pub base_url: Option<String>,
	#[serde(default)]
	pub request_timeout_secs: Option<u64>,
	#[serde(default)]
	pub max_attempts: Option<u32>,
}

impl GitHubAppConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.app_id.is_some() {
			self.app_id = other.app_id;
		}
		if other.private_key_pem.is_some() {
			self.private_key_pem = other.private_key_pem;
		}
		if other.webhook_secret.is_some() {
			self.webhook_secret = other.webhook_secret;
		}
		if other.app_slug.is_some() {
			self.app_slug = other.app_slug;
		}
		if other.base_url.is_some() {
			self.base_url = other.base_url;
		}
		if other.request_timeout_secs.is_some() {
			self.request_timeout_secs = other.request_timeout_secs;
		}
		if other.max_attempts.is_some() {
			self.max_attempts = other.max_attempts;
		}
	}

	pub fn finalize(self) -> Result<GitHubAppConfig, ConfigError> {
		let private_key_pem = self.private_key_pem.filter(|key| !key.is_empty());
		let credentials = match (self.app_id, private_key_pem) {
			(Some(app_id), Some(private_key_pem)) => Some(GitHubAppCredentials {
				app_id,
				private_key_pem,
			}),
			(None, None) => None,
			(Some(_), None) => {
				return Err(ConfigError::Validation(
					"github_app.app_id is set but github_app.private_key_pem is missing".to_string(),
				))
			}
			(None, Some(_)) => {
				return Err(ConfigError::Validation(
					"github_app.private_key_pem is set but github_app.app_id is missing".to_string(),
				))
			}
		};

		let base_url = self
			.base_url
			.map(|url| url.trim_end_matches('/').to_string())
			.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
		if !base_url.starts_with("https://") {
			return Err(ConfigError::InvalidValue {
				key: "github_app.base_url".to_string(),
				message: format!("must use https, got '{base_url}'"),
			});
		}

		let request_timeout_secs = self
			.request_timeout_secs
			.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
		if request_timeout_secs == 0 {
			return Err(ConfigError::InvalidValue {
				key: "github_app.request_timeout_secs".to_string(),
				message: "must be at least 1".to_string(),
			});
		}

		Ok(GitHubAppConfig {
			credentials,
			webhook_secret: self.webhook_secret.filter(|secret| !secret.is_empty()),
			app_slug: self
				.app_slug
				.filter(|slug| !slug.is_empty())
				.unwrap_or_else(|| DEFAULT_APP_SLUG.to_string()),
			base_url,
			request_timeout: Duration::from_secs(request_timeout_secs),
			max_attempts: self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS).max(1),
		})
	}
}
