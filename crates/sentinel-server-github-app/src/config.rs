// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! GitHub App identity and endpoint settings.

use std::fmt;
use std::time::Duration;

use reqwest::Url;
use sentinel_common_config::SecretString;
use sentinel_common_http::RetryConfig;

use crate::error::GithubAppError;

pub const DEFAULT_BASE_URL: &str = "https://api.github.com";
pub const DEFAULT_APP_SLUG: &str = "sentinel";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything needed to act as the GitHub App.
///
/// The private key is a [`SecretString`] and prints as `[REDACTED]`.
#[derive(Clone)]
pub struct GithubAppConfig {
	app_id: u64,
	private_key_pem: SecretString,
	app_slug: String,
	base_url: Url,
	request_timeout: Duration,
	pub retry_config: RetryConfig,
}

impl fmt::Debug for GithubAppConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("GithubAppConfig")
			.field("app_id", &self.app_id)
			.field("private_key_pem", &self.private_key_pem)
			.field("app_slug", &self.app_slug)
			.field("base_url", &self.base_url.as_str())
			.field("request_timeout", &self.request_timeout)
			.finish()
	}
}

impl GithubAppConfig {
	/// App credentials against public GitHub.
	///
	/// Fails if the private key is empty; whether it parses as RSA is only
	/// known once the first JWT is signed.
	pub fn new(app_id: u64, private_key_pem: impl Into<SecretString>) -> Result<Self, GithubAppError> {
		let private_key_pem = private_key_pem.into();
		if private_key_pem.is_empty() {
			return Err(GithubAppError::Config(
				"GitHub App private key is empty".to_string(),
			));
		}

		Ok(Self {
			app_id,
			private_key_pem,
			app_slug: DEFAULT_APP_SLUG.to_string(),
			base_url: parse_base_url(DEFAULT_BASE_URL)?,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			retry_config: RetryConfig::default(),
		})
	}

	/// Point at GitHub Enterprise. Must be HTTPS and not a loopback host.
	pub fn with_base_url(mut self, raw: &str) -> Result<Self, GithubAppError> {
		self.base_url = parse_base_url(raw)?;
		Ok(self)
	}

	pub fn with_app_slug(mut self, slug: impl Into<String>) -> Self {
		self.app_slug = slug.into();
		self
	}

	pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;
		self
	}

	pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
		self.retry_config = config;
		self
	}

	pub fn app_id(&self) -> u64 {
		self.app_id
	}

	pub(crate) fn private_key_pem(&self) -> &str {
		self.private_key_pem.expose()
	}

	pub fn app_slug(&self) -> &str {
		&self.app_slug
	}

	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	pub fn request_timeout(&self) -> Duration {
		self.request_timeout
	}

	/// Join an API path onto the base URL.
	pub(crate) fn endpoint(&self, path: &str) -> Result<Url, GithubAppError> {
		self
			.base_url
			.join(path)
			.map_err(|e| GithubAppError::Config(format!("Invalid URL for {path}: {e}")))
	}

	/// Where users go to install the App.
	pub fn installation_url(&self) -> String {
		if self.base_url.as_str().starts_with(DEFAULT_BASE_URL) {
			format!("https://github.com/apps/{}/installations/new", self.app_slug)
		} else {
			let base = self
				.base_url
				.as_str()
				.trim_end_matches('/')
				.trim_end_matches("/api/v3");
			format!("{base}/apps/{}/installations/new", self.app_slug)
		}
	}
}

/// Parse a base URL, forcing a trailing slash so relative joins append.
fn parse_base_url(raw: &str) -> Result<Url, GithubAppError> {
	let normalized = if raw.ends_with('/') {
		raw.to_string()
	} else {
		format!("{raw}/")
	};
	let url = Url::parse(&normalized)
		.map_err(|e| GithubAppError::Config(format!("Invalid GitHub base URL '{raw}': {e}")))?;

	if url.scheme() != "https" {
		return Err(GithubAppError::Config(format!(
			"GitHub base URL must use https, got '{}'",
			url.scheme()
		)));
	}

	match url.host_str() {
		None => Err(GithubAppError::Config(
			"GitHub base URL must include a host".to_string(),
		)),
		Some("localhost" | "127.0.0.1" | "[::1]") => Err(GithubAppError::Config(
			"GitHub base URL must not be localhost".to_string(),
		)),
		Some(_) => Ok(url),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_target_public_github() {
		let config = GithubAppConfig::new(42, "pem").unwrap();
		assert_eq!(config.app_id(), 42);
		assert_eq!(config.base_url().as_str(), "https://api.github.com/");
		assert_eq!(config.app_slug(), "sentinel");
		assert_eq!(config.request_timeout(), Duration::from_secs(30));
	}

	#[test]
	fn empty_key_is_rejected() {
		assert!(matches!(
			GithubAppConfig::new(42, ""),
			Err(GithubAppError::Config(_))
		));
	}

	#[test]
	fn enterprise_base_url_keeps_path_for_joins() {
		let config = GithubAppConfig::new(42, "pem")
			.unwrap()
			.with_base_url("https://github.example.com/api/v3")
			.unwrap();
		let url = config.endpoint("app/installations/1/access_tokens").unwrap();
		assert_eq!(
			url.as_str(),
			"https://github.example.com/api/v3/app/installations/1/access_tokens"
		);
	}

	#[test]
	fn insecure_or_loopback_base_urls_are_rejected() {
		for raw in ["http://api.github.com", "https://localhost:8443", "https://127.0.0.1", "nope"] {
			let result = GithubAppConfig::new(42, "pem").unwrap().with_base_url(raw);
			assert!(result.is_err(), "{raw} should be rejected");
		}
	}

	#[test]
	fn installation_url_for_public_and_enterprise() {
		let public = GithubAppConfig::new(1, "pem").unwrap();
		assert_eq!(
			public.installation_url(),
			"https://github.com/apps/sentinel/installations/new"
		);

		let enterprise = GithubAppConfig::new(1, "pem")
			.unwrap()
			.with_base_url("https://github.example.com/api/v3")
			.unwrap()
			.with_app_slug("infra-scanner");
		assert_eq!(
			enterprise.installation_url(),
			"https://github.example.com/apps/infra-scanner/installations/new"
		);
	}

	#[test]
	fn debug_redacts_credentials() {
		let config = GithubAppConfig::new(1, "very-private-key").unwrap();
		let out = format!("{config:?}");
		assert!(!out.contains("very-private-key"));
		assert!(out.contains("[REDACTED]"));
	}
}
