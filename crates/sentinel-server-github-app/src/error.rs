// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the GitHub App integration.

use std::sync::Arc;

use sentinel_common_http::RetryableError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GithubAppError {
	#[error("Network error: {0}")]
	Network(#[from] reqwest::Error),

	#[error("Request timed out")]
	Timeout,

	#[error("Unauthorized or invalid app configuration")]
	Unauthorized,

	#[error("Forbidden or insufficient permissions")]
	Forbidden,

	#[error("Rate limit exceeded")]
	RateLimited,

	#[error("GitHub API error: {status} - {message}")]
	ApiError { status: u16, message: String },

	#[error("Invalid response from GitHub: {0}")]
	InvalidResponse(String),

	#[error("Configuration error: {0}")]
	Config(String),

	/// The App assertion could not be built (bad or missing private key).
	#[error("JWT error: {0}")]
	Jwt(String),

	#[error("Not found: {path}")]
	NotFound { path: String },

	/// Minting an installation access token failed. Never cached. Shared by
	/// every caller that waited on the same exchange.
	#[error("Token exchange failed for installation {installation_id}: {source}")]
	TokenExchange {
		installation_id: i64,
		#[source]
		source: Arc<GithubAppError>,
	},

	#[error("Invalid webhook signature")]
	InvalidWebhookSignature,
}

impl RetryableError for GithubAppError {
	fn is_retryable(&self) -> bool {
		match self {
			GithubAppError::Network(e) => e.is_retryable(),
			GithubAppError::Timeout | GithubAppError::RateLimited => true,
			GithubAppError::ApiError { status, .. } => *status >= 500,
			// The exchange has already run its own retries.
			GithubAppError::TokenExchange { .. } => false,
			_ => false,
		}
	}
}

impl GithubAppError {
	pub fn api_error(status: u16, message: impl Into<String>) -> Self {
		Self::ApiError {
			status,
			message: message.into(),
		}
	}

	pub fn not_found(path: impl Into<String>) -> Self {
		Self::NotFound { path: path.into() }
	}

	#[cfg(test)]
	pub(crate) fn token_exchange(installation_id: i64, source: GithubAppError) -> Self {
		Self::TokenExchange {
			installation_id,
			source: Arc::new(source),
		}
	}

	/// True for failures caused by credentials rather than transport.
	pub fn is_auth_failure(&self) -> bool {
		match self {
			GithubAppError::Unauthorized | GithubAppError::Jwt(_) | GithubAppError::Forbidden => true,
			GithubAppError::TokenExchange { source, .. } => source.is_auth_failure(),
			_ => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn transient_failures_are_retryable() {
		assert!(GithubAppError::Timeout.is_retryable());
		assert!(GithubAppError::RateLimited.is_retryable());
		assert!(GithubAppError::api_error(502, "Bad Gateway").is_retryable());
	}

	#[test]
	fn client_failures_are_not_retryable() {
		assert!(!GithubAppError::api_error(422, "Unprocessable").is_retryable());
		assert!(!GithubAppError::not_found("a/b.tf").is_retryable());
		assert!(!GithubAppError::Jwt("bad key".into()).is_retryable());
		assert!(!GithubAppError::InvalidWebhookSignature.is_retryable());
	}

	#[test]
	fn token_exchange_is_never_retried_again() {
		let transient = GithubAppError::token_exchange(7, GithubAppError::Timeout);
		assert!(!transient.is_retryable());
		assert!(!transient.is_auth_failure());

		let revoked = GithubAppError::token_exchange(7, GithubAppError::Unauthorized);
		assert!(!revoked.is_retryable());
		assert!(revoked.is_auth_failure());
		assert_eq!(
			revoked.to_string(),
			"Token exchange failed for installation 7: Unauthorized or invalid app configuration"
		);
	}
}
