// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Installation token issuance with single-flight per installation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::{Client, Method};
use sentinel_common_config::SecretString;
use sentinel_common_http::retry;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, trace};

use crate::client::{github_request, map_github_error, map_send_error, GithubApi, InstallationClient};
use crate::config::GithubAppConfig;
use crate::error::GithubAppError;
use crate::jwt::generate_app_jwt;
use crate::token_cache::CredentialCache;
use crate::types::AccessTokenResponse;

/// A freshly minted installation access token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
	pub token: SecretString,
	pub expires_at: DateTime<Utc>,
}

/// Exchanges the App identity for an installation access token.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
	async fn issue(&self, installation_id: i64) -> Result<IssuedToken, GithubAppError>;
}

/// Signs an App JWT and calls `POST /app/installations/{id}/access_tokens`.
pub struct HttpTokenIssuer {
	config: GithubAppConfig,
	http_client: Client,
}

impl HttpTokenIssuer {
	pub fn new(config: GithubAppConfig, http_client: Client) -> Self {
		Self {
			config,
			http_client,
		}
	}

	async fn exchange(&self, jwt: &str, installation_id: i64) -> Result<IssuedToken, GithubAppError> {
		let url = self
			.config
			.endpoint(&format!("app/installations/{installation_id}/access_tokens"))?;

		let response = github_request(&self.http_client, Method::POST, url, jwt)
			.send()
			.await
			.map_err(map_send_error)?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(map_github_error(status, &body));
		}

		let body: AccessTokenResponse = response.json().await.map_err(|e| {
			error!(error = %e, "Failed to parse access token response");
			GithubAppError::InvalidResponse(format!("JSON parse error: {e}"))
		})?;

		Ok(IssuedToken {
			token: SecretString::new(body.token),
			expires_at: parse_expires_at(&body.expires_at)?,
		})
	}
}

#[async_trait]
impl TokenIssuer for HttpTokenIssuer {
	#[instrument(skip(self))]
	async fn issue(&self, installation_id: i64) -> Result<IssuedToken, GithubAppError> {
		let jwt = generate_app_jwt(self.config.app_id(), self.config.private_key_pem())?;
		retry(&self.config.retry_config, || self.exchange(&jwt, installation_id)).await
	}
}

pub(crate) fn parse_expires_at(raw: &str) -> Result<DateTime<Utc>, GithubAppError> {
	DateTime::parse_from_rfc3339(raw)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| GithubAppError::InvalidResponse(format!("Invalid expires_at: {raw} - {e}")))
}

/// Anything that can hand out an API client for an installation.
///
/// Follow-up work depends on this rather than on [`AppAuthenticator`] so it
/// can be exercised without GitHub.
#[async_trait]
pub trait ClientProvider: Send + Sync {
	async fn client_for(&self, installation_id: i64) -> Result<Arc<dyn GithubApi>, GithubAppError>;
}

/// Acts as the GitHub App: serves cached installation tokens and mints new
/// ones on a miss.
///
/// At most one exchange per installation is in flight. Callers that miss the
/// cache while an exchange is running await that exchange and all receive its
/// result, success or failure. The entry is removed once the exchange
/// settles, so a failure is never cached and the next miss starts afresh.
#[derive(Clone)]
pub struct AppAuthenticator {
	config: GithubAppConfig,
	http_client: Client,
	cache: Arc<CredentialCache>,
	issuer: Arc<dyn TokenIssuer>,
	in_flight: Arc<Mutex<HashMap<i64, InFlightExchange>>>,
}

type InFlightExchange = Shared<BoxFuture<'static, Result<IssuedToken, Arc<GithubAppError>>>>;

impl AppAuthenticator {
	pub fn new(config: GithubAppConfig) -> Result<Self, GithubAppError> {
		let http_client = sentinel_common_http::builder()
			.timeout(config.request_timeout())
			.build()
			.map_err(|e| GithubAppError::Config(format!("Failed to create HTTP client: {e}")))?;

		info!(
			app_id = config.app_id(),
			base_url = %config.base_url(),
			"Created GitHub App authenticator"
		);

		let issuer = Arc::new(HttpTokenIssuer::new(config.clone(), http_client.clone()));
		Ok(Self {
			config,
			http_client,
			cache: Arc::new(CredentialCache::new()),
			issuer,
			in_flight: Arc::new(Mutex::new(HashMap::new())),
		})
	}

	/// Share an existing cache.
	pub fn with_cache(mut self, cache: Arc<CredentialCache>) -> Self {
		self.cache = cache;
		self
	}

	/// Replace how tokens are minted.
	pub fn with_issuer(mut self, issuer: Arc<dyn TokenIssuer>) -> Self {
		self.issuer = issuer;
		self
	}

	pub fn config(&self) -> &GithubAppConfig {
		&self.config
	}

	pub fn cache(&self) -> &Arc<CredentialCache> {
		&self.cache
	}

	pub(crate) fn http_client(&self) -> &Client {
		&self.http_client
	}

	pub fn installation_url(&self) -> String {
		self.config.installation_url()
	}

	/// The exchange runs the issuer, stores a success in the cache and then
	/// removes itself from `in_flight`, all before any waiter sees the result.
	fn start_exchange(&self, installation_id: i64) -> InFlightExchange {
		let issuer = Arc::clone(&self.issuer);
		let cache = Arc::clone(&self.cache);
		let in_flight = Arc::clone(&self.in_flight);

		async move {
			debug!(installation_id, "Minting installation token");
			let result = issuer.issue(installation_id).await;
			match &result {
				Ok(issued) => {
					cache
						.set(installation_id, issued.token.clone(), issued.expires_at)
						.await;
					info!(installation_id, expires_at = %issued.expires_at, "Installation token refreshed");
				}
				Err(e) => {
					error!(installation_id, error = %e, "Installation token exchange failed");
				}
			}
			in_flight.lock().await.remove(&installation_id);
			result.map_err(Arc::new)
		}
		.boxed()
		.shared()
	}

	#[cfg(test)]
	pub(crate) async fn in_flight_len(&self) -> usize {
		self.in_flight.lock().await.len()
	}

	/// A token with more than the safety margin left, minting one if needed.
	///
	/// Failures come back as [`GithubAppError::TokenExchange`].
	#[instrument(skip(self))]
	pub async fn installation_token(&self, installation_id: i64) -> Result<SecretString, GithubAppError> {
		if let Some(token) = self.cache.get(installation_id).await {
			return Ok(token);
		}

		let exchange = {
			let mut in_flight = self.in_flight.lock().await;
			// An exchange may have landed between the miss and taking the lock.
			if let Some(token) = self.cache.get(installation_id).await {
				trace!(installation_id, "Token minted by a concurrent caller");
				return Ok(token);
			}
			in_flight
				.entry(installation_id)
				.or_insert_with(|| self.start_exchange(installation_id))
				.clone()
		};

		let issued = exchange
			.await
			.map_err(|source| GithubAppError::TokenExchange {
				installation_id,
				source,
			})?;
		Ok(issued.token)
	}

	/// Forget the cached token, e.g. after GitHub answered 401.
	pub async fn invalidate(&self, installation_id: i64) {
		self.cache.invalidate(installation_id).await;
	}

	/// An API client for the installation. Ensures a token can be obtained
	/// so credential problems surface here rather than on first use.
	pub async fn client(&self, installation_id: i64) -> Result<InstallationClient, GithubAppError> {
		self.installation_token(installation_id).await?;
		Ok(InstallationClient::new(self.clone(), installation_id))
	}
}

#[async_trait]
impl ClientProvider for AppAuthenticator {
	async fn client_for(&self, installation_id: i64) -> Result<Arc<dyn GithubApi>, GithubAppError> {
		Ok(Arc::new(self.client(installation_id).await?))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Duration;
	use std::sync::atomic::{AtomicUsize, Ordering};

	/// Counts exchanges; fails the first `failures` of them.
	struct FakeIssuer {
		calls: AtomicUsize,
		failures: usize,
		lifetime: Duration,
		timeouts: bool,
	}

	impl FakeIssuer {
		fn new(failures: usize, lifetime: Duration) -> Arc<Self> {
			Arc::new(Self {
				calls: AtomicUsize::new(0),
				failures,
				lifetime,
				timeouts: false,
			})
		}

		/// Always fails with a transient error.
		fn timing_out() -> Arc<Self> {
			Arc::new(Self {
				calls: AtomicUsize::new(0),
				failures: usize::MAX,
				lifetime: Duration::hours(1),
				timeouts: true,
			})
		}

		fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}

	#[async_trait]
	impl TokenIssuer for FakeIssuer {
		async fn issue(&self, installation_id: i64) -> Result<IssuedToken, GithubAppError> {
			let n = self.calls.fetch_add(1, Ordering::SeqCst);
			tokio::time::sleep(std::time::Duration::from_millis(20)).await;
			if n < self.failures {
				return Err(if self.timeouts {
					GithubAppError::Timeout
				} else {
					GithubAppError::Unauthorized
				});
			}
			Ok(IssuedToken {
				token: SecretString::new(format!("ghs_{installation_id}_{n}")),
				expires_at: Utc::now() + self.lifetime,
			})
		}
	}

	fn authenticator(issuer: Arc<FakeIssuer>) -> AppAuthenticator {
		let config = GithubAppConfig::new(1, "unused-pem").unwrap();
		AppAuthenticator::new(config).unwrap().with_issuer(issuer)
	}

	#[tokio::test]
	async fn concurrent_misses_share_one_exchange() {
		let issuer = FakeIssuer::new(0, Duration::hours(1));
		let auth = authenticator(Arc::clone(&issuer));

		let tasks: Vec<_> = (0..16)
			.map(|_| {
				let auth = auth.clone();
				tokio::spawn(async move { auth.installation_token(77).await })
			})
			.collect();

		for task in tasks {
			let token = task.await.unwrap().unwrap();
			assert_eq!(token.expose(), "ghs_77_0");
		}
		assert_eq!(issuer.calls(), 1);
	}

	#[tokio::test]
	async fn concurrent_misses_share_one_failure() {
		let issuer = FakeIssuer::new(usize::MAX, Duration::hours(1));
		let auth = authenticator(Arc::clone(&issuer));

		let tasks: Vec<_> = (0..16)
			.map(|_| {
				let auth = auth.clone();
				tokio::spawn(async move { auth.installation_token(77).await })
			})
			.collect();

		for task in tasks {
			let err = task.await.unwrap().unwrap_err();
			assert!(matches!(
				err,
				GithubAppError::TokenExchange {
					installation_id: 77,
					..
				}
			));
			assert!(err.is_auth_failure());
		}
		assert_eq!(issuer.calls(), 1);
		assert!(auth.cache().get(77).await.is_none());
		assert_eq!(auth.in_flight_len().await, 0);
	}

	#[tokio::test]
	async fn different_installations_exchange_independently() {
		let issuer = FakeIssuer::new(0, Duration::hours(1));
		let auth = authenticator(Arc::clone(&issuer));

		let (a, b) = tokio::join!(auth.installation_token(1), auth.installation_token(2));
		assert!(a.unwrap().expose().starts_with("ghs_1_"));
		assert!(b.unwrap().expose().starts_with("ghs_2_"));
		assert_eq!(issuer.calls(), 2);
	}

	#[tokio::test]
	async fn failure_is_wrapped_and_not_cached() {
		let issuer = FakeIssuer::new(1, Duration::hours(1));
		let auth = authenticator(Arc::clone(&issuer));

		let err = auth.installation_token(5).await.unwrap_err();
		assert!(matches!(
			err,
			GithubAppError::TokenExchange {
				installation_id: 5,
				..
			}
		));
		assert!(auth.cache().get(5).await.is_none());

		let token = auth.installation_token(5).await.unwrap();
		assert_eq!(token.expose(), "ghs_5_1");
		assert_eq!(issuer.calls(), 2);
	}

	#[tokio::test]
	async fn short_lived_token_is_reminted() {
		// Four minutes is inside the five minute margin, so every call mints.
		let issuer = FakeIssuer::new(0, Duration::minutes(4));
		let auth = authenticator(Arc::clone(&issuer));

		auth.installation_token(3).await.unwrap();
		auth.installation_token(3).await.unwrap();
		assert_eq!(issuer.calls(), 2);
	}

	#[tokio::test]
	async fn invalidate_forces_a_new_exchange() {
		let issuer = FakeIssuer::new(0, Duration::hours(1));
		let auth = authenticator(Arc::clone(&issuer));

		assert_eq!(auth.installation_token(3).await.unwrap().expose(), "ghs_3_0");
		auth.invalidate(3).await;
		assert_eq!(auth.installation_token(3).await.unwrap().expose(), "ghs_3_1");
	}

	#[tokio::test]
	async fn client_surfaces_auth_errors() {
		let issuer = FakeIssuer::new(usize::MAX, Duration::hours(1));
		let auth = authenticator(issuer);
		let err = auth.client_for(9).await.err().unwrap();
		assert!(err.is_auth_failure());
	}

	#[tokio::test]
	async fn api_requests_do_not_retry_a_failed_exchange() {
		let issuer = FakeIssuer::timing_out();
		let auth = authenticator(Arc::clone(&issuer));
		let client = InstallationClient::new(auth, 5);

		let err = client.get_contents("acme", "infra", "main.tf").await.unwrap_err();
		assert!(matches!(
			err,
			GithubAppError::TokenExchange {
				installation_id: 5,
				..
			}
		));
		assert_eq!(issuer.calls(), 1);
	}

	#[tokio::test]
	async fn bad_private_key_fails_before_any_network_call() {
		let config = GithubAppConfig::new(1, "not a pem").unwrap();
		let auth = AppAuthenticator::new(config).unwrap();

		let err = auth.installation_token(1).await.unwrap_err();
		let GithubAppError::TokenExchange { source, .. } = err else {
			panic!("expected a token exchange error");
		};
		assert!(matches!(*source, GithubAppError::Jwt(_)));
	}

	#[test]
	fn expires_at_accepts_github_timestamps() {
		let parsed = parse_expires_at("2016-07-11T22:14:10Z").unwrap();
		assert_eq!(parsed.timestamp(), 1_468_275_250);
		assert!(parse_expires_at("tomorrow").is_err());
	}
}
