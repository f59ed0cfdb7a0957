// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! App-level assertion signed with the App's RSA key.

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::GithubAppError;

/// Backdate `iat` to tolerate clock drift between us and GitHub.
const CLOCK_SKEW: Duration = Duration::seconds(60);
/// GitHub rejects assertions living longer than ten minutes.
const ASSERTION_LIFETIME: Duration = Duration::seconds(9 * 60);

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Claims {
	pub iat: i64,
	pub exp: i64,
	pub iss: String,
}

/// Sign an RS256 JWT identifying the App.
///
/// Fails with [`GithubAppError::Jwt`] when the key is not a usable RSA PEM.
#[instrument(skip(private_key_pem))]
pub fn generate_app_jwt(app_id: u64, private_key_pem: &str) -> Result<String, GithubAppError> {
	let now = Utc::now();
	let claims = Claims {
		iat: (now - CLOCK_SKEW).timestamp(),
		exp: (now + ASSERTION_LIFETIME).timestamp(),
		iss: app_id.to_string(),
	};

	let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
		.map_err(|e| GithubAppError::Jwt(format!("Invalid RSA private key: {e}")))?;

	let token = encode(&Header::new(Algorithm::RS256), &claims, &key)
		.map_err(|e| GithubAppError::Jwt(format!("Failed to encode JWT: {e}")))?;

	debug!(app_id, exp = claims.exp, "Signed GitHub App assertion");
	Ok(token)
}
