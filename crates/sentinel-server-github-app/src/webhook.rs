// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authenticity check for inbound GitHub webhook deliveries.
//!
//! GitHub signs the exact request bytes with HMAC-SHA256 under the App's
//! webhook secret and sends `X-Hub-Signature-256: sha256=<hex>`. Verification
//! must run over the raw body before any JSON parsing.

use tracing::{debug, warn};

use crate::error::GithubAppError;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Returns `true` only when a secret is configured, the header is present and
/// well-formed, and the digest matches in constant time.
pub fn verify(raw_body: &[u8], signature_header: Option<&str>, secret: Option<&str>) -> bool {
	let Some(secret) = secret.filter(|s| !s.is_empty()) else {
		warn!("Webhook secret is not configured; rejecting delivery");
		return false;
	};
	let Some(header) = signature_header.filter(|h| !h.is_empty()) else {
		debug!("Webhook delivery carried no signature");
		return false;
	};
	verify_webhook_signature(secret, header, raw_body).is_ok()
}

/// Like [`verify`] with a known secret and header, returning a typed error.
pub fn verify_webhook_signature(
	secret: &str,
	signature_header: &str,
	body: &[u8],
) -> Result<(), GithubAppError> {
	let Some(expected_hex) = signature_header.strip_prefix(SIGNATURE_PREFIX) else {
		warn!("Webhook signature is missing the sha256= prefix");
		return Err(GithubAppError::InvalidWebhookSignature);
	};

	if sentinel_common_webhook::verify_hmac_sha256(secret.as_bytes(), body, expected_hex) {
		debug!("Webhook signature verified");
		Ok(())
	} else {
		warn!("Webhook signature mismatch");
		Err(GithubAppError::InvalidWebhookSignature)
	}
}

/// `sha256=<hex>` for `body`; what GitHub would send.
pub fn compute_webhook_signature(secret: &str, body: &[u8]) -> String {
	format!(
		"{SIGNATURE_PREFIX}{}",
		sentinel_common_webhook::compute_hmac_sha256(secret.as_bytes(), body)
	)
}
