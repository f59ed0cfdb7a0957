// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HMAC-SHA256 primitives for webhook payload authentication.
//!
//! Signatures are lowercase hex without any scheme prefix; callers that speak
//! a particular header format (`sha256=...`) strip or add it themselves.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn keyed(secret: &[u8]) -> Option<HmacSha256> {
	// HMAC accepts keys of any length; the error arm is unreachable for Sha256.
	HmacSha256::new_from_slice(secret).ok()
}

/// Hex-encoded HMAC-SHA256 of `payload` under `secret`.
pub fn compute_hmac_sha256(secret: &[u8], payload: &[u8]) -> String {
	match keyed(secret) {
		Some(mut mac) => {
			mac.update(payload);
			hex::encode(mac.finalize().into_bytes())
		}
		None => String::new(),
	}
}

/// Check a hex signature against `payload` in constant time.
///
/// Malformed hex and wrong-length digests are rejected rather than erroring.
pub fn verify_hmac_sha256(secret: &[u8], payload: &[u8], signature_hex: &str) -> bool {
	let Ok(expected) = hex::decode(signature_hex) else {
		return false;
	};
	let Some(mut mac) = keyed(secret) else {
		return false;
	};
	mac.update(payload);
	mac.verify_slice(&expected).is_ok()
}


#[cfg(test)]
mod proptests {
	use super::*;
	use proptest::prelude::*;

	proptest! {
		#[test]
		fn signing_then_verifying_succeeds(
			secret in proptest::collection::vec(any::<u8>(), 1..64),
			payload in proptest::collection::vec(any::<u8>(), 0..512)
		) {
			let sig = compute_hmac_sha256(&secret, &payload);
			prop_assert_eq!(sig.len(), 64);
			prop_assert!(verify_hmac_sha256(&secret, &payload, &sig));
		}

		#[test]
		fn flipping_a_byte_breaks_verification(
			payload in proptest::collection::vec(any::<u8>(), 1..512),
			index in any::<prop::sample::Index>()
		) {
			let sig = compute_hmac_sha256(b"secret", &payload);
			let mut tampered = payload.clone();
			let i = index.index(tampered.len());
			tampered[i] ^= 0x01;
			prop_assert!(!verify_hmac_sha256(b"secret", &tampered, &sig));
		}
	}
}
