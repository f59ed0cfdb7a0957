// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Process-local cache of installation access tokens.
//!
//! Entries are keyed by the GitHub installation id, the same key the
//! persisted installation records use. A token is only handed out while it
//! has more than the safety margin (five minutes by default) left to live, so
//! a caller never starts a slow API call with a token about to lapse.
//!
//! Reads take a shared lock, writes replace the whole entry under an
//! exclusive lock; no reader sees a token paired with another token's expiry.
//! The lock is never held across network I/O.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use sentinel_common_config::SecretString;
use tokio::sync::RwLock;
use tracing::{debug, trace};

pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::minutes(5);

#[derive(Clone)]
struct CachedToken {
	token: SecretString,
	expires_at: DateTime<Utc>,
}

impl CachedToken {
	fn usable_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
		now < self.expires_at - margin
	}
}

/// Installation tokens with proactive expiry.
///
/// Construct one per process and share it behind an `Arc`; tests build as many
/// isolated instances as they like.
pub struct CredentialCache {
	entries: RwLock<HashMap<i64, CachedToken>>,
	margin: Duration,
}

impl Default for CredentialCache {
	fn default() -> Self {
		Self::new()
	}
}

impl CredentialCache {
	pub fn new() -> Self {
		Self::with_margin(DEFAULT_SAFETY_MARGIN)
	}

	pub fn with_margin(margin: Duration) -> Self {
		Self {
			entries: RwLock::new(HashMap::new()),
			margin,
		}
	}

	pub fn margin(&self) -> Duration {
		self.margin
	}

	/// The cached token, or `None` if absent or inside the safety margin.
	///
	/// A miss is not an error; it tells the caller to mint a new token.
	pub async fn get(&self, installation_id: i64) -> Option<SecretString> {
		self.lookup(installation_id, Utc::now()).await
	}

	async fn lookup(&self, installation_id: i64, now: DateTime<Utc>) -> Option<SecretString> {
		let entries = self.entries.read().await;
		match entries.get(&installation_id) {
			Some(cached) if cached.usable_at(now, self.margin) => {
				trace!(installation_id, "Installation token cache hit");
				Some(cached.token.clone())
			}
			Some(_) => {
				trace!(installation_id, "Installation token inside refresh margin");
				None
			}
			None => None,
		}
	}

	/// Store a token, replacing any previous entry for the installation.
	pub async fn set(&self, installation_id: i64, token: SecretString, expires_at: DateTime<Utc>) {
		let mut entries = self.entries.write().await;
		entries.insert(installation_id, CachedToken { token, expires_at });
		debug!(installation_id, %expires_at, "Cached installation token");
	}

	/// Drop the entry; returns whether one existed.
	pub async fn invalidate(&self, installation_id: i64) -> bool {
		let removed = self.entries.write().await.remove(&installation_id).is_some();
		if removed {
			debug!(installation_id, "Invalidated installation token");
		}
		removed
	}

	/// Number of entries, including ones inside the margin.
	pub async fn len(&self) -> usize {
		self.entries.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.entries.read().await.is_empty()
	}
}
