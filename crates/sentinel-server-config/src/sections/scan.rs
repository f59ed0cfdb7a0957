// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Follow-up repository scanning triggered by webhooks and trace requests.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_QUEUE_CAPACITY: usize = 256;
const DEFAULT_MAX_CONCURRENT: usize = 4;
const DEFAULT_JOB_TIMEOUT_SECS: u64 = 300;

fn default_extensions() -> Vec<String> {
	vec![".tf".to_string()]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
	pub enabled: bool,
	/// File suffixes collected from repositories, e.g. `.tf`.
	pub extensions: Vec<String>,
	/// Jobs beyond this many waiting are dropped.
	pub queue_capacity: usize,
	/// Scans running at once across all installations.
	pub max_concurrent: usize,
	pub job_timeout: Duration,
}

impl Default for ScanConfig {
	fn default() -> Self {
		ScanConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanConfigLayer {
	#[serde(default)]
	pub enabled: Option<bool>,
	#[serde(default)]
	pub extensions: Option<Vec<String>>,
	#[serde(default)]
	pub queue_capacity: Option<usize>,
	#[serde(default)]
	pub max_concurrent: Option<usize>,
	#[serde(default)]
	pub job_timeout_secs: Option<u64>,
}

impl ScanConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
		if other.extensions.is_some() {
			self.extensions = other.extensions;
		}
		if other.queue_capacity.is_some() {
			self.queue_capacity = other.queue_capacity;
		}
		if other.max_concurrent.is_some() {
			self.max_concurrent = other.max_concurrent;
		}
		if other.job_timeout_secs.is_some() {
			self.job_timeout_secs = other.job_timeout_secs;
		}
	}

	pub fn finalize(self) -> ScanConfig {
		ScanConfig {
			enabled: self.enabled.unwrap_or(true),
			extensions: self.extensions.unwrap_or_else(default_extensions),
			queue_capacity: self.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY).max(1),
			max_concurrent: self.max_concurrent.unwrap_or(DEFAULT_MAX_CONCURRENT).max(1),
			job_timeout: Duration::from_secs(
				self.job_timeout_secs.unwrap_or(DEFAULT_JOB_TIMEOUT_SECS),
			),
		}
	}
}
