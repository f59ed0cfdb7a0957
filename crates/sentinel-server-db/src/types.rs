// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Account that owns one or more installations, keyed by login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrganizationRecord {
	pub id: Uuid,
	pub name: String,
	pub owner_id: Option<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl OrganizationRecord {
	pub fn new(name: impl Into<String>) -> Self {
		let now = Utc::now();
		Self {
			id: Uuid::new_v4(),
			name: name.into(),
			owner_id: None,
			created_at: now,
			updated_at: now,
		}
	}
}

/// A GitHub App installation. `installation_id` is GitHub's id and is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct InstallationRecord {
	pub id: Uuid,
	pub organization_id: Uuid,
	pub installation_id: i64,
	pub account_id: i64,
	pub account_type: String,
	pub account_login: String,
	pub repository_selection: String,
	pub access_tokens_url: String,
	pub repositories_url: String,
	pub html_url: String,
	pub app_id: i64,
	pub target_id: i64,
	pub target_type: String,
	pub permissions: BTreeMap<String, String>,
	pub events: Vec<String>,
	pub suspended_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl InstallationRecord {
	pub fn is_suspended(&self) -> bool {
		self.suspended_at.is_some()
	}
}

/// Repository granted to an installation. Unique per `(installation_id, repo_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RepositoryRecord {
	pub id: Uuid,
	pub installation_id: i64,
	pub repo_id: i64,
	pub name: String,
	pub full_name: String,
	pub private: bool,
	pub html_url: String,
	pub description: Option<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl RepositoryRecord {
	/// Splits `full_name` into `(owner, name)`.
	pub fn owner_and_name(&self) -> Option<(&str, &str)> {
		self.full_name.split_once('/')
	}
}
