// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Typed GitHub App webhook payloads.
//!
//! Dispatch is on the `X-GitHub-Event` header. Only `installation` and
//! `installation_repositories` are modelled; every other event type becomes
//! [`WebhookEvent::Unrecognized`] without its body being parsed.

use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Clone)]
pub enum WebhookEvent {
	Installation(InstallationEvent),
	InstallationRepositories(InstallationRepositoriesEvent),
	Unrecognized { event_type: String },
}

impl WebhookEvent {
	pub fn parse(event_type: &str, body: &[u8]) -> Result<Self, serde_json::Error> {
		Ok(match event_type {
			"installation" => Self::Installation(serde_json::from_slice(body)?),
			"installation_repositories" => Self::InstallationRepositories(serde_json::from_slice(body)?),
			other => Self::Unrecognized {
				event_type: other.to_string(),
			},
		})
	}

	/// The installation the event concerns, if it is one we handle.
	pub fn installation_id(&self) -> Option<i64> {
		match self {
			Self::Installation(e) => Some(e.installation.id),
			Self::InstallationRepositories(e) => Some(e.installation.id),
			Self::Unrecognized { .. } => None,
		}
	}

	pub fn event_type(&self) -> &str {
		match self {
			Self::Installation(_) => "installation",
			Self::InstallationRepositories(_) => "installation_repositories",
			Self::Unrecognized { event_type } => event_type,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallationAction {
	Created,
	Deleted,
	Suspend,
	Unsuspend,
	NewPermissionsAccepted,
	#[serde(other)]
	Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallationEvent {
	pub action: InstallationAction,
	pub installation: InstallationPayload,
	/// Repositories granted at install time (`created` only).
	#[serde(default)]
	pub repositories: Vec<RepositoryPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallationAccount {
	pub id: i64,
	pub login: String,
	#[serde(default, rename = "type")]
	pub kind: Option<String>,
}

/// The `installation` object.
///
/// Account details arrive either as GitHub's nested `account` object or as
/// flattened `account_*` fields; the accessors prefer the nested form.
#[derive(Debug, Clone, Deserialize)]
pub struct InstallationPayload {
	pub id: i64,
	#[serde(default)]
	pub account: Option<InstallationAccount>,
	#[serde(default)]
	account_id: Option<i64>,
	#[serde(default)]
	account_type: Option<String>,
	#[serde(default)]
	account_login: Option<String>,
	#[serde(default)]
	pub repository_selection: Option<String>,
	#[serde(default)]
	pub access_tokens_url: Option<String>,
	#[serde(default)]
	pub repositories_url: Option<String>,
	#[serde(default)]
	pub html_url: Option<String>,
	#[serde(default)]
	pub app_id: Option<i64>,
	#[serde(default)]
	pub target_id: Option<i64>,
	#[serde(default)]
	pub target_type: Option<String>,
	#[serde(default)]
	pub permissions: BTreeMap<String, String>,
	#[serde(default)]
	pub events: Vec<String>,
}

impl InstallationPayload {
	pub fn account_login(&self) -> Option<&str> {
		self
			.account
			.as_ref()
			.map(|a| a.login.as_str())
			.or(self.account_login.as_deref())
			.filter(|login| !login.is_empty())
	}

	pub fn account_id(&self) -> Option<i64> {
		self.account.as_ref().map(|a| a.id).or(self.account_id)
	}

	pub fn account_type(&self) -> Option<&str> {
		self
			.account
			.as_ref()
			.and_then(|a| a.kind.as_deref())
			.or(self.account_type.as_deref())
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallationRef {
	pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepositoryPayload {
	pub id: i64,
	pub name: String,
	pub full_name: String,
	#[serde(default)]
	pub private: bool,
	#[serde(default)]
	pub html_url: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
}

impl RepositoryPayload {
	/// `(owner, name)` from `full_name`.
	pub fn owner_and_name(&self) -> Option<(&str, &str)> {
		self.full_name.split_once('/')
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallationRepositoriesEvent {
	#[serde(default)]
	pub action: Option<String>,
	pub installation: InstallationRef,
	#[serde(default)]
	pub repositories: Vec<RepositoryPayload>,
	#[serde(default)]
	pub repositories_added: Vec<RepositoryPayload>,
	#[serde(default)]
	pub repositories_removed: Vec<RepositoryPayload>,
}

impl InstallationRepositoriesEvent {
	/// Repositories to upsert, from both `repositories` and
	/// `repositories_added`.
	pub fn added(&self) -> Vec<&RepositoryPayload> {
		self
			.repositories
			.iter()
			.chain(&self.repositories_added)
			.collect()
	}

	pub fn removed(&self) -> &[RepositoryPayload] {
		&self.repositories_removed
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn flat_installation_payload() {
		let body = br#"{
			"action": "created",
			"installation": {
				"id": 101,
				"account_id": 9,
				"account_type": "Organization",
				"account_login": "acme",
				"repository_selection": "selected",
				"app_id": 55,
				"permissions": {"contents": "read", "pull_requests": "write"},
				"events": ["push", "pull_request"]
			}
		}"#;
		let WebhookEvent::Installation(event) = WebhookEvent::parse("installation", body).unwrap() else {
			panic!("expected installation event");
		};
		assert_eq!(event.action, InstallationAction::Created);
		assert_eq!(event.installation.id, 101);
		assert_eq!(event.installation.account_login(), Some("acme"));
		assert_eq!(event.installation.account_id(), Some(9));
		assert_eq!(event.installation.account_type(), Some("Organization"));
		assert_eq!(event.installation.permissions["contents"], "read");
		assert_eq!(event.installation.events, vec!["push", "pull_request"]);
	}

	#[test]
	fn nested_account_wins() {
		let body = br#"{
			"action": "deleted",
			"installation": {
				"id": 7,
				"account_login": "stale",
				"account": {"id": 3, "login": "octo-org", "type": "Organization"}
			}
		}"#;
		let WebhookEvent::Installation(event) = WebhookEvent::parse("installation", body).unwrap() else {
			panic!("expected installation event");
		};
		assert_eq!(event.action, InstallationAction::Deleted);
		assert_eq!(event.installation.account_login(), Some("octo-org"));
		assert_eq!(event.installation.account_id(), Some(3));
	}

	#[test]
	fn unknown_action_is_other() {
		let body = br#"{"action": "renamed", "installation": {"id": 1}}"#;
		let event = WebhookEvent::parse("installation", body).unwrap();
		let WebhookEvent::Installation(event) = event else {
			panic!("expected installation event");
		};
		assert_eq!(event.action, InstallationAction::Other);
		assert_eq!(event.installation.account_login(), None);
	}

	#[test]
	fn repositories_event_merges_added_lists() {
		let body = br#"{
			"action": "added",
			"installation": {"id": 12},
			"repositories": [{"id": 1, "name": "a", "full_name": "acme/a"}],
			"repositories_added": [{"id": 2, "name": "b", "full_name": "acme/b", "private": true, "description": null}],
			"repositories_removed": [{"id": 3, "name": "c", "full_name": "acme/c"}]
		}"#;
		let event = WebhookEvent::parse("installation_repositories", body).unwrap();
		assert_eq!(event.installation_id(), Some(12));
		let WebhookEvent::InstallationRepositories(event) = event else {
			panic!("expected installation_repositories event");
		};
		let added: Vec<i64> = event.added().iter().map(|r| r.id).collect();
		assert_eq!(added, vec![1, 2]);
		assert_eq!(event.removed()[0].owner_and_name(), Some(("acme", "c")));
	}

	#[test]
	fn unrecognized_event_body_is_never_parsed() {
		let event = WebhookEvent::parse("ping", b"not json at all").unwrap();
		assert!(matches!(event, WebhookEvent::Unrecognized { ref event_type } if event_type == "ping"));
		assert_eq!(event.installation_id(), None);
		assert_eq!(event.event_type(), "ping");
	}

	#[test]
	fn malformed_known_event_is_an_error() {
		assert!(WebhookEvent::parse("installation", b"{").is_err());
		assert!(WebhookEvent::parse("installation_repositories", br#"{"installation": {}}"#).is_err());
	}
}
