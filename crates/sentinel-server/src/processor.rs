// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Applies verified GitHub App webhook events to the store.
//!
//! Events for the same installation are applied one at a time; GitHub may
//! redeliver or reorder them, and every handler tolerates replays.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use sentinel_server_db::{DbError, GithubStore, InstallationRecord, RepositoryRecord};
use sentinel_server_github_app::{
	InstallationAction, InstallationEvent, InstallationPayload, InstallationRepositoriesEvent,
	RepositoryPayload, WebhookEvent,
};

use crate::scan::{ScanJob, ScanService};

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
	#[error("invalid payload: {0}")]
	InvalidPayload(String),

	#[error("installation {0} not found")]
	InstallationNotFound(i64),

	#[error(transparent)]
	Store(#[from] DbError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
	Processed,
	Ignored,
}

impl Outcome {
	pub fn message(&self) -> &'static str {
		match self {
			Outcome::Processed => "Event processed successfully",
			Outcome::Ignored => "Event type not handled",
		}
	}
}

pub struct WebhookProcessor {
	store: Arc<dyn GithubStore>,
	/// Fallback when a payload omits `app_id`.
	app_id: Option<i64>,
	scans: Option<ScanService>,
	/// Only installations with an event in progress have an entry.
	installation_locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl WebhookProcessor {
	pub fn new(store: Arc<dyn GithubStore>) -> Self {
		Self {
			store,
			app_id: None,
			scans: None,
			installation_locks: Mutex::new(HashMap::new()),
		}
	}

	pub fn with_app_id(mut self, app_id: i64) -> Self {
		self.app_id = Some(app_id);
		self
	}

	pub fn with_scan_service(mut self, scans: ScanService) -> Self {
		self.scans = Some(scans);
		self
	}

	/// Parse and apply one delivery. `body` must already be verified.
	pub async fn process(&self, event_type: &str, body: &[u8]) -> Result<Outcome, WebhookError> {
		let event = WebhookEvent::parse(event_type, body)
			.map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;
		self.handle(event).await
	}

	#[instrument(skip(self, event), fields(event_type = %event.event_type(), installation_id = ?event.installation_id()))]
	pub async fn handle(&self, event: WebhookEvent) -> Result<Outcome, WebhookError> {
		let Some(installation_id) = event.installation_id() else {
			debug!("ignoring unhandled event type");
			return Ok(Outcome::Ignored);
		};

		let lock = self.installation_lock(installation_id).await;
		let result = {
			let _guard = lock.lock().await;
			match event {
				WebhookEvent::Installation(e) => self.handle_installation(e).await,
				WebhookEvent::InstallationRepositories(e) => {
					self.handle_installation_repositories(e).await
				}
				WebhookEvent::Unrecognized { .. } => Ok(Outcome::Ignored),
			}
		};
		self.release_lock(installation_id, lock).await;
		result
	}

	async fn installation_lock(&self, installation_id: i64) -> Arc<Mutex<()>> {
		let mut locks = self.installation_locks.lock().await;
		Arc::clone(locks.entry(installation_id).or_default())
	}

	/// Drop the entry once no other event holds or waits on it.
	async fn release_lock(&self, installation_id: i64, lock: Arc<Mutex<()>>) {
		drop(lock);
		let mut locks = self.installation_locks.lock().await;
		if locks
			.get(&installation_id)
			.is_some_and(|l| Arc::strong_count(l) == 1)
		{
			locks.remove(&installation_id);
		}
	}

	#[cfg(test)]
	async fn held_locks(&self) -> usize {
		self.installation_locks.lock().await.len()
	}

	async fn handle_installation(&self, event: InstallationEvent) -> Result<Outcome, WebhookError> {
		let installation_id = event.installation.id;
		match event.action {
			InstallationAction::Created => self.installation_created(event).await,
			InstallationAction::Deleted => {
				let deleted = self.store.delete_installation(installation_id).await?;
				if !deleted {
					info!(installation_id, "installation already absent");
				}
				Ok(Outcome::Processed)
			}
			InstallationAction::Suspend => {
				self.set_suspended(installation_id, true).await?;
				Ok(Outcome::Processed)
			}
			InstallationAction::Unsuspend => {
				self.set_suspended(installation_id, false).await?;
				Ok(Outcome::Processed)
			}
			InstallationAction::NewPermissionsAccepted => {
				let updated = self
					.store
					.update_installation_grants(
						installation_id,
						&event.installation.permissions,
						&event.installation.events,
					)
					.await?;
				if !updated {
					return Err(WebhookError::InstallationNotFound(installation_id));
				}
				Ok(Outcome::Processed)
			}
			InstallationAction::Other => {
				debug!(installation_id, "ignoring installation action");
				Ok(Outcome::Ignored)
			}
		}
	}

	async fn installation_created(&self, event: InstallationEvent) -> Result<Outcome, WebhookError> {
		let payload = &event.installation;
		let login = payload
			.account_login()
			.ok_or_else(|| WebhookError::InvalidPayload("installation account login is missing".into()))?;

		// Looked up first so a retried delivery reuses the organization.
		let organization = self.store.find_or_create_organization(login).await?;
		let record = self.installation_record(payload, organization.id, login);
		let repositories: Vec<_> = event
			.repositories
			.iter()
			.map(|r| repository_record(payload.id, r))
			.collect();

		let created = self.store.create_installation(&record, &repositories).await?;
		if !created {
			info!(installation_id = payload.id, "duplicate installation delivery");
			return Ok(Outcome::Processed);
		}

		info!(
			installation_id = payload.id,
			account_login = %login,
			repositories = repositories.len(),
			"installation created"
		);
		self.queue_repository_scans(payload.id, event.repositories.iter());
		Ok(Outcome::Processed)
	}

	fn installation_record(
		&self,
		payload: &InstallationPayload,
		organization_id: Uuid,
		login: &str,
	) -> InstallationRecord {
		let now = Utc::now();
		let account_id = payload.account_id().unwrap_or_default();
		InstallationRecord {
			id: Uuid::new_v4(),
			organization_id,
			installation_id: payload.id,
			account_id,
			account_type: payload.account_type().unwrap_or_default().to_string(),
			account_login: login.to_string(),
			repository_selection: payload.repository_selection.clone().unwrap_or_default(),
			access_tokens_url: payload.access_tokens_url.clone().unwrap_or_default(),
			repositories_url: payload.repositories_url.clone().unwrap_or_default(),
			html_url: payload.html_url.clone().unwrap_or_default(),
			app_id: payload.app_id.or(self.app_id).unwrap_or_default(),
			target_id: payload.target_id.unwrap_or(account_id),
			target_type: payload
				.target_type
				.clone()
				.or_else(|| payload.account_type().map(str::to_string))
				.unwrap_or_default(),
			permissions: payload.permissions.clone(),
			events: payload.events.clone(),
			suspended_at: None,
			created_at: now,
			updated_at: now,
		}
	}

	async fn set_suspended(&self, installation_id: i64, suspended: bool) -> Result<(), WebhookError> {
		let suspended_at = suspended.then(Utc::now);
		if !self
			.store
			.set_installation_suspended(installation_id, suspended_at)
			.await?
		{
			return Err(WebhookError::InstallationNotFound(installation_id));
		}
		Ok(())
	}

	async fn handle_installation_repositories(
		&self,
		event: InstallationRepositoriesEvent,
	) -> Result<Outcome, WebhookError> {
		let installation_id = event.installation.id;
		let installation = self
			.store
			.get_installation(installation_id)
			.await?
			.ok_or(WebhookError::InstallationNotFound(installation_id))?;

		let added = event.added();
		if !added.is_empty() {
			let records: Vec<_> = added
				.iter()
				.map(|r| repository_record(installation_id, r))
				.collect();
			self
				.store
				.upsert_repositories(installation_id, &records)
				.await
				.map_err(|e| match e {
					DbError::NotFound(_) => WebhookError::InstallationNotFound(installation_id),
					other => WebhookError::Store(other),
				})?;
		}

		let removed: Vec<i64> = event.removed().iter().map(|r| r.id).collect();
		if !removed.is_empty() {
			self
				.store
				.remove_repositories(installation_id, &removed)
				.await?;
		}

		info!(
			installation_id,
			action = event.action.as_deref().unwrap_or_default(),
			added = added.len(),
			removed = removed.len(),
			"installation repositories updated"
		);

		if !installation.is_suspended() {
			self.queue_repository_scans(installation_id, added.into_iter());
		}
		Ok(Outcome::Processed)
	}

	fn queue_repository_scans<'a>(
		&self,
		installation_id: i64,
		repositories: impl Iterator<Item = &'a RepositoryPayload>,
	) {
		let Some(scans) = &self.scans else {
			return;
		};
		for repository in repositories {
			let Some((owner, repo)) = repository.owner_and_name() else {
				warn!(full_name = %repository.full_name, "cannot scan repository without owner");
				continue;
			};
			scans.submit(ScanJob::Repository {
				installation_id,
				owner: owner.to_string(),
				repo: repo.to_string(),
			});
		}
	}
}

fn repository_record(installation_id: i64, repository: &RepositoryPayload) -> RepositoryRecord {
	let now = Utc::now();
	RepositoryRecord {
		id: Uuid::new_v4(),
		installation_id,
		repo_id: repository.id,
		name: repository.name.clone(),
		full_name: repository.full_name.clone(),
		private: repository.private,
		html_url: repository
			.html_url
			.clone()
			.unwrap_or_else(|| format!("https://github.com/{}", repository.full_name)),
		description: repository.description.clone(),
		created_at: now,
		updated_at: now,
	}
}
