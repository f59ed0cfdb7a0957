// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use crate::error::DbError;
use crate::types::{InstallationRecord, OrganizationRecord, RepositoryRecord};

const INSTALLATION_COLUMNS: &str = "id, organization_id, installation_id, account_id, account_type, \
	account_login, repository_selection, access_tokens_url, repositories_url, html_url, app_id, \
	target_id, target_type, permissions, events, suspended_at, created_at, updated_at";

const REPOSITORY_COLUMNS: &str = "id, installation_id, repo_id, name, full_name, private, html_url, \
	description, created_at, updated_at";

#[async_trait]
pub trait GithubStore: Send + Sync {
	async fn find_or_create_organization(&self, name: &str) -> Result<OrganizationRecord, DbError>;
	async fn get_organization_by_name(
		&self,
		name: &str,
	) -> Result<Option<OrganizationRecord>, DbError>;

	/// Insert an installation and its repositories. Returns `false` without
	/// writing anything when the installation id already exists.
	async fn create_installation(
		&self,
		installation: &InstallationRecord,
		repositories: &[RepositoryRecord],
	) -> Result<bool, DbError>;
	async fn get_installation(
		&self,
		installation_id: i64,
	) -> Result<Option<InstallationRecord>, DbError>;
	async fn list_installations(&self) -> Result<Vec<InstallationRecord>, DbError>;
	async fn update_installation_grants(
		&self,
		installation_id: i64,
		permissions: &BTreeMap<String, String>,
		events: &[String],
	) -> Result<bool, DbError>;
	async fn set_installation_suspended(
		&self,
		installation_id: i64,
		suspended_at: Option<DateTime<Utc>>,
	) -> Result<bool, DbError>;
	/// Hard delete; repositories cascade.
	async fn delete_installation(&self, installation_id: i64) -> Result<bool, DbError>;

	async fn upsert_repositories(
		&self,
		installation_id: i64,
		repositories: &[RepositoryRecord],
	) -> Result<(), DbError>;
	async fn remove_repositories(&self, installation_id: i64, repo_ids: &[i64])
		-> Result<u64, DbError>;
	async fn list_repositories(&self, installation_id: i64)
		-> Result<Vec<RepositoryRecord>, DbError>;
	async fn get_installation_for_repository(
		&self,
		full_name: &str,
	) -> Result<Option<InstallationRecord>, DbError>;
}

#[derive(Clone)]
pub struct GithubRepository {
	pool: SqlitePool,
}

impl GithubRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	// =========================================================================
	// Organizations
	// =========================================================================

	/// Look the organization up by name, creating it on first sight.
	#[tracing::instrument(skip(self))]
	pub async fn find_or_create_organization(
		&self,
		name: &str,
	) -> Result<OrganizationRecord, DbError> {
		let candidate = OrganizationRecord::new(name);
		let result = sqlx::query(
			r#"
			INSERT INTO organizations (id, name, owner_id, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?)
			ON CONFLICT(name) DO NOTHING
			"#,
		)
		.bind(candidate.id.to_string())
		.bind(&candidate.name)
		.bind(&candidate.owner_id)
		.bind(candidate.created_at.to_rfc3339())
		.bind(candidate.updated_at.to_rfc3339())
		.execute(&self.pool)
		.await?;

		if result.rows_affected() > 0 {
			tracing::info!(organization_id = %candidate.id, name = %name, "organization: created");
			return Ok(candidate);
		}

		self.get_organization_by_name(name)
			.await?
			.ok_or_else(|| DbError::Internal(format!("organization '{name}' vanished after insert")))
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_organization_by_name(
		&self,
		name: &str,
	) -> Result<Option<OrganizationRecord>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, name, owner_id, created_at, updated_at
			FROM organizations
			WHERE name = ?
			"#,
		)
		.bind(name)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_organization(&r)).transpose()
	}

	// =========================================================================
	// Installations
	// =========================================================================

	#[tracing::instrument(
		skip(self, installation, repositories),
		fields(installation_id = installation.installation_id, repo_count = repositories.len())
	)]
	pub async fn create_installation(
		&self,
		installation: &InstallationRecord,
		repositories: &[RepositoryRecord],
	) -> Result<bool, DbError> {
		let mut tx = self.pool.begin().await?;

		let result = sqlx::query(
			r#"
			INSERT INTO github_installations (
				id, organization_id, installation_id, account_id, account_type, account_login,
				repository_selection, access_tokens_url, repositories_url, html_url, app_id,
				target_id, target_type, permissions, events, suspended_at, created_at, updated_at
			) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			ON CONFLICT(installation_id) DO NOTHING
			"#,
		)
		.bind(installation.id.to_string())
		.bind(installation.organization_id.to_string())
		.bind(installation.installation_id)
		.bind(installation.account_id)
		.bind(&installation.account_type)
		.bind(&installation.account_login)
		.bind(&installation.repository_selection)
		.bind(&installation.access_tokens_url)
		.bind(&installation.repositories_url)
		.bind(&installation.html_url)
		.bind(installation.app_id)
		.bind(installation.target_id)
		.bind(&installation.target_type)
		.bind(serde_json::to_string(&installation.permissions)?)
		.bind(serde_json::to_string(&installation.events)?)
		.bind(installation.suspended_at.map(|t| t.to_rfc3339()))
		.bind(installation.created_at.to_rfc3339())
		.bind(installation.updated_at.to_rfc3339())
		.execute(&mut *tx)
		.await?;

		if result.rows_affected() == 0 {
			tx.rollback().await?;
			tracing::info!("github_installation: already exists, skipping");
			return Ok(false);
		}

		let now = Utc::now().to_rfc3339();
		for repo in repositories {
			upsert_repository(&mut *tx, installation.installation_id, repo, &now).await?;
		}
		tx.commit().await?;

		tracing::info!(
			account_login = %installation.account_login,
			"github_installation: created"
		);
		Ok(true)
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_installation(
		&self,
		installation_id: i64,
	) -> Result<Option<InstallationRecord>, DbError> {
		let row = sqlx::query(&format!(
			"SELECT {INSTALLATION_COLUMNS} FROM github_installations WHERE installation_id = ?"
		))
		.bind(installation_id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_installation(&r)).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_installations(&self) -> Result<Vec<InstallationRecord>, DbError> {
		let rows = sqlx::query(&format!(
			"SELECT {INSTALLATION_COLUMNS} FROM github_installations ORDER BY account_login, installation_id"
		))
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_installation).collect()
	}

	/// Replace the permissions and subscribed events of an installation.
	#[tracing::instrument(skip(self, permissions, events))]
	pub async fn update_installation_grants(
		&self,
		installation_id: i64,
		permissions: &BTreeMap<String, String>,
		events: &[String],
	) -> Result<bool, DbError> {
		let result = sqlx::query(
			r#"
			UPDATE github_installations
			SET permissions = ?, events = ?, updated_at = ?
			WHERE installation_id = ?
			"#,
		)
		.bind(serde_json::to_string(permissions)?)
		.bind(serde_json::to_string(events)?)
		.bind(Utc::now().to_rfc3339())
		.bind(installation_id)
		.execute(&self.pool)
		.await?;

		let updated = result.rows_affected() > 0;
		if updated {
			tracing::info!(installation_id, "github_installation: grants updated");
		}
		Ok(updated)
	}

	#[tracing::instrument(skip(self))]
	pub async fn set_installation_suspended(
		&self,
		installation_id: i64,
		suspended_at: Option<DateTime<Utc>>,
	) -> Result<bool, DbError> {
		let result = sqlx::query(
			r#"
			UPDATE github_installations
			SET suspended_at = ?, updated_at = ?
			WHERE installation_id = ?
			"#,
		)
		.bind(suspended_at.map(|t| t.to_rfc3339()))
		.bind(Utc::now().to_rfc3339())
		.bind(installation_id)
		.execute(&self.pool)
		.await?;

		let updated = result.rows_affected() > 0;
		if updated {
			tracing::info!(
				installation_id,
				suspended = suspended_at.is_some(),
				"github_installation: suspension updated"
			);
		}
		Ok(updated)
	}

	#[tracing::instrument(skip(self))]
	pub async fn delete_installation(&self, installation_id: i64) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM github_installations WHERE installation_id = ?")
			.bind(installation_id)
			.execute(&self.pool)
			.await?;

		let deleted = result.rows_affected() > 0;
		if deleted {
			tracing::info!(installation_id, "github_installation: deleted");
		}
		Ok(deleted)
	}

	// =========================================================================
	// Repositories
	// =========================================================================

	/// Insert or refresh repositories in one transaction. Fails with
	/// [`DbError::NotFound`] when the installation does not exist.
	#[tracing::instrument(skip(self, repositories), fields(repo_count = repositories.len()))]
	pub async fn upsert_repositories(
		&self,
		installation_id: i64,
		repositories: &[RepositoryRecord],
	) -> Result<(), DbError> {
		let mut tx = self.pool.begin().await?;
		let now = Utc::now().to_rfc3339();
		for repo in repositories {
			upsert_repository(&mut *tx, installation_id, repo, &now)
				.await
				.map_err(|e| match e {
					DbError::Sqlx(sqlx::Error::Database(ref db_err))
						if db_err.is_foreign_key_violation() =>
					{
						DbError::NotFound(format!("installation {installation_id}"))
					}
					other => other,
				})?;
		}
		tx.commit().await?;

		tracing::info!("github_repositories: upserted");
		Ok(())
	}

	#[tracing::instrument(skip(self, repo_ids), fields(repo_count = repo_ids.len()))]
	pub async fn remove_repositories(
		&self,
		installation_id: i64,
		repo_ids: &[i64],
	) -> Result<u64, DbError> {
		let mut tx = self.pool.begin().await?;
		let mut removed = 0;
		for repo_id in repo_ids {
			removed += sqlx::query(
				"DELETE FROM github_repositories WHERE installation_id = ? AND repo_id = ?",
			)
			.bind(installation_id)
			.bind(repo_id)
			.execute(&mut *tx)
			.await?
			.rows_affected();
		}
		tx.commit().await?;

		tracing::info!(removed, "github_repositories: removed");
		Ok(removed)
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_repositories(
		&self,
		installation_id: i64,
	) -> Result<Vec<RepositoryRecord>, DbError> {
		let rows = sqlx::query(&format!(
			"SELECT {REPOSITORY_COLUMNS} FROM github_repositories WHERE installation_id = ? ORDER BY full_name"
		))
		.bind(installation_id)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_repository).collect()
	}

	/// The active installation that grants access to `owner/name`.
	#[tracing::instrument(skip(self))]
	pub async fn get_installation_for_repository(
		&self,
		full_name: &str,
	) -> Result<Option<InstallationRecord>, DbError> {
		let row = sqlx::query(&format!(
			r#"
			SELECT {INSTALLATION_COLUMNS}
			FROM github_installations
			WHERE installation_id IN (
				SELECT installation_id FROM github_repositories WHERE full_name = ? COLLATE NOCASE
			)
			AND suspended_at IS NULL
			ORDER BY created_at
			LIMIT 1
			"#
		))
		.bind(full_name)
		.fetch_optional(&self.pool)
		.await?;

		match row {
			Some(r) => {
				let installation = row_to_installation(&r)?;
				tracing::debug!(
					installation_id = installation.installation_id,
					"github_installation_for_repository: found"
				);
				Ok(Some(installation))
			}
			None => {
				tracing::debug!("github_installation_for_repository: not found");
				Ok(None)
			}
		}
	}
}

async fn upsert_repository(
	conn: &mut SqliteConnection,
	installation_id: i64,
	repo: &RepositoryRecord,
	now: &str,
) -> Result<(), DbError> {
	sqlx::query(
		r#"
		INSERT INTO github_repositories (
			id, installation_id, repo_id, name, full_name, private, html_url, description,
			created_at, updated_at
		) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
		ON CONFLICT(installation_id, repo_id) DO UPDATE SET
			name = excluded.name,
			full_name = excluded.full_name,
			private = excluded.private,
			html_url = excluded.html_url,
			description = excluded.description,
			updated_at = excluded.updated_at
		"#,
	)
	.bind(repo.id.to_string())
	.bind(installation_id)
	.bind(repo.repo_id)
	.bind(&repo.name)
	.bind(&repo.full_name)
	.bind(repo.private)
	.bind(&repo.html_url)
	.bind(&repo.description)
	.bind(repo.created_at.to_rfc3339())
	.bind(now)
	.execute(conn)
	.await?;
	Ok(())
}

fn parse_uuid(raw: &str) -> Result<Uuid, DbError> {
	Uuid::parse_str(raw).map_err(|e| DbError::Internal(format!("Invalid UUID '{raw}': {e}")))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DbError> {
	DateTime::parse_from_rfc3339(raw)
		.map(|t| t.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("Invalid timestamp '{raw}': {e}")))
}

fn row_to_organization(row: &SqliteRow) -> Result<OrganizationRecord, DbError> {
	Ok(OrganizationRecord {
		id: parse_uuid(&row.try_get::<String, _>("id")?)?,
		name: row.try_get("name")?,
		owner_id: row.try_get("owner_id")?,
		created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
		updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
	})
}

fn row_to_installation(row: &SqliteRow) -> Result<InstallationRecord, DbError> {
	let permissions: String = row.try_get("permissions")?;
	let events: String = row.try_get("events")?;
	let suspended_at: Option<String> = row.try_get("suspended_at")?;

	Ok(InstallationRecord {
		id: parse_uuid(&row.try_get::<String, _>("id")?)?,
		organization_id: parse_uuid(&row.try_get::<String, _>("organization_id")?)?,
		installation_id: row.try_get("installation_id")?,
		account_id: row.try_get("account_id")?,
		account_type: row.try_get("account_type")?,
		account_login: row.try_get("account_login")?,
		repository_selection: row.try_get("repository_selection")?,
		access_tokens_url: row.try_get("access_tokens_url")?,
		repositories_url: row.try_get("repositories_url")?,
		html_url: row.try_get("html_url")?,
		app_id: row.try_get("app_id")?,
		target_id: row.try_get("target_id")?,
		target_type: row.try_get("target_type")?,
		permissions: serde_json::from_str(&permissions)?,
		events: serde_json::from_str(&events)?,
		suspended_at: suspended_at.as_deref().map(parse_timestamp).transpose()?,
		created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
		updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
	})
}

fn row_to_repository(row: &SqliteRow) -> Result<RepositoryRecord, DbError> {
	Ok(RepositoryRecord {
		id: parse_uuid(&row.try_get::<String, _>("id")?)?,
		installation_id: row.try_get("installation_id")?,
		repo_id: row.try_get("repo_id")?,
		name: row.try_get("name")?,
		full_name: row.try_get("full_name")?,
		private: row.try_get("private")?,
		html_url: row.try_get("html_url")?,
		description: row.try_get("description")?,
		created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
		updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
	})
}

#[async_trait]
impl GithubStore for GithubRepository {
	async fn find_or_create_organization(&self, name: &str) -> Result<OrganizationRecord, DbError> {
		self.find_or_create_organization(name).await
	}

	async fn get_organization_by_name(
		&self,
		name: &str,
	) -> Result<Option<OrganizationRecord>, DbError> {
		self.get_organization_by_name(name).await
	}

	async fn create_installation(
		&self,
		installation: &InstallationRecord,
		repositories: &[RepositoryRecord],
	) -> Result<bool, DbError> {
		self.create_installation(installation, repositories).await
	}

	async fn get_installation(
		&self,
		installation_id: i64,
	) -> Result<Option<InstallationRecord>, DbError> {
		self.get_installation(installation_id).await
	}

	async fn list_installations(&self) -> Result<Vec<InstallationRecord>, DbError> {
		self.list_installations().await
	}

	async fn update_installation_grants(
		&self,
		installation_id: i64,
		permissions: &BTreeMap<String, String>,
		events: &[String],
	) -> Result<bool, DbError> {
		self.update_installation_grants(installation_id, permissions, events)
			.await
	}

	async fn set_installation_suspended(
		&self,
		installation_id: i64,
		suspended_at: Option<DateTime<Utc>>,
	) -> Result<bool, DbError> {
		self.set_installation_suspended(installation_id, suspended_at)
			.await
	}

	async fn delete_installation(&self, installation_id: i64) -> Result<bool, DbError> {
		self.delete_installation(installation_id).await
	}

	async fn upsert_repositories(
		&self,
		installation_id: i64,
		repositories: &[RepositoryRecord],
	) -> Result<(), DbError> {
		self.upsert_repositories(installation_id, repositories).await
	}

	async fn remove_repositories(
		&self,
		installation_id: i64,
		repo_ids: &[i64],
	) -> Result<u64, DbError> {
		self.remove_repositories(installation_id, repo_ids).await
	}

	async fn list_repositories(
		&self,
		installation_id: i64,
	) -> Result<Vec<RepositoryRecord>, DbError> {
		self.list_repositories(installation_id).await
	}

	async fn get_installation_for_repository(
		&self,
		full_name: &str,
	) -> Result<Option<InstallationRecord>, DbError> {
		self.get_installation_for_repository(full_name).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;

	fn installation(org: &OrganizationRecord, installation_id: i64) -> InstallationRecord {
		let now = Utc::now();
		InstallationRecord {
			id: Uuid::new_v4(),
			organization_id: org.id,
			installation_id,
			account_id: 1000 + installation_id,
			account_type: "Organization".to_string(),
			account_login: org.name.clone(),
			repository_selection: "selected".to_string(),
			access_tokens_url: format!(
				"https://api.github.com/app/installations/{installation_id}/access_tokens"
			),
			repositories_url: "https://api.github.com/installation/repositories".to_string(),
			html_url: format!("https://github.com/settings/installations/{installation_id}"),
			app_id: 7,
			target_id: 1000 + installation_id,
			target_type: "Organization".to_string(),
			permissions: BTreeMap::from([("contents".to_string(), "read".to_string())]),
			events: vec!["push".to_string(), "pull_request".to_string()],
			suspended_at: None,
			created_at: now,
			updated_at: now,
		}
	}

	fn repository(installation_id: i64, repo_id: i64, full_name: &str) -> RepositoryRecord {
		let now = Utc::now();
		let name = full_name.rsplit('/').next().unwrap_or(full_name);
		RepositoryRecord {
			id: Uuid::new_v4(),
			installation_id,
			repo_id,
			name: name.to_string(),
			full_name: full_name.to_string(),
			private: true,
			html_url: format!("https://github.com/{full_name}"),
			description: None,
			created_at: now,
			updated_at: now,
		}
	}

	async fn setup() -> GithubRepository {
		GithubRepository::new(create_test_pool().await)
	}

	#[tokio::test]
	async fn find_or_create_organization_is_idempotent() {
		let repo = setup().await;
		let first = repo.find_or_create_organization("acme").await.unwrap();
		let second = repo.find_or_create_organization("acme").await.unwrap();
		assert_eq!(first.id, second.id);

		let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM organizations")
			.fetch_one(&repo.pool)
			.await
			.unwrap();
		assert_eq!(count, 1);
	}

	#[tokio::test]
	async fn create_installation_round_trips_fields() {
		let repo = setup().await;
		let org = repo.find_or_create_organization("acme").await.unwrap();
		let record = installation(&org, 42);

		assert!(repo
			.create_installation(&record, &[repository(42, 1, "acme/infra")])
			.await
			.unwrap());

		let stored = repo.get_installation(42).await.unwrap().unwrap();
		assert_eq!(stored.id, record.id);
		assert_eq!(stored.organization_id, org.id);
		assert_eq!(stored.permissions, record.permissions);
		assert_eq!(stored.events, vec!["push", "pull_request"]);
		assert!(!stored.is_suspended());

		let repos = repo.list_repositories(42).await.unwrap();
		assert_eq!(repos.len(), 1);
		assert_eq!(repos[0].full_name, "acme/infra");
		assert!(repos[0].private);
	}

	#[tokio::test]
	async fn duplicate_create_is_a_no_op() {
		let repo = setup().await;
		let org = repo.find_or_create_organization("acme").await.unwrap();
		let original = installation(&org, 42);
		assert!(repo.create_installation(&original, &[]).await.unwrap());

		let mut replay = installation(&org, 42);
		replay.account_login = "changed".to_string();
		let created = repo
			.create_installation(&replay, &[repository(42, 9, "acme/late")])
			.await
			.unwrap();
		assert!(!created);

		let stored = repo.get_installation(42).await.unwrap().unwrap();
		assert_eq!(stored.id, original.id);
		assert_eq!(stored.account_login, "acme");
		assert!(repo.list_repositories(42).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn delete_cascades_and_is_idempotent() {
		let repo = setup().await;
		let org = repo.find_or_create_organization("acme").await.unwrap();
		repo.create_installation(
			&installation(&org, 42),
			&[repository(42, 1, "acme/a"), repository(42, 2, "acme/b")],
		)
		.await
		.unwrap();

		assert!(repo.delete_installation(42).await.unwrap());
		assert!(repo.get_installation(42).await.unwrap().is_none());
		assert!(repo.list_repositories(42).await.unwrap().is_empty());

		assert!(!repo.delete_installation(42).await.unwrap());
	}

	#[tokio::test]
	async fn upsert_repositories_updates_in_place() {
		let repo = setup().await;
		let org = repo.find_or_create_organization("acme").await.unwrap();
		repo.create_installation(&installation(&org, 42), &[])
			.await
			.unwrap();

		let first = repository(42, 1, "acme/old-name");
		repo.upsert_repositories(42, &[first.clone()]).await.unwrap();

		let mut renamed = repository(42, 1, "acme/new-name");
		renamed.private = false;
		renamed.description = Some("renamed".to_string());
		repo.upsert_repositories(42, &[renamed]).await.unwrap();

		let repos = repo.list_repositories(42).await.unwrap();
		assert_eq!(repos.len(), 1);
		assert_eq!(repos[0].id, first.id);
		assert_eq!(repos[0].full_name, "acme/new-name");
		assert!(!repos[0].private);
		assert_eq!(repos[0].description.as_deref(), Some("renamed"));
	}

	#[tokio::test]
	async fn same_repo_under_two_installations_is_two_rows() {
		let repo = setup().await;
		let org = repo.find_or_create_organization("acme").await.unwrap();
		repo.create_installation(&installation(&org, 1), &[])
			.await
			.unwrap();
		repo.create_installation(&installation(&org, 2), &[])
			.await
			.unwrap();

		repo.upsert_repositories(1, &[repository(1, 55, "acme/shared")])
			.await
			.unwrap();
		repo.upsert_repositories(2, &[repository(2, 55, "acme/shared")])
			.await
			.unwrap();

		assert_eq!(repo.list_repositories(1).await.unwrap().len(), 1);
		assert_eq!(repo.list_repositories(2).await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn upsert_for_unknown_installation_is_not_found() {
		let repo = setup().await;
		let err = repo
			.upsert_repositories(404, &[repository(404, 1, "ghost/repo")])
			.await
			.unwrap_err();
		assert!(matches!(err, DbError::NotFound(_)));

		let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM github_repositories")
			.fetch_one(&repo.pool)
			.await
			.unwrap();
		assert_eq!(count, 0);
	}

	#[tokio::test]
	async fn remove_repositories_counts_rows() {
		let repo = setup().await;
		let org = repo.find_or_create_organization("acme").await.unwrap();
		repo.create_installation(
			&installation(&org, 42),
			&[repository(42, 1, "acme/a"), repository(42, 2, "acme/b")],
		)
		.await
		.unwrap();

		let removed = repo.remove_repositories(42, &[1, 3]).await.unwrap();
		assert_eq!(removed, 1);
		let remaining = repo.list_repositories(42).await.unwrap();
		assert_eq!(remaining.len(), 1);
		assert_eq!(remaining[0].repo_id, 2);
	}

	#[tokio::test]
	async fn grants_and_suspension_updates() {
		let repo = setup().await;
		let org = repo.find_or_create_organization("acme").await.unwrap();
		repo.create_installation(&installation(&org, 42), &[])
			.await
			.unwrap();

		let permissions = BTreeMap::from([
			("contents".to_string(), "read".to_string()),
			("pull_requests".to_string(), "write".to_string()),
		]);
		assert!(repo
			.update_installation_grants(42, &permissions, &["push".to_string()])
			.await
			.unwrap());
		assert!(!repo
			.update_installation_grants(7, &permissions, &[])
			.await
			.unwrap());

		let suspended_at = Utc::now();
		assert!(repo
			.set_installation_suspended(42, Some(suspended_at))
			.await
			.unwrap());

		let stored = repo.get_installation(42).await.unwrap().unwrap();
		assert_eq!(stored.permissions, permissions);
		assert_eq!(stored.events, vec!["push"]);
		assert!(stored.is_suspended());

		assert!(repo.set_installation_suspended(42, None).await.unwrap());
		assert!(!repo.get_installation(42).await.unwrap().unwrap().is_suspended());
	}

	#[tokio::test]
	async fn installation_for_repository_skips_suspended() {
		let repo = setup().await;
		let org = repo.find_or_create_organization("acme").await.unwrap();
		repo.create_installation(&installation(&org, 42), &[repository(42, 1, "acme/infra")])
			.await
			.unwrap();

		let found = repo
			.get_installation_for_repository("Acme/Infra")
			.await
			.unwrap()
			.unwrap();
		assert_eq!(found.installation_id, 42);

		repo.set_installation_suspended(42, Some(Utc::now()))
			.await
			.unwrap();
		assert!(repo
			.get_installation_for_repository("acme/infra")
			.await
			.unwrap()
			.is_none());
	}

	#[tokio::test]
	async fn list_installations_orders_by_login() {
		let repo = setup().await;
		let zeta = repo.find_or_create_organization("zeta").await.unwrap();
		let alpha = repo.find_or_create_organization("alpha").await.unwrap();
		repo.create_installation(&installation(&zeta, 1), &[])
			.await
			.unwrap();
		repo.create_installation(&installation(&alpha, 2), &[])
			.await
			.unwrap();

		let logins: Vec<_> = repo
			.list_installations()
			.await
			.unwrap()
			.into_iter()
			.map(|i| i.account_login)
			.collect();
		assert_eq!(logins, vec!["alpha", "zeta"]);
	}
}
