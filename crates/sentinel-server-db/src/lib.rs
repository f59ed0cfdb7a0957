// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite persistence for the Sentinel server.
//!
//! Stores organizations, GitHub App installations and the repositories each
//! installation can access. Queries go through [`GithubStore`] so the webhook
//! processor can be exercised against in-process fakes.

pub mod error;
pub mod github;
pub mod migrations;
pub mod pool;
pub mod types;

#[cfg(test)]
mod testing;

pub use error::{DbError, Result};
pub use github::{GithubRepository, GithubStore};
pub use migrations::run_migrations;
pub use pool::create_pool;
pub use types::{InstallationRecord, OrganizationRecord, RepositoryRecord};
