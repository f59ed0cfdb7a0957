// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! GitHub App integration for Sentinel.
//!
//! - [`CredentialCache`]: per-installation access tokens with a refresh margin
//! - [`AppAuthenticator`]: JWT assertion, single-flight token exchange, and
//!   installation-scoped API clients
//! - [`webhook`]: `X-Hub-Signature-256` verification
//! - [`events`]: typed `installation` / `installation_repositories` payloads
//! - [`walker`]: lazy, extension-filtered repository content traversal

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod jwt;
pub mod token_cache;
pub mod types;
pub mod walker;
pub mod webhook;

pub use auth::{AppAuthenticator, ClientProvider, HttpTokenIssuer, IssuedToken, TokenIssuer};
pub use client::{GithubApi, InstallationClient};
pub use config::GithubAppConfig;
pub use error::GithubAppError;
pub use events::{
	InstallationAccount, InstallationAction, InstallationEvent, InstallationPayload,
	InstallationRepositoriesEvent, RepositoryPayload, WebhookEvent,
};
pub use sentinel_common_http::RetryConfig;
pub use token_cache::CredentialCache;
pub use types::{ContentEntry, EntryKind, PullRequestFile, RepoContents, RepoFile};
pub use webhook::{compute_webhook_signature, verify, verify_webhook_signature};
