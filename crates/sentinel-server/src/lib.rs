// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Sentinel server: receives GitHub App webhooks, keeps the installation
//! registry current and queues follow-up repository scans.

pub mod api;
pub mod api_docs;
pub mod error;
pub mod processor;
pub mod routes;
pub mod scan;

pub use api::{create_app_state, create_router, AppState};
pub use api_docs::ApiDoc;
pub use error::{ErrorResponse, ServerError};
pub use processor::{Outcome, WebhookError, WebhookProcessor};
pub use scan::{GithubScanner, ScanJob, ScanReport, ScanRunner, ScanService, ScannedFile};
pub use sentinel_server_config::ServerConfig;
