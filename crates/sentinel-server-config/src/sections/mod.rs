// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod database;
mod github_app;
mod http;
mod logging;
mod scan;

pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use github_app::{GitHubAppConfig, GitHubAppConfigLayer, GitHubAppCredentials};
pub use http::{HttpConfig, HttpConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use scan::{ScanConfig, ScanConfigLayer};
