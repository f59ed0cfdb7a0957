// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use sentinel_common_config::load_secret_env;
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	DatabaseConfigLayer, GitHubAppConfigLayer, HttpConfigLayer, LogFormat, LoggingConfigLayer,
	ScanConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file source. A missing file contributes nothing.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/sentinel/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!(path = %self.path.display(), "parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: SENTINEL_SERVER_<SECTION>_<FIELD>. Secrets also accept a
/// `_FILE` variant.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			http: Some(load_http_from_env()?),
			database: Some(load_database_from_env()),
			github_app: Some(load_github_app_from_env()?),
			logging: Some(load_logging_from_env()),
			scan: Some(load_scan_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_parse<T: std::str::FromStr>(name: &str, kind: &str) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v.trim().parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid {kind} value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_list(name: &str) -> Option<Vec<String>> {
	env_var(name).map(|s| {
		s.split(',')
			.map(|s| s.trim().to_string())
			.filter(|s| !s.is_empty())
			.collect()
	})
}

fn load_http_from_env() -> Result<HttpConfigLayer, ConfigError> {
	Ok(HttpConfigLayer {
		host: env_var("SENTINEL_SERVER_HOST"),
		port: env_parse("SENTINEL_SERVER_PORT", "u16")?,
		base_url: env_var("SENTINEL_SERVER_BASE_URL"),
	})
}

fn load_database_from_env() -> DatabaseConfigLayer {
	DatabaseConfigLayer {
		url: env_var("SENTINEL_SERVER_DATABASE_URL"),
	}
}

fn load_github_app_from_env() -> Result<GitHubAppConfigLayer, ConfigError> {
	Ok(GitHubAppConfigLayer {
		app_id: env_parse("SENTINEL_SERVER_GITHUB_APP_ID", "u64")?,
		private_key_pem: load_secret_env("SENTINEL_SERVER_GITHUB_APP_PRIVATE_KEY")?,
		webhook_secret: load_secret_env("SENTINEL_SERVER_GITHUB_APP_WEBHOOK_SECRET")?,
		app_slug: env_var("SENTINEL_SERVER_GITHUB_APP_SLUG"),
		base_url: env_var("SENTINEL_SERVER_GITHUB_APP_BASE_URL"),
		request_timeout_secs: env_parse("SENTINEL_SERVER_GITHUB_APP_REQUEST_TIMEOUT_SECS", "u64")?,
		max_attempts: env_parse("SENTINEL_SERVER_GITHUB_APP_MAX_ATTEMPTS", "u32")?,
	})
}

fn load_logging_from_env() -> LoggingConfigLayer {
	LoggingConfigLayer {
		level: env_var("SENTINEL_SERVER_LOG_LEVEL"),
		format: env_var("SENTINEL_SERVER_LOG_FORMAT").map(|v| LogFormat::parse(&v)),
	}
}

fn load_scan_from_env() -> Result<ScanConfigLayer, ConfigError> {
	Ok(ScanConfigLayer {
		enabled: env_bool("SENTINEL_SERVER_SCAN_ENABLED"),
		extensions: env_list("SENTINEL_SERVER_SCAN_EXTENSIONS"),
		queue_capacity: env_parse("SENTINEL_SERVER_SCAN_QUEUE_CAPACITY", "usize")?,
		max_concurrent: env_parse("SENTINEL_SERVER_SCAN_MAX_CONCURRENT", "usize")?,
		job_timeout_secs: env_parse("SENTINEL_SERVER_SCAN_JOB_TIMEOUT_SECS", "u64")?,
	})
}
