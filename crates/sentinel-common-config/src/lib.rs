// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration primitives shared by Sentinel crates.
//!
//! - [`Secret`] and [`SecretString`], re-exported from
//!   [`sentinel_common_secret`]
//! - [`load_secret_env`] for reading secrets from `VAR` or `VAR_FILE`

pub mod env;

pub use sentinel_common_secret::{Secret, SecretString, REDACTED};

pub use env::{load_secret_env, SecretEnvError};
