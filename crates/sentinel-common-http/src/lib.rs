// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Outbound HTTP plumbing shared by Sentinel crates.
//!
//! - [`builder`]: a `reqwest` client builder carrying the Sentinel User-Agent
//!   (GitHub rejects API calls without one)
//! - [`retry`]: exponential backoff with jitter for transient failures

mod client;
mod retry;

pub use client::{builder, user_agent};
pub use retry::{retry, RetryConfig, RetryableError};
