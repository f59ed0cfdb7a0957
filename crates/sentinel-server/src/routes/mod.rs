// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP handlers.

pub mod docs;
pub mod github;
pub mod health;
pub mod webhook;

use serde::Serialize;
use utoipa::ToSchema;

/// Body for endpoints that only acknowledge.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
	pub message: String,
}

impl MessageResponse {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
		}
	}
}
