// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use sentinel_server_db::DbError;

use crate::processor::WebhookError;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	#[error("bad request: {0}")]
	BadRequest(String),
	#[error("unauthorized: {0}")]
	Unauthorized(String),
	#[error("not found: {0}")]
	NotFound(String),
	#[error("service unavailable: {0}")]
	ServiceUnavailable(String),
	#[error("internal error: {0}")]
	Internal(String),
	#[error(transparent)]
	Database(#[from] DbError),
}

impl From<WebhookError> for ServerError {
	fn from(e: WebhookError) -> Self {
		match e {
			WebhookError::InvalidPayload(msg) => ServerError::BadRequest(msg),
			WebhookError::InstallationNotFound(id) => {
				ServerError::NotFound(format!("installation {id} not found"))
			}
			WebhookError::Store(e) => ServerError::Database(e),
		}
	}
}

impl ServerError {
	fn status_and_code(&self) -> (StatusCode, &'static str) {
		match self {
			ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
			ServerError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
			ServerError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
			ServerError::ServiceUnavailable(_) => {
				(StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
			}
			ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
			ServerError::Database(DbError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
			ServerError::Database(DbError::Conflict(_)) => (StatusCode::CONFLICT, "conflict"),
			ServerError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
		}
	}
}

impl IntoResponse for ServerError {
	fn into_response(self) -> Response {
		let (status, error) = self.status_and_code();
		let message = match &self {
			// Storage details stay in the logs.
			ServerError::Database(e) if status.is_server_error() => {
				tracing::error!(error = %e, "database error");
				"Internal server error".to_string()
			}
			ServerError::Internal(msg) => {
				tracing::error!(error = %msg, "internal error");
				"Internal server error".to_string()
			}
			ServerError::BadRequest(msg)
			| ServerError::Unauthorized(msg)
			| ServerError::NotFound(msg)
			| ServerError::ServiceUnavailable(msg) => {
				tracing::warn!(status = status.as_u16(), message = %msg, "request failed");
				msg.clone()
			}
			ServerError::Database(e) => e.to_string(),
		};

		(
			status,
			Json(ErrorResponse {
				error: error.to_string(),
				message,
			}),
		)
			.into_response()
	}
}
