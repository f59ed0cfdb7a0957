// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! GitHub App webhook receiver.

use axum::{
	body::Bytes,
	extract::State,
	http::HeaderMap,
	Json,
};
use tracing::{info, warn};

use sentinel_server_github_app::webhook;

use super::MessageResponse;
use crate::{api::AppState, error::ServerError};

pub const EVENT_HEADER: &str = "x-github-event";
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const DELIVERY_HEADER: &str = "x-github-delivery";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	headers.get(name).and_then(|v| v.to_str().ok())
}

#[utoipa::path(
    post,
    path = "/webhook/github",
    request_body(content = String, description = "Raw GitHub event payload", content_type = "application/json"),
    params(
        ("X-GitHub-Event" = String, Header, description = "GitHub event type"),
        ("X-Hub-Signature-256" = String, Header, description = "sha256=<hex HMAC of the body>")
    ),
    responses(
        (status = 200, description = "Event processed or ignored", body = MessageResponse),
        (status = 400, description = "Missing headers or malformed payload", body = crate::error::ErrorResponse),
        (status = 401, description = "Signature verification failed", body = crate::error::ErrorResponse),
        (status = 404, description = "Installation not found", body = crate::error::ErrorResponse),
        (status = 500, description = "Storage failure", body = crate::error::ErrorResponse)
    ),
    tag = "webhooks"
)]
/// POST /webhook/github - Receive a GitHub App webhook delivery.
///
/// The body is taken as raw bytes so the signature is checked over exactly
/// what GitHub sent.
pub async fn github_webhook(
	State(state): State<AppState>,
	headers: HeaderMap,
	body: Bytes,
) -> Result<Json<MessageResponse>, ServerError> {
	let event_type = header_str(&headers, EVENT_HEADER)
		.ok_or_else(|| ServerError::BadRequest("Missing X-GitHub-Event header".to_string()))?;
	let signature = header_str(&headers, SIGNATURE_HEADER)
		.ok_or_else(|| ServerError::BadRequest("Missing X-Hub-Signature-256 header".to_string()))?;
	let delivery = header_str(&headers, DELIVERY_HEADER).unwrap_or("-");

	let secret = state.webhook_secret.as_ref().map(|s| s.expose().as_str());
	if !webhook::verify(&body, Some(signature), secret) {
		warn!(event_type, delivery, "Rejected webhook with invalid signature");
		return Err(ServerError::Unauthorized(
			"Invalid webhook signature".to_string(),
		));
	}

	let outcome = state.processor.process(event_type, &body).await?;
	info!(event_type, delivery, outcome = ?outcome, "Webhook handled");

	Ok(Json(MessageResponse::new(outcome.message())))
}
