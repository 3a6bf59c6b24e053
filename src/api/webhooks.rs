//! Provider callback endpoint.
//!
//! The body must reach signature verification byte-for-byte as
//! received, so the handler takes the raw bytes rather than a JSON
//! extractor.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::services::orchestrator::{PaymentOrchestrator, WebhookOutcome};

pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Clone)]
pub struct WebhookState {
    pub orchestrator: Arc<PaymentOrchestrator>,
}

/// POST /api/payments/webhook
pub async fn handle_webhook(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let signature = match signature {
        Some(s) => s,
        None => {
            warn!("Missing webhook signature header");
            return (StatusCode::BAD_REQUEST, "Webhook Error: missing signature").into_response();
        }
    };

    match state.orchestrator.handle_callback(&body, signature).await {
        Ok(outcome) => {
            match &outcome {
                WebhookOutcome::ReservationRecorded {
                    reservation_id, ..
                } => {
                    info!(reservation_id = %reservation_id, "Webhook processed: reservation recorded")
                }
                WebhookOutcome::ReservationAlreadyRecorded { reservation_id } => {
                    info!(reservation_id = %reservation_id, "Webhook redelivery: reservation already recorded")
                }
                WebhookOutcome::WalletCredited { user_id, .. } => {
                    info!(user_id = %user_id, "Webhook processed: wallet credited")
                }
                WebhookOutcome::WalletAlreadyCredited { user_id } => {
                    info!(user_id = %user_id, "Webhook redelivery: wallet already credited")
                }
                WebhookOutcome::Ignored { event_type } => {
                    info!(event_type = %event_type, "Webhook ignored")
                }
            }
            (StatusCode::OK, Json(serde_json::json!({"received": true}))).into_response()
        }
        // Unverifiable or unreadable deliveries are the sender's fault;
        // answer 400 so the provider stops retrying them.
        Err(err @ (AppError::InvalidSignature { .. } | AppError::MalformedPayload { .. })) => {
            warn!(error = %err, "Webhook rejected");
            (
                StatusCode::BAD_REQUEST,
                format!("Webhook Error: {}", err.user_message()),
            )
                .into_response()
        }
        Err(err @ AppError::InvalidArgument { .. }) => {
            warn!(error = %err, "Webhook payload failed validation");
            (
                StatusCode::BAD_REQUEST,
                format!("Webhook Error: {}", err.user_message()),
            )
                .into_response()
        }
        // Verified but unprocessed. Non-200 so the provider redelivers.
        Err(err) => {
            error!(error = %err, "Webhook processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Webhook Error: processing failed",
            )
                .into_response()
        }
    }
}
