//! Authenticated payment creation endpoints.
//!
//! Both handlers resolve the caller from the bearer credential first;
//! identity fields in the body are never accepted.

use axum::extract::rejection::JsonRejection;
use axum::{extract::State, http::HeaderMap, Json};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::auth::{bearer_token, CallerIdentity, IdentityVerifier};
use crate::error::{AppError, AppResult};
use crate::services::orchestrator::{PaymentOrchestrator, ReservationPaymentRequest};

#[derive(Clone)]
pub struct PaymentsState {
    pub orchestrator: Arc<PaymentOrchestrator>,
    pub verifier: Arc<dyn IdentityVerifier>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReservationPaymentRequest {
    pub amount: f64,
    pub toilet_id: String,
    pub establishment_id: String,
    pub establishment_name: String,
    pub establishment_address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTopUpPaymentRequest {
    pub amount: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentResponse {
    pub client_secret: String,
}

async fn authenticate(
    verifier: &dyn IdentityVerifier,
    headers: &HeaderMap,
) -> AppResult<CallerIdentity> {
    let header_value = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let token = bearer_token(header_value)?;
    Ok(verifier.verify_bearer(token).await?)
}

fn parse_amount(raw: f64) -> AppResult<Decimal> {
    Decimal::from_f64(raw)
        .ok_or_else(|| AppError::invalid_argument("amount is not a valid number", Some("amount")))
}

/// Bodies that fail to deserialize (missing keys included) are the
/// caller's fault and answer 400, not the extractor's default 422.
fn require_body<T>(body: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    let Json(body) = body.map_err(|rejection| {
        AppError::invalid_argument(rejection.body_text(), None)
    })?;
    Ok(body)
}

/// POST /api/payments
pub async fn create_reservation_payment(
    State(state): State<PaymentsState>,
    headers: HeaderMap,
    body: Result<Json<CreateReservationPaymentRequest>, JsonRejection>,
) -> AppResult<Json<CreatePaymentResponse>> {
    let caller = authenticate(state.verifier.as_ref(), &headers).await?;
    let body = require_body(body)?;

    info!(
        user_id = %caller.user_id,
        toilet_id = %body.toilet_id,
        "💳 Reservation payment requested"
    );

    let created = state
        .orchestrator
        .create_reservation_payment(
            &caller,
            ReservationPaymentRequest {
                amount: parse_amount(body.amount)?,
                toilet_id: body.toilet_id,
                establishment_id: body.establishment_id,
                establishment_name: body.establishment_name,
                establishment_address: body.establishment_address,
            },
        )
        .await?;

    Ok(Json(CreatePaymentResponse {
        client_secret: created.client_secret,
    }))
}

/// POST /api/payments/topup
pub async fn create_topup_payment(
    State(state): State<PaymentsState>,
    headers: HeaderMap,
    body: Result<Json<CreateTopUpPaymentRequest>, JsonRejection>,
) -> AppResult<Json<CreatePaymentResponse>> {
    let caller = authenticate(state.verifier.as_ref(), &headers).await?;
    let body = require_body(body)?;

    info!(user_id = %caller.user_id, "💰 Wallet top-up payment requested");

    let created = state
        .orchestrator
        .create_topup_payment(&caller, parse_amount(body.amount)?)
        .await?;

    Ok(Json(CreatePaymentResponse {
        client_secret: created.client_secret,
    }))
}
