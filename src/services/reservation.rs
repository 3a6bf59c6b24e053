use crate::database::error::DatabaseError;
use crate::database::reservation_repository::{NewReservation, ReservationStore, ReservationWrite};
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::types::{PaymentMetadata, PaymentObject};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Codes are drawn from the full uppercase alphanumeric set with an
/// OS-seeded CSPRNG. Uniqueness is not enforced; 36^6 values make
/// collisions tolerable for a human-presented code.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LEN: usize = 6;

pub fn generate_confirmation_code() -> String {
    let mut rng = rand::rngs::OsRng;
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Single-use access token embedded in the QR code:
/// `{toiletId}-{confirmationCode}`.
pub fn access_token(toilet_id: &str, confirmation_code: &str) -> String {
    format!("{}-{}", toilet_id, confirmation_code)
}

/// Access window: one hour, starting 15 minutes after payment.
pub fn generate_time_slot(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now + Duration::minutes(15);
    let end = start + Duration::hours(1);
    (start, end)
}

#[derive(Debug, Error)]
pub enum ReservationWriteError {
    #[error("Invalid payment metadata: {0}")]
    InvalidMetadata(#[from] PaymentError),
    #[error("Persistence failed: {0}")]
    Persistence(#[from] DatabaseError),
}

/// Derives and persists reservations from succeeded payment events.
pub struct ReservationWriter {
    store: Arc<dyn ReservationStore>,
}

impl ReservationWriter {
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self { store }
    }

    /// Record the reservation for a succeeded payment, exactly once per
    /// authorization id. Replayed events return the prior write.
    pub async fn record_reservation(
        &self,
        payment: &PaymentObject,
    ) -> Result<ReservationWrite, ReservationWriteError> {
        let metadata = PaymentMetadata::from_string_map(&payment.metadata)?;
        let new = Self::derive(payment, &metadata)?;

        let write = self.store.insert_once(new).await?;

        if write.created {
            info!(
                reservation_id = %write.reservation.id,
                payment_intent_id = %payment.authorization_id,
                confirmation_code = %write.reservation.confirmation_code,
                "reservation recorded"
            );
        } else {
            info!(
                reservation_id = %write.reservation.id,
                payment_intent_id = %payment.authorization_id,
                "duplicate payment event, reservation already recorded"
            );
        }

        Ok(write)
    }

    fn derive(
        payment: &PaymentObject,
        metadata: &PaymentMetadata,
    ) -> PaymentResult<NewReservation> {
        let toilet_id =
            metadata
                .toilet_id
                .clone()
                .ok_or_else(|| PaymentError::MalformedPayload {
                    message: "reservation payment carries no toilet id".to_string(),
                })?;

        let confirmation_code = generate_confirmation_code();
        let qr_code = access_token(&toilet_id, &confirmation_code);
        let (slot_start, slot_end) = generate_time_slot(Utc::now());

        Ok(NewReservation {
            payment_intent_id: payment.authorization_id.clone(),
            toilet_id,
            user_id: metadata.user_id.clone(),
            user_email: metadata.user_email.clone(),
            user_name: metadata
                .user_name
                .clone()
                .unwrap_or_else(|| "Utilisateur".to_string()),
            amount: payment.amount(),
            confirmation_code,
            qr_code,
            establishment_id: metadata.establishment_id.clone().unwrap_or_default(),
            establishment_name: metadata.establishment_name.clone().unwrap_or_default(),
            establishment_address: metadata.establishment_address.clone().unwrap_or_default(),
            payment_method: "card".to_string(),
            slot_start,
            slot_end,
        })
    }
}
