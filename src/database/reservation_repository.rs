use crate::database::error::DatabaseError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Reservation entity. The authoritative record of a paid access.
#[derive(Debug, Clone, FromRow)]
pub struct Reservation {
    pub id: Uuid,
    /// The payment authorization this reservation was created for.
    /// UNIQUE in the schema; the idempotency key for webhook replays.
    pub payment_intent_id: String,
    pub toilet_id: String,
    pub user_id: String,
    pub user_email: String,
    pub user_name: String,
    pub amount: Decimal,
    pub status: String,
    pub confirmation_code: String,
    pub qr_code: String,
    pub establishment_id: String,
    pub establishment_name: String,
    pub establishment_address: String,
    pub payment_method: String,
    pub slot_start: DateTime<Utc>,
    pub slot_end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum ReservationStatus {
    Validated,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Validated => "validated",
            ReservationStatus::Completed => "completed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

/// Fields for a reservation about to be persisted. Timestamps are
/// server-assigned on write.
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub payment_intent_id: String,
    pub toilet_id: String,
    pub user_id: String,
    pub user_email: String,
    pub user_name: String,
    pub amount: Decimal,
    pub confirmation_code: String,
    pub qr_code: String,
    pub establishment_id: String,
    pub establishment_name: String,
    pub establishment_address: String,
    pub payment_method: String,
    pub slot_start: DateTime<Utc>,
    pub slot_end: DateTime<Utc>,
}

/// Outcome of an idempotent insert.
#[derive(Debug, Clone)]
pub struct ReservationWrite {
    pub reservation: Reservation,
    /// False when a reservation for this authorization already existed
    /// and the row returned is the prior write.
    pub created: bool,
}

#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Persist a reservation at most once per payment authorization id.
    /// A second call with the same authorization id returns the existing
    /// row with `created: false` and performs no write.
    async fn insert_once(&self, new: NewReservation) -> Result<ReservationWrite, DatabaseError>;

    async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Reservation>, DatabaseError>;
}

pub struct PgReservationStore {
    pool: PgPool,
}

impl PgReservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const RESERVATION_COLUMNS: &str = "id, payment_intent_id, toilet_id, user_id, user_email, \
     user_name, amount, status, confirmation_code, qr_code, establishment_id, \
     establishment_name, establishment_address, payment_method, slot_start, slot_end, created_at";

#[async_trait]
impl ReservationStore for PgReservationStore {
    async fn insert_once(&self, new: NewReservation) -> Result<ReservationWrite, DatabaseError> {
        let inserted = sqlx::query_as::<_, Reservation>(&format!(
            "INSERT INTO reservations (id, payment_intent_id, toilet_id, user_id, user_email, \
             user_name, amount, status, confirmation_code, qr_code, establishment_id, \
             establishment_name, establishment_address, payment_method, slot_start, slot_end) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             ON CONFLICT (payment_intent_id) DO NOTHING \
             RETURNING {}",
            RESERVATION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new.payment_intent_id)
        .bind(&new.toilet_id)
        .bind(&new.user_id)
        .bind(&new.user_email)
        .bind(&new.user_name)
        .bind(new.amount)
        .bind(ReservationStatus::Validated.as_str())
        .bind(&new.confirmation_code)
        .bind(&new.qr_code)
        .bind(&new.establishment_id)
        .bind(&new.establishment_name)
        .bind(&new.establishment_address)
        .bind(&new.payment_method)
        .bind(new.slot_start)
        .bind(new.slot_end)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if let Some(reservation) = inserted {
            return Ok(ReservationWrite {
                reservation,
                created: true,
            });
        }

        // Conflict path: a prior delivery already wrote this reservation.
        let existing = self
            .find_by_payment_intent(&new.payment_intent_id)
            .await?
            .ok_or(DatabaseError::NotFound)?;

        Ok(ReservationWrite {
            reservation: existing,
            created: false,
        })
    }

    async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Reservation>, DatabaseError> {
        sqlx::query_as::<_, Reservation>(&format!(
            "SELECT {} FROM reservations WHERE payment_intent_id = $1",
            RESERVATION_COLUMNS
        ))
        .bind(payment_intent_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
