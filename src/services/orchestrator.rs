use crate::auth::CallerIdentity;
use crate::database::wallet_repository::WalletStore;
use crate::error::{AppError, AppResult};
use crate::payments::provider::PaymentGateway;
use crate::payments::types::{
    AuthorizationRequest, CreatedAuthorization, PaymentKind, PaymentMetadata,
};
use crate::services::notification::AccessTicketSender;
use crate::services::reservation::ReservationWriter;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Lifecycle of a payment authorization as seen from this service.
/// Used for structured logging; persistence-side idempotency (not this
/// state) is what suppresses duplicate RESERVATION_RECORDED transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Created,
    CreationFailed,
    ProviderSucceeded,
    SignatureRejected,
    ReservationRecorded,
    Notified,
}

impl FlowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowState::Created => "created",
            FlowState::CreationFailed => "creation_failed",
            FlowState::ProviderSucceeded => "provider_succeeded",
            FlowState::SignatureRejected => "signature_rejected",
            FlowState::ReservationRecorded => "reservation_recorded",
            FlowState::Notified => "notified",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Reservations must be strictly positive and at most this amount.
    pub reservation_max_amount: Decimal,
    /// Wallet top-ups are bounded inclusively.
    pub topup_min_amount: Decimal,
    pub topup_max_amount: Decimal,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            reservation_max_amount: Decimal::from(100),
            topup_min_amount: Decimal::from(5),
            topup_max_amount: Decimal::from(100),
        }
    }
}

/// Validated synchronous request to start a reservation payment.
/// Payer identity is not part of this struct; it always comes from the
/// verified credential.
#[derive(Debug, Clone)]
pub struct ReservationPaymentRequest {
    pub amount: Decimal,
    pub toilet_id: String,
    pub establishment_id: String,
    pub establishment_name: String,
    pub establishment_address: String,
}

/// Business outcome of a verified webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    ReservationRecorded {
        reservation_id: Uuid,
        confirmation_code: String,
        notified: bool,
    },
    ReservationAlreadyRecorded {
        reservation_id: Uuid,
    },
    WalletCredited {
        user_id: String,
        balance: Decimal,
    },
    WalletAlreadyCredited {
        user_id: String,
    },
    Ignored {
        event_type: String,
    },
}

/// Ties gateway, reservation writer, wallet store and notifier together
/// behind the two HTTP entry points. All collaborators are injected at
/// startup; the orchestrator holds no mutable state.
pub struct PaymentOrchestrator {
    gateway: Arc<dyn PaymentGateway>,
    reservation_writer: ReservationWriter,
    wallet: Arc<dyn WalletStore>,
    notifier: Arc<dyn AccessTicketSender>,
    config: OrchestratorConfig,
}

impl PaymentOrchestrator {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        reservation_writer: ReservationWriter,
        wallet: Arc<dyn WalletStore>,
        notifier: Arc<dyn AccessTicketSender>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            gateway,
            reservation_writer,
            wallet,
            notifier,
            config,
        }
    }

    /// Synchronous path: create a reservation payment authorization for
    /// an authenticated caller.
    pub async fn create_reservation_payment(
        &self,
        caller: &CallerIdentity,
        request: ReservationPaymentRequest,
    ) -> AppResult<CreatedAuthorization> {
        Self::require_field("toiletId", &request.toilet_id)?;
        Self::require_field("establishmentId", &request.establishment_id)?;
        Self::require_field("establishmentName", &request.establishment_name)?;
        Self::require_field("establishmentAddress", &request.establishment_address)?;

        if request.amount <= Decimal::ZERO || request.amount > self.config.reservation_max_amount {
            return Err(AppError::invalid_argument(
                format!(
                    "amount must be greater than 0 and at most {}",
                    self.config.reservation_max_amount
                ),
                Some("amount"),
            ));
        }

        let metadata = PaymentMetadata::for_reservation(
            caller.user_id.clone(),
            caller.email.clone(),
            caller.name.clone(),
            request.toilet_id.clone(),
            request.establishment_id.clone(),
            request.establishment_name.clone(),
            request.establishment_address.clone(),
        );

        self.create_authorization(request.amount, metadata).await
    }

    /// Synchronous path: create a wallet top-up authorization.
    pub async fn create_topup_payment(
        &self,
        caller: &CallerIdentity,
        amount: Decimal,
    ) -> AppResult<CreatedAuthorization> {
        if amount < self.config.topup_min_amount || amount > self.config.topup_max_amount {
            return Err(AppError::invalid_argument(
                format!(
                    "amount must be between {} and {}",
                    self.config.topup_min_amount, self.config.topup_max_amount
                ),
                Some("amount"),
            ));
        }

        let metadata = PaymentMetadata::for_wallet_topup(
            caller.user_id.clone(),
            caller.email.clone(),
            caller.name.clone(),
        );

        self.create_authorization(amount, metadata).await
    }

    async fn create_authorization(
        &self,
        amount: Decimal,
        metadata: PaymentMetadata,
    ) -> AppResult<CreatedAuthorization> {
        match self
            .gateway
            .create_authorization(AuthorizationRequest { amount, metadata })
            .await
        {
            Ok(created) => {
                info!(
                    authorization_id = %created.authorization_id,
                    state = FlowState::Created.as_str(),
                    "payment authorization created"
                );
                Ok(created)
            }
            Err(e) => {
                error!(
                    error = %e,
                    state = FlowState::CreationFailed.as_str(),
                    "payment authorization creation failed"
                );
                Err(e.into())
            }
        }
    }

    /// Asynchronous path: verify and process a provider callback.
    ///
    /// The raw body must be exactly as received. Signature failures map
    /// to `InvalidSignature` (never acknowledged as processed);
    /// persistence failures propagate so the HTTP layer returns non-200
    /// and the provider redelivers.
    pub async fn handle_callback(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> AppResult<WebhookOutcome> {
        let event = match self.gateway.verify_callback(payload, signature_header) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    error = %e,
                    state = FlowState::SignatureRejected.as_str(),
                    "webhook rejected"
                );
                return Err(e.into());
            }
        };

        if !event.is_payment_succeeded() {
            info!(event_type = %event.event_type, "ignoring non-payment event");
            return Ok(WebhookOutcome::Ignored {
                event_type: event.event_type,
            });
        }

        let payment = event.payment.ok_or_else(|| AppError::MalformedPayload {
            message: "succeeded event carries no payment object".to_string(),
        })?;

        info!(
            authorization_id = %payment.authorization_id,
            event_id = %event.event_id,
            state = FlowState::ProviderSucceeded.as_str(),
            "payment succeeded callback verified"
        );

        let metadata = PaymentMetadata::from_string_map(&payment.metadata)
            .map_err(AppError::from)?;

        match metadata.kind {
            PaymentKind::Reservation => {
                let write = self.reservation_writer.record_reservation(&payment).await?;

                if !write.created {
                    return Ok(WebhookOutcome::ReservationAlreadyRecorded {
                        reservation_id: write.reservation.id,
                    });
                }

                info!(
                    reservation_id = %write.reservation.id,
                    state = FlowState::ReservationRecorded.as_str(),
                    "reservation recorded"
                );

                // Best effort: the reservation is the source of truth, a
                // failed email never rolls it back or fails the webhook.
                let notified = match self.notifier.send_access_ticket(&write.reservation).await {
                    Ok(()) => {
                        info!(
                            reservation_id = %write.reservation.id,
                            state = FlowState::Notified.as_str(),
                            "access ticket dispatched"
                        );
                        true
                    }
                    Err(e) => {
                        error!(
                            reservation_id = %write.reservation.id,
                            error = %e,
                            "access ticket email failed"
                        );
                        false
                    }
                };

                Ok(WebhookOutcome::ReservationRecorded {
                    reservation_id: write.reservation.id,
                    confirmation_code: write.reservation.confirmation_code.clone(),
                    notified,
                })
            }
            PaymentKind::WalletTopup => {
                let credit = self
                    .wallet
                    .credit_topup(&payment.authorization_id, &metadata.user_id, payment.amount())
                    .await?;

                if credit.credited {
                    info!(
                        user_id = %metadata.user_id,
                        balance = %credit.balance,
                        "wallet credited"
                    );
                    Ok(WebhookOutcome::WalletCredited {
                        user_id: metadata.user_id,
                        balance: credit.balance,
                    })
                } else {
                    info!(
                        user_id = %metadata.user_id,
                        "duplicate top-up event, wallet already credited"
                    );
                    Ok(WebhookOutcome::WalletAlreadyCredited {
                        user_id: metadata.user_id,
                    })
                }
            }
        }
    }

    fn require_field(name: &str, value: &str) -> AppResult<()> {
        if value.trim().is_empty() {
            return Err(AppError::invalid_argument(
                format!("required field '{}' is missing", name),
                Some(name),
            ));
        }
        Ok(())
    }
}
