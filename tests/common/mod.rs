//! In-memory collaborators shared by the integration tests. Signature
//! verification and event parsing run for real; HTTP edges and storage
//! are replaced.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use toiletpass_backend::auth::{AuthError, CallerIdentity, IdentityVerifier};
use toiletpass_backend::database::error::DatabaseError;
use toiletpass_backend::database::reservation_repository::{
    NewReservation, Reservation, ReservationStore, ReservationWrite,
};
use toiletpass_backend::database::wallet_repository::{TopUpCredit, WalletStore};
use toiletpass_backend::payments::error::PaymentResult;
use toiletpass_backend::payments::provider::PaymentGateway;
use toiletpass_backend::payments::providers::stripe::parse_event;
use toiletpass_backend::payments::types::{
    AuthorizationRequest, CreatedAuthorization, ProviderEvent,
};
use toiletpass_backend::payments::utils::{sign_payload, verify_signature_header};
use toiletpass_backend::services::notification::{AccessTicketSender, NotificationError};
use toiletpass_backend::services::orchestrator::{OrchestratorConfig, PaymentOrchestrator};
use toiletpass_backend::services::reservation::ReservationWriter;

pub const WEBHOOK_SECRET: &str = "whsec_test";

pub struct MockGateway {
    pub create_calls: AtomicUsize,
    pub last_amount: Mutex<Option<Decimal>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            create_calls: AtomicUsize::new(0),
            last_amount: Mutex::new(None),
        }
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_authorization(
        &self,
        request: AuthorizationRequest,
    ) -> PaymentResult<CreatedAuthorization> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_amount.lock().unwrap() = Some(request.amount);
        Ok(CreatedAuthorization {
            authorization_id: "pi_test_1".to_string(),
            client_secret: "pi_test_1_secret_abc".to_string(),
        })
    }

    fn verify_callback(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> PaymentResult<ProviderEvent> {
        verify_signature_header(
            payload,
            signature_header,
            WEBHOOK_SECRET,
            300,
            Utc::now().timestamp(),
        )?;
        parse_event(payload)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[derive(Default)]
pub struct InMemoryReservationStore {
    pub rows: Mutex<HashMap<String, Reservation>>,
}

#[async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn insert_once(&self, new: NewReservation) -> Result<ReservationWrite, DatabaseError> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(existing) = rows.get(&new.payment_intent_id) {
            return Ok(ReservationWrite {
                reservation: existing.clone(),
                created: false,
            });
        }

        let reservation = Reservation {
            id: Uuid::new_v4(),
            payment_intent_id: new.payment_intent_id.clone(),
            toilet_id: new.toilet_id,
            user_id: new.user_id,
            user_email: new.user_email,
            user_name: new.user_name,
            amount: new.amount,
            status: "validated".to_string(),
            confirmation_code: new.confirmation_code,
            qr_code: new.qr_code,
            establishment_id: new.establishment_id,
            establishment_name: new.establishment_name,
            establishment_address: new.establishment_address,
            payment_method: new.payment_method,
            slot_start: new.slot_start,
            slot_end: new.slot_end,
            created_at: Utc::now(),
        };
        rows.insert(new.payment_intent_id, reservation.clone());

        Ok(ReservationWrite {
            reservation,
            created: true,
        })
    }

    async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Reservation>, DatabaseError> {
        Ok(self.rows.lock().unwrap().get(payment_intent_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryWalletStore {
    pub state: Mutex<(HashSet<String>, HashMap<String, Decimal>)>,
}

#[async_trait]
impl WalletStore for InMemoryWalletStore {
    async fn credit_topup(
        &self,
        payment_intent_id: &str,
        user_id: &str,
        amount: Decimal,
    ) -> Result<TopUpCredit, DatabaseError> {
        let mut state = self.state.lock().unwrap();
        if !state.0.insert(payment_intent_id.to_string()) {
            let balance = state.1.get(user_id).copied().unwrap_or(Decimal::ZERO);
            return Ok(TopUpCredit {
                credited: false,
                balance,
            });
        }
        let balance = state.1.entry(user_id.to_string()).or_insert(Decimal::ZERO);
        *balance += amount;
        Ok(TopUpCredit {
            credited: true,
            balance: *balance,
        })
    }

    async fn balance_of(&self, user_id: &str) -> Result<Decimal, DatabaseError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .1
            .get(user_id)
            .copied()
            .unwrap_or(Decimal::ZERO))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sends: AtomicUsize,
    pub fail: AtomicBool,
}

#[async_trait]
impl AccessTicketSender for RecordingNotifier {
    async fn send_access_ticket(&self, _reservation: &Reservation) -> Result<(), NotificationError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotificationError::Transport("smtp unavailable".to_string()));
        }
        Ok(())
    }
}

/// Identity verifier that accepts any token unless told to reject.
#[derive(Default)]
pub struct MockVerifier {
    pub reject: AtomicBool,
}

#[async_trait]
impl IdentityVerifier for MockVerifier {
    async fn verify_bearer(&self, _token: &str) -> Result<CallerIdentity, AuthError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(AuthError::InvalidCredential);
        }
        Ok(CallerIdentity {
            user_id: "user-1".to_string(),
            email: "user@example.com".to_string(),
            name: Some("Alex".to_string()),
        })
    }
}

pub struct Harness {
    pub gateway: Arc<MockGateway>,
    pub store: Arc<InMemoryReservationStore>,
    pub wallet: Arc<InMemoryWalletStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub orchestrator: Arc<PaymentOrchestrator>,
}

pub fn harness() -> Harness {
    let gateway = Arc::new(MockGateway::new());
    let store = Arc::new(InMemoryReservationStore::default());
    let wallet = Arc::new(InMemoryWalletStore::default());
    let notifier = Arc::new(RecordingNotifier::default());

    let orchestrator = Arc::new(PaymentOrchestrator::new(
        gateway.clone(),
        ReservationWriter::new(store.clone()),
        wallet.clone(),
        notifier.clone(),
        OrchestratorConfig::default(),
    ));

    Harness {
        gateway,
        store,
        wallet,
        notifier,
        orchestrator,
    }
}

pub fn signed(body: &[u8]) -> String {
    sign_payload(body, WEBHOOK_SECRET, Utc::now().timestamp())
}

pub fn succeeded_event(intent_id: &str, amount_minor: i64, metadata: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": format!("evt_{}", intent_id),
        "type": "payment_intent.succeeded",
        "data": {
            "object": {
                "id": intent_id,
                "amount": amount_minor,
                "currency": "eur",
                "metadata": metadata
            }
        }
    }))
    .unwrap()
}

pub fn reservation_metadata() -> serde_json::Value {
    json!({
        "type": "reservation",
        "userId": "user-1",
        "userEmail": "user@example.com",
        "userName": "Alex",
        "toiletId": "T1",
        "establishmentId": "E1",
        "establishmentName": "Cafe Central",
        "establishmentAddress": "1 Rue de la Paix"
    })
}
