//! Payment flow tests at the orchestrator boundary: synchronous
//! authorization creation and verified callback processing.

mod common;

use common::*;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::atomic::Ordering;

use toiletpass_backend::auth::CallerIdentity;
use toiletpass_backend::database::reservation_repository::ReservationStore;
use toiletpass_backend::database::wallet_repository::WalletStore;
use toiletpass_backend::error::AppError;
use toiletpass_backend::payments::utils::sign_payload;
use toiletpass_backend::services::orchestrator::{ReservationPaymentRequest, WebhookOutcome};

fn caller() -> CallerIdentity {
    CallerIdentity {
        user_id: "user-1".to_string(),
        email: "user@example.com".to_string(),
        name: Some("Alex".to_string()),
    }
}

fn reservation_request(amount: &str) -> ReservationPaymentRequest {
    ReservationPaymentRequest {
        amount: amount.parse().unwrap(),
        toilet_id: "T1".to_string(),
        establishment_id: "E1".to_string(),
        establishment_name: "Cafe Central".to_string(),
        establishment_address: "1 Rue de la Paix".to_string(),
    }
}

#[tokio::test]
async fn reservation_payment_creation_returns_client_secret() {
    let h = harness();
    let created = h
        .orchestrator
        .create_reservation_payment(&caller(), reservation_request("2.5"))
        .await
        .unwrap();

    assert_eq!(created.client_secret, "pi_test_1_secret_abc");
    assert_eq!(h.gateway.create_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        *h.gateway.last_amount.lock().unwrap(),
        Some("2.5".parse().unwrap())
    );
}

#[tokio::test]
async fn reservation_payment_rejects_missing_fields() {
    let h = harness();
    let mut request = reservation_request("2.5");
    request.toilet_id = "  ".to_string();

    let err = h
        .orchestrator
        .create_reservation_payment(&caller(), request)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidArgument { .. }));
    assert_eq!(h.gateway.create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn reservation_amount_above_cap_is_rejected() {
    let h = harness();
    let err = h
        .orchestrator
        .create_reservation_payment(&caller(), reservation_request("100.01"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidArgument { .. }));
    assert_eq!(h.gateway.create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn topup_below_minimum_never_reaches_the_provider() {
    let h = harness();
    let err = h
        .orchestrator
        .create_topup_payment(&caller(), "4.99".parse().unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidArgument { .. }));
    assert_eq!(h.gateway.create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn topup_bounds_are_inclusive() {
    let h = harness();
    h.orchestrator
        .create_topup_payment(&caller(), Decimal::from(5))
        .await
        .unwrap();
    h.orchestrator
        .create_topup_payment(&caller(), Decimal::from(100))
        .await
        .unwrap();
    assert!(h
        .orchestrator
        .create_topup_payment(&caller(), "100.01".parse().unwrap())
        .await
        .is_err());
}

#[tokio::test]
async fn verified_callback_records_reservation_and_notifies() {
    let h = harness();
    let body = succeeded_event("pi_abc", 250, reservation_metadata());

    let outcome = h
        .orchestrator
        .handle_callback(&body, &signed(&body))
        .await
        .unwrap();

    let confirmation_code = match outcome {
        WebhookOutcome::ReservationRecorded {
            confirmation_code,
            notified,
            ..
        } => {
            assert!(notified);
            confirmation_code
        }
        other => panic!("unexpected outcome: {:?}", other),
    };

    assert_eq!(confirmation_code.len(), 6);

    let stored = h
        .store
        .find_by_payment_intent("pi_abc")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.amount, "2.50".parse::<Decimal>().unwrap());
    assert_eq!(stored.status, "validated");
    assert_eq!(stored.qr_code, format!("T1-{}", confirmation_code));
    assert_eq!(stored.user_name, "Alex");
    assert_eq!(h.notifier.sends.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_user_name_defaults_in_the_stored_reservation() {
    let h = harness();
    let metadata = json!({
        "type": "reservation",
        "userId": "user-2",
        "userEmail": "other@example.com",
        "toiletId": "T2",
        "establishmentId": "E2",
        "establishmentName": "Bar",
        "establishmentAddress": "2 Main St"
    });
    let body = succeeded_event("pi_anon", 250, metadata);

    h.orchestrator
        .handle_callback(&body, &signed(&body))
        .await
        .unwrap();

    let stored = h
        .store
        .find_by_payment_intent("pi_anon")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.user_name, "Utilisateur");
}

#[tokio::test]
async fn replayed_callback_does_not_duplicate_the_reservation() {
    let h = harness();
    let body = succeeded_event("pi_dup", 250, reservation_metadata());

    let first = h
        .orchestrator
        .handle_callback(&body, &signed(&body))
        .await
        .unwrap();
    let first_id = match first {
        WebhookOutcome::ReservationRecorded { reservation_id, .. } => reservation_id,
        other => panic!("unexpected outcome: {:?}", other),
    };

    let second = h
        .orchestrator
        .handle_callback(&body, &signed(&body))
        .await
        .unwrap();
    match second {
        WebhookOutcome::ReservationAlreadyRecorded { reservation_id } => {
            assert_eq!(reservation_id, first_id)
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    // Only the first delivery sends the ticket.
    assert_eq!(h.notifier.sends.load(Ordering::SeqCst), 1);
    assert_eq!(h.store.rows.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn unverifiable_callback_persists_nothing() {
    let h = harness();
    let body = succeeded_event("pi_bad", 250, reservation_metadata());
    let header = sign_payload(&body, "whsec_wrong", chrono::Utc::now().timestamp());

    let err = h
        .orchestrator
        .handle_callback(&body, &header)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidSignature { .. }));
    assert!(h.store.rows.lock().unwrap().is_empty());
    assert_eq!(h.notifier.sends.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn email_failure_keeps_the_reservation() {
    let h = harness();
    h.notifier.fail.store(true, Ordering::SeqCst);
    let body = succeeded_event("pi_mail", 250, reservation_metadata());

    let outcome = h
        .orchestrator
        .handle_callback(&body, &signed(&body))
        .await
        .unwrap();

    match outcome {
        WebhookOutcome::ReservationRecorded { notified, .. } => assert!(!notified),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(h
        .store
        .find_by_payment_intent("pi_mail")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn non_success_events_are_acknowledged_without_side_effects() {
    let h = harness();
    let body = serde_json::to_vec(&json!({
        "id": "evt_created",
        "type": "payment_intent.created",
        "data": { "object": { "id": "pi_new", "amount": 250, "currency": "eur" } }
    }))
    .unwrap();

    let outcome = h
        .orchestrator
        .handle_callback(&body, &signed(&body))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        WebhookOutcome::Ignored {
            event_type: "payment_intent.created".to_string()
        }
    );
    assert!(h.store.rows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn wallet_topup_callback_credits_once() {
    let h = harness();
    let metadata = json!({
        "type": "wallet_topup",
        "userId": "user-1",
        "userEmail": "user@example.com"
    });
    let body = succeeded_event("pi_topup", 1000, metadata);

    let first = h
        .orchestrator
        .handle_callback(&body, &signed(&body))
        .await
        .unwrap();
    assert_eq!(
        first,
        WebhookOutcome::WalletCredited {
            user_id: "user-1".to_string(),
            balance: Decimal::from(10),
        }
    );

    let second = h
        .orchestrator
        .handle_callback(&body, &signed(&body))
        .await
        .unwrap();
    assert_eq!(
        second,
        WebhookOutcome::WalletAlreadyCredited {
            user_id: "user-1".to_string()
        }
    );

    assert_eq!(
        h.wallet.balance_of("user-1").await.unwrap(),
        Decimal::from(10)
    );
}

#[tokio::test]
async fn successive_topups_accumulate() {
    let h = harness();
    let metadata = json!({
        "type": "wallet_topup",
        "userId": "user-9",
        "userEmail": "nine@example.com"
    });

    for (intent, minor) in [("pi_t1", 500_i64), ("pi_t2", 2550_i64)] {
        let body = succeeded_event(intent, minor, metadata.clone());
        h.orchestrator
            .handle_callback(&body, &signed(&body))
            .await
            .unwrap();
    }

    assert_eq!(
        h.wallet.balance_of("user-9").await.unwrap(),
        "30.50".parse::<Decimal>().unwrap()
    );
}
