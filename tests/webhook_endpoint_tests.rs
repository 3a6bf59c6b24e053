//! HTTP-level webhook endpoint tests: status codes and response bodies
//! as the payment provider sees them.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::post;
use axum::Router;
use common::*;
use tower::ServiceExt;

use toiletpass_backend::api::webhooks::{handle_webhook, WebhookState, SIGNATURE_HEADER};

fn app(h: &Harness) -> Router {
    Router::new()
        .route("/api/payments/webhook", post(handle_webhook))
        .with_state(WebhookState {
            orchestrator: h.orchestrator.clone(),
        })
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn valid_delivery_is_acknowledged_with_received_true() {
    let h = harness();
    let body = succeeded_event("pi_http", 250, reservation_metadata());
    let signature = signed(&body);

    let response = app(&h)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/payments/webhook")
                .header(SIGNATURE_HEADER, signature)
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body, serde_json::json!({"received": true}));
}

#[tokio::test]
async fn missing_signature_header_is_a_400() {
    let h = harness();
    let body = succeeded_event("pi_http", 250, reservation_metadata());

    let response = app(&h)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/payments/webhook")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response).await.starts_with("Webhook Error:"));
    assert!(h.store.rows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn bad_signature_is_a_400_with_plain_text_body() {
    let h = harness();
    let body = succeeded_event("pi_http", 250, reservation_metadata());
    let signature = toiletpass_backend::payments::utils::sign_payload(
        &body,
        "whsec_wrong",
        chrono::Utc::now().timestamp(),
    );

    let response = app(&h)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/payments/webhook")
                .header(SIGNATURE_HEADER, signature)
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response).await.starts_with("Webhook Error:"));
}

#[tokio::test]
async fn unparseable_body_with_valid_signature_is_a_400() {
    let h = harness();
    let body = b"not json at all".to_vec();
    let signature = signed(&body);

    let response = app(&h)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/payments/webhook")
                .header(SIGNATURE_HEADER, signature)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn redelivery_still_returns_200() {
    let h = harness();
    let body = succeeded_event("pi_redeliver", 250, reservation_metadata());

    for _ in 0..2 {
        let response = app(&h)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/payments/webhook")
                    .header(SIGNATURE_HEADER, signed(&body))
                    .header("content-type", "application/json")
                    .body(Body::from(body.clone()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(h.store.rows.lock().unwrap().len(), 1);
}
