use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentGateway;
use crate::payments::types::{
    to_minor_units, AuthorizationRequest, CreatedAuthorization, PaymentObject, ProviderEvent,
};
use crate::payments::utils::{verify_signature_header, PaymentHttpClient};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub currency: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub signature_tolerance_secs: i64,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            webhook_secret: String::new(),
            currency: "eur".to_string(),
            base_url: "https://api.stripe.com".to_string(),
            timeout_secs: 30,
            max_retries: 3,
            signature_tolerance_secs: 300,
        }
    }
}

impl StripeConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let secret_key =
            std::env::var("STRIPE_SECRET_KEY").map_err(|_| PaymentError::ValidationError {
                message: "STRIPE_SECRET_KEY environment variable is required".to_string(),
                field: Some("STRIPE_SECRET_KEY".to_string()),
            })?;
        let webhook_secret =
            std::env::var("STRIPE_WEBHOOK_SECRET").map_err(|_| PaymentError::ValidationError {
                message: "STRIPE_WEBHOOK_SECRET environment variable is required".to_string(),
                field: Some("STRIPE_WEBHOOK_SECRET".to_string()),
            })?;

        Ok(Self {
            currency: std::env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "eur".to_string()),
            base_url: std::env::var("STRIPE_BASE_URL")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            timeout_secs: std::env::var("STRIPE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
            max_retries: std::env::var("STRIPE_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(3),
            signature_tolerance_secs: std::env::var("STRIPE_SIGNATURE_TOLERANCE_SECS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(300),
            secret_key,
            webhook_secret,
        })
    }
}

pub struct StripeGateway {
    config: StripeConfig,
    http: PaymentHttpClient,
}

impl StripeGateway {
    pub fn new(config: StripeConfig) -> PaymentResult<Self> {
        let http =
            PaymentHttpClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(StripeConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_authorization(
        &self,
        request: AuthorizationRequest,
    ) -> PaymentResult<CreatedAuthorization> {
        if request.amount <= Decimal::ZERO {
            return Err(PaymentError::ValidationError {
                message: "amount must be greater than zero".to_string(),
                field: Some("amount".to_string()),
            });
        }
        let amount_minor = to_minor_units(request.amount)?;

        let mut form: Vec<(String, String)> = vec![
            ("amount".to_string(), amount_minor.to_string()),
            ("currency".to_string(), self.config.currency.clone()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        for (key, value) in request.metadata.to_string_map() {
            form.push((format!("metadata[{}]", key), value));
        }

        let intent: StripePaymentIntent = self
            .http
            .post_form(
                &self.endpoint("/v1/payment_intents"),
                &self.config.secret_key,
                &form,
            )
            .await?;

        let client_secret = intent
            .client_secret
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PaymentError::ProviderError {
                provider: "stripe".to_string(),
                message: "payment intent response is missing client_secret".to_string(),
                provider_code: None,
                retryable: false,
            })?;

        info!(
            authorization_id = %intent.id,
            amount_minor,
            currency = %self.config.currency,
            "payment authorization created"
        );

        Ok(CreatedAuthorization {
            authorization_id: intent.id,
            client_secret,
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
            &self.config.webhook_secret,
            self.config.signature_tolerance_secs,
            chrono::Utc::now().timestamp(),
        )?;

        parse_event(payload)
    }

    fn name(&self) -> &'static str {
        "stripe"
    }
}

/// Parse a verified callback body into a [`ProviderEvent`].
///
/// Only the payment-intent object shape is decoded; events carrying other
/// object types keep `payment: None` and are acknowledged upstream without
/// side effects.
pub fn parse_event(payload: &[u8]) -> PaymentResult<ProviderEvent> {
    let event: StripeEvent =
        serde_json::from_slice(payload).map_err(|e| PaymentError::MalformedPayload {
            message: format!("callback body is not a valid event: {}", e),
        })?;

    let payment = serde_json::from_value::<StripePaymentIntent>(event.data.object)
        .ok()
        .and_then(|intent| {
            intent.amount.map(|amount_minor| PaymentObject {
                authorization_id: intent.id,
                amount_minor,
                currency: intent.currency.unwrap_or_default(),
                metadata: intent.metadata,
            })
        });

    Ok(ProviderEvent {
        event_id: event.id,
        event_type: event.event_type,
        payment,
    })
}

#[derive(Debug, Deserialize)]
struct StripeEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct StripePaymentIntent {
    id: String,
    amount: Option<i64>,
    currency: Option<String>,
    client_secret: Option<String>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}
