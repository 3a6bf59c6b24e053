use crate::payments::error::{PaymentError, PaymentResult};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use std::time::Duration;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// HTTP client for provider API calls with timeout and bounded retry.
#[derive(Clone)]
pub struct PaymentHttpClient {
    client: Client,
    timeout: Duration,
    max_retries: u32,
}

impl PaymentHttpClient {
    pub fn new(timeout: Duration, max_retries: u32) -> PaymentResult<Self> {
        let client =
            Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| PaymentError::NetworkError {
                    message: format!("failed to initialize HTTP client: {}", e),
                })?;

        Ok(Self {
            client,
            timeout,
            max_retries,
        })
    }

    /// POST a form-encoded body and decode the JSON response. The provider
    /// API is form-in, JSON-out.
    pub async fn post_form<T: DeserializeOwned>(
        &self,
        url: &str,
        bearer_token: &str,
        form: &[(String, String)],
    ) -> PaymentResult<T> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            let request = self
                .client
                .post(url)
                .timeout(self.timeout)
                .bearer_auth(bearer_token)
                .form(form);

            let response = request
                .send()
                .await
                .map_err(|e| PaymentError::NetworkError {
                    message: format!("provider request failed: {}", e),
                });

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    if status.is_success() {
                        return serde_json::from_str::<T>(&text).map_err(|e| {
                            PaymentError::ProviderError {
                                provider: "http".to_string(),
                                message: format!("invalid provider JSON response: {}", e),
                                provider_code: None,
                                retryable: false,
                            }
                        });
                    }

                    if status.as_u16() == 429 {
                        if attempt < self.max_retries {
                            tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                            continue;
                        }
                        return Err(PaymentError::RateLimitError {
                            message: "provider rate limit exceeded".to_string(),
                            retry_after_seconds: None,
                        });
                    }

                    if status.is_server_error() && attempt < self.max_retries {
                        warn!(
                            status = %status,
                            attempt = attempt + 1,
                            "provider server error, retrying"
                        );
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }

                    return Err(PaymentError::ProviderError {
                        provider: "http".to_string(),
                        message: format!("HTTP {}: {}", status, text),
                        provider_code: Some(status.as_u16().to_string()),
                        retryable: status.is_server_error(),
                    });
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(PaymentError::NetworkError {
            message: "provider request failed".to_string(),
        }))
    }
}

/// Constant-time byte comparison. Never short-circuits on the first
/// mismatching byte.
pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// A parsed `t=<unix>,v1=<hex>` signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<String>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> PaymentResult<Self> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let mut kv = part.trim().splitn(2, '=');
            match (kv.next(), kv.next()) {
                (Some("t"), Some(value)) => {
                    timestamp =
                        Some(value.parse::<i64>().map_err(|_| {
                            PaymentError::InvalidSignature {
                                message: "signature header timestamp is not an integer"
                                    .to_string(),
                            }
                        })?);
                }
                (Some("v1"), Some(value)) => signatures.push(value.to_string()),
                // Unknown scheme versions are ignored, matching provider docs.
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| PaymentError::InvalidSignature {
            message: "signature header is missing a timestamp".to_string(),
        })?;
        if signatures.is_empty() {
            return Err(PaymentError::InvalidSignature {
                message: "signature header carries no v1 signature".to_string(),
            });
        }

        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

/// Verify a provider callback signature over `"{t}.{body}"` with
/// HMAC-SHA256, rejecting timestamps outside the tolerance window.
/// `now` is the current unix time, passed in so the window is testable.
pub fn verify_signature_header(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> PaymentResult<()> {
    let parsed = SignatureHeader::parse(header)?;

    if (now - parsed.timestamp).abs() > tolerance_secs {
        return Err(PaymentError::InvalidSignature {
            message: "signature timestamp outside tolerance window".to_string(),
        });
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| {
        PaymentError::InvalidSignature {
            message: "invalid webhook secret".to_string(),
        }
    })?;
    mac.update(parsed.timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    let matched = parsed
        .signatures
        .iter()
        .any(|sig| secure_eq(expected.as_bytes(), sig.trim().as_bytes()));
    if !matched {
        return Err(PaymentError::InvalidSignature {
            message: "signature does not match payload".to_string(),
        });
    }

    Ok(())
}

/// Compute a valid signature header for a payload. Used by tests and by
/// local tooling that replays callbacks against a dev server.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    )
}
