use crate::payments::error::PaymentResult;
use crate::payments::types::{AuthorizationRequest, CreatedAuthorization, ProviderEvent};
use async_trait::async_trait;

/// Seam between the orchestration layer and the payment provider.
///
/// Implementations are constructed once at startup and injected; nothing
/// in the crate reaches for a process-wide provider client.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment authorization carrying the request metadata.
    /// Returns the provider's opaque id and the client secret the payer
    /// uses to complete payment.
    async fn create_authorization(
        &self,
        request: AuthorizationRequest,
    ) -> PaymentResult<CreatedAuthorization>;

    /// Verify an inbound callback against the shared webhook secret and
    /// parse it once verified. The raw body must be passed exactly as
    /// received; any re-serialization breaks the signature.
    fn verify_callback(&self, payload: &[u8], signature_header: &str)
        -> PaymentResult<ProviderEvent>;

    fn name(&self) -> &'static str;
}
