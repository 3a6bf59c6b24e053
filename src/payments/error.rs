use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    #[error("Unauthenticated: {message}")]
    Unauthenticated { message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimitError {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    #[error("Webhook signature verification failed: {message}")]
    InvalidSignature { message: String },

    #[error("Malformed webhook payload: {message}")]
    MalformedPayload { message: String },

    #[error("Provider error: provider={provider}, message={message}")]
    ProviderError {
        provider: String,
        message: String,
        provider_code: Option<String>,
        retryable: bool,
    },
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::ValidationError { .. } => false,
            PaymentError::Unauthenticated { .. } => false,
            PaymentError::NetworkError { .. } => true,
            PaymentError::RateLimitError { .. } => true,
            PaymentError::InvalidSignature { .. } => false,
            PaymentError::MalformedPayload { .. } => false,
            PaymentError::ProviderError { retryable, .. } => *retryable,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            PaymentError::ValidationError { .. } => 400,
            PaymentError::Unauthenticated { .. } => 401,
            PaymentError::NetworkError { .. } => 502,
            PaymentError::RateLimitError { .. } => 429,
            PaymentError::InvalidSignature { .. } => 400,
            PaymentError::MalformedPayload { .. } => 400,
            PaymentError::ProviderError { .. } => 502,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            PaymentError::ValidationError { message, .. } => message.clone(),
            PaymentError::Unauthenticated { .. } => "Authentication required".to_string(),
            PaymentError::NetworkError { .. } => {
                "Payment provider is temporarily unavailable".to_string()
            }
            PaymentError::RateLimitError { .. } => {
                "Too many requests to payment provider. Please retry shortly".to_string()
            }
            PaymentError::InvalidSignature { .. } => "Invalid webhook signature".to_string(),
            PaymentError::MalformedPayload { .. } => "Malformed webhook payload".to_string(),
            PaymentError::ProviderError { .. } => "Payment provider returned an error".to_string(),
        }
    }
}
