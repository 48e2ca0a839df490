//! Payment Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
///
/// Card declines are not errors — they are recovered into
/// [`crate::checkout::CheckoutOutcome::Declined`] by the checkout flow.
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Missing or unusable gateway credentials
    #[error("Configuration error: {0}")]
    Config(String),

    /// Checkout submitted without a payment token
    #[error("Missing payment token")]
    MissingToken,

    /// Processor transport or API failure (not a card decline)
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Charge creation exceeded its deadline
    #[error("Gateway timed out after {0:?}")]
    GatewayTimeout(std::time::Duration),

    /// Intention not found
    #[error("Intention not found: {0}")]
    IntentionNotFound(String),

    /// Attempt to overwrite an intention's charge id
    #[error("Intention {id} already bound to charge {existing}")]
    IntentionConflict { id: String, existing: String },

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Payload serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PaymentError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentError::Gateway(_) | PaymentError::GatewayTimeout(_) | PaymentError::Storage(_)
        )
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            PaymentError::Config(_) => "Payments are not configured for this project.",
            PaymentError::MissingToken => "Invalid transaction data. Please try again.",
            PaymentError::Gateway(_) | PaymentError::GatewayTimeout(_) => {
                "Payment processing failed. Please try again."
            }
            _ => "An error occurred processing your request.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(PaymentError::Gateway("boom".into()).is_retryable());
        assert!(!PaymentError::MissingToken.is_retryable());
    }
}
