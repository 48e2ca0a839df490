//! Charge Gateway
//!
//! Abstraction over the payment processor's charge-creation API, so the
//! checkout flow and tests run against a mock while production talks to
//! Stripe.

mod mock;
mod stripe;

pub use mock::MockGateway;
pub use stripe::StripeGateway;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;

/// Metadata key carrying the intention id on a charge
pub const INTENTION_METADATA_KEY: &str = "intention_id";

/// A charge-creation request
#[derive(Clone, Debug)]
pub struct ChargeRequest {
    /// Amount in minor currency units (cents)
    pub amount_minor: i64,

    /// ISO currency code, lowercase
    pub currency: String,

    /// Client-side payment token from the checkout widget
    pub token: String,

    /// Human-readable charge description
    pub description: String,

    /// Intention to embed as opaque metadata for webhook correlation
    pub intention_id: Uuid,
}

/// The processor-side charge record
#[derive(Clone, Debug)]
pub struct ChargeRecord {
    /// Processor-issued charge id
    pub id: String,
    pub created: DateTime<Utc>,
}

/// Outcome of a charge-creation call
///
/// Declines are data, not errors: transport and API failures propagate as
/// `Err`, a card decline comes back as `Declined` with the processor's
/// user-facing reason.
#[derive(Clone, Debug)]
pub enum ChargeAttempt {
    Created(ChargeRecord),
    Declined { reason: String },
}

/// Payment gateway trait
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a charge at the processor
    async fn create_charge(&self, request: &ChargeRequest) -> Result<ChargeAttempt>;

    /// Gateway name, recorded on intentions and whitelisted by the
    /// notification validator
    fn name(&self) -> &str;
}
