//! Mock Charge Gateway
//!
//! For testing and sandbox demos. Behavior is driven by the token prefix,
//! so tests can exercise every checkout path without network access.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use super::{ChargeAttempt, ChargeRecord, ChargeRequest, PaymentGateway};
use crate::error::{PaymentError, Result};

/// Mock gateway with token-driven outcomes
///
/// - `tok_declined*` — card decline with a fixed reason
/// - `tok_error*` — hard gateway failure
/// - anything else — charge created with a sequential `ch_N` id
pub struct MockGateway {
    counter: AtomicU64,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<ChargeAttempt> {
        if request.token.starts_with("tok_declined") {
            return Ok(ChargeAttempt::Declined {
                reason: "Your card was declined.".into(),
            });
        }
        if request.token.starts_with("tok_error") {
            return Err(PaymentError::Gateway("connection reset by peer".into()));
        }

        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        Ok(ChargeAttempt::Created(ChargeRecord {
            id: format!("ch_{n}"),
            created: Utc::now(),
        }))
    }

    fn name(&self) -> &str {
        "stripe"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn request(token: &str) -> ChargeRequest {
        ChargeRequest {
            amount_minor: 5000,
            currency: "usd".into(),
            token: token.into(),
            description: "Investing in Test Project".into(),
            intention_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn test_token_driven_outcomes() {
        let gateway = MockGateway::new();

        let ok = gateway.create_charge(&request("tok_ok")).await.unwrap();
        assert!(matches!(ok, ChargeAttempt::Created(ref c) if c.id == "ch_1"));

        let declined = gateway
            .create_charge(&request("tok_declined_insufficient"))
            .await
            .unwrap();
        assert!(matches!(declined, ChargeAttempt::Declined { .. }));

        assert!(gateway.create_charge(&request("tok_error")).await.is_err());
    }
}
