//! Stripe Charge Gateway
//!
//! Creates charges through the Stripe Charges API with the card token
//! collected by the checkout widget. Card-error class failures are mapped to
//! [`ChargeAttempt::Declined`]; everything else is a hard gateway error with
//! no local side effects.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stripe::{Charge, ChargeSourceParams, Client, CreateCharge, Currency, ErrorType, StripeError};

use super::{ChargeAttempt, ChargeRecord, ChargeRequest, PaymentGateway, INTENTION_METADATA_KEY};
use crate::error::{PaymentError, Result};

/// Stripe gateway
pub struct StripeGateway {
    client: Client,
    timeout: Duration,
}

impl StripeGateway {
    /// Create a gateway from a secret key and charge deadline
    pub fn new(secret_key: &str, timeout: Duration) -> Self {
        Self {
            client: Client::new(secret_key),
            timeout,
        }
    }

    fn build_params<'a>(&self, request: &'a ChargeRequest) -> Result<CreateCharge<'a>> {
        let currency = request
            .currency
            .to_lowercase()
            .parse::<Currency>()
            .map_err(|e| PaymentError::Gateway(format!("unsupported currency: {e}")))?;
        let token = request
            .token
            .parse()
            .map_err(|e| PaymentError::Gateway(format!("malformed card token: {e}")))?;

        let mut metadata = HashMap::new();
        metadata.insert(
            INTENTION_METADATA_KEY.to_string(),
            request.intention_id.to_string(),
        );

        let mut params = CreateCharge::new();
        params.amount = Some(request.amount_minor);
        params.currency = Some(currency);
        params.source = Some(ChargeSourceParams::Token(token));
        params.description = Some(&request.description);
        params.metadata = Some(metadata);

        Ok(params)
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<ChargeAttempt> {
        let params = self.build_params(request)?;

        let charge = tokio::time::timeout(self.timeout, Charge::create(&self.client, params))
            .await
            .map_err(|_| PaymentError::GatewayTimeout(self.timeout))?;

        match charge {
            Ok(charge) => Ok(ChargeAttempt::Created(ChargeRecord {
                id: charge.id.to_string(),
                created: DateTime::from_timestamp(charge.created, 0).unwrap_or_else(Utc::now),
            })),
            Err(StripeError::Stripe(request_error))
                if matches!(request_error.error_type, ErrorType::Card) =>
            {
                Ok(ChargeAttempt::Declined {
                    reason: request_error
                        .message
                        .clone()
                        .unwrap_or_else(|| "Your card was declined.".into()),
                })
            }
            Err(other) => Err(PaymentError::Gateway(other.to_string())),
        }
    }

    fn name(&self) -> &str {
        "stripe"
    }
}
