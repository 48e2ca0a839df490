//! Checkout Flow (Charge Initiator)
//!
//! Renders the checkout button description and exchanges the widget's card
//! token for a processor charge. The intention is created before the charge
//! call and bound to the returned charge id, so the asynchronous notification
//! can be correlated later.
//!
//! ```text
//! ┌──────────┐   token    ┌──────────────┐   charge    ┌──────────┐
//! │  Widget  │───────────▶│ CheckoutFlow │────────────▶│  Stripe  │
//! └──────────┘            │  intention   │◀── ch_id ───└──────────┘
//!                         └──────────────┘
//! ```

use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::{Branding, GatewayConfig, GatewayMode};
use crate::error::{PaymentError, Result};
use crate::gateway::{ChargeAttempt, ChargeRequest, PaymentGateway};
use crate::intention::{Backer, Intention, IntentionStore};
use crate::project::Project;

/// Form field name the checkout widget fills with the card token
pub const TOKEN_FIELD: &str = "stripeToken";

/// Fixed action token carried by the checkout form
pub const CHECKOUT_ACTION: &str = "payments.checkout";

/// The project reference a checkout acts on
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutProject {
    pub id: i64,
    pub title: String,
    pub slug: String,
    /// Pledged amount in major units
    pub amount: Decimal,
    pub currency_code: String,
}

impl CheckoutProject {
    /// Build a reference from a stored project and a pledged amount
    pub fn from_project(project: &Project, amount: Decimal) -> Self {
        Self {
            id: project.id,
            title: project.title.clone(),
            slug: project.slug.clone(),
            amount,
            currency_code: project.currency_code.clone(),
        }
    }
}

/// One checkout submission
#[derive(Clone, Debug)]
pub struct CheckoutContext {
    pub project: CheckoutProject,
    pub backer: Backer,
    pub reward_id: Option<i64>,
    /// Card token from the widget, absent when the form was tampered with
    pub token: Option<String>,
}

/// Result of a checkout submission
///
/// Declines are recovered into a structured result; transport and API
/// failures propagate as errors with no local side effects.
#[derive(Clone, Debug, Serialize)]
pub enum CheckoutOutcome {
    Success { redirect_url: String },
    Declined { redirect_url: String, message: String },
}

/// Checkout button description for the widget
#[derive(Clone, Debug, Serialize)]
pub enum CheckoutButton {
    Form(CheckoutForm),
    ConfigurationError { notice: String },
}

/// Everything the front end needs to render the checkout form
#[derive(Clone, Debug, Serialize)]
pub struct CheckoutForm {
    pub published_key: String,
    pub description: String,
    pub amount_minor: i64,
    pub currency: String,
    pub allow_remember_me: bool,
    pub zip_code: bool,
    pub project_id: i64,
    pub action: &'static str,
    pub payment_service: &'static str,
    pub token_field: &'static str,
    pub branding: Branding,
    pub additional_info: Option<String>,
    /// True in sandbox mode; the front end shows a test-mode notice
    pub sandbox_notice: bool,
}

/// Backing page for a project
pub fn backing_route(slug: &str) -> String {
    format!("/projects/{slug}/backing")
}

/// Backing page shown after a successful checkout
pub fn backing_share_route(slug: &str) -> String {
    format!("/projects/{slug}/backing/share")
}

fn amount_in_minor_units(amount: Decimal) -> Result<i64> {
    (amount.abs() * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| PaymentError::Gateway("amount out of range".into()))
}

fn charge_description(title: &str) -> String {
    format!("Investing in {title}")
}

/// The charge initiator
pub struct CheckoutFlow {
    gateway: Arc<dyn PaymentGateway>,
    intentions: Arc<dyn IntentionStore>,
    config: GatewayConfig,
}

impl CheckoutFlow {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        intentions: Arc<dyn IntentionStore>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            gateway,
            intentions,
            config,
        }
    }

    /// Describe the checkout button for a project
    ///
    /// Missing credentials produce a configuration notice instead of a form;
    /// nothing else can fail here.
    pub fn button(&self, project: &CheckoutProject) -> CheckoutButton {
        let keys = match self.config.require_keys() {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(project_id = project.id, error = %e, "Checkout button blocked");
                return CheckoutButton::ConfigurationError {
                    notice: e.user_message().to_string(),
                };
            }
        };

        let amount_minor = amount_in_minor_units(project.amount).unwrap_or(0);

        CheckoutButton::Form(CheckoutForm {
            published_key: keys.published.clone(),
            description: charge_description(&project.title),
            amount_minor,
            currency: project.currency_code.clone(),
            allow_remember_me: self.config.remember_me,
            zip_code: self.config.zip_code_required,
            project_id: project.id,
            action: CHECKOUT_ACTION,
            payment_service: "stripe",
            token_field: TOKEN_FIELD,
            branding: self.config.branding.clone(),
            additional_info: if self.config.display_info {
                self.config.branding.additional_info.clone()
            } else {
                None
            },
            sandbox_notice: self.config.mode == GatewayMode::Sandbox,
        })
    }

    /// Submit a checkout: one charge call, one intention mutation on success
    pub async fn submit(&self, context: &CheckoutContext) -> Result<CheckoutOutcome> {
        // Hard failures before any processor call
        self.config.require_keys()?;
        let token = context
            .token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(PaymentError::MissingToken)?;

        let project = &context.project;
        let mut intention =
            self.intentions
                .find_or_create(&context.backer, project.id, context.reward_id)?;

        // An intention already bound to a charge belongs to a previous
        // attempt whose notification is still in flight; each new attempt
        // gets its own intention so that notification can still correlate
        // and this charge can bind cleanly.
        if intention.charge_id.is_some() {
            let fresh = Intention::new(&context.backer, project.id, context.reward_id);
            self.intentions.save(&fresh)?;
            intention = fresh;
        }

        let request = ChargeRequest {
            amount_minor: amount_in_minor_units(project.amount)?,
            currency: project.currency_code.to_lowercase(),
            token: token.to_string(),
            description: charge_description(&project.title),
            intention_id: intention.id,
        };

        tracing::debug!(
            intention_id = %intention.id,
            project_id = project.id,
            amount_minor = request.amount_minor,
            "Creating charge"
        );

        match self.gateway.create_charge(&request).await? {
            ChargeAttempt::Created(charge) => {
                self.intentions
                    .attach_charge(intention.id, self.gateway.name(), &charge.id)?;

                tracing::info!(
                    intention_id = %intention.id,
                    charge_id = %charge.id,
                    "Charge created"
                );

                Ok(CheckoutOutcome::Success {
                    redirect_url: backing_share_route(&project.slug),
                })
            }
            ChargeAttempt::Declined { reason } => {
                tracing::info!(
                    intention_id = %intention.id,
                    project_id = project.id,
                    reason = %reason,
                    "Charge declined"
                );

                Ok(CheckoutOutcome::Declined {
                    redirect_url: backing_route(&project.slug),
                    message: reason,
                })
            }
        }
    }
}
