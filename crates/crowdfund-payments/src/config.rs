//! Gateway Configuration
//!
//! Explicit configuration for the Stripe gateway: credential pairs for the
//! sandbox and live modes, checkout widget options, and the charge deadline.
//! Replaces ad-hoc global plugin parameters with one struct constructed once
//! and handed to each component.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};

/// Credential mode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayMode {
    /// Test credentials, no real money moves
    Sandbox,
    /// Production credentials
    Live,
}

/// A published/secret credential pair
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct KeyPair {
    /// Client-exposed key (rendered into the checkout button)
    pub published: String,
    /// Server-only key
    pub secret: String,
}

impl KeyPair {
    pub fn new(published: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            published: published.into(),
            secret: secret.into(),
        }
    }

    /// Both halves present and non-blank
    pub fn is_complete(&self) -> bool {
        !self.published.trim().is_empty() && !self.secret.trim().is_empty()
    }
}

/// Optional checkout widget branding
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Branding {
    pub company_name: Option<String>,
    pub logo_url: Option<String>,
    pub button_label: Option<String>,
    pub panel_label: Option<String>,
    pub additional_info: Option<String>,
}

/// Gateway configuration
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Which credential pair is active
    pub mode: GatewayMode,
    /// Sandbox credentials
    pub sandbox: KeyPair,
    /// Live credentials
    pub live: KeyPair,
    /// Let the checkout widget remember the card
    pub remember_me: bool,
    /// Require a zip code in the checkout widget
    pub zip_code_required: bool,
    /// Show the additional-info paragraph under the button
    pub display_info: bool,
    /// Widget branding
    pub branding: Branding,
    /// Deadline for a single charge-creation call
    pub charge_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            mode: GatewayMode::Sandbox,
            sandbox: KeyPair::default(),
            live: KeyPair::default(),
            remember_me: true,
            zip_code_required: false,
            display_info: false,
            branding: Branding::default(),
            charge_timeout: Duration::from_secs(30),
        }
    }
}

impl GatewayConfig {
    /// Resolve the credential pair for the active mode
    pub fn keys(&self) -> &KeyPair {
        match self.mode {
            GatewayMode::Sandbox => &self.sandbox,
            GatewayMode::Live => &self.live,
        }
    }

    /// Resolved keys, or a configuration error when either half is missing
    pub fn require_keys(&self) -> Result<&KeyPair> {
        let keys = self.keys();
        if keys.is_complete() {
            Ok(keys)
        } else {
            Err(PaymentError::Config(format!(
                "incomplete {} credential pair",
                match self.mode {
                    GatewayMode::Sandbox => "sandbox",
                    GatewayMode::Live => "live",
                }
            )))
        }
    }

    /// Load from environment variables
    ///
    /// `STRIPE_TEST_MODE` selects the mode (defaults to sandbox);
    /// `STRIPE_TEST_PUBLISHED_KEY`/`STRIPE_TEST_SECRET_KEY` and
    /// `STRIPE_PUBLISHED_KEY`/`STRIPE_SECRET_KEY` fill the pairs.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).unwrap_or_default();

        let test_mode = std::env::var("STRIPE_TEST_MODE")
            .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
            .unwrap_or(true);

        Self {
            mode: if test_mode {
                GatewayMode::Sandbox
            } else {
                GatewayMode::Live
            },
            sandbox: KeyPair::new(var("STRIPE_TEST_PUBLISHED_KEY"), var("STRIPE_TEST_SECRET_KEY")),
            live: KeyPair::new(var("STRIPE_PUBLISHED_KEY"), var("STRIPE_SECRET_KEY")),
            ..Self::default()
        }
    }
}
