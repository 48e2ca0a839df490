//! # crowdfund-payments
//!
//! Stripe payment gateway and transaction reconciliation for crowdfunding
//! projects.
//!
//! ## Flow
//!
//! ```text
//! checkout                                 webhook (async, at-least-once)
//! ────────                                 ──────────────────────────────
//! ┌───────────┐  token   ┌────────┐        ┌──────────────┐
//! │ Checkout  │─────────▶│ Stripe │───────▶│ Notification │
//! │  Flow     │  charge  └────────┘  POST  │  Validator   │
//! └─────┬─────┘                            └──────┬───────┘
//!       │ creates                                 │ loads by metadata
//!       ▼                                         ▼
//! ┌───────────┐      intention_id         ┌──────────────┐
//! │ Intention │◀──────────────────────────│  Reconciler  │
//! └───────────┘                           └──────┬───────┘
//!                                                │ exactly once per txn id
//!                                                ▼
//!                                  project funds + reward inventory
//! ```
//!
//! The hard guarantee lives in the reconciler: webhook deliveries are
//! duplicated and unordered, and a transaction already in `completed` is a
//! terminal no-op — funds are credited and rewards distributed exactly once
//! per processor transaction id.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use crowdfund_payments::{
//!     CheckoutFlow, GatewayConfig, MemoryIntentionStore, StripeGateway,
//! };
//!
//! let config = GatewayConfig::from_env();
//! let gateway = StripeGateway::new(&config.require_keys()?.secret, config.charge_timeout);
//! let flow = CheckoutFlow::new(Arc::new(gateway), intentions, config);
//!
//! match flow.submit(&context).await? {
//!     CheckoutOutcome::Success { redirect_url } => redirect(redirect_url),
//!     CheckoutOutcome::Declined { redirect_url, message } => back(redirect_url, message),
//! }
//! ```

mod checkout;
mod config;
mod error;
mod gateway;
mod intention;
mod notifier;
mod project;
mod reconcile;
mod reward;
mod transaction;
mod webhook;

pub use checkout::{
    backing_route, backing_share_route, CheckoutButton, CheckoutContext, CheckoutFlow,
    CheckoutForm, CheckoutOutcome, CheckoutProject, CHECKOUT_ACTION, TOKEN_FIELD,
};
pub use config::{Branding, GatewayConfig, GatewayMode, KeyPair};
pub use error::{PaymentError, Result};
pub use gateway::{
    ChargeAttempt, ChargeRecord, ChargeRequest, MockGateway, PaymentGateway, StripeGateway,
    INTENTION_METADATA_KEY,
};
pub use intention::{Backer, Intention, IntentionStore, MemoryIntentionStore};
pub use notifier::{LogNotifier, PaymentNotifier};
pub use project::{MemoryProjectStore, Project, ProjectStore};
pub use reconcile::{ReconcileOutcome, TransactionReconciler};
pub use reward::{MemoryRewardStore, Reward, RewardStore};
pub use transaction::{
    AppliedTransaction, MemoryTransactionStore, Transaction, TransactionStatus, TransactionStore,
};
pub use webhook::{NotificationHandler, NotificationResult, PAYMENT_SERVICE};
