//! Application State

use std::sync::Arc;

use crowdfund_payments::{CheckoutFlow, GatewayMode, NotificationHandler, ProjectStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Checkout flow (button rendering + charge submission)
    pub checkout: Arc<CheckoutFlow>,

    /// Webhook notification handler
    pub notifications: Arc<NotificationHandler>,

    /// Project lookup for button rendering
    pub projects: Arc<dyn ProjectStore>,

    /// Active credential mode, reported by the health endpoint
    pub mode: GatewayMode,

    /// Whether real Stripe credentials are configured
    pub stripe_configured: bool,
}
