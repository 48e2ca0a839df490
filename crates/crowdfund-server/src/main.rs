//! crowdfund-gateway HTTP Server
//!
//! Axum-based server exposing the checkout button description, the checkout
//! submission endpoint, and the Stripe webhook notification endpoint.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crowdfund_payments::{
    CheckoutFlow, GatewayConfig, GatewayMode, LogNotifier, MemoryIntentionStore,
    MemoryProjectStore, MemoryRewardStore, MemoryTransactionStore, MockGateway,
    NotificationHandler, PaymentGateway, Project, Reward, StripeGateway, TransactionReconciler,
};

use crate::handlers::{
    checkout, health_check, payment_button, stripe_webhook, webhook_method_not_allowed,
};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = GatewayConfig::from_env();
    let stripe_configured = config.keys().is_complete();

    // Gateway: real Stripe when credentials exist, mock otherwise
    let gateway: Arc<dyn PaymentGateway> = if stripe_configured {
        tracing::info!("✓ Stripe configured");
        Arc::new(StripeGateway::new(
            &config.keys().secret,
            config.charge_timeout,
        ))
    } else {
        tracing::warn!("⚠ Stripe not configured - using the mock gateway");
        tracing::warn!("  Set STRIPE_TEST_PUBLISHED_KEY and STRIPE_TEST_SECRET_KEY in .env");
        Arc::new(MockGateway::new())
    };

    // Stores
    let intentions = Arc::new(MemoryIntentionStore::new());
    let projects = Arc::new(MemoryProjectStore::new());
    let rewards = Arc::new(MemoryRewardStore::new());
    let transactions = Arc::new(MemoryTransactionStore::new());

    if config.mode == GatewayMode::Sandbox {
        seed_demo_data(&projects, &rewards);
    }

    // Wire the flow
    let checkout_flow = Arc::new(CheckoutFlow::new(
        gateway,
        intentions.clone(),
        config.clone(),
    ));
    let reconciler =
        TransactionReconciler::new(transactions, projects.clone(), rewards);
    let notifications = Arc::new(NotificationHandler::new(
        intentions,
        projects.clone(),
        reconciler,
        Arc::new(LogNotifier),
    ));

    let state = AppState {
        checkout: checkout_flow,
        notifications,
        projects,
        mode: config.mode,
        stripe_configured,
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router; the webhook route accepts POST only, anything else is
    // logged and answered with 405
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/projects/{id}/button", get(payment_button))
        .route("/api/checkout", post(checkout))
        .route(
            "/webhook/stripe",
            post(stripe_webhook).fallback(webhook_method_not_allowed),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🚀 crowdfund-server running on http://{}", addr);
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                   - Health check");
    tracing::info!("  GET  /api/projects/{{id}}/button - Checkout button description");
    tracing::info!("  POST /api/checkout             - Submit a checkout");
    tracing::info!("  POST /webhook/stripe           - Stripe notification endpoint");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Seed a demo project and reward so the sandbox flow works end to end
fn seed_demo_data(projects: &MemoryProjectStore, rewards: &MemoryRewardStore) {
    projects.insert(Project {
        id: 1,
        user_id: 100,
        title: "Solar Lantern".into(),
        slug: "solar-lantern".into(),
        goal: dec!(10000),
        funds: Decimal::ZERO,
        currency_code: "usd".into(),
    });
    rewards.insert(Reward {
        id: 1,
        project_id: 1,
        title: "Early bird lantern".into(),
        number: 50,
        distributed: 0,
    });

    tracing::info!("Seeded demo project 1 (Solar Lantern) with reward 1");
}
