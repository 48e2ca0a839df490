//! HTTP Handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crowdfund_payments::{
    Backer, CheckoutButton, CheckoutContext, CheckoutOutcome, CheckoutProject, GatewayMode,
    NotificationResult, PaymentError,
};

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub gateway_mode: &'static str,
    pub stripe_configured: bool,
}

#[derive(Debug, Deserialize)]
pub struct ButtonQuery {
    /// Pledged amount in major units; defaults to the project goal
    #[serde(default)]
    pub amount: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub project_id: i64,
    pub amount: Decimal,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub reward_id: Option<i64>,
}

/// Wire shape for a checkout result: declines come back as a structured
/// message, success carries an empty one
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub redirect_url: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn error_response(status: StatusCode, code: &str, error: impl Into<String>) -> HandlerError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

fn payment_error_response(e: &PaymentError) -> HandlerError {
    let (status, code) = match e {
        PaymentError::MissingToken => (StatusCode::BAD_REQUEST, "MISSING_TOKEN"),
        PaymentError::Config(_) => (StatusCode::SERVICE_UNAVAILABLE, "PAYMENTS_DISABLED"),
        PaymentError::Gateway(_) | PaymentError::GatewayTimeout(_) => {
            (StatusCode::BAD_GATEWAY, "GATEWAY_ERROR")
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "CHECKOUT_ERROR"),
    };
    error_response(status, code, e.user_message())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        gateway_mode: match state.mode {
            GatewayMode::Sandbox => "sandbox",
            GatewayMode::Live => "live",
        },
        stripe_configured: state.stripe_configured,
    })
}

/// Checkout button description for a project
pub async fn payment_button(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Query(query): Query<ButtonQuery>,
) -> Result<Json<CheckoutButton>, HandlerError> {
    let project = state
        .projects
        .get(project_id)
        .map_err(|e| {
            tracing::error!(project_id, error = %e, "Project lookup failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                "Project lookup failed",
            )
        })?
        .ok_or_else(|| {
            error_response(StatusCode::NOT_FOUND, "PROJECT_NOT_FOUND", "Unknown project")
        })?;

    let amount = query.amount.unwrap_or(project.goal);
    let reference = CheckoutProject::from_project(&project, amount);

    Ok(Json(state.checkout.button(&reference)))
}

/// Submit a checkout
pub async fn checkout(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, HandlerError> {
    let project = state
        .projects
        .get(payload.project_id)
        .map_err(|e| {
            tracing::error!(project_id = payload.project_id, error = %e, "Project lookup failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                "Project lookup failed",
            )
        })?
        .ok_or_else(|| {
            error_response(StatusCode::NOT_FOUND, "PROJECT_NOT_FOUND", "Unknown project")
        })?;

    let backer = match (payload.user_id, payload.session_id) {
        (Some(user_id), _) => Backer::User(user_id),
        (None, Some(session_id)) => Backer::Session(session_id),
        (None, None) => {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "MISSING_BACKER",
                "A user id or session id is required",
            ));
        }
    };

    let context = CheckoutContext {
        project: CheckoutProject::from_project(&project, payload.amount),
        backer,
        reward_id: payload.reward_id,
        token: payload.token,
    };

    let outcome = state.checkout.submit(&context).await.map_err(|e| {
        tracing::error!(project_id = project.id, error = %e, "Checkout failed");
        payment_error_response(&e)
    })?;

    let response = match outcome {
        CheckoutOutcome::Success { redirect_url } => CheckoutResponse {
            redirect_url,
            message: String::new(),
        },
        CheckoutOutcome::Declined {
            redirect_url,
            message,
        } => CheckoutResponse {
            redirect_url,
            message,
        },
    };

    Ok(Json(response))
}

/// Stripe webhook endpoint
///
/// Always answers 200: the processor retries on non-2xx, and every
/// validation failure here is already a logged no-op by design.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    body: String,
) -> Json<NotificationResult> {
    Json(state.notifications.handle(&body).await)
}

/// Non-POST request to the webhook path: logged no-op
pub async fn webhook_method_not_allowed(method: axum::http::Method) -> StatusCode {
    tracing::warn!(%method, "Invalid request method on the webhook endpoint");
    StatusCode::METHOD_NOT_ALLOWED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_non_post_webhook_is_rejected() {
        let status = webhook_method_not_allowed(axum::http::Method::GET).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }
}
