//! Webhook Notification Handling
//!
//! Validates the asynchronous charge notification and hands the result to
//! the reconciler. Deliveries are at-least-once and may be duplicated or out
//! of order, and there is no synchronous caller to receive an error — every
//! failure here is a structured log plus an empty result, never a panic or a
//! propagated error.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::gateway::INTENTION_METADATA_KEY;
use crate::intention::{Intention, IntentionStore};
use crate::notifier::PaymentNotifier;
use crate::project::{Project, ProjectStore};
use crate::reconcile::{ReconcileOutcome, TransactionReconciler};
use crate::reward::Reward;
use crate::transaction::{Transaction, TransactionStatus};

/// Service name recorded on transactions and whitelisted on intentions
pub const PAYMENT_SERVICE: &str = "stripe";

/// Top-level payload keys preserved as the transaction's opaque extra data
const EXTRA_DATA_KEYS: &[&str] = &[
    "object",
    "id",
    "created",
    "livemode",
    "type",
    "pending_webhooks",
    "request",
    "paid",
    "amount",
    "currency",
    "captured",
    "balance_transaction",
    "failure_message",
    "failure_code",
    "data",
];

/// Typed view of the notification body
///
/// Unknown fields are tolerated; anything required that is missing fails
/// validation, not parsing.
#[derive(Debug, Deserialize)]
struct WebhookPayload {
    data: Option<WebhookData>,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    object: Option<ChargeObject>,
}

#[derive(Debug, Deserialize)]
struct ChargeObject {
    id: Option<String>,
    created: Option<i64>,
    paid: Option<bool>,
    amount: Option<i64>,
    currency: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

/// The result envelope relayed to downstream hooks
///
/// Every field is populated only on a successful, non-duplicate
/// reconciliation reaching completed; otherwise the envelope is empty apart
/// from the service name.
#[derive(Clone, Debug, Serialize)]
pub struct NotificationResult {
    pub project: Option<Project>,
    pub reward: Option<Reward>,
    pub transaction: Option<Transaction>,
    pub payment_session: Option<Intention>,
    pub payment_service: &'static str,
}

impl NotificationResult {
    pub fn empty() -> Self {
        Self {
            project: None,
            reward: None,
            transaction: None,
            payment_session: None,
            payment_service: PAYMENT_SERVICE,
        }
    }
}

/// Webhook notification handler
pub struct NotificationHandler {
    intentions: Arc<dyn IntentionStore>,
    projects: Arc<dyn ProjectStore>,
    reconciler: TransactionReconciler,
    notifier: Arc<dyn PaymentNotifier>,
}

impl NotificationHandler {
    pub fn new(
        intentions: Arc<dyn IntentionStore>,
        projects: Arc<dyn ProjectStore>,
        reconciler: TransactionReconciler,
        notifier: Arc<dyn PaymentNotifier>,
    ) -> Self {
        Self {
            intentions,
            projects,
            reconciler,
            notifier,
        }
    }

    /// Process one notification delivery
    pub async fn handle(&self, body: &str) -> NotificationResult {
        let raw: Value = match serde_json::from_str(body) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(error = %e, body, "Notification body is not JSON");
                return NotificationResult::empty();
            }
        };

        let payload: WebhookPayload = match serde_json::from_value(raw.clone()) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, payload = %raw, "Notification payload malformed");
                return NotificationResult::empty();
            }
        };

        let Some(object) = payload.data.and_then(|d| d.object) else {
            tracing::error!(payload = %raw, "Notification has no data object");
            return NotificationResult::empty();
        };

        let Some(intention) = self.resolve_intention(&object, &raw) else {
            return NotificationResult::empty();
        };

        let Some(project) = self.resolve_project(&intention, &raw) else {
            return NotificationResult::empty();
        };

        let Some(mut candidate) = validate(&object, &intention, &project, &raw) else {
            return NotificationResult::empty();
        };
        candidate.extra_data = extra_data(&raw);

        let outcome = match self.reconciler.reconcile(candidate) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, payload = %raw, "Reconciliation failed");
                return NotificationResult::empty();
            }
        };

        let ReconcileOutcome::Completed {
            transaction,
            project,
            reward,
        } = outcome
        else {
            // Pending or duplicate: nothing for downstream hooks
            return NotificationResult::empty();
        };

        // The intention served its correlation purpose
        if let Err(e) = self.intentions.delete(intention.id) {
            tracing::warn!(intention_id = %intention.id, error = %e, "Failed to delete intention");
        }

        if let Err(e) = self
            .notifier
            .after_payment(&transaction, &project, reward.as_ref())
            .await
        {
            tracing::warn!(txn_id = %transaction.txn_id, error = %e, "Post-payment notifier failed");
        }

        NotificationResult {
            project: Some(project),
            reward,
            transaction: Some(transaction),
            payment_session: Some(intention),
            payment_service: PAYMENT_SERVICE,
        }
    }

    fn resolve_intention(&self, object: &ChargeObject, raw: &Value) -> Option<Intention> {
        let intention_id = object
            .metadata
            .get(INTENTION_METADATA_KEY)
            .and_then(|v| Uuid::parse_str(v).ok());

        let Some(intention_id) = intention_id else {
            tracing::error!(payload = %raw, "Notification metadata carries no intention id");
            return None;
        };

        let intention = match self.intentions.get(intention_id) {
            Ok(Some(intention)) => intention,
            Ok(None) => {
                tracing::error!(intention_id = %intention_id, payload = %raw, "Unknown intention");
                return None;
            }
            Err(e) => {
                tracing::error!(intention_id = %intention_id, error = %e, "Intention lookup failed");
                return None;
            }
        };

        // Guard against notifications for intentions created under a
        // different gateway
        let trusted = intention
            .gateway
            .as_deref()
            .is_some_and(|g| g.eq_ignore_ascii_case(PAYMENT_SERVICE));
        if !trusted {
            tracing::error!(
                intention_id = %intention.id,
                gateway = ?intention.gateway,
                "Intention gateway is not trusted"
            );
            return None;
        }

        Some(intention)
    }

    fn resolve_project(&self, intention: &Intention, raw: &Value) -> Option<Project> {
        match self.projects.get(intention.project_id) {
            Ok(Some(project)) => Some(project),
            Ok(None) => {
                tracing::error!(
                    project_id = intention.project_id,
                    payload = %raw,
                    "Invalid project reference"
                );
                None
            }
            Err(e) => {
                // Open follow-up: lookups are one-shot; the notification is
                // dropped for operator attention, never retried here.
                tracing::error!(
                    project_id = intention.project_id,
                    error = %e,
                    "Project lookup failed, notification dropped"
                );
                None
            }
        }
    }
}

/// Validate payload fields against the intention and project currency,
/// producing the transaction candidate
fn validate(
    object: &ChargeObject,
    intention: &Intention,
    project: &Project,
    raw: &Value,
) -> Option<Transaction> {
    let Some(txn_id) = object.id.as_deref().filter(|id| !id.is_empty()) else {
        tracing::error!(payload = %raw, "Notification carries no transaction id");
        return None;
    };

    let currency = match &object.currency {
        Some(c) if c.eq_ignore_ascii_case(&project.currency_code) => c.to_lowercase(),
        Some(c) => {
            tracing::error!(
                payload_currency = %c,
                project_currency = %project.currency_code,
                payload = %raw,
                "Currency mismatch"
            );
            return None;
        }
        None => project.currency_code.to_lowercase(),
    };

    let status = if object.paid == Some(true) {
        TransactionStatus::Completed
    } else {
        TransactionStatus::Pending
    };

    // Minor units to major units, floored at zero
    let amount = Decimal::new(object.amount.unwrap_or(0).max(0), 2);

    let txn_date = object
        .created
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(chrono::Utc::now);

    Some(Transaction {
        txn_id: txn_id.to_string(),
        investor_id: intention.user_id,
        project_id: intention.project_id,
        reward_id: intention.effective_reward_id(),
        amount,
        currency,
        status,
        txn_date,
        service_provider: "Stripe".into(),
        extra_data: None,
        receiver_id: Some(project.user_id),
    })
}

/// Serialize the whitelisted top-level payload keys for storage
fn extra_data(raw: &Value) -> Option<String> {
    let object = raw.as_object()?;
    let picked: serde_json::Map<String, Value> = object
        .iter()
        .filter(|(key, _)| EXTRA_DATA_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    if picked.is_empty() {
        None
    } else {
        serde_json::to_string(&Value::Object(picked)).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intention::{Backer, MemoryIntentionStore};
    use crate::notifier::LogNotifier;
    use crate::project::MemoryProjectStore;
    use crate::reward::MemoryRewardStore;
    use crate::transaction::MemoryTransactionStore;
    use rust_decimal_macros::dec;

    fn handler_with_intention() -> (NotificationHandler, Intention) {
        let intentions = Arc::new(MemoryIntentionStore::new());
        let projects = Arc::new(MemoryProjectStore::new());
        let transactions = Arc::new(MemoryTransactionStore::new());
        let rewards = Arc::new(MemoryRewardStore::new());

        projects.insert(Project {
            id: 42,
            user_id: 1,
            title: "Test Project".into(),
            slug: "test-project".into(),
            goal: dec!(1000),
            funds: Decimal::ZERO,
            currency_code: "usd".into(),
        });

        let intention = intentions
            .find_or_create(&Backer::User(7), 42, None)
            .unwrap();
        intentions
            .attach_charge(intention.id, "stripe", "ch_1")
            .unwrap();
        let intention = intentions.get(intention.id).unwrap().unwrap();

        let reconciler = TransactionReconciler::new(transactions, projects.clone(), rewards);
        let handler =
            NotificationHandler::new(intentions, projects, reconciler, Arc::new(LogNotifier));

        (handler, intention)
    }

    fn payload(intention_id: Uuid, paid: bool) -> String {
        serde_json::json!({
            "data": {
                "object": {
                    "id": "ch_1",
                    "created": 1_700_000_000,
                    "paid": paid,
                    "amount": 5000,
                    "currency": "usd",
                    "metadata": { "intention_id": intention_id.to_string() }
                }
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_paid_notification_completes() {
        let (handler, intention) = handler_with_intention();

        let result = handler.handle(&payload(intention.id, true)).await;
        let transaction = result.transaction.expect("transaction populated");

        assert_eq!(transaction.txn_id, "ch_1");
        assert_eq!(transaction.amount, dec!(50.00));
        assert_eq!(transaction.currency, "usd");
        assert_eq!(transaction.investor_id, Some(7));
        assert!(transaction.status.is_completed());
        assert_eq!(result.project.unwrap().funds, dec!(50.00));
        assert_eq!(result.payment_session.unwrap().id, intention.id);
    }

    #[tokio::test]
    async fn test_unpaid_notification_returns_empty_envelope() {
        let (handler, intention) = handler_with_intention();

        let result = handler.handle(&payload(intention.id, false)).await;
        assert!(result.transaction.is_none());
        assert!(result.project.is_none());
        assert_eq!(result.payment_service, "stripe");
    }

    #[tokio::test]
    async fn test_malformed_body_is_a_noop() {
        let (handler, _) = handler_with_intention();

        for body in ["not json", "{}", r#"{"data": {}}"#] {
            let result = handler.handle(body).await;
            assert!(result.transaction.is_none());
        }
    }

    #[tokio::test]
    async fn test_unknown_intention_is_a_noop() {
        let (handler, _) = handler_with_intention();

        let result = handler.handle(&payload(Uuid::new_v4(), true)).await;
        assert!(result.transaction.is_none());
    }

    #[tokio::test]
    async fn test_untrusted_gateway_is_a_noop() {
        let intentions = Arc::new(MemoryIntentionStore::new());
        let projects = Arc::new(MemoryProjectStore::new());
        let reconciler = TransactionReconciler::new(
            Arc::new(MemoryTransactionStore::new()),
            projects.clone(),
            Arc::new(MemoryRewardStore::new()),
        );
        let handler = NotificationHandler::new(
            intentions.clone(),
            projects,
            reconciler,
            Arc::new(LogNotifier),
        );

        // Intention with no charge attached yet: gateway is unset
        let intention = intentions
            .find_or_create(&Backer::User(7), 42, None)
            .unwrap();
        let result = handler.handle(&payload(intention.id, true)).await;
        assert!(result.transaction.is_none());
    }

    #[tokio::test]
    async fn test_currency_mismatch_is_a_noop() {
        let (handler, intention) = handler_with_intention();

        let body = serde_json::json!({
            "data": { "object": {
                "id": "ch_1",
                "paid": true,
                "amount": 5000,
                "currency": "eur",
                "metadata": { "intention_id": intention.id.to_string() }
            }}
        })
        .to_string();

        let result = handler.handle(&body).await;
        assert!(result.transaction.is_none());
    }

    #[tokio::test]
    async fn test_negative_amount_floors_at_zero() {
        let (handler, intention) = handler_with_intention();

        let body = serde_json::json!({
            "data": { "object": {
                "id": "ch_1",
                "paid": true,
                "amount": -250,
                "currency": "usd",
                "metadata": { "intention_id": intention.id.to_string() }
            }}
        })
        .to_string();

        let result = handler.handle(&body).await;
        assert_eq!(result.transaction.unwrap().amount, Decimal::ZERO);
    }

    #[test]
    fn test_extra_data_picks_whitelisted_keys() {
        let raw = serde_json::json!({
            "id": "evt_1",
            "livemode": false,
            "data": { "object": { "id": "ch_1" } },
            "api_version": "2015-01-01"
        });

        let stored = extra_data(&raw).unwrap();
        let value: Value = serde_json::from_str(&stored).unwrap();
        assert!(value.get("id").is_some());
        assert!(value.get("data").is_some());
        assert!(value.get("api_version").is_none());
    }
}
