//! End-to-end checkout + webhook flow
//!
//! Drives the public API the way the server does: a checkout submission
//! against the mock gateway followed by webhook deliveries, including the
//! duplicated and concurrent deliveries the processor is allowed to send.

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use crowdfund_payments::{
    Backer, CheckoutContext, CheckoutFlow, CheckoutOutcome, CheckoutProject, GatewayConfig,
    IntentionStore, KeyPair, MemoryIntentionStore, MemoryProjectStore, MemoryRewardStore,
    MemoryTransactionStore, MockGateway, NotificationHandler, Project, ProjectStore, Reward,
    RewardStore, TransactionReconciler, TransactionStore,
};

struct World {
    flow: CheckoutFlow,
    handler: Arc<NotificationHandler>,
    intentions: Arc<MemoryIntentionStore>,
    projects: Arc<MemoryProjectStore>,
    rewards: Arc<MemoryRewardStore>,
    transactions: Arc<MemoryTransactionStore>,
}

fn world() -> World {
    let intentions = Arc::new(MemoryIntentionStore::new());
    let projects = Arc::new(MemoryProjectStore::new());
    let rewards = Arc::new(MemoryRewardStore::new());
    let transactions = Arc::new(MemoryTransactionStore::new());

    projects.insert(Project {
        id: 42,
        user_id: 1,
        title: "Solar Lantern".into(),
        slug: "solar-lantern".into(),
        goal: dec!(10000),
        funds: Decimal::ZERO,
        currency_code: "usd".into(),
    });
    rewards.insert(Reward {
        id: 3,
        project_id: 42,
        title: "Early bird lantern".into(),
        number: 10,
        distributed: 0,
    });

    let config = GatewayConfig {
        sandbox: KeyPair::new("pk_test_1", "sk_test_1"),
        ..GatewayConfig::default()
    };

    let flow = CheckoutFlow::new(
        Arc::new(MockGateway::new()),
        intentions.clone(),
        config,
    );
    let reconciler =
        TransactionReconciler::new(transactions.clone(), projects.clone(), rewards.clone());
    let handler = Arc::new(NotificationHandler::new(
        intentions.clone(),
        projects.clone(),
        reconciler,
        Arc::new(crowdfund_payments::LogNotifier),
    ));

    World {
        flow,
        handler,
        intentions,
        projects,
        rewards,
        transactions,
    }
}

fn checkout_context(token: &str, reward_id: Option<i64>) -> CheckoutContext {
    CheckoutContext {
        project: CheckoutProject {
            id: 42,
            title: "Solar Lantern".into(),
            slug: "solar-lantern".into(),
            amount: dec!(50.00),
            currency_code: "usd".into(),
        },
        backer: Backer::User(7),
        reward_id,
        token: Some(token.into()),
    }
}

fn webhook_body(intention_id: Uuid, charge_id: &str, paid: bool, amount: i64) -> String {
    serde_json::json!({
        "id": "evt_1",
        "livemode": false,
        "data": {
            "object": {
                "id": charge_id,
                "created": 1_700_000_000i64,
                "paid": paid,
                "amount": amount,
                "currency": "usd",
                "metadata": { "intention_id": intention_id.to_string() }
            }
        }
    })
    .to_string()
}

#[tokio::test]
async fn checkout_then_webhook_funds_project_once() {
    let w = world();

    let outcome = w.flow.submit(&checkout_context("tok_ok", None)).await.unwrap();
    assert!(matches!(outcome, CheckoutOutcome::Success { .. }));

    let intention = w
        .intentions
        .find_or_create(&Backer::User(7), 42, None)
        .unwrap();
    let charge_id = intention.charge_id.clone().unwrap();
    assert_eq!(charge_id, "ch_1");

    let result = w
        .handler
        .handle(&webhook_body(intention.id, &charge_id, true, 5000))
        .await;

    let transaction = result.transaction.expect("completed transaction");
    assert_eq!(transaction.investor_id, Some(7));
    assert_eq!(transaction.project_id, 42);
    assert_eq!(transaction.amount, dec!(50.00));
    assert_eq!(transaction.currency, "usd");
    assert!(transaction.status.is_completed());
    assert_eq!(transaction.receiver_id, Some(1));
    assert!(transaction.extra_data.is_some());

    assert_eq!(w.projects.get(42).unwrap().unwrap().funds, dec!(50.00));

    // The intention is consumed by reconciliation
    assert!(w.intentions.get(intention.id).unwrap().is_none());

    // Second delivery of the same webhook: a no-op with an empty envelope
    let replay = w
        .handler
        .handle(&webhook_body(intention.id, &charge_id, true, 5000))
        .await;
    assert!(replay.transaction.is_none());
    assert_eq!(w.projects.get(42).unwrap().unwrap().funds, dec!(50.00));
}

#[tokio::test]
async fn unpaid_webhook_records_pending_without_funding() {
    let w = world();

    w.flow
        .submit(&checkout_context("tok_ok", Some(3)))
        .await
        .unwrap();
    let intention = w
        .intentions
        .find_or_create(&Backer::User(7), 42, Some(3))
        .unwrap();

    let result = w
        .handler
        .handle(&webhook_body(intention.id, "ch_1", false, 5000))
        .await;
    assert!(result.transaction.is_none());

    let stored = w.transactions.get("ch_1").unwrap().unwrap();
    assert!(!stored.status.is_completed());
    assert_eq!(w.projects.get(42).unwrap().unwrap().funds, Decimal::ZERO);
    assert_eq!(w.rewards.get(3).unwrap().unwrap().distributed, 0);

    // The paid notification for the same charge later completes it
    let result = w
        .handler
        .handle(&webhook_body(intention.id, "ch_1", true, 5000))
        .await;
    assert!(result.transaction.is_some());
    assert_eq!(result.reward.unwrap().distributed, 1);
    assert_eq!(w.projects.get(42).unwrap().unwrap().funds, dec!(50.00));
}

#[tokio::test]
async fn decline_leaves_no_transaction() {
    let w = world();

    let outcome = w
        .flow
        .submit(&checkout_context("tok_declined", None))
        .await
        .unwrap();

    match outcome {
        CheckoutOutcome::Declined { message, .. } => {
            assert_eq!(message, "Your card was declined.");
        }
        CheckoutOutcome::Success { .. } => panic!("expected decline"),
    }

    assert!(w.transactions.get("ch_1").unwrap().is_none());
    assert_eq!(w.projects.get(42).unwrap().unwrap().funds, Decimal::ZERO);
}

#[tokio::test]
async fn webhook_for_unknown_intention_changes_nothing() {
    let w = world();

    let result = w
        .handler
        .handle(&webhook_body(Uuid::new_v4(), "ch_9", true, 5000))
        .await;

    assert!(result.transaction.is_none());
    assert!(w.transactions.get("ch_9").unwrap().is_none());
    assert_eq!(w.projects.get(42).unwrap().unwrap().funds, Decimal::ZERO);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_deliveries_credit_once() {
    let w = world();

    w.flow
        .submit(&checkout_context("tok_ok", Some(3)))
        .await
        .unwrap();
    let intention = w
        .intentions
        .find_or_create(&Backer::User(7), 42, Some(3))
        .unwrap();
    let body = webhook_body(intention.id, "ch_1", true, 5000);

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let handler = w.handler.clone();
        let body = body.clone();
        tasks.push(tokio::spawn(async move { handler.handle(&body).await }));
    }

    let mut completed = 0;
    for task in tasks {
        if task.await.unwrap().transaction.is_some() {
            completed += 1;
        }
    }

    // Exactly one delivery wins the transition into completed
    assert_eq!(completed, 1);
    assert_eq!(w.projects.get(42).unwrap().unwrap().funds, dec!(50.00));
    assert_eq!(w.rewards.get(3).unwrap().unwrap().distributed, 1);
}
