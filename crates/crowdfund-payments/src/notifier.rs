//! Post-Payment Notifier
//!
//! Downstream messaging boundary, invoked once per non-duplicate transition
//! into completed. Delivery (mail, etc.) is an external collaborator; a
//! notifier failure never unwinds the reconciliation.

use async_trait::async_trait;

use crate::error::Result;
use crate::project::Project;
use crate::reward::Reward;
use crate::transaction::Transaction;

/// Post-payment notification boundary
#[async_trait]
pub trait PaymentNotifier: Send + Sync {
    async fn after_payment(
        &self,
        transaction: &Transaction,
        project: &Project,
        reward: Option<&Reward>,
    ) -> Result<()>;
}

/// Default notifier: structured log only
pub struct LogNotifier;

#[async_trait]
impl PaymentNotifier for LogNotifier {
    async fn after_payment(
        &self,
        transaction: &Transaction,
        project: &Project,
        reward: Option<&Reward>,
    ) -> Result<()> {
        tracing::info!(
            txn_id = %transaction.txn_id,
            project_id = project.id,
            amount = %transaction.amount,
            reward_id = ?reward.map(|r| r.id),
            "Payment completed"
        );
        Ok(())
    }
}
