//! Transaction Reconciler
//!
//! The state machine that turns validated notifications into exactly-once
//! funding updates. Per transaction id: absent → pending → completed, with
//! completed terminal. The funding credit and reward distribution fire only
//! on the write that transitions a record into completed, never on replays.

use std::sync::Arc;

use crate::error::Result;
use crate::project::{Project, ProjectStore};
use crate::reward::{Reward, RewardStore};
use crate::transaction::{AppliedTransaction, Transaction, TransactionStore};

/// Outcome of one reconciliation attempt
#[derive(Clone, Debug)]
pub enum ReconcileOutcome {
    /// The record transitioned into completed: funds were credited and
    /// reward accounting ran exactly once
    Completed {
        transaction: Transaction,
        /// Project state after the credit
        project: Project,
        reward: Option<Reward>,
    },
    /// The record was written but is not completed; no side effects
    Recorded { transaction: Transaction },
    /// Replay of an already-completed transaction; nothing happened
    Duplicate,
}

/// The reconciler
pub struct TransactionReconciler {
    transactions: Arc<dyn TransactionStore>,
    projects: Arc<dyn ProjectStore>,
    rewards: Arc<dyn RewardStore>,
}

impl TransactionReconciler {
    pub fn new(
        transactions: Arc<dyn TransactionStore>,
        projects: Arc<dyn ProjectStore>,
        rewards: Arc<dyn RewardStore>,
    ) -> Self {
        Self {
            transactions,
            projects,
            rewards,
        }
    }

    /// Apply a validated transaction candidate
    ///
    /// The store's conditional upsert decides atomically whether this
    /// delivery wins the transition into completed; only the winner reaches
    /// the funding credit below, so replays can never re-credit funds.
    pub fn reconcile(&self, candidate: Transaction) -> Result<ReconcileOutcome> {
        let txn_id = candidate.txn_id.clone();

        let (mut transaction, newly_completed) = match self.transactions.apply(candidate)? {
            AppliedTransaction::Duplicate => {
                tracing::debug!(txn_id = %txn_id, "Duplicate notification, already completed");
                return Ok(ReconcileOutcome::Duplicate);
            }
            AppliedTransaction::Applied {
                transaction,
                newly_completed,
            } => (transaction, newly_completed),
        };

        if !newly_completed {
            tracing::info!(txn_id = %txn_id, status = ?transaction.status, "Transaction recorded");
            return Ok(ReconcileOutcome::Recorded { transaction });
        }

        // Exactly-once funding commit for this transaction id
        let project = self
            .projects
            .add_funds(transaction.project_id, transaction.amount)?;

        tracing::info!(
            txn_id = %txn_id,
            project_id = project.id,
            amount = %transaction.amount,
            funds = %project.funds,
            "Funds credited"
        );

        let reward = match transaction.reward_id {
            Some(reward_id) => self.distribute_reward(&mut transaction, reward_id),
            None => None,
        };

        Ok(ReconcileOutcome::Completed {
            transaction,
            project,
            reward,
        })
    }

    /// Record one reward distribution; failure downgrades the transaction to
    /// "no reward" and is non-fatal to the funding transition
    fn distribute_reward(&self, transaction: &mut Transaction, reward_id: i64) -> Option<Reward> {
        let outcome = self
            .rewards
            .record_distribution(reward_id, transaction.project_id);

        match outcome {
            Ok(Some(reward)) => Some(reward),
            Ok(None) => {
                tracing::warn!(
                    txn_id = %transaction.txn_id,
                    reward_id,
                    "Reward unavailable, downgrading transaction"
                );
                self.downgrade(transaction);
                None
            }
            Err(e) => {
                tracing::warn!(
                    txn_id = %transaction.txn_id,
                    reward_id,
                    error = %e,
                    "Reward update failed, downgrading transaction"
                );
                self.downgrade(transaction);
                None
            }
        }
    }

    fn downgrade(&self, transaction: &mut Transaction) {
        transaction.reward_id = None;
        if let Err(e) = self.transactions.clear_reward(&transaction.txn_id) {
            tracing::error!(txn_id = %transaction.txn_id, error = %e, "Failed to persist reward downgrade");
        }
    }
}
