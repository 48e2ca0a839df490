//! Transactions
//!
//! A transaction is the durable, deduplicated record of a funding event,
//! keyed by the processor's transaction id. The store's `apply` is an atomic
//! conditional upsert: the completed-state check and the write happen under
//! one guard, so a concurrent duplicate delivery can never slip between the
//! check and the mutation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::Result;

/// Transaction status
///
/// `Completed` is terminal: no transition leaves it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
}

impl TransactionStatus {
    pub fn is_completed(self) -> bool {
        matches!(self, TransactionStatus::Completed)
    }
}

/// A reconciled funding record
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    /// Processor transaction id, the natural dedup key
    pub txn_id: String,

    /// Backing user, `None` for anonymous backers
    pub investor_id: Option<i64>,

    /// Funded project
    pub project_id: i64,

    /// Reward tier, cleared when reward accounting fails
    pub reward_id: Option<i64>,

    /// Amount in major currency units
    pub amount: Decimal,

    /// ISO currency code, lowercase
    pub currency: String,

    pub status: TransactionStatus,

    /// Processor-reported transaction time
    pub txn_date: DateTime<Utc>,

    /// Service provider name ("Stripe")
    pub service_provider: String,

    /// Serialized opaque processor payload, `None` when absent
    pub extra_data: Option<String>,

    /// Project owner receiving the funds
    pub receiver_id: Option<i64>,
}

/// Result of applying a notification to the transaction store
#[derive(Clone, Debug)]
pub enum AppliedTransaction {
    /// The candidate was written
    Applied {
        transaction: Transaction,
        /// True exactly when this write transitioned the record into
        /// `Completed` — the one moment funding side effects may fire
        newly_completed: bool,
    },
    /// The stored record is already completed; nothing was written
    Duplicate,
}

/// Transaction storage
pub trait TransactionStore: Send + Sync {
    /// Get a transaction by processor transaction id
    fn get(&self, txn_id: &str) -> Result<Option<Transaction>>;

    /// Atomic conditional upsert keyed by `txn_id`
    ///
    /// Transitions: absent → pending, absent → completed,
    /// pending → pending, pending → completed. A record already in
    /// `Completed` is never touched; the call reports `Duplicate` and the
    /// caller must not apply side effects.
    fn apply(&self, candidate: Transaction) -> Result<AppliedTransaction>;

    /// Downgrade a stored transaction to "no reward"
    fn clear_reward(&self, txn_id: &str) -> Result<()>;
}

/// In-memory transaction store (for development and tests)
pub struct MemoryTransactionStore {
    transactions: RwLock<HashMap<String, Transaction>>,
}

impl Default for MemoryTransactionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransactionStore {
    pub fn new() -> Self {
        Self {
            transactions: RwLock::new(HashMap::new()),
        }
    }
}

impl TransactionStore for MemoryTransactionStore {
    fn get(&self, txn_id: &str) -> Result<Option<Transaction>> {
        let transactions = self.transactions.read().unwrap();
        Ok(transactions.get(txn_id).cloned())
    }

    fn apply(&self, candidate: Transaction) -> Result<AppliedTransaction> {
        // Single write guard across check and mutation; this is the per-id
        // critical section that makes duplicate deliveries safe.
        let mut transactions = self.transactions.write().unwrap();

        if let Some(existing) = transactions.get(&candidate.txn_id) {
            if existing.status.is_completed() {
                return Ok(AppliedTransaction::Duplicate);
            }
        }

        let newly_completed = candidate.status.is_completed();
        transactions.insert(candidate.txn_id.clone(), candidate.clone());

        Ok(AppliedTransaction::Applied {
            transaction: candidate,
            newly_completed,
        })
    }

    fn clear_reward(&self, txn_id: &str) -> Result<()> {
        let mut transactions = self.transactions.write().unwrap();
        if let Some(transaction) = transactions.get_mut(txn_id) {
            transaction.reward_id = None;
        }
        Ok(())
    }
}
