//! Projects and the Funding Ledger

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{PaymentError, Result};

/// A crowdfunding project
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,

    /// Project owner, the receiver of funds
    pub user_id: i64,

    pub title: String,

    /// URL slug for backing routes
    pub slug: String,

    /// Funding goal
    pub goal: Decimal,

    /// Funds raised so far
    pub funds: Decimal,

    /// ISO currency code, lowercase (e.g. "usd")
    pub currency_code: String,
}

/// Project storage and funding ledger
///
/// `add_funds` is the exactly-once commit point for a completed transaction:
/// it credits the amount and recomputes the project totals in one guarded
/// step. Credits are additive, so concurrent commits for distinct
/// transactions may land in any order.
pub trait ProjectStore: Send + Sync {
    /// Get a project by id
    fn get(&self, id: i64) -> Result<Option<Project>>;

    /// Credit funds to a project and recompute its totals
    fn add_funds(&self, id: i64, amount: Decimal) -> Result<Project>;
}

/// In-memory project store (for development and tests)
pub struct MemoryProjectStore {
    projects: RwLock<HashMap<i64, Project>>,
}

impl Default for MemoryProjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self {
            projects: RwLock::new(HashMap::new()),
        }
    }

    /// Seed a project (sandbox server and tests)
    pub fn insert(&self, project: Project) {
        self.projects.write().unwrap().insert(project.id, project);
    }
}

impl ProjectStore for MemoryProjectStore {
    fn get(&self, id: i64) -> Result<Option<Project>> {
        let projects = self.projects.read().unwrap();
        Ok(projects.get(&id).cloned())
    }

    fn add_funds(&self, id: i64, amount: Decimal) -> Result<Project> {
        let mut projects = self.projects.write().unwrap();
        let project = projects
            .get_mut(&id)
            .ok_or_else(|| PaymentError::Storage(format!("project {id} not found")))?;

        project.funds += amount;
        Ok(project.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn project(id: i64) -> Project {
        Project {
            id,
            user_id: 1,
            title: "Test Project".into(),
            slug: "test-project".into(),
            goal: dec!(1000),
            funds: Decimal::ZERO,
            currency_code: "usd".into(),
        }
    }

    #[test]
    fn test_credits_accumulate() {
        let store = MemoryProjectStore::new();
        store.insert(project(42));

        store.add_funds(42, dec!(50.00)).unwrap();
        let updated = store.add_funds(42, dec!(25.50)).unwrap();
        assert_eq!(updated.funds, dec!(75.50));
    }

    #[test]
    fn test_missing_project_is_storage_error() {
        let store = MemoryProjectStore::new();
        assert!(store.add_funds(999, dec!(1)).is_err());
    }
}
