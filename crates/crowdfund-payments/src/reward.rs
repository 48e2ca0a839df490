//! Reward Inventory
//!
//! Rewards are inventory-limited perks tied to funding tiers. A completed
//! transaction carrying a reward id records exactly one distribution; the
//! reconciler treats any failure here as non-fatal and downgrades the
//! transaction to "no reward".

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::Result;

/// A reward tier
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Reward {
    pub id: i64,
    pub project_id: i64,
    pub title: String,

    /// Total units available, 0 = unlimited
    pub number: u32,

    /// Units distributed so far
    pub distributed: u32,
}

impl Reward {
    /// Units still available
    pub fn is_available(&self) -> bool {
        self.number == 0 || self.distributed < self.number
    }
}

/// Reward inventory storage
pub trait RewardStore: Send + Sync {
    /// Get a reward by id
    fn get(&self, id: i64) -> Result<Option<Reward>>;

    /// Record one distribution against a reward's inventory
    ///
    /// Returns the updated reward, or `None` when the reward does not exist,
    /// belongs to a different project, or its inventory is exhausted. Never
    /// panics past this boundary.
    fn record_distribution(&self, reward_id: i64, project_id: i64) -> Result<Option<Reward>>;
}

/// In-memory reward store (for development and tests)
pub struct MemoryRewardStore {
    rewards: RwLock<HashMap<i64, Reward>>,
}

impl Default for MemoryRewardStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRewardStore {
    pub fn new() -> Self {
        Self {
            rewards: RwLock::new(HashMap::new()),
        }
    }

    /// Seed a reward (sandbox server and tests)
    pub fn insert(&self, reward: Reward) {
        self.rewards.write().unwrap().insert(reward.id, reward);
    }
}

impl RewardStore for MemoryRewardStore {
    fn get(&self, id: i64) -> Result<Option<Reward>> {
        let rewards = self.rewards.read().unwrap();
        Ok(rewards.get(&id).cloned())
    }

    fn record_distribution(&self, reward_id: i64, project_id: i64) -> Result<Option<Reward>> {
        let mut rewards = self.rewards.write().unwrap();

        let Some(reward) = rewards.get_mut(&reward_id) else {
            return Ok(None);
        };
        if reward.project_id != project_id || !reward.is_available() {
            return Ok(None);
        }

        reward.distributed += 1;
        Ok(Some(reward.clone()))
    }
}
