//! Payment Intentions
//!
//! An intention is the durable record of a backing attempt, created before
//! the charge call so the asynchronous notification can be correlated back to
//! the user and project. The processor charge id becomes the intention's
//! unique key; it is set at most once and is immutable thereafter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::{PaymentError, Result};

/// Who is backing: a signed-in user or an anonymous session
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backer {
    User(i64),
    Session(String),
}

/// A pending backing attempt
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Intention {
    /// Generated identifier, embedded as charge metadata
    pub id: Uuid,

    /// Backing user, `None` for anonymous sessions
    pub user_id: Option<i64>,

    /// Anonymous session id, when no user is signed in
    pub session_id: Option<String>,

    /// Project being backed
    pub project_id: i64,

    /// Selected reward tier, if any
    pub reward_id: Option<i64>,

    /// Gateway name, set once the charge is created
    pub gateway: Option<String>,

    /// Processor charge id (unique key), set once the charge is created
    pub charge_id: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Intention {
    /// Create a new intention for a backer/project pair
    pub fn new(backer: &Backer, project_id: i64, reward_id: Option<i64>) -> Self {
        let (user_id, session_id) = match backer {
            Backer::User(id) => (Some(*id), None),
            Backer::Session(sid) => (None, Some(sid.clone())),
        };
        Self {
            id: Uuid::new_v4(),
            user_id,
            session_id,
            project_id,
            reward_id,
            gateway: None,
            charge_id: None,
            created_at: Utc::now(),
        }
    }

    /// Anonymous intentions carry no user id
    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }

    /// Reward id to record on the transaction; anonymous backers get none
    pub fn effective_reward_id(&self) -> Option<i64> {
        if self.is_anonymous() {
            None
        } else {
            self.reward_id
        }
    }
}

/// Intention storage
pub trait IntentionStore: Send + Sync {
    /// Save or update an intention
    fn save(&self, intention: &Intention) -> Result<()>;

    /// Get by id
    fn get(&self, id: Uuid) -> Result<Option<Intention>>;

    /// Fetch the open intention for a backer/project pair, creating one
    /// when none exists
    fn find_or_create(
        &self,
        backer: &Backer,
        project_id: i64,
        reward_id: Option<i64>,
    ) -> Result<Intention>;

    /// Bind the processor charge to an intention, once
    ///
    /// Re-attaching the same charge id is a no-op; a different charge id is
    /// an [`PaymentError::IntentionConflict`].
    fn attach_charge(&self, id: Uuid, gateway: &str, charge_id: &str) -> Result<()>;

    /// Delete after successful reconciliation
    fn delete(&self, id: Uuid) -> Result<()>;
}

fn backer_of(intention: &Intention) -> Option<Backer> {
    match (&intention.user_id, &intention.session_id) {
        (Some(id), _) => Some(Backer::User(*id)),
        (None, Some(sid)) => Some(Backer::Session(sid.clone())),
        (None, None) => None,
    }
}

/// The id map and the backer index must move together
#[derive(Default)]
struct IntentionMaps {
    by_id: HashMap<Uuid, Intention>,
    by_backer: HashMap<(Backer, i64), Uuid>,
}

/// In-memory intention store (for development and tests)
///
/// One lock guards both maps: every operation takes a single guard, so
/// checkout and webhook threads can never wedge against each other on lock
/// order.
pub struct MemoryIntentionStore {
    maps: RwLock<IntentionMaps>,
}

impl Default for MemoryIntentionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIntentionStore {
    pub fn new() -> Self {
        Self {
            maps: RwLock::new(IntentionMaps::default()),
        }
    }
}

impl IntentionStore for MemoryIntentionStore {
    fn save(&self, intention: &Intention) -> Result<()> {
        let backer = backer_of(intention)
            .ok_or_else(|| PaymentError::Storage("intention without a backer".into()))?;

        let mut maps = self.maps.write().unwrap();
        maps.by_backer
            .insert((backer, intention.project_id), intention.id);
        maps.by_id.insert(intention.id, intention.clone());

        Ok(())
    }

    fn get(&self, id: Uuid) -> Result<Option<Intention>> {
        let maps = self.maps.read().unwrap();
        Ok(maps.by_id.get(&id).cloned())
    }

    fn find_or_create(
        &self,
        backer: &Backer,
        project_id: i64,
        reward_id: Option<i64>,
    ) -> Result<Intention> {
        // Check and insert under one guard, so two concurrent submissions
        // for the same backer/project resolve to the same intention
        let mut maps = self.maps.write().unwrap();

        if let Some(id) = maps.by_backer.get(&(backer.clone(), project_id)) {
            if let Some(existing) = maps.by_id.get(id) {
                return Ok(existing.clone());
            }
        }

        let intention = Intention::new(backer, project_id, reward_id);
        maps.by_backer
            .insert((backer.clone(), project_id), intention.id);
        maps.by_id.insert(intention.id, intention.clone());
        Ok(intention)
    }

    fn attach_charge(&self, id: Uuid, gateway: &str, charge_id: &str) -> Result<()> {
        let mut maps = self.maps.write().unwrap();
        let intention = maps
            .by_id
            .get_mut(&id)
            .ok_or_else(|| PaymentError::IntentionNotFound(id.to_string()))?;

        match &intention.charge_id {
            Some(existing) if existing == charge_id => Ok(()),
            Some(existing) => Err(PaymentError::IntentionConflict {
                id: id.to_string(),
                existing: existing.clone(),
            }),
            None => {
                intention.gateway = Some(gateway.to_string());
                intention.charge_id = Some(charge_id.to_string());
                Ok(())
            }
        }
    }

    fn delete(&self, id: Uuid) -> Result<()> {
        let mut maps = self.maps.write().unwrap();

        if let Some(intention) = maps.by_id.remove(&id) {
            if let Some(backer) = backer_of(&intention) {
                let key = (backer, intention.project_id);
                // Only drop the index entry if it still points at this
                // intention; a newer attempt may have re-pointed it
                if maps.by_backer.get(&key) == Some(&id) {
                    maps.by_backer.remove(&key);
                }
            }
        }

        Ok(())
    }
}
