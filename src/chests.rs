//! Treasure chests: respawning tap targets.
//!
//! Chest positions are fixed per session, but the respawn timer is durable:
//! each chest is persisted as `chests/{userId}_{chestId}` so reloading the
//! page does not reset a chest that was just looted.
//!
//! Lifecycle: spawned with no loot stamp (immediately collectible) →
//! collected (stamp set to now) → ineligible until the respawn interval
//! elapses → eligible again.

use serde::{Deserialize, Serialize};

use crate::diag;
use crate::remote::{from_doc, to_doc, DocStore, StoreError, CHEST_COLLECTION};
use crate::state::StateStore;

/// How long a looted chest stays empty.
pub const CHEST_RESPAWN_MS: f64 = 60_000.0;

/// Gold per opened chest.
pub const CHEST_REWARD: f64 = 10.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Chest {
    pub id: u32,
    pub x: u16,
    pub y: u16,
    /// Epoch ms of the last loot, `None` when never looted.
    pub last_spawn_time: Option<f64>,
}

impl Default for Chest {
    fn default() -> Self {
        Self {
            id: 0,
            x: 0,
            y: 0,
            last_spawn_time: None,
        }
    }
}

/// The session's fixed chest layout.
pub fn spawn_layout() -> Vec<Chest> {
    vec![
        Chest { id: 1, x: 8, y: 4, last_spawn_time: None },
        Chest { id: 2, x: 28, y: 9, last_spawn_time: None },
        Chest { id: 3, x: 50, y: 5, last_spawn_time: None },
    ]
}

pub fn doc_id(user_id: &str, chest_id: u32) -> String {
    format!("{user_id}_{chest_id}")
}

pub fn is_collectible(chest: &Chest, now_ms: f64) -> bool {
    match chest.last_spawn_time {
        None => true,
        Some(looted_at) => now_ms - looted_at >= CHEST_RESPAWN_MS,
    }
}

/// Loot a chest: credit the reward, stamp it, and persist the stamp so the
/// respawn timer survives a reload. Returns false when the chest is still
/// respawning. A failed persist is logged and not retried; the stamp stays
/// local for this session either way.
pub fn collect(
    chest: &mut Chest,
    state: &mut StateStore,
    store: &mut dyn DocStore,
    now_ms: f64,
) -> bool {
    if !is_collectible(chest, now_ms) {
        return false;
    }
    chest.last_spawn_time = Some(now_ms);
    state.credit(CHEST_REWARD);

    let user_id = state.profile().id.clone();
    if let Err(e) = persist(store, &user_id, chest) {
        diag::warn(&format!("chests: failed to persist chest {}: {e}", chest.id));
    }
    true
}

fn persist(store: &mut dyn DocStore, user_id: &str, chest: &Chest) -> Result<(), StoreError> {
    store.merge(CHEST_COLLECTION, &doc_id(user_id, chest.id), to_doc(chest)?)
}

/// Overlay persisted loot stamps onto the session layout at startup.
/// Missing or malformed documents leave the chest as freshly spawned.
pub fn restore(store: &dyn DocStore, user_id: &str, chests: &mut [Chest]) {
    for chest in chests {
        match store.get(CHEST_COLLECTION, &doc_id(user_id, chest.id)) {
            Ok(Some(doc)) => match from_doc::<Chest>(doc) {
                Ok(saved) => chest.last_spawn_time = saved.last_spawn_time,
                Err(e) => diag::warn(&format!("chests: bad document for chest {}: {e}", chest.id)),
            },
            Ok(None) => {}
            Err(e) => diag::warn(&format!("chests: load failed for chest {}: {e}", chest.id)),
        }
    }
}
