//! Remote document store seam.
//!
//! One JSON document per user under `userData`, one per spawn target under
//! `chests`, one session lock per user under `sessions`. The store is the
//! durable cross-session source of truth; any of the player's sessions may
//! write it, and conflicts resolve last-write-wins at the write layer.
//!
//! `DocStore` is the injection point: tests and offline mode use
//! [`MemoryStore`]; the production build plugs a JS-backed store in behind
//! the same trait. Watches are poll-based to match the tick-driven loop —
//! `poll_watch` hands back the latest document iff it changed since the
//! previous poll, so a burst of writes collapses into one delivery.

use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::state::Referral;
use crate::tasks::TaskFlag;

pub const USER_COLLECTION: &str = "userData";
pub const CHEST_COLLECTION: &str = "chests";
pub const SESSION_COLLECTION: &str = "sessions";

/// A document: top-level field map, merged field-wise on write.
pub type Doc = Map<String, Value>;

#[derive(Debug)]
pub enum StoreError {
    /// The backing store could not be reached this cycle.
    Unavailable(String),
    /// A document failed to (de)serialize.
    Codec(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(why) => write!(f, "store unavailable: {why}"),
            StoreError::Codec(why) => write!(f, "document codec error: {why}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Handle for a standing watch on one document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WatchId(u64);

pub trait DocStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Doc>, StoreError>;

    /// Field-wise merge write: fields present in `patch` replace their
    /// counterparts, absent fields are left untouched.
    fn merge(&mut self, collection: &str, id: &str, patch: Doc) -> Result<(), StoreError>;

    /// Open a standing watch on one document. Deliveries start with the
    /// first change after the watch opens; existing contents are not
    /// replayed (the caller has just read them).
    fn watch(&mut self, collection: &str, id: &str) -> WatchId;

    /// Latest document if it changed since this watch last polled.
    fn poll_watch(&mut self, watch: WatchId) -> Result<Option<Doc>, StoreError>;

    /// Tear the watch down; a detached session must stop observing.
    fn unwatch(&mut self, watch: WatchId);
}

/// Serialize into a mergeable document.
pub fn to_doc<T: Serialize>(value: &T) -> Result<Doc, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::Codec(format!(
            "expected an object document, got {other}"
        ))),
        Err(e) => Err(StoreError::Codec(e.to_string())),
    }
}

pub fn from_doc<T: DeserializeOwned>(doc: Doc) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(doc)).map_err(|e| StoreError::Codec(e.to_string()))
}

/// The per-user document as stored under `userData/{id}`.
///
/// Field names are camelCase on the wire; every field defaults so partial
/// documents written by older clients still load.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserDoc {
    pub id: String,
    pub first_name: String,
    pub username: String,
    pub photo_url: String,
    pub balance: f64,
    pub energy: f64,
    pub max_energy: f64,
    pub last_energy_update: f64,
    pub rank: String,
    pub tasks: Vec<TaskFlag>,
    pub referrals: Vec<Referral>,
    pub selected_ship: String,
    pub location: String,
    pub last_interaction: f64,
}

/// In-memory `DocStore`. Used by tests and by the degraded offline mode;
/// also the reference semantics for any real backend.
#[derive(Default)]
pub struct MemoryStore {
    docs: HashMap<(String, String), Doc>,
    /// Per-document write counter, bumped on every effective merge.
    versions: HashMap<(String, String), u64>,
    watches: HashMap<WatchId, WatchState>,
    next_watch: u64,
}

struct WatchState {
    key: (String, String),
    seen_version: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(collection: &str, id: &str) -> (String, String) {
        (collection.to_string(), id.to_string())
    }
}

impl DocStore for MemoryStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Doc>, StoreError> {
        Ok(self.docs.get(&Self::key(collection, id)).cloned())
    }

    fn merge(&mut self, collection: &str, id: &str, patch: Doc) -> Result<(), StoreError> {
        let key = Self::key(collection, id);
        let doc = self.docs.entry(key.clone()).or_default();
        let mut changed = false;
        for (field, value) in patch {
            if doc.get(&field) != Some(&value) {
                doc.insert(field, value);
                changed = true;
            }
        }
        if changed {
            *self.versions.entry(key).or_insert(0) += 1;
        }
        Ok(())
    }

    fn watch(&mut self, collection: &str, id: &str) -> WatchId {
        let key = Self::key(collection, id);
        let watch = WatchId(self.next_watch);
        self.next_watch += 1;
        // Start at the current version: writes before the watch opened are
        // history, not news.
        let seen_version = self.versions.get(&key).copied().unwrap_or(0);
        self.watches.insert(watch, WatchState { key, seen_version });
        watch
    }

    fn poll_watch(&mut self, watch: WatchId) -> Result<Option<Doc>, StoreError> {
        let state = match self.watches.get_mut(&watch) {
            Some(s) => s,
            None => return Ok(None),
        };
        let current = self.versions.get(&state.key).copied().unwrap_or(0);
        if current == state.seen_version {
            return Ok(None);
        }
        state.seen_version = current;
        Ok(self.docs.get(&state.key).cloned())
    }

    fn unwatch(&mut self, watch: WatchId) {
        self.watches.remove(&watch);
    }
}
