//! Single-session lock.
//!
//! One lock document per user under `sessions/{userId}`, refreshed by a
//! heartbeat. A second tab for the same identity sees a heartbeat from a
//! different session id that is fresher than the inactivity timeout and
//! blocks itself. A heartbeat that is older than the timeout is a dead
//! session and may be taken over.
//!
//! A failed heartbeat write does not self-block: the lock is advisory, and
//! the next scheduled beat is the retry. Only observing a fresher foreign
//! heartbeat blocks.

use serde::{Deserialize, Serialize};

use crate::diag;
use crate::identity::Identity;
use crate::remote::{from_doc, to_doc, DocStore, StoreError, SESSION_COLLECTION};

/// How often the active session refreshes its heartbeat.
pub const HEARTBEAT_INTERVAL_MS: f64 = 10_000.0;

/// A heartbeat older than this marks the session as dead.
pub const SESSION_TIMEOUT_MS: f64 = 30_000.0;

#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionDoc {
    pub user_id: String,
    pub session_id: String,
    /// Epoch ms of the last heartbeat.
    pub timestamp: f64,
    pub active: bool,
}

pub struct SessionLock {
    user_id: String,
    session_id: String,
    enabled: bool,
    last_beat: Option<f64>,
    blocked: bool,
}

impl SessionLock {
    /// `session_id` must be unique per tab/session (e.g. random hex).
    pub fn new(identity: &Identity, session_id: String) -> Self {
        Self {
            user_id: identity.id.clone(),
            session_id,
            enabled: !identity.is_placeholder(),
            last_beat: None,
            blocked: false,
        }
    }

    /// Whether a fresher heartbeat from another session owns the lock.
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Claim or inspect the lock at session start. Returns false when a
    /// live foreign session already holds it (this session must not run).
    pub fn acquire(&mut self, store: &mut dyn DocStore, now_ms: f64) -> Result<bool, StoreError> {
        if !self.enabled {
            return Ok(true);
        }
        if let Some(doc) = store.get(SESSION_COLLECTION, &self.user_id)? {
            let existing: SessionDoc = from_doc(doc)?;
            if self.owned_by_other_live_session(&existing, now_ms) {
                self.blocked = true;
                return Ok(false);
            }
        }
        self.write_beat(store, now_ms)?;
        Ok(true)
    }

    /// Periodic drive: refresh the heartbeat when due, and re-check for a
    /// foreign takeover. Write failures are logged; the next beat retries.
    pub fn tick(&mut self, store: &mut dyn DocStore, now_ms: f64) {
        if !self.enabled || self.blocked {
            return;
        }
        let due = match self.last_beat {
            None => true,
            Some(at) => now_ms - at >= HEARTBEAT_INTERVAL_MS,
        };
        if !due {
            return;
        }

        match store.get(SESSION_COLLECTION, &self.user_id) {
            Ok(Some(doc)) => match from_doc::<SessionDoc>(doc) {
                Ok(existing) if self.owned_by_other_live_session(&existing, now_ms) => {
                    diag::warn("session: another live session took the lock, blocking");
                    self.blocked = true;
                    return;
                }
                Ok(_) => {}
                Err(e) => diag::warn(&format!("session: bad lock document: {e}")),
            },
            Ok(None) => {}
            Err(e) => diag::warn(&format!("session: lock read failed: {e}")),
        }

        if let Err(e) = self.write_beat(store, now_ms) {
            diag::warn(&format!("session: heartbeat write failed, will retry: {e}"));
        }
    }

    /// Release on teardown: mark inactive so another tab can start at once.
    pub fn release(&mut self, store: &mut dyn DocStore, now_ms: f64) {
        if !self.enabled || self.blocked {
            return;
        }
        let doc = SessionDoc {
            user_id: self.user_id.clone(),
            session_id: self.session_id.clone(),
            timestamp: now_ms,
            active: false,
        };
        if let Err(e) = to_doc(&doc)
            .and_then(|d| store.merge(SESSION_COLLECTION, &self.user_id, d))
        {
            diag::warn(&format!("session: release failed: {e}"));
        }
    }

    fn owned_by_other_live_session(&self, existing: &SessionDoc, now_ms: f64) -> bool {
        existing.active
            && existing.session_id != self.session_id
            && now_ms - existing.timestamp < SESSION_TIMEOUT_MS
    }

    fn write_beat(&mut self, store: &mut dyn DocStore, now_ms: f64) -> Result<(), StoreError> {
        let doc = SessionDoc {
            user_id: self.user_id.clone(),
            session_id: self.session_id.clone(),
            timestamp: now_ms,
            active: true,
        };
        store.merge(SESSION_COLLECTION, &self.user_id, to_doc(&doc)?)?;
        self.last_beat = Some(now_ms);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryStore;

    fn identity() -> Identity {
        Identity {
            id: "u1".into(),
            first_name: String::new(),
            username: String::new(),
            photo_url: String::new(),
        }
    }

    fn lock_doc(store: &MemoryStore) -> SessionDoc {
        from_doc(store.get(SESSION_COLLECTION, "u1").unwrap().unwrap()).unwrap()
    }

    #[test]
    fn first_session_acquires_and_beats() {
        let mut store = MemoryStore::new();
        let mut lock = SessionLock::new(&identity(), "s1".into());
        assert!(lock.acquire(&mut store, 0.0).unwrap());
        let doc = lock_doc(&store);
        assert_eq!(doc.session_id, "s1");
        assert!(doc.active);
    }

    #[test]
    fn fresh_foreign_heartbeat_blocks() {
        let mut store = MemoryStore::new();
        let mut first = SessionLock::new(&identity(), "s1".into());
        first.acquire(&mut store, 0.0).unwrap();

        let mut second = SessionLock::new(&identity(), "s2".into());
        assert!(!second.acquire(&mut store, 5_000.0).unwrap());
        assert!(second.is_blocked());
        // The lock still belongs to s1.
        assert_eq!(lock_doc(&store).session_id, "s1");
    }

    #[test]
    fn stale_foreign_heartbeat_is_taken_over() {
        let mut store = MemoryStore::new();
        let mut first = SessionLock::new(&identity(), "s1".into());
        first.acquire(&mut store, 0.0).unwrap();

        let mut second = SessionLock::new(&identity(), "s2".into());
        assert!(second
            .acquire(&mut store, SESSION_TIMEOUT_MS + 1.0)
            .unwrap());
        assert_eq!(lock_doc(&store).session_id, "s2");
    }

    #[test]
    fn own_heartbeat_never_blocks() {
        let mut store = MemoryStore::new();
        let mut lock = SessionLock::new(&identity(), "s1".into());
        lock.acquire(&mut store, 0.0).unwrap();
        lock.tick(&mut store, HEARTBEAT_INTERVAL_MS + 1.0);
        assert!(!lock.is_blocked());
        assert!((lock_doc(&store).timestamp - (HEARTBEAT_INTERVAL_MS + 1.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn beat_only_fires_on_the_interval() {
        let mut store = MemoryStore::new();
        let mut lock = SessionLock::new(&identity(), "s1".into());
        lock.acquire(&mut store, 0.0).unwrap();
        lock.tick(&mut store, 1_000.0); // not due yet
        assert!((lock_doc(&store).timestamp - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn takeover_mid_session_blocks_the_loser() {
        let mut store = MemoryStore::new();
        let mut lock = SessionLock::new(&identity(), "s1".into());
        lock.acquire(&mut store, 0.0).unwrap();

        // A foreign session grabs the lock (e.g. after our beats stalled).
        let foreign = SessionDoc {
            user_id: "u1".into(),
            session_id: "s2".into(),
            timestamp: 40_000.0,
            active: true,
        };
        store
            .merge(SESSION_COLLECTION, "u1", to_doc(&foreign).unwrap())
            .unwrap();

        lock.tick(&mut store, 41_000.0);
        assert!(lock.is_blocked());
        // Blocked sessions stop beating.
        lock.tick(&mut store, 60_000.0);
        assert_eq!(lock_doc(&store).session_id, "s2");
    }

    #[test]
    fn released_lock_is_free_immediately() {
        let mut store = MemoryStore::new();
        let mut first = SessionLock::new(&identity(), "s1".into());
        first.acquire(&mut store, 0.0).unwrap();
        first.release(&mut store, 1_000.0);

        let mut second = SessionLock::new(&identity(), "s2".into());
        assert!(second.acquire(&mut store, 2_000.0).unwrap());
    }

    #[test]
    fn placeholder_identity_never_locks() {
        let mut store = MemoryStore::new();
        let mut lock = SessionLock::new(&Identity::placeholder(), "s1".into());
        assert!(lock.acquire(&mut store, 0.0).unwrap());
        lock.tick(&mut store, 20_000.0);
        assert!(store.get(SESSION_COLLECTION, "guest").unwrap().is_none());
    }
}
