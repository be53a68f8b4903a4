//! The reconciliation engine between local state and the remote document.
//!
//! One actor owns both directions. Outbound: local mutations are change-
//! detected against a single last-synced checkpoint, debounced, and written
//! as a field-wise merge. Inbound: watch deliveries are debounced and applied
//! per field, and the checkpoint is advanced to the applied remote values.
//!
//! The checkpoint is what breaks echo loops: both directions compare
//! against it. Inbound fields that match the checkpoint carry no remote
//! news — they are this session's own writes coming back — and are skipped,
//! so an echo arriving after further local mutations cannot revert them.
//! Fields that differ are folded in and advance the checkpoint, so the
//! outbound change-detector does not mistake the application for a fresh
//! local change, push, re-trigger the watch, and cycle.
//!
//! The placeholder identity participates in neither direction; a fallback
//! session must never touch the shared store.

use serde_json::json;

use crate::debounce::Debouncer;
use crate::diag;
use crate::identity::Identity;
use crate::referrals;
use crate::remote::{from_doc, to_doc, Doc, DocStore, StoreError, UserDoc, WatchId, USER_COLLECTION};
use crate::state::{Profile, StateStore};
use crate::tasks::{self, TaskFlag};

/// Quiet window before a burst of local mutations is flushed.
pub const PUSH_QUIET_MS: f64 = 500.0;
/// Ceiling after which a continuous stream of mutations flushes anyway.
pub const PUSH_MAX_WAIT_MS: f64 = 1_000.0;
/// Quiet window for coalescing inbound watch deliveries.
pub const PULL_QUIET_MS: f64 = 500.0;
pub const PULL_MAX_WAIT_MS: f64 = 1_000.0;

/// The composite of fields owned by the outbound path. Identity metadata and
/// referrals are written elsewhere (account creation, referral ledger) and
/// deliberately absent.
#[derive(Clone, Debug, PartialEq)]
pub struct SyncedFields {
    pub balance: f64,
    pub rank: String,
    pub energy: f64,
    pub last_energy_update: f64,
    pub tasks: Vec<TaskFlag>,
    pub location: String,
}

impl SyncedFields {
    pub fn of(profile: &Profile) -> Self {
        Self {
            balance: profile.balance,
            rank: profile.rank.clone(),
            energy: profile.energy,
            last_energy_update: profile.last_energy_update,
            tasks: tasks::to_flags(&profile.tasks),
            location: profile.location.clone(),
        }
    }

    /// `carried` holds completion flags with titles outside the local
    /// catalog; they ride along so a rewrite of `tasks` does not erase a
    /// newer client's quests.
    fn to_patch(&self, carried: &[TaskFlag], now_ms: f64) -> Result<Doc, StoreError> {
        let mut doc = Doc::new();
        doc.insert("balance".into(), json!(self.balance));
        doc.insert("rank".into(), json!(self.rank));
        doc.insert("energy".into(), json!(self.energy));
        doc.insert("lastEnergyUpdate".into(), json!(self.last_energy_update));
        let mut flags = self.tasks.clone();
        flags.extend(carried.iter().cloned());
        doc.insert(
            "tasks".into(),
            serde_json::to_value(&flags).map_err(|e| StoreError::Codec(e.to_string()))?,
        );
        doc.insert("location".into(), json!(self.location));
        doc.insert("lastInteraction".into(), json!(now_ms));
        Ok(doc)
    }
}

pub struct SyncEngine {
    user_id: String,
    /// False for the placeholder identity: both paths disabled.
    enabled: bool,
    watch: Option<WatchId>,
    /// The canonical last-synced snapshot both directions compare against.
    last_synced: Option<SyncedFields>,
    push_debounce: Debouncer,
    pull_debounce: Debouncer,
    /// Latest inbound document of the current pull burst.
    pending_remote: Option<UserDoc>,
    /// Remote completion flags whose titles are outside the local catalog
    /// (written by a newer client); carried through every push verbatim.
    passthrough_flags: Vec<TaskFlag>,
    /// Last `StateStore` version inspected by `observe_local`.
    seen_version: u64,
    push_count: u64,
}

impl SyncEngine {
    pub fn new(identity: &Identity) -> Self {
        Self {
            user_id: identity.id.clone(),
            enabled: !identity.is_placeholder(),
            watch: None,
            last_synced: None,
            push_debounce: Debouncer::new(PUSH_QUIET_MS, PUSH_MAX_WAIT_MS),
            pull_debounce: Debouncer::new(PULL_QUIET_MS, PULL_MAX_WAIT_MS),
            pending_remote: None,
            passthrough_flags: Vec::new(),
            seen_version: 0,
            push_count: 0,
        }
    }

    /// Total outbound writes so far.
    pub fn pushes(&self) -> u64 {
        self.push_count
    }

    /// Session start: load or create the remote document, reconcile offline
    /// energy accrual, open the watch. On failure the engine disables
    /// itself — pushing without the remote baseline would merge a fresh
    /// profile over progress this session never loaded.
    pub fn bootstrap(
        &mut self,
        store: &mut dyn DocStore,
        state: &mut StateStore,
        now_ms: f64,
    ) -> Result<(), StoreError> {
        if !self.enabled {
            return Ok(());
        }
        if let Err(e) = self.load_or_create(store, state, now_ms) {
            self.enabled = false;
            return Err(e);
        }
        self.last_synced = Some(SyncedFields::of(state.profile()));
        self.seen_version = state.version();
        self.watch = Some(store.watch(USER_COLLECTION, &self.user_id));
        Ok(())
    }

    fn load_or_create(
        &mut self,
        store: &mut dyn DocStore,
        state: &mut StateStore,
        now_ms: f64,
    ) -> Result<(), StoreError> {
        match store.get(USER_COLLECTION, &self.user_id)? {
            Some(doc) => {
                let remote: UserDoc = from_doc(doc)?;
                state.apply_remote_balance(remote.balance);
                state.apply_remote_rank(&remote.rank);
                state.apply_remote_task_flags(&remote.tasks);
                state.apply_remote_referrals(&remote.referrals);
                if !remote.location.is_empty() {
                    state.set_location(&remote.location);
                }
                if !remote.selected_ship.is_empty() {
                    state.set_selected_ship(&remote.selected_ship);
                }
                self.passthrough_flags = remote
                    .tasks
                    .iter()
                    .filter(|f| !tasks::is_known_title(&f.title))
                    .cloned()
                    .collect();
                // The stored energy/stamp pair is the baseline; regenerate
                // from it up to now.
                state.apply_remote_energy(
                    remote.energy,
                    remote.max_energy,
                    remote.last_energy_update,
                );
                state.regen_energy(now_ms);
            }
            None => {
                // Account creation: the only write carrying identity
                // metadata; later pushes never touch those fields.
                let p = state.profile();
                let doc = UserDoc {
                    id: p.id.clone(),
                    first_name: p.first_name.clone(),
                    username: p.username.clone(),
                    photo_url: p.photo_url.clone(),
                    balance: p.balance,
                    energy: p.energy,
                    max_energy: p.max_energy,
                    last_energy_update: p.last_energy_update,
                    rank: p.rank.clone(),
                    tasks: tasks::to_flags(&p.tasks),
                    referrals: p.referrals.clone(),
                    selected_ship: p.selected_ship.clone(),
                    location: p.location.clone(),
                    last_interaction: now_ms,
                };
                store.merge(USER_COLLECTION, &self.user_id, to_doc(&doc)?)?;
            }
        }
        Ok(())
    }

    /// Tear down the watch and drop pending work. A detached session must
    /// stop reading and writing the shared document.
    pub fn shutdown(&mut self, store: &mut dyn DocStore) {
        if let Some(watch) = self.watch.take() {
            store.unwatch(watch);
        }
        self.push_debounce.clear();
        self.pull_debounce.clear();
        self.pending_remote = None;
    }

    /// Change detection over local state. Call once per tick; cheap when the
    /// version counter has not moved.
    pub fn observe_local(&mut self, state: &StateStore, now_ms: f64) {
        if !self.enabled || state.version() == self.seen_version {
            return;
        }
        self.seen_version = state.version();
        let snapshot = SyncedFields::of(state.profile());
        if Some(&snapshot) != self.last_synced.as_ref() {
            self.push_debounce.mark(now_ms);
        }
    }

    /// Drive both directions. Call once per tick after `observe_local`.
    pub fn poll(&mut self, store: &mut dyn DocStore, state: &mut StateStore, now_ms: f64) {
        if !self.enabled {
            return;
        }
        self.poll_inbound(store, now_ms);
        if self.pull_debounce.ready(now_ms) {
            self.pull_debounce.clear();
            if let Some(remote) = self.pending_remote.take() {
                self.apply_inbound(state, remote, now_ms);
            }
        }
        if self.push_debounce.ready(now_ms) {
            self.push_debounce.clear();
            self.flush_push(store, state, now_ms);
        }
    }

    fn poll_inbound(&mut self, store: &mut dyn DocStore, now_ms: f64) {
        let watch = match self.watch {
            Some(w) => w,
            None => return,
        };
        match store.poll_watch(watch) {
            Ok(Some(doc)) => match from_doc::<UserDoc>(doc) {
                Ok(remote) => {
                    // Later deliveries within the burst replace earlier
                    // ones; only the final snapshot is applied.
                    self.pending_remote = Some(remote);
                    self.pull_debounce.mark(now_ms);
                }
                Err(e) => diag::warn(&format!("sync: malformed remote document: {e}")),
            },
            Ok(None) => {}
            Err(e) => diag::warn(&format!("sync: watch poll failed: {e}")),
        }
    }

    /// Apply a coalesced inbound snapshot, comparing each field against the
    /// last-synced checkpoint. A field that matches the checkpoint is this
    /// session's own write coming back and is skipped, so an echo cannot
    /// revert mutations made since the push; a field that differs is folded
    /// into local state and advances the checkpoint to the remote value.
    fn apply_inbound(&mut self, state: &mut StateStore, remote: UserDoc, now_ms: f64) {
        let checkpoint = match self.last_synced.as_mut() {
            Some(c) => c,
            None => return,
        };

        if remote.balance.is_finite()
            && remote.balance >= 0.0
            && (remote.balance - checkpoint.balance).abs() > f64::EPSILON
        {
            state.apply_remote_balance(remote.balance);
            checkpoint.balance = remote.balance;
        }
        if remote.rank != checkpoint.rank {
            state.apply_remote_rank(&remote.rank);
            checkpoint.rank = state.profile().rank.clone();
        }
        let (known, foreign): (Vec<TaskFlag>, Vec<TaskFlag>) = remote
            .tasks
            .iter()
            .cloned()
            .partition(|f| tasks::is_known_title(&f.title));
        self.passthrough_flags = foreign;
        if known != checkpoint.tasks {
            state.apply_remote_task_flags(&known);
            checkpoint.tasks = known;
        }
        if !remote.location.is_empty() && remote.location != checkpoint.location {
            state.set_location(&remote.location);
            checkpoint.location = remote.location.clone();
        }
        if remote.last_energy_update > checkpoint.last_energy_update {
            // A fresher stamp means another session recorded accrual or
            // spend; fold the stamp in and note the persisted energy so
            // later comparisons run against what the store actually holds.
            state.observe_remote_energy_stamp(remote.last_energy_update);
            checkpoint.last_energy_update = remote.last_energy_update;
            checkpoint.energy = remote.energy;
        }
        if state.apply_remote_referrals(&remote.referrals) {
            referrals::remember(&self.user_id, state.profile().referrals.as_slice());
        }

        // Whatever still differs from the checkpoint after application is a
        // genuine local-only change (e.g. a completion the remote lacks) and
        // goes out on the usual debounced path.
        self.seen_version = state.version();
        let snapshot = SyncedFields::of(state.profile());
        if Some(&snapshot) != self.last_synced.as_ref() {
            self.push_debounce.mark(now_ms);
        }
    }

    fn flush_push(&mut self, store: &mut dyn DocStore, state: &StateStore, now_ms: f64) {
        // Snapshot at flush time: a burst of mutations pushes its final state.
        let snapshot = SyncedFields::of(state.profile());
        if Some(&snapshot) == self.last_synced.as_ref() {
            return;
        }
        if !snapshot.balance.is_finite() || snapshot.balance < 0.0 {
            // A negative balance here means a local computation bug upstream;
            // keep it out of the durable store.
            diag::warn(&format!(
                "sync: refusing to push negative balance {}",
                snapshot.balance
            ));
            return;
        }
        let patch = match snapshot.to_patch(&self.passthrough_flags, now_ms) {
            Ok(p) => p,
            Err(e) => {
                diag::warn(&format!("sync: failed to encode push: {e}"));
                return;
            }
        };
        match store.merge(USER_COLLECTION, &self.user_id, patch) {
            Ok(()) => {
                self.last_synced = Some(snapshot);
                self.push_count += 1;
            }
            // No retry here: the next local mutation or watch delivery is
            // the natural retry trigger.
            Err(e) => diag::warn(&format!("sync: push failed: {e}")),
        }
    }
}
