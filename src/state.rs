//! Local game state for the active session.
//!
//! `StateStore` is the single owner of the in-memory profile. Every mutation
//! goes through a typed method and bumps a monotonic version counter, which
//! is the change-notification seam: the tick loop polls `version()` and feeds
//! changes to the sync engine instead of components sharing ambient globals.
//!
//! Mutations that would not change anything leave the version untouched, so
//! applying a remote snapshot that matches local state causes no downstream
//! churn.

use serde::{Deserialize, Serialize};

use crate::energy::{self, DEFAULT_MAX_ENERGY};
use crate::identity::Identity;
use crate::rank;
use crate::tasks::{self, TaskFlag, TaskState};

/// Gold credited per tap before the rank bonus.
pub const TAP_BASE_GAIN: f64 = 1.0;

/// Energy spent per tap.
pub const TAP_ENERGY_COST: f64 = 1.0;

/// One referred player.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Referral {
    pub id: String,
}

/// Identity and durable state for one player.
#[derive(Clone, Debug, PartialEq)]
pub struct Profile {
    pub id: String,
    pub first_name: String,
    pub username: String,
    pub photo_url: String,
    pub balance: f64,
    pub energy: f64,
    pub max_energy: f64,
    /// Epoch ms at which `energy` is known to be accurate.
    pub last_energy_update: f64,
    /// Cached projection of `rank::resolve_rank(balance)`.
    pub rank: String,
    pub tasks: Vec<TaskState>,
    pub referrals: Vec<Referral>,
    pub selected_ship: String,
    pub location: String,
}

impl Profile {
    pub fn new(identity: &Identity, now_ms: f64) -> Self {
        Self {
            id: identity.id.clone(),
            first_name: identity.first_name.clone(),
            username: identity.username.clone(),
            photo_url: identity.photo_url.clone(),
            balance: 0.0,
            energy: DEFAULT_MAX_ENERGY,
            max_energy: DEFAULT_MAX_ENERGY,
            last_energy_update: now_ms,
            rank: rank::resolve_rank(0.0).name.to_string(),
            tasks: tasks::initial_states(),
            referrals: Vec::new(),
            selected_ship: "sloop".to_string(),
            location: "harbor".to_string(),
        }
    }
}

/// Owner of the session's mutable game state.
pub struct StateStore {
    profile: Profile,
    version: u64,
}

impl StateStore {
    pub fn new(identity: &Identity, now_ms: f64) -> Self {
        Self {
            profile: Profile::new(identity, now_ms),
            version: 0,
        }
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Monotonic change counter; bumped by every effective mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    fn bump(&mut self) {
        self.version += 1;
    }

    fn refresh_rank(&mut self) {
        let resolved = rank::resolve_rank(self.profile.balance).name;
        if self.profile.rank != resolved {
            self.profile.rank = resolved.to_string();
        }
    }

    /// Current per-tap gain including the rank bonus.
    pub fn tap_gain(&self) -> f64 {
        TAP_BASE_GAIN + rank::resolve_rank(self.profile.balance).click_bonus
    }

    /// One tap: spend energy, credit gold, refresh the rank cache.
    /// Returns false (no state change) when energy is insufficient.
    pub fn tap(&mut self) -> bool {
        if self.profile.energy < TAP_ENERGY_COST {
            return false;
        }
        let gain = self.tap_gain();
        self.profile.energy -= TAP_ENERGY_COST;
        self.profile.balance += gain;
        self.refresh_rank();
        self.bump();
        true
    }

    /// Credit gold. Negative or non-finite amounts are ignored, as is a
    /// credit that would leave the balance negative.
    pub fn credit(&mut self, amount: f64) -> bool {
        if !amount.is_finite() || amount <= 0.0 {
            return false;
        }
        self.profile.balance += amount;
        self.refresh_rank();
        self.bump();
        true
    }

    /// Run energy regeneration up to `now_ms`.
    pub fn regen_energy(&mut self, now_ms: f64) {
        let p = &self.profile;
        let (energy, stamp) =
            energy::regen(p.energy, p.last_energy_update, p.max_energy, now_ms);
        if (energy - p.energy).abs() > f64::EPSILON
            || (stamp - p.last_energy_update).abs() > f64::EPSILON
        {
            self.profile.energy = energy;
            self.profile.last_energy_update = stamp;
            self.bump();
        }
    }

    /// Adopt the persisted energy snapshot at session start. The stored
    /// energy/stamp pair is the baseline regeneration resumes from; a fresh
    /// profile's full-energy default must not survive a reload. Malformed
    /// values leave local state untouched, and energy is clamped to the
    /// (possibly adopted) maximum.
    pub fn apply_remote_energy(&mut self, energy: f64, max_energy: f64, stamp_ms: f64) -> bool {
        if !energy.is_finite() || energy < 0.0 || !stamp_ms.is_finite() || stamp_ms < 0.0 {
            return false;
        }
        if max_energy.is_finite() && max_energy > 0.0 {
            self.profile.max_energy = max_energy;
        }
        self.profile.energy = energy.min(self.profile.max_energy);
        self.profile.last_energy_update = stamp_ms;
        self.bump();
        true
    }

    /// Fold in an energy stamp observed on the remote document, so accrual
    /// recorded by another concurrent session is not double-counted. Keeps
    /// whichever stamp is later.
    pub fn observe_remote_energy_stamp(&mut self, remote_stamp_ms: f64) {
        if remote_stamp_ms > self.profile.last_energy_update {
            self.profile.last_energy_update = remote_stamp_ms;
            self.bump();
        }
    }

    /// Mark a task completed and credit its points in one step, evaluated
    /// against live local state. Returns the points on the false→true
    /// transition, `None` when already completed or unknown.
    pub fn complete_task(&mut self, title: &str) -> Option<f64> {
        let task = self.profile.tasks.iter_mut().find(|t| t.title == title)?;
        if task.completed {
            return None;
        }
        task.completed = true;
        let points = task.points;
        self.profile.balance += points;
        self.refresh_rank();
        self.bump();
        Some(points)
    }

    /// Idempotent referral insert. Returns false when already present.
    pub fn add_referral(&mut self, id: &str) -> bool {
        if self.profile.referrals.iter().any(|r| r.id == id) {
            return false;
        }
        self.profile.referrals.push(Referral { id: id.to_string() });
        self.bump();
        true
    }

    pub fn set_location(&mut self, location: &str) {
        if self.profile.location != location {
            self.profile.location = location.to_string();
            self.bump();
        }
    }

    pub fn set_selected_ship(&mut self, ship: &str) {
        if self.profile.selected_ship != ship {
            self.profile.selected_ship = ship.to_string();
            self.bump();
        }
    }

    /// Bypass the credit guards (simulating an upstream computation bug).
    #[cfg(test)]
    pub fn set_balance_unchecked(&mut self, balance: f64) {
        self.profile.balance = balance;
        self.bump();
    }

    // ── Remote application (pull path) ────────────────────
    //
    // Each applies only when the incoming value actually differs, rejecting
    // malformed input; returns whether local state changed.

    pub fn apply_remote_balance(&mut self, balance: f64) -> bool {
        if !balance.is_finite() || balance < 0.0 {
            return false;
        }
        if (balance - self.profile.balance).abs() < f64::EPSILON {
            return false;
        }
        self.profile.balance = balance;
        self.refresh_rank();
        self.bump();
        true
    }

    /// Apply a remote rank string. The rank cache must always equal the
    /// resolver's answer for the loaded balance, so a remote rank that
    /// disagrees with the resolver is discarded in favor of recomputing.
    pub fn apply_remote_rank(&mut self, rank_name: &str) -> bool {
        let resolved = rank::resolve_rank(self.profile.balance).name;
        let next = match rank::tier_by_name(rank_name) {
            Some(tier) if tier.name == resolved => tier.name,
            _ => resolved,
        };
        if self.profile.rank == next {
            return false;
        }
        self.profile.rank = next.to_string();
        self.bump();
        true
    }

    pub fn apply_remote_task_flags(&mut self, flags: &[TaskFlag]) -> bool {
        if tasks::merge_flags(&mut self.profile.tasks, flags) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Replace the referral set when it differs. The set only grows within a
    /// session, so a shorter incoming list is treated as a stale snapshot
    /// and ignored.
    pub fn apply_remote_referrals(&mut self, referrals: &[Referral]) -> bool {
        if referrals.len() < self.profile.referrals.len()
            || referrals == self.profile.referrals.as_slice()
        {
            return false;
        }
        self.profile.referrals = referrals.to_vec();
        self.bump();
        true
    }
}
