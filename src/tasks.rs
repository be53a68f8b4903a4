//! Quest catalog and completion tracking.
//!
//! Two cleanly separated shapes: the static local catalog (`TaskDef`, which
//! carries the completion predicate and is never serialized) and the
//! persisted per-task record (`TaskFlag`, title + completed only). They are
//! joined by title at read time; titles are unique within the catalog.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::diag;
use crate::remote::{Doc, DocStore, USER_COLLECTION};
use crate::state::{Profile, StateStore};

/// A quest definition from the static catalog.
///
/// `check` is the completion condition — an externally-defined capability
/// (it may also trigger side effects like opening a link before the caller
/// asks for completion). It never leaves the process.
pub struct TaskDef {
    pub title: &'static str,
    pub points: f64,
    pub check: fn(&Profile) -> bool,
}

/// Per-task durable state as held in the profile.
#[derive(Clone, Debug, PartialEq)]
pub struct TaskState {
    pub title: String,
    pub points: f64,
    /// Monotonic: false→true, never reverts.
    pub completed: bool,
}

/// The serializable completion flag stored remotely. The remote store never
/// holds points or predicates, only which titles are done.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskFlag {
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

fn always(_: &Profile) -> bool {
    true
}

fn has_five_referrals(profile: &Profile) -> bool {
    profile.referrals.len() >= 5
}

/// The fixed quest catalog, in display order.
pub fn catalog() -> &'static [TaskDef] {
    &[
        TaskDef {
            title: "Join the crew channel",
            points: 500.0,
            check: always,
        },
        TaskDef {
            title: "Rate the game",
            points: 250.0,
            check: always,
        },
        TaskDef {
            title: "Invite 5 friends",
            points: 1_000.0,
            check: has_five_referrals,
        },
    ]
}

/// Whether a title exists in the local catalog. Flags with other titles
/// come from a newer client and must not be treated as local quests.
pub fn is_known_title(title: &str) -> bool {
    catalog().iter().any(|d| d.title == title)
}

/// Seed the per-profile task list from the catalog (all incomplete).
pub fn initial_states() -> Vec<TaskState> {
    catalog()
        .iter()
        .map(|def| TaskState {
            title: def.title.to_string(),
            points: def.points,
            completed: false,
        })
        .collect()
}

/// Merge remote completion flags onto local task states by title.
///
/// Unknown titles are ignored (the catalog is the authority on which quests
/// exist) and completion never reverts. Returns true when anything changed.
pub fn merge_flags(tasks: &mut [TaskState], flags: &[TaskFlag]) -> bool {
    let mut changed = false;
    for flag in flags {
        if !flag.completed {
            continue;
        }
        if let Some(task) = tasks.iter_mut().find(|t| t.title == flag.title) {
            if !task.completed {
                task.completed = true;
                changed = true;
            }
        }
    }
    changed
}

/// Try to complete a quest. Returns whether it actually completed.
///
/// No-op when already completed (checked against live local state, so two
/// calls in quick succession credit once) or when the predicate says the
/// condition is not met. On success the completion flag and the credited
/// balance go to the remote store in one combined write; a failed write is
/// logged and left to the debounced sync push, which carries both fields
/// anyway.
pub fn complete(def: &TaskDef, state: &mut StateStore, store: &mut dyn DocStore) -> bool {
    let already_done = state
        .profile()
        .tasks
        .iter()
        .find(|t| t.title == def.title)
        .map_or(true, |t| t.completed);
    if already_done {
        return false;
    }
    if !(def.check)(state.profile()) {
        return false;
    }
    if state.complete_task(def.title).is_none() {
        return false;
    }

    let p = state.profile();
    if p.id == crate::identity::PLACEHOLDER_ID {
        return true; // degraded mode: local play only, never persisted
    }
    let mut patch = Doc::new();
    patch.insert("balance".into(), json!(p.balance));
    match serde_json::to_value(to_flags(&p.tasks)) {
        Ok(flags) => {
            patch.insert("tasks".into(), flags);
        }
        Err(e) => {
            diag::warn(&format!("tasks: failed to encode flags: {e}"));
            return true;
        }
    }
    if let Err(e) = store.merge(USER_COLLECTION, &p.id, patch) {
        diag::warn(&format!("tasks: persist failed for {:?}: {e}", def.title));
    }
    true
}

/// Project local task states into their persisted shape.
pub fn to_flags(tasks: &[TaskState]) -> Vec<TaskFlag> {
    tasks
        .iter()
        .map(|t| TaskFlag {
            title: t.title.clone(),
            completed: t.completed,
        })
        .collect()
}
