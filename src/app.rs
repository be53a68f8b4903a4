//! Session orchestration: wires state, sync, session lock, and chests to
//! the tick loop and the input events.

use crate::chests::{self, Chest};
use crate::diag;
use crate::identity::Launch;
use crate::input::{InputEvent, ACTION_CHEST_BASE, ACTION_TAP, ACTION_TASK_BASE};
use crate::referrals;
use crate::remote::DocStore;
use crate::session::SessionLock;
use crate::state::StateStore;
use crate::sync::SyncEngine;
use crate::tasks;

#[derive(Clone, Debug)]
pub struct LogEntry {
    pub text: String,
    pub is_important: bool,
}

pub struct App {
    pub state: StateStore,
    pub chests: Vec<Chest>,
    pub log: Vec<LogEntry>,
    /// Set when another live session holds the lock; the app idles.
    pub blocked: bool,
    engine: SyncEngine,
    session: SessionLock,
    store: Box<dyn DocStore>,
}

impl App {
    pub fn new(launch: Launch, mut store: Box<dyn DocStore>, session_id: String, now_ms: f64) -> Self {
        let mut state = StateStore::new(&launch.identity, now_ms);

        // Pre-populate from the local cache before live data arrives.
        if let Some(cached) = referrals::recall(&launch.identity.id) {
            state.apply_remote_referrals(&cached);
        }

        let mut session = SessionLock::new(&launch.identity, session_id);
        let blocked = match session.acquire(&mut *store, now_ms) {
            Ok(acquired) => !acquired,
            Err(e) => {
                // Advisory lock: an unreachable store does not block play.
                diag::warn(&format!("session: acquire failed: {e}"));
                false
            }
        };

        let mut engine = SyncEngine::new(&launch.identity);
        if !blocked {
            if let Err(e) = engine.bootstrap(&mut *store, &mut state, now_ms) {
                diag::warn(&format!("sync: bootstrap failed, playing offline: {e}"));
            }
        }

        let mut chest_layout = chests::spawn_layout();
        chests::restore(&*store, &launch.identity.id, &mut chest_layout);

        let mut app = Self {
            state,
            chests: chest_layout,
            log: Vec::new(),
            blocked,
            engine,
            session,
            store,
        };

        if app.blocked {
            app.add_log("別のタブでプレイ中です。こちらのセッションは停止します。", true);
        } else {
            app.add_log("出航！タップしてゴールドを集めよう。", true);
            if launch.identity.is_placeholder() {
                app.add_log("Telegram 外で起動: ゲストモード（保存されません）", false);
            }
        }

        // Referral attribution happens once, at session start.
        if let Some(referrer) = launch.referrer.as_deref() {
            if !launch.identity.is_placeholder() {
                match referrals::attribute_referral(
                    &mut *app.store,
                    Some(&mut app.state),
                    &launch.identity.id,
                    referrer,
                ) {
                    Ok(true) => diag::log(&format!("referrals: attributed to {referrer}")),
                    Ok(false) => {}
                    Err(e) => diag::warn(&format!("referrals: attribution failed: {e}")),
                }
            }
        }

        app
    }

    pub fn add_log(&mut self, text: &str, is_important: bool) {
        self.log.push(LogEntry {
            text: text.to_string(),
            is_important,
        });
        if self.log.len() > 50 {
            self.log.remove(0);
        }
    }

    /// Handle one input event. Returns true when the event was consumed.
    pub fn handle_input(&mut self, event: &InputEvent, now_ms: f64) -> bool {
        if self.blocked {
            return false;
        }
        match event {
            InputEvent::Key('c') | InputEvent::Key(' ') | InputEvent::Click(ACTION_TAP) => {
                self.tap();
                true
            }
            InputEvent::Key(c @ '1'..='9') => {
                let idx = (*c as u8 - b'1') as usize;
                self.try_task(idx);
                true
            }
            InputEvent::Click(id) if *id >= ACTION_CHEST_BASE => {
                self.try_chest((*id - ACTION_CHEST_BASE) as usize, now_ms);
                true
            }
            InputEvent::Click(id) if *id >= ACTION_TASK_BASE => {
                self.try_task((*id - ACTION_TASK_BASE) as usize);
                true
            }
            _ => false,
        }
    }

    fn tap(&mut self) {
        if !self.state.tap() {
            self.add_log("エネルギーが切れた…回復を待とう。", false);
        }
    }

    fn try_task(&mut self, idx: usize) {
        let def = match tasks::catalog().get(idx) {
            Some(d) => d,
            None => return,
        };
        if tasks::complete(def, &mut self.state, &mut *self.store) {
            self.add_log(&format!("クエスト達成: {} (+{})", def.title, def.points), true);
        }
    }

    fn try_chest(&mut self, idx: usize, now_ms: f64) {
        let chest = match self.chests.get_mut(idx) {
            Some(c) => c,
            None => return,
        };
        if chests::collect(chest, &mut self.state, &mut *self.store, now_ms) {
            self.add_log("宝箱を開けた！", true);
        }
    }

    /// Drive one logic step. `delta_ticks` comes from the tick clock;
    /// timestamp-driven subsystems use `now_ms` directly.
    pub fn tick(&mut self, now_ms: f64, delta_ticks: u32) {
        if self.blocked || delta_ticks == 0 {
            return;
        }
        self.state.regen_energy(now_ms);
        self.engine.observe_local(&self.state, now_ms);
        self.engine.poll(&mut *self.store, &mut self.state, now_ms);
        self.session.tick(&mut *self.store, now_ms);
        if self.session.is_blocked() {
            self.blocked = true;
            self.engine.shutdown(&mut *self.store);
            self.add_log("別のセッションに引き継がれました。", true);
        }
    }

    /// Teardown when the view goes away.
    pub fn shutdown(&mut self, now_ms: f64) {
        self.engine.shutdown(&mut *self.store);
        self.session.release(&mut *self.store, now_ms);
    }
}
