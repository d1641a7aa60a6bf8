// Finite state machine for the queue lifecycle
use super::broadcaster::{Broadcaster, SubscriberId, Subscription};
use super::click_gate::ClickGate;
use super::error::{ControllerError, ControllerResult};
use super::types::{ClickTarget, ControllerSnapshot, QueueState};
use crate::input::InputExecutor;
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};

pub const EVENT_AUTO_ACCEPT_CLICKED: &str = "auto_accept:clicked";
pub const EVENT_TIMEOUT_DISARMED: &str = "timeout:auto_accept_disabled";
pub const EVENT_RESET: &str = "reset";

/// Owns the canonical queue state. Every mutation goes through the methods
/// here; each effective transition publishes exactly one snapshot.
pub struct StateMachine<E: InputExecutor> {
    snapshot: ControllerSnapshot,
    gate: ClickGate<E>,
    broadcaster: Broadcaster,
    snapshot_tx: watch::Sender<ControllerSnapshot>,
    stop_after_match_found_s: f64,
    // Disarm timer: only a firing carrying the current generation counts
    timer_generation: u64,
    pending_timer: Option<JoinHandle<()>>,
    timer_tx: mpsc::Sender<u64>,
}

impl<E: InputExecutor> StateMachine<E> {
    pub fn new(
        gate: ClickGate<E>,
        auto_accept_enabled: bool,
        stop_after_match_found_s: f64,
        timer_tx: mpsc::Sender<u64>,
    ) -> (Self, watch::Receiver<ControllerSnapshot>) {
        let snapshot = ControllerSnapshot::initial(auto_accept_enabled);
        let (snapshot_tx, snapshot_rx) = watch::channel(snapshot.clone());
        let fsm = Self {
            snapshot,
            gate,
            broadcaster: Broadcaster::new(),
            snapshot_tx,
            stop_after_match_found_s,
            timer_generation: 0,
            pending_timer: None,
            timer_tx,
        };
        (fsm, snapshot_rx)
    }

    pub fn state(&self) -> QueueState {
        self.snapshot.queue_state
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        self.snapshot.clone()
    }

    pub fn gate(&self) -> &ClickGate<E> {
        &self.gate
    }

    pub fn has_pending_timer(&self) -> bool {
        self.pending_timer.is_some()
    }

    pub fn subscribe(&mut self) -> Subscription {
        self.broadcaster.subscribe()
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.broadcaster.unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.broadcaster.len()
    }

    /// Swap click settings and timeout policy. Queue state and any armed
    /// timer are left alone.
    pub fn apply_settings(&mut self, gate: ClickGate<E>, stop_after_match_found_s: f64) {
        self.gate = gate;
        self.stop_after_match_found_s = stop_after_match_found_s;
    }

    fn publish(&mut self) {
        let snapshot = self.snapshot.clone();
        self.broadcaster.publish(&snapshot);
        self.snapshot_tx.send_replace(snapshot);
    }

    fn transition(&mut self, new_state: QueueState, event: impl Into<String>) {
        let event = event.into();
        log::info!(
            "🎮 Queue state: {} -> {} ({})",
            self.snapshot.queue_state,
            new_state,
            event
        );
        let now = Utc::now();
        self.snapshot.queue_state = new_state;
        self.snapshot.last_event = Some(event);
        self.snapshot.last_state_change_at = Some(now);
        if new_state == QueueState::MatchFound {
            self.snapshot.last_match_found_at = Some(now);
        }
        self.publish();
    }

    /// Manual "Find Match": valid from idle, or from accepted to begin a new cycle
    pub fn start_queue(&mut self) -> ControllerResult<ControllerSnapshot> {
        match self.state() {
            QueueState::Idle | QueueState::Accepted => {
                self.gate.request_click(ClickTarget::Queue);
                self.transition(QueueState::Searching, state_changed(QueueState::Searching));
                Ok(self.snapshot())
            }
            QueueState::Searching => Ok(self.snapshot()),
            state => Err(ControllerError::InvalidTransition {
                command: "start queue",
                state,
            }),
        }
    }

    /// Manual "Cancel Search": valid only while searching
    pub fn stop_queue(&mut self) -> ControllerResult<ControllerSnapshot> {
        match self.state() {
            QueueState::Searching => {
                self.gate.request_click(ClickTarget::Queue);
                self.transition(QueueState::Idle, state_changed(QueueState::Idle));
                Ok(self.snapshot())
            }
            QueueState::Idle => Ok(self.snapshot()),
            state => Err(ControllerError::InvalidTransition {
                command: "stop queue",
                state,
            }),
        }
    }

    /// External restart: back to idle without clicking anything
    pub fn reset(&mut self) -> ControllerSnapshot {
        self.cancel_timer();
        if self.state() != QueueState::Idle {
            self.transition(QueueState::Idle, EVENT_RESET);
        }
        self.snapshot()
    }

    /// Only affects future detections; armed timers and dispatched clicks stand
    pub fn set_auto_accept(&mut self, enabled: bool) -> ControllerSnapshot {
        log::info!("Auto-accept {}", if enabled { "enabled" } else { "disabled" });
        self.snapshot.auto_accept_enabled = enabled;
        self.publish();
        self.snapshot()
    }

    /// Apply a state reported by the detection loop
    pub fn on_observed(&mut self, observed: QueueState) {
        match observed {
            QueueState::MatchFound => self.enter_match_found(),
            _ if observed == self.state() => {}
            _ if self.state() == QueueState::Accepted => {
                log::debug!("Ignoring observed {} after accepting", observed);
            }
            _ => self.transition(observed, state_changed(observed)),
        }
    }

    // Re-entering match_found always re-runs the side effects: it means
    // "still waiting to accept", so the click is retried or the timer re-armed.
    fn enter_match_found(&mut self) {
        self.transition(QueueState::MatchFound, state_changed(QueueState::MatchFound));
        if self.snapshot.auto_accept_enabled {
            self.gate.request_click(ClickTarget::Accept);
            self.transition(QueueState::Accepted, EVENT_AUTO_ACCEPT_CLICKED);
        } else {
            self.arm_timer();
        }
    }

    fn arm_timer(&mut self) {
        self.cancel_timer();
        if self.stop_after_match_found_s <= 0.0 {
            return;
        }
        let Ok(delay) = Duration::try_from_secs_f64(self.stop_after_match_found_s) else {
            log::warn!(
                "⚠️ Disarm timeout {}s is out of range; timer not armed",
                self.stop_after_match_found_s
            );
            return;
        };
        self.timer_generation += 1;
        let generation = self.timer_generation;
        let timer_tx = self.timer_tx.clone();
        log::debug!("⏱️ Disarm timer #{} armed for {:?}", generation, delay);
        self.pending_timer = Some(tokio::spawn(async move {
            sleep(delay).await;
            let _ = timer_tx.send(generation).await;
        }));
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.pending_timer.take() {
            timer.abort();
            // Also invalidates a firing that was already queued before the abort
            self.timer_generation += 1;
            log::debug!("⏱️ Pending disarm timer cancelled");
        }
    }

    /// Disarm-timeout firing. The state is re-checked because commands or
    /// detections may have moved on while the timer slept.
    pub fn on_timeout(&mut self, generation: u64) {
        if generation != self.timer_generation {
            log::debug!("⏱️ Ignoring superseded disarm timer #{}", generation);
            return;
        }
        self.pending_timer = None;
        if self.state() != QueueState::MatchFound {
            log::debug!("⏱️ Disarm timer fired in {}; nothing to do", self.state());
            return;
        }
        log::warn!("⚠️ Match was not accepted in time; disabling auto-accept");
        self.snapshot.auto_accept_enabled = false;
        self.transition(QueueState::Idle, EVENT_TIMEOUT_DISARMED);
    }

    pub fn shutdown(&mut self) {
        self.cancel_timer();
    }
}

fn state_changed(state: QueueState) -> String {
    format!("state_changed:{}", state)
}
