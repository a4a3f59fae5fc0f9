//! Per-config send throttling.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Tracks the last successful dispatch per config.
///
/// Every check and update takes the lock exactly once, so two events racing
/// for the same config cannot both pass [`ThrottleGate::try_acquire`].
#[derive(Debug, Default)]
pub struct ThrottleGate {
    last_sent: Mutex<HashMap<String, Instant>>,
}

impl ThrottleGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `config_id` may send now.
    pub fn can_send(&self, config_id: &str, window: Duration) -> bool {
        self.can_send_at(config_id, window, Instant::now())
    }

    /// Record a send for `config_id` at the current instant.
    pub fn mark_sent(&self, config_id: &str) {
        self.mark_sent_at(config_id, Instant::now());
    }

    /// Check and mark in one step. Returns `true` if the caller may send.
    pub fn try_acquire(&self, config_id: &str, window: Duration) -> bool {
        self.try_acquire_at(config_id, window, Instant::now())
    }

    /// Drop any record for `config_id`.
    pub fn forget(&self, config_id: &str) {
        self.last_sent.lock().remove(config_id);
    }

    /// Number of configs with a recorded send.
    pub fn len(&self) -> usize {
        self.last_sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn can_send_at(&self, config_id: &str, window: Duration, now: Instant) -> bool {
        let last = self.last_sent.lock().get(config_id).copied();
        window_elapsed(last, window, now)
    }

    fn mark_sent_at(&self, config_id: &str, now: Instant) {
        self.last_sent.lock().insert(config_id.to_string(), now);
    }

    fn try_acquire_at(&self, config_id: &str, window: Duration, now: Instant) -> bool {
        let mut last_sent = self.last_sent.lock();
        if !window_elapsed(last_sent.get(config_id).copied(), window, now) {
            return false;
        }
        last_sent.insert(config_id.to_string(), now);
        true
    }
}

/// A zero window always passes; otherwise strictly more than `window` must
/// have elapsed since `last`.
fn window_elapsed(last: Option<Instant>, window: Duration, now: Instant) -> bool {
    match last {
        None => true,
        Some(_) if window.is_zero() => true,
        Some(last) => now.saturating_duration_since(last) > window,
    }
}
