//! Fire-once timers for the arm/confirm pattern
//!
//! Timers are keyed: arming a key that is already armed replaces its
//! deadline, which gives debouncing for free. The scheduler never runs
//! anything itself. The owner polls [`ConfirmScheduler::take_due`] with the
//! current instant, re-checks the triggering condition for each fired key,
//! and only then commits the action. Time is always passed in explicitly so
//! the whole machinery can be driven by a test clock.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::platform::Pid;
use crate::section::SectionName;

/// Every deferred action the manager knows about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerKey {
    /// Debounced re-sort of control items after position changes
    AssignByPosition,
    /// Debounced save of the section list
    PersistSections,
    /// Debounced refresh after the active space changed
    SpaceChanged,
    HoverShow,
    HoverHide,
    ClickShow(SectionName),
    SmartRehide,
    /// Timed rule: pointer has been below the bar since the timer was armed
    RehideConfirm(SectionName),
    /// Focus rule: waiting for a freshly focused app to finish launching
    FocusRehide { pid: Pid, attempt: u32 },
}

pub type Timers = ConfirmScheduler<TimerKey>;

#[derive(Debug)]
struct Armed<K> {
    key: K,
    deadline: Instant,
}

/// Keyed fire-once timers ordered by deadline
#[derive(Debug)]
pub struct ConfirmScheduler<K> {
    /// Sequence number → armed timer; the sequence keeps same-deadline timers FIFO
    armed: BTreeMap<u64, Armed<K>>,
    next_seq: u64,
}

impl<K> Default for ConfirmScheduler<K> {
    fn default() -> Self {
        Self {
            armed: BTreeMap::new(),
            next_seq: 0,
        }
    }
}

impl<K: PartialEq + Clone + Debug> ConfirmScheduler<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `key` to fire `delay` after `now`, replacing any pending deadline
    pub fn arm(&mut self, key: K, now: Instant, delay: Duration) {
        self.cancel(&key);
        debug!(key = ?key, delay_ms = delay.as_millis() as u64, "Armed timer");
        let seq = self.next_seq;
        self.next_seq += 1;
        self.armed.insert(seq, Armed { key, deadline: now + delay });
    }

    /// Arm `key` only if it is not pending already (keeps the earlier deadline)
    pub fn arm_if_idle(&mut self, key: K, now: Instant, delay: Duration) {
        if !self.is_armed(&key) {
            self.arm(key, now, delay);
        }
    }

    pub fn cancel(&mut self, key: &K) -> bool {
        let before = self.armed.len();
        self.armed.retain(|_, armed| armed.key != *key);
        let cancelled = self.armed.len() != before;
        if cancelled {
            debug!(key = ?key, "Cancelled timer");
        }
        cancelled
    }

    /// Cancel every timer whose key matches the predicate
    pub fn cancel_where(&mut self, mut predicate: impl FnMut(&K) -> bool) {
        self.armed.retain(|_, armed| {
            let cancel = predicate(&armed.key);
            if cancel {
                debug!(key = ?armed.key, "Cancelled timer");
            }
            !cancel
        });
    }

    pub fn is_armed(&self, key: &K) -> bool {
        self.armed.values().any(|armed| armed.key == *key)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.armed.len()
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.armed.values().map(|armed| armed.deadline).min()
    }

    /// Remove and return every key whose deadline is at or before `now`,
    /// earliest deadline first
    pub fn take_due(&mut self, now: Instant) -> Vec<K> {
        let mut due: Vec<(Instant, u64)> = self
            .armed
            .iter()
            .filter(|(_, armed)| armed.deadline <= now)
            .map(|(seq, armed)| (armed.deadline, *seq))
            .collect();
        due.sort();

        due.into_iter()
            .filter_map(|(_, seq)| self.armed.remove(&seq))
            .map(|armed| {
                debug!(key = ?armed.key, "Timer fired");
                armed.key
            })
            .collect()
    }
}
