//! Single-shot timers keyed by owner, with replace-on-reschedule semantics
//!
//! Each key owns at most one pending timer. `reschedule` cancels whatever is
//! pending for the key and arms a new deadline in one call, so there is no
//! window in which the old timer can fire after a replacement was requested.
//! Time only moves when the owner calls `advance`, which keeps the manager
//! deterministic under a fixed tick.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

/// Converts game seconds to a delay; negative and NaN become zero, values
/// past the `Duration` range saturate
pub fn seconds(secs: f32) -> Duration {
    Duration::try_from_secs_f32(secs.max(0.0)).unwrap_or(Duration::MAX)
}

#[derive(Debug, Clone, Copy)]
struct PendingTimer {
    deadline: Duration,
    generation: u64,
}

#[derive(Debug)]
pub struct TimerManager<K> {
    now: Duration,
    timers: HashMap<K, PendingTimer>,
    next_generation: u64,
}

impl<K: Copy + Eq + Hash> TimerManager<K> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            timers: HashMap::new(),
            next_generation: 1,
        }
    }

    /// Cancels any pending timer for `key` and arms a fresh one
    pub fn reschedule(&mut self, key: K, delay: Duration) {
        let generation = self.next_generation;
        self.next_generation += 1;

        self.timers.insert(
            key,
            PendingTimer {
                deadline: self.now.saturating_add(delay),
                generation,
            },
        );
    }

    /// Returns true if a pending timer was removed
    pub fn cancel(&mut self, key: &K) -> bool {
        self.timers.remove(key).is_some()
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.timers.contains_key(key)
    }

    pub fn remaining(&self, key: &K) -> Option<Duration> {
        self.timers
            .get(key)
            .map(|timer| timer.deadline.saturating_sub(self.now))
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Moves the clock forward and returns the keys whose timers fired,
    /// earliest deadline first
    pub fn advance(&mut self, dt: Duration) -> Vec<K> {
        self.now = self.now.saturating_add(dt);
        let now = self.now;

        let mut expired: Vec<(K, PendingTimer)> = self
            .timers
            .iter()
            .filter(|(_, timer)| timer.deadline <= now)
            .map(|(key, timer)| (*key, *timer))
            .collect();

        expired.sort_by_key(|(_, timer)| (timer.deadline, timer.generation));

        for (key, _) in &expired {
            self.timers.remove(key);
        }

        expired.into_iter().map(|(key, _)| key).collect()
    }
}

impl<K: Copy + Eq + Hash> Default for TimerManager<K> {
    fn default() -> Self {
        Self::new()
    }
}
