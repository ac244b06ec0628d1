//! Synchronisation helpers for the threaded runner.
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Level-triggered boolean shared between one producer and its consumers.
///
/// Consumers only care about the current level, never about how many
/// transitions happened while they were busy. All waits are bounded.
#[derive(Debug, Default)]
pub struct Signal {
    level: Mutex<bool>,
    changed: Condvar,
}

impl Signal {
    pub fn new(level: bool) -> Self {
        Self {
            level: Mutex::new(level),
            changed: Condvar::new(),
        }
    }

    pub fn get(&self) -> bool {
        *self.level.lock()
    }

    /// Set the level. Waiters are only woken when it actually changes.
    pub fn set_level(&self, level: bool) {
        let mut current = self.level.lock();
        if *current != level {
            *current = level;
            self.changed.notify_all();
        }
    }

    pub fn set(&self) {
        self.set_level(true);
    }

    pub fn clear(&self) {
        self.set_level(false);
    }

    /// Wait until the level equals `level` or `timeout` elapses. Returns
    /// whether the level was reached.
    pub fn wait_for(&self, level: bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut current = self.level.lock();
        while *current != level {
            if self.changed.wait_until(&mut current, deadline).timed_out() {
                return *current == level;
            }
        }
        true
    }

    /// Wait for the level to go high, then clear it. Returns `false` if it
    /// stayed low for the whole timeout.
    pub fn take(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut current = self.level.lock();
        while !*current {
            if self.changed.wait_until(&mut current, deadline).timed_out() && !*current {
                return false;
            }
        }
        *current = false;
        self.changed.notify_all();
        true
    }
}

/// Fixed-rate gate: reports when one period has passed since it last fired.
#[derive(Debug, Clone)]
pub struct Pacer {
    period: Duration,
    last: Instant,
}

impl Pacer {
    pub fn new(rate_hz: u32) -> Self {
        Self {
            period: Duration::from_secs(1) / rate_hz.max(1),
            last: Instant::now(),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether a period has elapsed; re-arms when it has.
    pub fn is_ready(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last) >= self.period {
            self.last = now;
            true
        } else {
            false
        }
    }

    /// Sleep until the end of the current period, but never longer than
    /// `max_wait`. Returns whether the period boundary was reached.
    pub fn wait_until_ready(&mut self, max_wait: Duration) -> bool {
        let deadline = self.last + self.period;
        let now = Instant::now();
        if deadline > now {
            let remaining = deadline - now;
            if remaining > max_wait {
                std::thread::sleep(max_wait);
                return false;
            }
            std::thread::sleep(remaining);
        }
        self.last = deadline.max(now);
        // After a long stall, re-anchor instead of bursting to catch up.
        if Instant::now().duration_since(self.last) > self.period * 4 {
            self.last = Instant::now();
        }
        true
    }
}
