//! 60 Hz delay and sound timers.
//!
//! A timer holds an 8-bit value that counts down to zero at 60 Hz. Two
//! strategies share the same `read`/`write`/`tick` surface:
//!
//! - [`TimerMode::WallClock`] derives the decay lazily from elapsed real time
//!   whenever the timer is touched, so no driver is needed.
//! - [`TimerMode::Ticked`] is a plain counter decremented once per `tick`,
//!   for hosts that already run a 60 Hz loop.
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};

/// Timer rate in Hz.
pub const TIMER_HZ: u32 = 60;

/// Length of one timer tick.
pub const TICK_PERIOD: Duration = Duration::from_nanos(1_000_000_000 / TIMER_HZ as u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerMode {
    #[default]
    WallClock,
    Ticked,
}

#[derive(Debug, Clone)]
pub struct Timer {
    mode: TimerMode,
    value: u8,
    /// Decay reference point; only meaningful in `WallClock` mode.
    last_update: Instant,
}

impl Timer {
    pub fn new(mode: TimerMode) -> Self {
        Self {
            mode,
            value: 0,
            last_update: Instant::now(),
        }
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn read(&mut self) -> u8 {
        self.read_at(Instant::now())
    }

    /// Set the value and restart decay. Returns the previous value.
    pub fn write(&mut self, value: u8) -> u8 {
        self.write_at(value, Instant::now())
    }

    /// Advance by one 60 Hz tick.
    ///
    /// In `WallClock` mode the elapsed time already accounts for the tick, so
    /// this only reconciles against the clock.
    pub fn tick(&mut self) -> u8 {
        match self.mode {
            TimerMode::Ticked => {
                self.value = self.value.saturating_sub(1);
                self.value
            }
            TimerMode::WallClock => self.read(),
        }
    }

    pub fn read_at(&mut self, now: Instant) -> u8 {
        if self.mode == TimerMode::WallClock {
            let elapsed = now.saturating_duration_since(self.last_update);
            let ticks = elapsed.as_nanos() / TICK_PERIOD.as_nanos();
            if ticks > 0 {
                // The value cannot drop below zero, so anything past 255 ticks
                // behaves the same as 255.
                let ticks = ticks.min(u8::MAX as u128) as u8;
                self.value = self.value.saturating_sub(ticks);
                self.last_update = now;
            }
        }
        self.value
    }

    pub fn write_at(&mut self, value: u8, now: Instant) -> u8 {
        let old = self.value;
        self.value = value;
        self.last_update = now;
        old
    }
}

/// The delay and sound timers together.
#[derive(Debug, Clone)]
pub struct TimerBank {
    pub delay: Timer,
    pub sound: Timer,
}

impl TimerBank {
    pub fn new(mode: TimerMode) -> Self {
        Self {
            delay: Timer::new(mode),
            sound: Timer::new(mode),
        }
    }

    /// Decrement both timers by one tick.
    pub fn tick(&mut self) {
        self.delay.tick();
        self.sound.tick();
    }

    /// Whether the host should be emitting sound.
    pub fn sound_active(&mut self) -> bool {
        self.sound.read() > 0
    }
}

/// Handle to a [`TimerBank`] that can be shared with a dedicated timer
/// thread. Every read-modify-write happens under the lock, so a concurrent
/// tick can never be observed half-applied.
#[derive(Debug, Clone)]
pub struct SharedTimers(Arc<Mutex<TimerBank>>);

impl SharedTimers {
    pub fn new(mode: TimerMode) -> Self {
        Self(Arc::new(Mutex::new(TimerBank::new(mode))))
    }

    pub fn lock(&self) -> MutexGuard<'_, TimerBank> {
        self.0.lock()
    }

    pub fn tick(&self) {
        self.0.lock().tick();
    }

    pub fn sound_active(&self) -> bool {
        self.0.lock().sound_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_clock_reads_back_immediately() {
        let start = Instant::now();
        let mut timer = Timer::new(TimerMode::WallClock);
        assert_eq!(timer.write_at(10, start), 0);
        assert_eq!(timer.read_at(start), 10);
    }

    #[test]
    fn wall_clock_decays_at_60hz() {
        let start = Instant::now();
        let mut timer = Timer::new(TimerMode::WallClock);
        timer.write_at(10, start);

        assert_eq!(timer.read_at(start + TICK_PERIOD * 3), 7);
        // Partial ticks do not count.
        assert_eq!(timer.read_at(start + TICK_PERIOD * 3 + TICK_PERIOD / 2), 7);
        assert_eq!(timer.read_at(start + TICK_PERIOD * 10), 0);
    }

    #[test]
    fn wall_clock_saturates_after_long_gaps() {
        let start = Instant::now();
        let mut timer = Timer::new(TimerMode::WallClock);
        timer.write_at(200, start);
        assert_eq!(timer.read_at(start + Duration::from_secs(3600)), 0);
    }

    #[test]
    fn write_returns_previous_value() {
        let start = Instant::now();
        let mut timer = Timer::new(TimerMode::Ticked);
        timer.write_at(5, start);
        assert_eq!(timer.write_at(9, start), 5);
    }

    #[test]
    fn ticked_counts_down_once_per_tick() {
        let mut timer = Timer::new(TimerMode::Ticked);
        timer.write(10);
        for expected in (0..10).rev() {
            assert_eq!(timer.tick(), expected);
        }
        assert_eq!(timer.tick(), 0);
        assert_eq!(timer.read(), 0);
    }

    #[test]
    fn both_modes_take_ten_ticks_from_ten() {
        let start = Instant::now();
        let mut lazy = Timer::new(TimerMode::WallClock);
        let mut ticked = Timer::new(TimerMode::Ticked);
        lazy.write_at(10, start);
        ticked.write_at(10, start);

        for i in 1..=10u32 {
            ticked.tick();
            assert_eq!(lazy.read_at(start + TICK_PERIOD * i), ticked.read_at(start));
        }
        assert_eq!(ticked.read(), 0);
    }

    #[test]
    fn shared_bank_reports_sound() {
        let timers = SharedTimers::new(TimerMode::Ticked);
        assert!(!timers.sound_active());
        timers.lock().sound.write(2);
        assert!(timers.sound_active());
        timers.tick();
        timers.tick();
        assert!(!timers.sound_active());
    }
}
