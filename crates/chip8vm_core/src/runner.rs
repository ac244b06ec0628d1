//! Threaded driver.
//!
//! ```text
//!  host input ──► [input queue] ──► CPU thread ──► [frame + draw signal] ──► display sink
//!                                      │
//!                                 [timer bank] ◄── timer thread (60 Hz)
//!                                      │
//!                                 [beep signal] ──► audio sink
//! ```
//!
//! The CPU thread owns the [`Emulator`]. Key events are queued by the host
//! and applied between steps, so a key-wait resolution can never interleave
//! with a step. The timer bank is the only interpreter state touched by two
//! threads and it carries its own lock. Every loop polls one shutdown flag
//! and every wait is bounded by the poll interval.
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use typed_builder::TypedBuilder;

use crate::display::Frame;
use crate::emulator::Emulator;
use crate::error::{Fault, KeyError};
use crate::keypad::Keypad;
use crate::signal::{Pacer, Signal};
use crate::timer::{SharedTimers, TIMER_HZ};

/// Longest any runner thread may block before re-checking shutdown.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, TypedBuilder)]
pub struct RunnerConfig {
    /// Instructions per second.
    #[builder(default = 600)]
    pub cpu_hz: u32,
    #[builder(default = TIMER_HZ)]
    pub timer_hz: u32,
    /// Upper bound for every blocking wait; clamped to `MAX_POLL_INTERVAL`.
    #[builder(default = Duration::from_millis(100))]
    pub poll_interval: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig::builder().build()
    }
}

struct Shared {
    shutdown: AtomicBool,
    poll_interval: Duration,
    frame: Mutex<Frame>,
    draw: Signal,
    beep: Signal,
    input: Mutex<Vec<(usize, bool)>>,
    fault: Mutex<Option<Fault>>,
    cycles: AtomicU64,
}

impl Shared {
    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

/// Owns the CPU and timer threads.
///
/// Dropping a runner without calling [`Runner::shutdown`] raises the
/// shutdown flag and detaches both threads; they exit within one poll
/// interval.
pub struct Runner {
    shared: Arc<Shared>,
    cpu: JoinHandle<Emulator>,
    timer: JoinHandle<()>,
    _stop: StopOnDrop,
}

/// Raises the shutdown flag when the owning runner goes away.
struct StopOnDrop(Arc<Shared>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.shutdown.store(true, Ordering::Release);
    }
}

impl Runner {
    /// Start the CPU and timer threads.
    pub fn spawn(emulator: Emulator, config: RunnerConfig) -> std::io::Result<Runner> {
        let poll_interval = config.poll_interval.min(MAX_POLL_INTERVAL);
        let shared = Arc::new(Shared {
            shutdown: AtomicBool::new(false),
            poll_interval,
            frame: Mutex::new(emulator.display().clone()),
            draw: Signal::new(false),
            beep: Signal::new(emulator.is_beeping()),
            input: Mutex::new(Vec::new()),
            fault: Mutex::new(None),
            cycles: AtomicU64::new(emulator.cycle_count()),
        });

        log::info!(
            "Runner start: cpu {} Hz, timers {} Hz, poll {:?}",
            config.cpu_hz,
            config.timer_hz,
            poll_interval
        );

        let timers = emulator.timers();
        let cpu = {
            let cpu_shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("chip8-cpu".into())
                .spawn(move || cpu_loop(emulator, &cpu_shared, config.cpu_hz))?
        };
        let timer = {
            let timer_shared = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name("chip8-timer".into())
                .spawn(move || timer_loop(timers, &timer_shared, config.timer_hz));
            match spawned {
                Ok(handle) => handle,
                Err(err) => {
                    shared.shutdown.store(true, Ordering::Release);
                    let _ = cpu.join();
                    return Err(err);
                }
            }
        };

        Ok(Runner {
            _stop: StopOnDrop(Arc::clone(&shared)),
            shared,
            cpu,
            timer,
        })
    }

    /// Queue a key transition for the CPU thread.
    pub fn update_key(&self, key: usize, pressed: bool) -> Result<(), KeyError> {
        Keypad::key(key)?;
        self.shared.input.lock().push((key, pressed));
        Ok(())
    }

    /// Wait up to `timeout` for a new frame. Consumes the draw request.
    pub fn wait_for_frame(&self, timeout: Duration) -> Option<Frame> {
        let timeout = timeout.min(self.shared.poll_interval);
        if self.shared.draw.take(timeout) {
            Some(self.shared.frame.lock().clone())
        } else {
            None
        }
    }

    /// The most recently published frame, whether or not it was consumed.
    pub fn latest_frame(&self) -> Frame {
        self.shared.frame.lock().clone()
    }

    pub fn is_beeping(&self) -> bool {
        self.shared.beep.get()
    }

    /// Wait up to `timeout` for the beep level to become `level`.
    pub fn wait_for_beep(&self, level: bool, timeout: Duration) -> bool {
        let timeout = timeout.min(self.shared.poll_interval);
        self.shared.beep.wait_for(level, timeout)
    }

    /// Completed instructions so far.
    pub fn cycles(&self) -> u64 {
        self.shared.cycles.load(Ordering::Acquire)
    }

    pub fn fault(&self) -> Option<Fault> {
        *self.shared.fault.lock()
    }

    /// `false` once shutdown was requested or the CPU faulted.
    pub fn is_running(&self) -> bool {
        !self.shared.is_shutdown()
    }

    pub fn request_shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
    }

    /// Stop all threads and hand the machine back, together with the fault
    /// that stopped it, if any.
    pub fn shutdown(self) -> (Emulator, Option<Fault>) {
        self.request_shutdown();
        let Runner { shared, cpu, timer, .. } = self;
        join(timer);
        let emulator = join(cpu);
        let fault = *shared.fault.lock();
        log::info!(
            "Runner stopped after {} cycles{}",
            emulator.cycle_count(),
            if fault.is_some() { " (faulted)" } else { "" }
        );
        (emulator, fault)
    }
}

fn join<T>(handle: JoinHandle<T>) -> T {
    match handle.join() {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

fn cpu_loop(mut emu: Emulator, shared: &Shared, cpu_hz: u32) -> Emulator {
    let mut pacer = Pacer::new(cpu_hz);
    while !shared.is_shutdown() {
        if !pacer.wait_until_ready(shared.poll_interval) {
            continue;
        }

        for (key, pressed) in shared.input.lock().drain(..) {
            if let Err(err) = emu.update_key(key, pressed) {
                log::warn!("Dropping key event: {err}");
            }
        }

        match emu.step() {
            Ok(report) => {
                if emu.take_redraw() {
                    *shared.frame.lock() = emu.display().clone();
                    shared.draw.set();
                }
                shared.beep.set_level(report.beeping);
                shared.cycles.store(emu.cycle_count(), Ordering::Release);
            }
            Err(fault) => {
                *shared.fault.lock() = Some(fault);
                shared.shutdown.store(true, Ordering::Release);
                break;
            }
        }
    }
    shared.beep.clear();
    emu
}

fn timer_loop(timers: SharedTimers, shared: &Shared, timer_hz: u32) {
    let mut pacer = Pacer::new(timer_hz);
    while !shared.is_shutdown() {
        if !pacer.wait_until_ready(shared.poll_interval) {
            continue;
        }
        timers.tick();
        let beeping = timers.sound_active();
        if beeping != shared.beep.get() {
            log::debug!("Beep {}", if beeping { "on" } else { "off" });
        }
        shared.beep.set_level(beeping);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::emulator::ExecState;
    use crate::timer::TimerMode;
    use std::time::Instant;

    fn emulator(ops: &[u16]) -> Emulator {
        let rom: Vec<u8> = ops.iter().flat_map(|op| op.to_be_bytes()).collect();
        let config = Config::builder().timer_mode(TimerMode::Ticked).build();
        Emulator::with_rom(&rom, config).unwrap()
    }

    fn fast() -> RunnerConfig {
        RunnerConfig::builder()
            .cpu_hz(2000)
            .poll_interval(Duration::from_millis(20))
            .build()
    }

    fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        done()
    }

    #[test]
    fn publishes_frames_after_draw() {
        // LD F, V0; DRW V0, V0, 5; JP 0x204
        let runner = Runner::spawn(emulator(&[0xF029, 0xD005, 0x1204]), fast()).unwrap();
        let mut frame = None;
        assert!(wait_until(Duration::from_secs(2), || {
            frame = runner.wait_for_frame(Duration::from_millis(20));
            frame.is_some()
        }));
        let frame = frame.unwrap();
        assert!(frame.get(0, 0));
        assert!(!frame.get(1, 1));

        let (emu, fault) = runner.shutdown();
        assert_eq!(fault, None);
        assert_eq!(emu.pc(), 0x204);
    }

    #[test]
    fn fault_stops_the_runner() {
        let runner = Runner::spawn(emulator(&[0x6001, 0xFFFF]), fast()).unwrap();
        assert!(wait_until(Duration::from_secs(2), || !runner.is_running()));
        let expected = Fault::UnknownOpcode {
            pc: 0x202,
            opcode: 0xFFFF,
        };
        assert_eq!(runner.fault(), Some(expected));
        let (emu, fault) = runner.shutdown();
        assert_eq!(fault, Some(expected));
        assert_eq!(emu.registers()[0], 1);
    }

    #[test]
    fn queued_key_press_resolves_wait() {
        // LD V5, K; JP 0x202
        let runner = Runner::spawn(emulator(&[0xF50A, 0x1202]), fast()).unwrap();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(runner.cycles(), 0);

        runner.update_key(0xC, true).unwrap();
        assert!(wait_until(Duration::from_secs(2), || runner.cycles() > 1));

        let (emu, _) = runner.shutdown();
        assert_eq!(emu.state(), ExecState::Running);
        assert_eq!(emu.registers()[5], 0xC);
        assert_eq!(emu.pc(), 0x202);
    }

    #[test]
    fn rejects_invalid_key_before_queueing() {
        let runner = Runner::spawn(emulator(&[0x1200]), fast()).unwrap();
        assert_eq!(runner.update_key(16, true), Err(KeyError(16)));
        runner.shutdown();
    }

    #[test]
    fn beep_follows_sound_timer() {
        // LD V0, 6; LD ST, V0; JP 0x204
        let runner = Runner::spawn(emulator(&[0x6006, 0xF018, 0x1204]), fast()).unwrap();
        assert!(wait_until(Duration::from_secs(2), || runner
            .wait_for_beep(true, Duration::from_millis(20))));
        // Six ticks at 60 Hz is 100 ms.
        assert!(wait_until(Duration::from_secs(2), || runner
            .wait_for_beep(false, Duration::from_millis(20))));
        runner.shutdown();
    }

    #[test]
    fn timer_thread_runs_alongside_cpu() {
        // LD V0, 3; LD DT, V0; LD V1, DT; SE V1, 0; JP 0x204; JP 0x20A
        let runner = Runner::spawn(
            emulator(&[0x6003, 0xF015, 0xF107, 0x3100, 0x1204, 0x120A]),
            fast(),
        )
        .unwrap();
        // Three ticks at 60 Hz is 50 ms.
        assert!(wait_until(Duration::from_secs(2), || runner.cycles() > 10));
        thread::sleep(Duration::from_millis(150));
        let (emu, fault) = runner.shutdown();
        assert_eq!(fault, None);
        assert_eq!(emu.pc(), 0x20A);
    }

    #[test]
    fn dropping_runner_raises_shutdown() {
        let runner = Runner::spawn(emulator(&[0x1200]), fast()).unwrap();
        let shared = Arc::clone(&runner.shared);
        assert!(!shared.is_shutdown());
        drop(runner);
        assert!(shared.is_shutdown());
    }

    #[test]
    fn shutdown_is_prompt() {
        let config = RunnerConfig::builder()
            .cpu_hz(1)
            .timer_hz(1)
            .poll_interval(Duration::from_secs(30))
            .build();
        let runner = Runner::spawn(emulator(&[0x1200]), config).unwrap();
        let start = Instant::now();
        runner.shutdown();
        assert!(start.elapsed() < MAX_POLL_INTERVAL * 3);
    }
}
