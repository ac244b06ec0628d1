use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use chip8vm_core::{
    disassemble, AudioSink, BeepEdge, Config, DisplaySink, Emulator, Frame, Runner,
    RunnerConfig, TimerMode, SCREEN_HEIGHT, SCREEN_WIDTH, START_ADDRESS,
};

pub const USAGE: &str = "\
usage: chip8vm <rom> [options]

options:
    --hz <N>         instructions per second (default 600)
    --seconds <S>    stop after S seconds (default 10)
    --seed <N>       seed for the RND instruction
    --live           redraw the terminal on every frame
    --disasm         print a listing of the ROM and exit";

#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub rom_path: PathBuf,
    pub cpu_hz: u32,
    pub seconds: f64,
    pub seed: Option<u64>,
    pub live: bool,
    pub disasm: bool,
}

impl Options {
    pub fn from_args(args: impl IntoIterator<Item = String>) -> Result<Options> {
        let mut rom_path = None;
        let mut cpu_hz = 600;
        let mut seconds: f64 = 10.0;
        let mut seed = None;
        let mut live = false;
        let mut disasm = false;

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--hz" => cpu_hz = value(&mut args, "--hz")?,
                "--seconds" => seconds = value(&mut args, "--seconds")?,
                "--seed" => seed = Some(value(&mut args, "--seed")?),
                "--live" => live = true,
                "--disasm" => disasm = true,
                flag if flag.starts_with("--") => bail!("unknown option '{flag}'"),
                path => {
                    if rom_path.is_some() {
                        bail!("unexpected argument '{path}'");
                    }
                    rom_path = Some(PathBuf::from(path));
                }
            }
        }

        let Some(rom_path) = rom_path else {
            bail!("no ROM path provided");
        };
        if cpu_hz == 0 {
            bail!("--hz must be at least 1");
        }
        if !(seconds.is_finite() && seconds > 0.0) {
            bail!("--seconds must be a positive number");
        }
        Ok(Options {
            rom_path,
            cpu_hz,
            seconds,
            seed,
            live,
            disasm,
        })
    }
}

impl Options {
    /// Interpreter settings for a run driven by the threaded runner.
    pub fn emulator_config(&self) -> Config {
        Config::builder()
            .timer_mode(TimerMode::Ticked)
            .rng_seed(self.seed)
            .build()
    }
}

fn value<T>(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = args.next().with_context(|| format!("{flag} needs a value"))?;
    raw.parse()
        .with_context(|| format!("invalid value '{raw}' for {flag}"))
}

/// Text rendering of a frame: one line per row, `#` for lit pixels.
pub fn render(frame: &Frame) -> String {
    let mut text = String::with_capacity((SCREEN_WIDTH + 1) * SCREEN_HEIGHT);
    for row in frame.rows() {
        text.extend(row.iter().map(|lit| if *lit { '#' } else { '.' }));
        text.push('\n');
    }
    text
}

/// Writes frames to a terminal (or any writer).
pub struct TerminalDisplay<W: Write> {
    out: W,
    live: bool,
    frames: u64,
}

impl<W: Write> TerminalDisplay<W> {
    pub fn new(out: W, live: bool) -> Self {
        Self {
            out,
            live,
            frames: 0,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn write_frame(&mut self, frame: &Frame) -> std::io::Result<()> {
        if self.live {
            // Home the cursor so each frame overwrites the last.
            write!(self.out, "\x1b[H")?;
        }
        self.out.write_all(render(frame).as_bytes())?;
        self.out.flush()
    }
}

impl<W: Write> DisplaySink for TerminalDisplay<W> {
    fn present(&mut self, frame: &Frame) {
        self.frames += 1;
        if !self.live {
            return;
        }
        if let Err(err) = self.write_frame(frame) {
            log::warn!("Failed to draw frame: {err}");
        }
    }
}

/// Audio stand-in that reports beep edges through the log.
#[derive(Default)]
pub struct LogBeeper {
    pub beeps: u64,
}

impl AudioSink for LogBeeper {
    fn set_beeping(&mut self, beeping: bool) {
        if beeping {
            self.beeps += 1;
            log::info!("Beep on");
        } else {
            log::info!("Beep off");
        }
    }
}

pub fn run(options: &Options) -> Result<()> {
    let rom = std::fs::read(&options.rom_path)
        .with_context(|| format!("failed to read ROM '{}'", options.rom_path.display()))?;

    if options.disasm {
        let mut out = std::io::stdout().lock();
        for line in disassemble(&rom, START_ADDRESS) {
            writeln!(out, "{line}")?;
        }
        return Ok(());
    }

    log::info!("Playing ROM path: '{}'", options.rom_path.display());
    let emulator = Emulator::with_rom(&rom, options.emulator_config())
        .with_context(|| format!("failed to load ROM '{}'", options.rom_path.display()))?;

    let runner_config = RunnerConfig::builder().cpu_hz(options.cpu_hz).build();
    let runner = Runner::spawn(emulator, runner_config).context("failed to start runner")?;

    let mut display = TerminalDisplay::new(std::io::stdout(), options.live);
    let mut beeper = LogBeeper::default();
    let mut beep = BeepEdge::default();
    if options.live {
        print!("\x1b[2J");
    }

    let deadline = Instant::now() + Duration::from_secs_f64(options.seconds);
    while runner.is_running() && Instant::now() < deadline {
        if let Some(frame) = runner.wait_for_frame(Duration::from_millis(16)) {
            display.present(&frame);
        }
        beep.drive(runner.is_beeping(), &mut beeper);
    }
    beep.drive(false, &mut beeper);

    let (emulator, fault) = runner.shutdown();
    if !options.live {
        print!("{}", render(emulator.display()));
    }
    log::info!(
        "{} frames, {} beeps, {} cycles",
        display.frames(),
        beeper.beeps,
        emulator.cycle_count()
    );

    if let Some(fault) = fault {
        return Err(anyhow::Error::new(fault).context("emulation aborted"));
    }
    Ok(())
}
