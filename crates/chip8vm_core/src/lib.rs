pub mod config;
pub mod decode;
pub mod display;
pub mod emulator;
pub mod error;
pub mod history;
pub mod host;
pub mod keypad;
pub mod runner;
pub mod signal;
pub mod timer;

pub use config::Config;
pub use decode::{disassemble, Instruction};
pub use display::{Display, Frame};
pub use emulator::{Emulator, ExecState, StepReport};
pub use error::{Fault, KeyError, LoadError};
pub use host::{AudioSink, BeepEdge, DisplaySink};
pub use keypad::Keypad;
pub use runner::{Runner, RunnerConfig};
pub use timer::{Timer, TimerBank, TimerMode};

/// Logical screen width in pixels.
pub const SCREEN_WIDTH: usize = 64;
/// Logical screen height in pixels.
pub const SCREEN_HEIGHT: usize = 32;

pub const RAM_SIZE: usize = 4096;
pub const NUM_REGS: usize = 16;
pub const STACK_SIZE: usize = 16;
pub const NUM_KEYS: usize = 16;

/// Programs are loaded (and execution starts) here.
pub const START_ADDRESS: u16 = 0x200;
/// Largest ROM that fits between `START_ADDRESS` and the end of RAM.
pub const MAX_ROM_SIZE: usize = RAM_SIZE - START_ADDRESS as usize;

/// Bytes per font glyph (4x5 pixels, one byte per row).
pub const FONT_GLYPH_SIZE: usize = 5;
pub const FONTSET_SIZE: usize = 80;

/// Hex digit glyphs 0-F, stored at address 0.
pub const FONTSET: [u8; FONTSET_SIZE] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];
