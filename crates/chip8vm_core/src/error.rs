use thiserror::Error;

/// Errors raised while placing a program into memory. The machine never
/// starts when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("ROM is too large ({size} bytes), max size is {max} bytes")]
    RomTooLarge { size: usize, max: usize },
}

/// Fatal runtime faults. A conformant program never triggers one, so each
/// variant points at a malformed ROM or an interpreter defect. Every fault
/// records the program counter and the opcode being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("unknown opcode {opcode:#06X} at {pc:#05X}")]
    UnknownOpcode { pc: u16, opcode: u16 },

    #[error("stack overflow: call depth exceeded at {pc:#05X} (opcode {opcode:#06X})")]
    StackOverflow { pc: u16, opcode: u16 },

    #[error("stack underflow: return with empty call stack at {pc:#05X} (opcode {opcode:#06X})")]
    StackUnderflow { pc: u16, opcode: u16 },

    #[error("memory access out of bounds at address {address:#06X} (pc {pc:#05X}, opcode {opcode:#06X})")]
    MemoryOutOfBounds { pc: u16, opcode: u16, address: usize },

    #[error("key index {key:#04X} out of range at {pc:#05X} (opcode {opcode:#06X})")]
    InvalidKey { pc: u16, opcode: u16, key: u8 },

    #[error("font digit {digit:#04X} out of range at {pc:#05X} (opcode {opcode:#06X})")]
    FontDigitOutOfRange { pc: u16, opcode: u16, digit: u8 },
}

impl Fault {
    /// Address of the faulting instruction.
    pub fn pc(&self) -> u16 {
        match *self {
            Fault::UnknownOpcode { pc, .. }
            | Fault::StackOverflow { pc, .. }
            | Fault::StackUnderflow { pc, .. }
            | Fault::MemoryOutOfBounds { pc, .. }
            | Fault::InvalidKey { pc, .. }
            | Fault::FontDigitOutOfRange { pc, .. } => pc,
        }
    }

    pub fn opcode(&self) -> u16 {
        match *self {
            Fault::UnknownOpcode { opcode, .. }
            | Fault::StackOverflow { opcode, .. }
            | Fault::StackUnderflow { opcode, .. }
            | Fault::MemoryOutOfBounds { opcode, .. }
            | Fault::InvalidKey { opcode, .. }
            | Fault::FontDigitOutOfRange { opcode, .. } => opcode,
        }
    }
}

/// The host reported a key outside the 16-key hex keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid key index: {0}")]
pub struct KeyError(pub usize);
