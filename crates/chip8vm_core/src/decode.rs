//! Opcode field extraction, instruction decoding and disassembly.
//!
//! Every opcode is a big-endian 16-bit word. The interpreter and the
//! disassembler share [`Instruction::decode`], so a listing always shows
//! exactly what the interpreter would execute.
use std::fmt;

/// The `i`-th hex digit of `opcode`, counting from the most significant (0)
/// to the least significant (3).
#[inline]
pub const fn nibble(opcode: u16, i: u32) -> u8 {
    ((opcode >> (12 - 4 * i)) & 0xF) as u8
}

/// Register operand `X` (second nibble).
#[inline]
pub const fn x(opcode: u16) -> u8 {
    nibble(opcode, 1)
}

/// Register operand `Y` (third nibble).
#[inline]
pub const fn y(opcode: u16) -> u8 {
    nibble(opcode, 2)
}

/// 4-bit immediate `N` (lowest nibble).
#[inline]
pub const fn n(opcode: u16) -> u8 {
    nibble(opcode, 3)
}

/// 12-bit address `NNN`.
#[inline]
pub const fn nnn(opcode: u16) -> u16 {
    opcode & 0x0FFF
}

/// 8-bit immediate `KK`.
#[inline]
pub const fn kk(opcode: u16) -> u8 {
    (opcode & 0x00FF) as u8
}

/// A decoded CHIP-8 instruction. Register operands are indices into `V0..VF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// 0000 - treated as a no-op.
    Nop,
    /// 00E0 - clear the display.
    Cls,
    /// 00EE - return from subroutine.
    Ret,
    /// 1NNN
    Jp { nnn: u16 },
    /// 2NNN
    Call { nnn: u16 },
    /// 3XKK - skip next if Vx == KK.
    SeImm { x: u8, kk: u8 },
    /// 4XKK - skip next if Vx != KK.
    SneImm { x: u8, kk: u8 },
    /// 5XY0 - skip next if Vx == Vy.
    SeReg { x: u8, y: u8 },
    /// 6XKK
    LdImm { x: u8, kk: u8 },
    /// 7XKK - add without touching VF.
    AddImm { x: u8, kk: u8 },
    /// 8XY0
    LdReg { x: u8, y: u8 },
    /// 8XY1
    Or { x: u8, y: u8 },
    /// 8XY2
    And { x: u8, y: u8 },
    /// 8XY3
    Xor { x: u8, y: u8 },
    /// 8XY4 - VF = carry.
    AddReg { x: u8, y: u8 },
    /// 8XY5 - VF = Vx > Vy.
    Sub { x: u8, y: u8 },
    /// 8XY6 - VF = lsb of Vx. `y` is decoded but unused.
    Shr { x: u8, y: u8 },
    /// 8XY7 - VF = Vy > Vx.
    Subn { x: u8, y: u8 },
    /// 8XYE - VF = msb of Vx. `y` is decoded but unused.
    Shl { x: u8, y: u8 },
    /// 9XY0 - skip next if Vx != Vy.
    SneReg { x: u8, y: u8 },
    /// ANNN
    LdI { nnn: u16 },
    /// BNNN - jump to V0 + NNN.
    JpV0 { nnn: u16 },
    /// CXKK - random byte masked with KK.
    Rnd { x: u8, kk: u8 },
    /// DXYN - draw an N-row sprite from memory[I] at (Vx, Vy).
    Drw { x: u8, y: u8, n: u8 },
    /// EX9E - skip next if key Vx is down.
    Skp { x: u8 },
    /// EXA1 - skip next if key Vx is up.
    Sknp { x: u8 },
    /// FX07
    LdVxDt { x: u8 },
    /// FX0A - block until a key is pressed.
    LdVxKey { x: u8 },
    /// FX15
    LdDtVx { x: u8 },
    /// FX18
    LdStVx { x: u8 },
    /// FX1E
    AddI { x: u8 },
    /// FX29 - point I at the font glyph for digit Vx.
    LdFont { x: u8 },
    /// FX33 - BCD of Vx into memory[I..I+3].
    LdBcd { x: u8 },
    /// FX55 - store V0..=Vx at memory[I..].
    StoreRegs { x: u8 },
    /// FX65 - load V0..=Vx from memory[I..].
    LoadRegs { x: u8 },
}

impl Instruction {
    /// Decode a raw opcode. Returns `None` for words that are not part of the
    /// instruction set (including the `0NNN` machine-call family).
    pub fn decode(opcode: u16) -> Option<Instruction> {
        use Instruction::*;

        let (x, y, n, nnn, kk) = (x(opcode), y(opcode), n(opcode), nnn(opcode), kk(opcode));
        let instruction = match (nibble(opcode, 0), x, y, n) {
            (0x0, 0x0, 0x0, 0x0) => Nop,
            (0x0, 0x0, 0xE, 0x0) => Cls,
            (0x0, 0x0, 0xE, 0xE) => Ret,
            (0x1, _, _, _) => Jp { nnn },
            (0x2, _, _, _) => Call { nnn },
            (0x3, _, _, _) => SeImm { x, kk },
            (0x4, _, _, _) => SneImm { x, kk },
            (0x5, _, _, 0x0) => SeReg { x, y },
            (0x6, _, _, _) => LdImm { x, kk },
            (0x7, _, _, _) => AddImm { x, kk },
            (0x8, _, _, 0x0) => LdReg { x, y },
            (0x8, _, _, 0x1) => Or { x, y },
            (0x8, _, _, 0x2) => And { x, y },
            (0x8, _, _, 0x3) => Xor { x, y },
            (0x8, _, _, 0x4) => AddReg { x, y },
            (0x8, _, _, 0x5) => Sub { x, y },
            (0x8, _, _, 0x6) => Shr { x, y },
            (0x8, _, _, 0x7) => Subn { x, y },
            (0x8, _, _, 0xE) => Shl { x, y },
            (0x9, _, _, 0x0) => SneReg { x, y },
            (0xA, _, _, _) => LdI { nnn },
            (0xB, _, _, _) => JpV0 { nnn },
            (0xC, _, _, _) => Rnd { x, kk },
            (0xD, _, _, _) => Drw { x, y, n },
            (0xE, _, 0x9, 0xE) => Skp { x },
            (0xE, _, 0xA, 0x1) => Sknp { x },
            (0xF, _, 0x0, 0x7) => LdVxDt { x },
            (0xF, _, 0x0, 0xA) => LdVxKey { x },
            (0xF, _, 0x1, 0x5) => LdDtVx { x },
            (0xF, _, 0x1, 0x8) => LdStVx { x },
            (0xF, _, 0x1, 0xE) => AddI { x },
            (0xF, _, 0x2, 0x9) => LdFont { x },
            (0xF, _, 0x3, 0x3) => LdBcd { x },
            (0xF, _, 0x5, 0x5) => StoreRegs { x },
            (0xF, _, 0x6, 0x5) => LoadRegs { x },
            _ => return None,
        };
        Some(instruction)
    }

    /// Whether this instruction sets the program counter itself, so the
    /// interpreter must not advance it afterwards.
    pub fn redirects_control(&self) -> bool {
        matches!(
            self,
            Instruction::Ret
                | Instruction::Jp { .. }
                | Instruction::Call { .. }
                | Instruction::JpV0 { .. }
                | Instruction::LdVxKey { .. }
        )
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;

        match *self {
            Nop => write!(f, "NOP"),
            Cls => write!(f, "CLS"),
            Ret => write!(f, "RET"),
            Jp { nnn } => write!(f, "JP {nnn:#05X}"),
            Call { nnn } => write!(f, "CALL {nnn:#05X}"),
            SeImm { x, kk } => write!(f, "SE V{x:X}, {kk:#04X}"),
            SneImm { x, kk } => write!(f, "SNE V{x:X}, {kk:#04X}"),
            SeReg { x, y } => write!(f, "SE V{x:X}, V{y:X}"),
            LdImm { x, kk } => write!(f, "LD V{x:X}, {kk:#04X}"),
            AddImm { x, kk } => write!(f, "ADD V{x:X}, {kk:#04X}"),
            LdReg { x, y } => write!(f, "LD V{x:X}, V{y:X}"),
            Or { x, y } => write!(f, "OR V{x:X}, V{y:X}"),
            And { x, y } => write!(f, "AND V{x:X}, V{y:X}"),
            Xor { x, y } => write!(f, "XOR V{x:X}, V{y:X}"),
            AddReg { x, y } => write!(f, "ADD V{x:X}, V{y:X}"),
            Sub { x, y } => write!(f, "SUB V{x:X}, V{y:X}"),
            Shr { x, .. } => write!(f, "SHR V{x:X}"),
            Subn { x, y } => write!(f, "SUBN V{x:X}, V{y:X}"),
            Shl { x, .. } => write!(f, "SHL V{x:X}"),
            SneReg { x, y } => write!(f, "SNE V{x:X}, V{y:X}"),
            LdI { nnn } => write!(f, "LD I, {nnn:#05X}"),
            JpV0 { nnn } => write!(f, "JP V0, {nnn:#05X}"),
            Rnd { x, kk } => write!(f, "RND V{x:X}, {kk:#04X}"),
            Drw { x, y, n } => write!(f, "DRW V{x:X}, V{y:X}, {n:#03X}"),
            Skp { x } => write!(f, "SKP V{x:X}"),
            Sknp { x } => write!(f, "SKNP V{x:X}"),
            LdVxDt { x } => write!(f, "LD V{x:X}, DT"),
            LdVxKey { x } => write!(f, "LD V{x:X}, K"),
            LdDtVx { x } => write!(f, "LD DT, V{x:X}"),
            LdStVx { x } => write!(f, "LD ST, V{x:X}"),
            AddI { x } => write!(f, "ADD I, V{x:X}"),
            LdFont { x } => write!(f, "LD F, V{x:X}"),
            LdBcd { x } => write!(f, "LD B, V{x:X}"),
            StoreRegs { x } => write!(f, "LD [I], V{x:X}"),
            LoadRegs { x } => write!(f, "LD V{x:X}, [I]"),
        }
    }
}

/// One line of a disassembly listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line {
    pub address: u16,
    pub opcode: u16,
    pub instruction: Option<Instruction>,
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#05X}: {:04X}  ", self.address, self.opcode)?;
        match self.instruction {
            Some(instruction) => write!(f, "{instruction}"),
            // Data bytes interleaved with code are common; show them raw.
            None => write!(f, "DW {:#06X}", self.opcode),
        }
    }
}

/// Walk `bytes` as a sequence of big-endian opcodes, as if loaded at `base`.
/// A trailing odd byte is ignored.
pub fn disassemble(bytes: &[u8], base: u16) -> impl Iterator<Item = Line> + '_ {
    bytes.chunks_exact(2).enumerate().map(move |(i, pair)| {
        let opcode = u16::from_be_bytes([pair[0], pair[1]]);
        Line {
            address: base.wrapping_add((i * 2) as u16),
            opcode,
            instruction: Instruction::decode(opcode),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nibble_extracts_each_digit() {
        assert_eq!(nibble(0xF123, 0), 0xF);
        assert_eq!(nibble(0xF123, 1), 0x1);
        assert_eq!(nibble(0xF123, 2), 0x2);
        assert_eq!(nibble(0xF123, 3), 0x3);

        assert_eq!(nibble(0x0AB0, 0), 0x0);
        assert_eq!(nibble(0x0AB0, 1), 0xA);
        assert_eq!(nibble(0x0AB0, 2), 0xB);
        assert_eq!(nibble(0x0AB0, 3), 0x0);
    }

    #[test]
    fn derived_fields() {
        let op = 0xD12F;
        assert_eq!(x(op), 0x1);
        assert_eq!(y(op), 0x2);
        assert_eq!(n(op), 0xF);
        assert_eq!(nnn(op), 0x12F);
        assert_eq!(kk(op), 0x2F);
    }

    #[test]
    fn decodes_representative_opcodes() {
        assert_eq!(Instruction::decode(0x0000), Some(Instruction::Nop));
        assert_eq!(Instruction::decode(0x00E0), Some(Instruction::Cls));
        assert_eq!(Instruction::decode(0x00EE), Some(Instruction::Ret));
        assert_eq!(Instruction::decode(0x1234), Some(Instruction::Jp { nnn: 0x234 }));
        assert_eq!(
            Instruction::decode(0x8AB4),
            Some(Instruction::AddReg { x: 0xA, y: 0xB })
        );
        assert_eq!(
            Instruction::decode(0xD015),
            Some(Instruction::Drw { x: 0, y: 1, n: 5 })
        );
        assert_eq!(Instruction::decode(0xF30A), Some(Instruction::LdVxKey { x: 3 }));
        assert_eq!(Instruction::decode(0xE19E), Some(Instruction::Skp { x: 1 }));
    }

    #[test]
    fn rejects_words_outside_the_instruction_set() {
        for op in [0x0123, 0x00E1, 0x5121, 0x8128, 0x912F, 0xE100, 0xF0FF, 0xFFFF] {
            assert_eq!(Instruction::decode(op), None, "{op:#06X}");
        }
    }

    #[test]
    fn mnemonics() {
        let text = |op| Instruction::decode(op).map(|i| i.to_string());
        assert_eq!(text(0x00E0).as_deref(), Some("CLS"));
        assert_eq!(text(0x2208).as_deref(), Some("CALL 0x208"));
        assert_eq!(text(0x610A).as_deref(), Some("LD V1, 0x0A"));
        assert_eq!(text(0x8016).as_deref(), Some("SHR V0"));
        assert_eq!(text(0xD015).as_deref(), Some("DRW V0, V1, 0x5"));
        assert_eq!(text(0xF555).as_deref(), Some("LD [I], V5"));
    }

    #[test]
    fn disassemble_lists_code_and_data() {
        let rom = [0x60, 0x0A, 0xFF, 0xFF, 0x12];
        let lines: Vec<_> = disassemble(&rom, 0x200).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].to_string(), "0x200: 600A  LD V0, 0x0A");
        assert_eq!(lines[1].address, 0x202);
        assert_eq!(lines[1].instruction, None);
        assert_eq!(lines[1].to_string(), "0x202: FFFF  DW 0xFFFF");
    }
}
