use std::ops::Range;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::Config;
use crate::decode::Instruction;
use crate::display::Display;
use crate::error::{Fault, KeyError, LoadError};
use crate::history::{History, Record};
use crate::keypad::Keypad;
use crate::timer::SharedTimers;
use crate::{
    FONTSET, FONTSET_SIZE, FONT_GLYPH_SIZE, MAX_ROM_SIZE, NUM_KEYS, NUM_REGS, RAM_SIZE,
    STACK_SIZE, START_ADDRESS,
};


/// Whether the interpreter is executing or blocked on `FX0A`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    Running,
    /// Waiting for a key press; the key index will be stored in `V[register]`.
    AwaitingKey { register: u8 },
}

/// What a single `step` left behind for the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepReport {
    /// `false` when the step was skipped because of a pending key wait.
    pub executed: bool,
    /// The display changed and has not been consumed yet.
    pub redraw: bool,
    /// The sound timer is non-zero.
    pub beeping: bool,
}

/// Address and raw word of the instruction being executed, for fault context.
#[derive(Debug, Clone, Copy)]
struct Op {
    pc: u16,
    opcode: u16,
}

pub struct Emulator {
    /// program counter
    pc: u16,
    ram: [u8; RAM_SIZE],
    /// display
    screen: Display,
    /// set when the screen changed, cleared by the display sink
    redraw: bool,
    /// V Registers
    v_reg: [u8; NUM_REGS],
    /// I Register
    i_reg: u16,
    stack_pointer: usize,
    stack: [u16; STACK_SIZE],
    keys: Keypad,
    /// delay and sound timers, shareable with a timer thread
    timers: SharedTimers,
    state: ExecState,
    /// completed instructions
    cycles: u64,
    /// first fatal fault; once set, the machine refuses to run
    fault: Option<Fault>,
    history: History,
    rng: StdRng,
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Emulator {
    pub fn new(config: Config) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut emu = Self {
            pc: START_ADDRESS,
            ram: [0; RAM_SIZE],
            screen: Display::default(),
            redraw: false,
            v_reg: [0; NUM_REGS],
            i_reg: 0,
            stack_pointer: 0,
            stack: [0; STACK_SIZE],
            keys: Keypad::empty(),
            timers: SharedTimers::new(config.timer_mode),
            state: ExecState::Running,
            cycles: 0,
            fault: None,
            history: History::new(config.history_capacity),
            rng,
        };
        emu.ram[..FONTSET_SIZE].copy_from_slice(&FONTSET);
        emu
    }

    /// Build a machine and load `rom` into it.
    pub fn with_rom(rom: &[u8], config: Config) -> Result<Self, LoadError> {
        let mut emu = Self::new(config);
        emu.load_rom(rom)?;
        Ok(emu)
    }

    /// Return every field to its power-on value. Memory past the fontset is
    /// zeroed, so a ROM has to be loaded again afterwards.
    pub fn reset(&mut self) {
        self.pc = START_ADDRESS;
        self.ram = [0; RAM_SIZE];
        self.ram[..FONTSET_SIZE].copy_from_slice(&FONTSET);
        self.screen.clear();
        self.redraw = false;
        self.v_reg = [0; NUM_REGS];
        self.i_reg = 0;
        self.stack_pointer = 0;
        self.stack = [0; STACK_SIZE];
        self.keys = Keypad::empty();
        {
            let mut timers = self.timers.lock();
            timers.delay.write(0);
            timers.sound.write(0);
        }
        self.state = ExecState::Running;
        self.cycles = 0;
        self.fault = None;
        self.history.clear();
        log::debug!("Chip8 reset");
    }

    /// Reset the machine and copy `rom` to `START_ADDRESS`. An oversized ROM
    /// is rejected before anything is touched.
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), LoadError> {
        if rom.len() > MAX_ROM_SIZE {
            return Err(LoadError::RomTooLarge {
                size: rom.len(),
                max: MAX_ROM_SIZE,
            });
        }
        self.reset();
        let start = START_ADDRESS as usize;
        self.ram[start..start + rom.len()].copy_from_slice(rom);
        log::info!("Loaded {} byte ROM at {:#05X}", rom.len(), START_ADDRESS);
        Ok(())
    }

    /// Run one fetch-decode-execute cycle.
    ///
    /// While a key wait is pending this does nothing and reports
    /// `executed: false`. A fault halts the machine for good: this and every
    /// later call return it.
    pub fn step(&mut self) -> Result<StepReport, Fault> {
        if let Some(fault) = self.fault {
            return Err(fault);
        }
        if let ExecState::AwaitingKey { .. } = self.state {
            return Ok(self.report(false));
        }

        match self.cycle() {
            Ok(()) => Ok(self.report(true)),
            Err(fault) => {
                self.fault = Some(fault);
                log::error!("{fault}");
                for record in self.history.iter() {
                    log::error!("  {record}");
                }
                Err(fault)
            }
        }
    }

    /// Run up to `steps` instructions, stopping early when a key wait
    /// begins. Returns how many instructions executed.
    pub fn step_frame(&mut self, steps: usize) -> Result<usize, Fault> {
        let mut executed = 0;
        for _ in 0..steps {
            if !self.step()?.executed {
                break;
            }
            executed += 1;
        }
        Ok(executed)
    }

    fn cycle(&mut self) -> Result<(), Fault> {
        let pc = self.pc;
        let opcode = self.fetch_opcode()?;
        let op = Op { pc, opcode };
        let instruction =
            Instruction::decode(opcode).ok_or(Fault::UnknownOpcode { pc, opcode })?;

        if log::log_enabled!(log::Level::Trace) {
            log::trace!("{:#05X}: {:04X}  {}", pc, opcode, instruction);
        }
        self.history.push(Record {
            cycle: self.cycles,
            pc,
            opcode,
            instruction,
        });

        self.execute(op, instruction)?;

        if let ExecState::AwaitingKey { register } = self.state {
            // The instruction completes when the key arrives.
            log::debug!("Waiting for key press into V{:X}", register);
            return Ok(());
        }
        if !instruction.redirects_control() {
            self.pc = self.pc.wrapping_add(2);
        }
        self.cycles += 1;
        Ok(())
    }

    fn fetch_opcode(&self) -> Result<u16, Fault> {
        let pc = self.pc as usize;
        if pc + 1 >= RAM_SIZE {
            return Err(Fault::MemoryOutOfBounds {
                pc: self.pc,
                opcode: 0,
                address: pc + 1,
            });
        }
        Ok(u16::from_be_bytes([self.ram[pc], self.ram[pc + 1]]))
    }

    fn push(&mut self, op: Op, val: u16) -> Result<(), Fault> {
        if self.stack_pointer == STACK_SIZE {
            return Err(Fault::StackOverflow {
                pc: op.pc,
                opcode: op.opcode,
            });
        }
        self.stack[self.stack_pointer] = val;
        self.stack_pointer += 1;
        Ok(())
    }

    fn pop(&mut self, op: Op) -> Result<u16, Fault> {
        if self.stack_pointer == 0 {
            return Err(Fault::StackUnderflow {
                pc: op.pc,
                opcode: op.opcode,
            });
        }
        self.stack_pointer -= 1;
        Ok(self.stack[self.stack_pointer])
    }

    /// `len` bytes of RAM starting at `start`, or a fault if any of them lie
    /// past the end of memory.
    fn ram_range(&self, op: Op, start: usize, len: usize) -> Result<Range<usize>, Fault> {
        let end = start + len;
        if end > RAM_SIZE {
            return Err(Fault::MemoryOutOfBounds {
                pc: op.pc,
                opcode: op.opcode,
                address: end - 1,
            });
        }
        Ok(start..end)
    }

    fn skip_if(&mut self, condition: bool) {
        if condition {
            self.pc = self.pc.wrapping_add(2);
        }
    }

    fn execute(&mut self, op: Op, instruction: Instruction) -> Result<(), Fault> {
        use Instruction::*;

        match instruction {
            Nop => (),
            // 00E0 - CLS
            Cls => {
                self.screen.clear();
                self.redraw = true;
            }
            // 00EE - RET
            Ret => self.pc = self.pop(op)?,
            // 1NNN - JP addr
            Jp { nnn } => self.pc = nnn,
            // 2NNN - CALL addr. RET does not advance pc, so push the address
            // of the following instruction.
            Call { nnn } => {
                self.push(op, self.pc.wrapping_add(2))?;
                self.pc = nnn;
            }
            SeImm { x, kk } => self.skip_if(self.v(x) == kk),
            SneImm { x, kk } => self.skip_if(self.v(x) != kk),
            SeReg { x, y } => self.skip_if(self.v(x) == self.v(y)),
            LdImm { x, kk } => self.set_v(x, kk),
            // 7XKK - no carry
            AddImm { x, kk } => self.set_v(x, self.v(x).wrapping_add(kk)),
            LdReg { x, y } => self.set_v(x, self.v(y)),
            Or { x, y } => self.set_v(x, self.v(x) | self.v(y)),
            And { x, y } => self.set_v(x, self.v(x) & self.v(y)),
            Xor { x, y } => self.set_v(x, self.v(x) ^ self.v(y)),
            // The flag is written before the result, so with X = F the result
            // wins.
            // 8XY4 - VF = carry
            AddReg { x, y } => {
                let (val, carry) = self.v(x).overflowing_add(self.v(y));
                self.v_reg[0xF] = carry as u8;
                self.set_v(x, val);
            }
            // 8XY5 - VF = Vx > Vy
            Sub { x, y } => {
                let (vx, vy) = (self.v(x), self.v(y));
                self.v_reg[0xF] = (vx > vy) as u8;
                self.set_v(x, vx.wrapping_sub(vy));
            }
            // 8XY6 - VF = lsb
            Shr { x, .. } => {
                let vx = self.v(x);
                self.v_reg[0xF] = vx & 0x1;
                self.set_v(x, vx >> 1);
            }
            // 8XY7 - VF = Vy > Vx
            Subn { x, y } => {
                let (vx, vy) = (self.v(x), self.v(y));
                self.v_reg[0xF] = (vy > vx) as u8;
                self.set_v(x, vy.wrapping_sub(vx));
            }
            // 8XYE - VF = msb
            Shl { x, .. } => {
                let vx = self.v(x);
                self.v_reg[0xF] = (vx & 0x80) >> 7;
                self.set_v(x, vx << 1);
            }
            SneReg { x, y } => self.skip_if(self.v(x) != self.v(y)),
            LdI { nnn } => self.i_reg = nnn,
            // BNNN - the target is checked on the next fetch
            JpV0 { nnn } => self.pc = nnn + self.v_reg[0] as u16,
            Rnd { x, kk } => {
                let rand: u8 = self.rng.gen();
                self.set_v(x, rand & kk);
            }
            Drw { x, y, n } => self.draw_sprite(op, x, y, n)?,
            Skp { x } => {
                let key = self.key_operand(op, x)?;
                self.skip_if(self.keys.is_pressed(key));
            }
            Sknp { x } => {
                let key = self.key_operand(op, x)?;
                self.skip_if(!self.keys.is_pressed(key));
            }
            LdVxDt { x } => {
                let delay = self.timers.lock().delay.read();
                self.set_v(x, delay);
            }
            LdVxKey { x } => self.state = ExecState::AwaitingKey { register: x },
            LdDtVx { x } => {
                self.timers.lock().delay.write(self.v(x));
            }
            LdStVx { x } => {
                self.timers.lock().sound.write(self.v(x));
            }
            // FX1E - 16-bit add, VF untouched
            AddI { x } => self.i_reg = self.i_reg.wrapping_add(self.v(x) as u16),
            LdFont { x } => {
                let digit = self.v(x);
                if digit as usize * FONT_GLYPH_SIZE >= FONTSET_SIZE {
                    return Err(Fault::FontDigitOutOfRange {
                        pc: op.pc,
                        opcode: op.opcode,
                        digit,
                    });
                }
                self.i_reg = digit as u16 * FONT_GLYPH_SIZE as u16;
            }
            LdBcd { x } => {
                let val = self.v(x);
                let range = self.ram_range(op, self.i_reg as usize, 3)?;
                self.ram[range].copy_from_slice(&[val / 100, (val / 10) % 10, val % 10]);
            }
            StoreRegs { x } => {
                let count = x as usize + 1;
                let range = self.ram_range(op, self.i_reg as usize, count)?;
                self.ram[range].copy_from_slice(&self.v_reg[..count]);
            }
            LoadRegs { x } => {
                let count = x as usize + 1;
                let range = self.ram_range(op, self.i_reg as usize, count)?;
                self.v_reg[..count].copy_from_slice(&self.ram[range]);
            }
        }
        Ok(())
    }

    /// DXYN: XOR an N-byte sprite from `memory[I]` onto the screen at
    /// `(Vx, Vy)`. VF ends up 1 iff a lit pixel was turned off.
    fn draw_sprite(&mut self, op: Op, x: u8, y: u8, height: u8) -> Result<(), Fault> {
        let x_coord = self.v(x) as usize;
        let y_coord = self.v(y) as usize;
        let range = self.ram_range(op, self.i_reg as usize, height as usize)?;

        self.v_reg[0xF] = 0;
        let mut collided = false;
        for (row, &bits) in self.ram[range].iter().enumerate() {
            let (changed, hit) = self.screen.xor_row(x_coord, y_coord + row, bits);
            self.redraw |= changed;
            collided |= hit;
        }
        self.v_reg[0xF] = collided as u8;
        Ok(())
    }

    fn key_operand(&self, op: Op, x: u8) -> Result<usize, Fault> {
        let key = self.v(x);
        if key as usize >= NUM_KEYS {
            return Err(Fault::InvalidKey {
                pc: op.pc,
                opcode: op.opcode,
                key,
            });
        }
        Ok(key as usize)
    }

    #[inline]
    fn v(&self, reg: u8) -> u8 {
        self.v_reg[reg as usize]
    }

    #[inline]
    fn set_v(&mut self, reg: u8, val: u8) {
        self.v_reg[reg as usize] = val;
    }

    fn report(&self, executed: bool) -> StepReport {
        StepReport {
            executed,
            redraw: self.redraw,
            beeping: self.is_beeping(),
        }
    }

    /// Decrement both timers by one 60 Hz tick.
    pub fn tick_timers(&self) {
        self.timers.tick();
    }

    /// Report a key transition from the host. A press edge (up -> down)
    /// completes a pending `FX0A`; holding a key that was already down does
    /// not.
    pub fn update_key(&mut self, key: usize, pressed: bool) -> Result<(), KeyError> {
        let edge = self.keys.update(key, pressed)?;
        if edge {
            self.resolve_key_press(key as u8);
        }
        Ok(())
    }

    /// Finish a pending `FX0A` with `key`. Only reachable through a press
    /// edge in `update_key`.
    fn resolve_key_press(&mut self, key: u8) {
        if let ExecState::AwaitingKey { register } = self.state {
            self.set_v(register, key);
            self.state = ExecState::Running;
            self.pc = self.pc.wrapping_add(2);
            self.cycles += 1;
            log::debug!("Key {:X} resolved wait into V{:X}", key, register);
        }
    }

    pub fn display(&self) -> &Display {
        &self.screen
    }

    pub fn needs_redraw(&self) -> bool {
        self.redraw
    }

    /// Return the redraw flag and clear it. Called by the display sink after
    /// it has consumed the frame.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.redraw)
    }

    pub fn is_beeping(&self) -> bool {
        self.timers.sound_active()
    }

    /// Handle to the timer bank, for a dedicated timer thread.
    pub fn timers(&self) -> SharedTimers {
        self.timers.clone()
    }

    pub fn state(&self) -> ExecState {
        self.state
    }

    pub fn fault(&self) -> Option<Fault> {
        self.fault
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn index(&self) -> u16 {
        self.i_reg
    }

    pub fn registers(&self) -> &[u8; NUM_REGS] {
        &self.v_reg
    }

    /// Active part of the call stack, oldest frame first.
    pub fn stack(&self) -> &[u16] {
        &self.stack[..self.stack_pointer]
    }

    pub fn memory(&self) -> &[u8; RAM_SIZE] {
        &self.ram
    }

    pub fn keys(&self) -> Keypad {
        self.keys
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycles
    }

    pub fn history(&self) -> &History {
        &self.history
    }
}
