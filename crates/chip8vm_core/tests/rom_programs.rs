//! End-to-end runs of small hand-assembled programs.
use chip8vm_core::{disassemble, Config, Emulator, ExecState, Fault, TimerMode, START_ADDRESS};

fn assemble(ops: &[u16]) -> Vec<u8> {
    ops.iter().flat_map(|op| op.to_be_bytes()).collect()
}

fn boot(rom: &[u8]) -> Emulator {
    let config = Config::builder()
        .timer_mode(TimerMode::Ticked)
        .rng_seed(Some(1))
        .build();
    Emulator::with_rom(rom, config).expect("ROM fits")
}

#[test]
fn add_program_then_fault_on_invalid_opcode() {
    // V0 = 10; V1 = 5; V0 += V1; invalid
    let rom = [0x60, 0x0A, 0x61, 0x05, 0x80, 0x14, 0xFF, 0xFF];
    let mut emu = boot(&rom);

    for _ in 0..3 {
        emu.step().expect("valid instruction");
    }
    assert_eq!(emu.registers()[0], 15);
    assert_eq!(emu.registers()[0xF], 0);

    let fault = emu.step().unwrap_err();
    assert_eq!(
        fault,
        Fault::UnknownOpcode {
            pc: 0x206,
            opcode: 0xFFFF
        }
    );
    assert_eq!(fault.pc(), 0x206);
    assert_eq!(fault.opcode(), 0xFFFF);
    assert_eq!(
        fault.to_string(),
        "unknown opcode 0xFFFF at 0x206"
    );
}

#[test]
fn trailing_zero_word_is_a_no_op() {
    let rom = [0x60, 0x0A, 0x61, 0x05, 0x80, 0x14, 0x00, 0x00];
    let mut emu = boot(&rom);
    assert_eq!(emu.step_frame(4), Ok(4));
    assert_eq!(emu.pc(), START_ADDRESS + 8);
}

#[test]
fn counting_loop_terminates() {
    // 0x200: LD V0, 0
    // 0x202: ADD V0, 1
    // 0x204: SE V0, 10
    // 0x206: JP 0x202
    // 0x208: JP 0x208
    let rom = assemble(&[0x6000, 0x7001, 0x300A, 0x1202, 0x1208]);
    let mut emu = boot(&rom);
    emu.step_frame(100).unwrap();
    assert_eq!(emu.registers()[0], 10);
    assert_eq!(emu.pc(), 0x208);
}

#[test]
fn bcd_digits_render_as_font_glyphs() {
    // Draw the hundreds digit of 137 ("1") at (0, 0).
    // 0x200: LD V0, 137
    // 0x202: LD I, 0x300
    // 0x204: LD B, V0
    // 0x206: LD V2, [I]   (V0..V2 = 1, 3, 7)
    // 0x208: LD F, V0
    // 0x20A: LD V3, 0
    // 0x20C: DRW V3, V3, 5
    let rom = assemble(&[0x6089, 0xA300, 0xF033, 0xF265, 0xF029, 0x6300, 0xD335]);
    let mut emu = boot(&rom);
    emu.step_frame(7).unwrap();

    assert_eq!(&emu.registers()[..3], &[1, 3, 7]);
    assert!(emu.take_redraw());
    // "1" glyph: 20 60 20 20 70
    let row = |y| (0..4).map(|x| emu.display().get(x, y)).collect::<Vec<_>>();
    assert_eq!(row(0), vec![false, false, true, false]);
    assert_eq!(row(1), vec![false, true, true, false]);
    assert_eq!(row(4), vec![false, true, true, true]);
}

#[test]
fn key_wait_survives_many_idle_steps() {
    let rom = assemble(&[0xF10A, 0x1202]);
    let mut emu = boot(&rom);
    emu.step().unwrap();
    for _ in 0..1000 {
        assert!(!emu.step().unwrap().executed);
    }
    assert_eq!(emu.cycle_count(), 0);
    emu.update_key(2, true).unwrap();
    assert_eq!(emu.state(), ExecState::Running);
    assert_eq!(emu.registers()[1], 2);
}

#[test]
fn disassembly_matches_execution() {
    let rom = assemble(&[0x6089, 0xA300, 0xF033, 0x00EE]);
    let listing: Vec<String> = disassemble(&rom, START_ADDRESS)
        .map(|line| line.to_string())
        .collect();
    assert_eq!(
        listing,
        vec![
            "0x200: 6089  LD V0, 0x89",
            "0x202: A300  LD I, 0x300",
            "0x204: F033  LD B, V0",
            "0x206: 00EE  RET",
        ]
    );
}
