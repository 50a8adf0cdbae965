use cpu65::{Bus, LayoutBuilder, Status};

const HALT: u16 = 0x8100;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Default map plus a halt register. Vectors: reset $C000, IRQ/BRK $C020,
/// NMI $C030.
fn machine(segments: &[(u16, &[u8])]) -> Bus<Vec<u8>> {
    init_logger();

    let layout = LayoutBuilder::new()
        .ram(0x0000, 0x8000)
        .serial(0x8000)
        .halt(HALT as usize)
        .rom(0xC000, 0x4000)
        .build()
        .unwrap();
    let mut bus = Bus::with_output(layout, Vec::new());

    for (pos, bytes) in segments {
        bus.rom_mut().load(*pos, bytes).unwrap();
    }
    bus.rom_mut()
        .load(0xFFFA, &[0x30, 0xC0, 0x00, 0xC0, 0x20, 0xC0])
        .unwrap();

    bus.reset();
    bus
}

#[test]
fn prints_hello_over_serial() {
    #[rustfmt::skip]
    let program: &[u8] = &[
        0xA2, 0x00,       // LDX #0
        0xBD, 0x10, 0xC0, // loop: LDA msg,X
        0xF0, 0x06,       // BEQ done
        0x8D, 0x00, 0x80, // STA ACIA data
        0xE8,             // INX
        0xD0, 0xF5,       // BNE loop
        0x8D, 0x00, 0x81, // done: STA halt
    ];
    let mut bus = machine(&[(0xC000, program), (0xC010, &b"hello\0"[..])]);

    assert_eq!(bus.run(Some(1000)), 29);
    assert!(bus.is_halted());
    assert_eq!(bus.exit_code(), Some(0));
    assert_eq!(bus.serial().output().as_slice(), b"hello");
}

#[test]
fn reset_restarts_a_halted_machine() {
    #[rustfmt::skip]
    let program: &[u8] = &[
        0xA9, 0x21,       // LDA #'!'
        0x8D, 0x00, 0x80, // STA ACIA data
        0x8D, 0x00, 0x81, // STA halt
    ];
    let mut bus = machine(&[(0xC000, program)]);

    bus.run(None);
    assert_eq!(bus.exit_code(), Some(0x21));

    bus.reset();
    assert!(!bus.is_halted());
    assert_eq!(bus.cpu().pc(), 0xC000);
    bus.run(None);
    assert_eq!(bus.serial().output().as_slice(), b"!!");
}

#[test]
fn subroutine_calls_return_and_count_cycles() {
    #[rustfmt::skip]
    let program: &[u8] = &[
        0xA2, 0xFF,       // LDX #$FF
        0x9A,             // TXS
        0xA2, 0x00,       // LDX #0
        0x20, 0x10, 0xC0, // JSR inc
        0x20, 0x10, 0xC0, // JSR inc
        0x8E, 0x00, 0x81, // STX halt
    ];
    #[rustfmt::skip]
    let inc: &[u8] = &[
        0xE8, // INX
        0x60, // RTS
    ];
    let mut bus = machine(&[(0xC000, program), (0xC010, inc)]);

    assert_eq!(bus.run(None), 10);
    assert_eq!(bus.exit_code(), Some(2));
    assert_eq!(bus.cpu().regs().sp, 0xFF);

    // Return address of the second JSR is left on the stack.
    assert_eq!(bus.peek(0x01FF), Some(0xC0));
    assert_eq!(bus.peek(0x01FE), Some(0x0A));

    // 7 reset + 2 + 2 + 2 + 2 * (6 + 2 + 6) + 4
    assert_eq!(bus.cpu().clock_count(), 45);
}

#[test]
fn brk_enters_handler_and_rti_returns_past_padding() {
    #[rustfmt::skip]
    let program: &[u8] = &[
        0xA2, 0xFF,       // LDX #$FF
        0x9A,             // TXS
        0x00, 0xEA,       // BRK + padding
        0x8D, 0x00, 0x81, // STA halt
    ];
    #[rustfmt::skip]
    let handler: &[u8] = &[
        0xA9, 0x2A, // LDA #$2A
        0x40,       // RTI
    ];
    let mut bus = machine(&[(0xC000, program), (0xC020, handler)]);

    bus.run(Some(3));
    assert_eq!(bus.cpu().pc(), 0xC020);
    assert!(bus.cpu().flag(Status::INTERRUPT));
    assert_eq!(bus.peek(0x01FF), Some(0xC0));
    assert_eq!(bus.peek(0x01FE), Some(0x05));
    assert_eq!(bus.peek(0x01FD).map(|p| p & 0x30), Some(0x30));

    bus.run(None);
    assert_eq!(bus.exit_code(), Some(0x2A));
    assert_eq!(bus.cpu().regs().sp, 0xFF);
}

#[test]
fn hardware_interrupts() {
    #[rustfmt::skip]
    let program: &[u8] = &[
        0xA2, 0xFF,       // LDX #$FF
        0x9A,             // TXS
        0x58,             // CLI
        0x4C, 0x04, 0xC0, // JMP *
    ];
    #[rustfmt::skip]
    let irq: &[u8] = &[
        0xEE, 0x00, 0x02, // INC $0200
        0x40,             // RTI
    ];
    #[rustfmt::skip]
    let nmi: &[u8] = &[
        0xEE, 0x01, 0x02, // INC $0201
        0x40,             // RTI
    ];
    let mut bus = machine(&[(0xC000, program), (0xC020, irq), (0xC030, nmi)]);

    bus.run(Some(4));
    assert_eq!(bus.cpu().pc(), 0xC004);

    assert!(bus.irq());
    assert_eq!(bus.cpu().pc(), 0xC020);
    assert!(bus.cpu().flag(Status::INTERRUPT));
    assert_eq!(bus.peek(0x01FD).map(|p| p & 0x30), Some(0x20));

    // Interrupt latency is drained before the handler's first instruction.
    assert_eq!(bus.step(), 6);
    bus.step();
    assert_eq!(bus.cpu().pc(), 0xC004);
    assert!(!bus.cpu().flag(Status::INTERRUPT));
    assert_eq!(bus.peek(0x0200), Some(1));

    bus.cpu_mut().regs_mut().status.insert(Status::INTERRUPT);
    assert!(!bus.irq());
    assert_eq!(bus.cpu().pc(), 0xC004);

    bus.nmi();
    assert_eq!(bus.cpu().pc(), 0xC030);
    bus.run(Some(2));
    assert_eq!(bus.cpu().pc(), 0xC004);
    assert_eq!(bus.peek(0x0201), Some(1));
    assert_eq!(bus.peek(0x0200), Some(1));
}

#[test]
fn bad_accesses_do_not_stop_execution() {
    #[rustfmt::skip]
    let program: &[u8] = &[
        0xA9, 0x55,       // LDA #$55
        0x8D, 0x00, 0xC0, // STA $C000 (ROM)
        0xAD, 0x00, 0x90, // LDA $9000 (unmapped)
        0xAD, 0x00, 0xC0, // LDA $C000
        0x8D, 0x00, 0x81, // STA halt
    ];
    let mut bus = machine(&[(0xC000, program)]);

    bus.step();
    bus.step();
    bus.step();
    assert_eq!(bus.cpu().regs().a, 0);
    assert!(bus.cpu().flag(Status::ZERO));

    bus.run(None);
    assert_eq!(bus.exit_code(), Some(0xA9));
}

#[test]
fn page_crossing_costs_reads_only() {
    #[rustfmt::skip]
    let program: &[u8] = &[
        0xA2, 0x01,       // LDX #1
        0xBD, 0xFF, 0x10, // LDA $10FF,X
        0xBD, 0x00, 0x10, // LDA $1000,X
        0x9D, 0xFF, 0x10, // STA $10FF,X
        0x8D, 0x00, 0x81, // STA halt
    ];
    let mut bus = machine(&[(0xC000, program)]);

    let ticks: Vec<u32> = (0..5).map(|_| bus.step()).collect();
    assert_eq!(ticks, [2, 5, 4, 5, 4]);
    assert!(bus.is_halted());
}

#[test]
fn decimal_mode_addition() {
    #[rustfmt::skip]
    let program: &[u8] = &[
        0xF8,             // SED
        0x18,             // CLC
        0xA9, 0x09,       // LDA #$09
        0x69, 0x01,       // ADC #$01
        0x8D, 0x00, 0x81, // STA halt
    ];
    let mut bus = machine(&[(0xC000, program)]);

    bus.run(None);
    assert_eq!(bus.exit_code(), Some(0x10));
    assert!(!bus.cpu().flag(Status::CARRY));
}

#[test]
fn status_block_after_run() {
    let mut bus = machine(&[(0xC000, &[0xA9, 0x80, 0x8D, 0x00, 0x81][..])]);
    bus.run(None);

    let status = bus.cpu().to_string();
    assert!(status.contains("A: 0x80"));
    assert!(status.contains("Flags: N V - B D I Z C"));
}
