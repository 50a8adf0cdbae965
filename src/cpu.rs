use std::fmt;

use bitflags::bitflags;
use log::{debug, trace};

use crate::inst::{decode_inst, AddressingMode, Inst, Opcode};

pub const NMI_VECTOR: u16 = 0xFFFA;
pub const RESET_VECTOR: u16 = 0xFFFC;
pub const IRQ_VECTOR: u16 = 0xFFFE;

const STACK_PAGE: u16 = 0x0100;
const RESET_CYCLES: u8 = 7;
const IRQ_CYCLES: u8 = 7;
const NMI_CYCLES: u8 = 8;

/// The processor's only view of the outside world.
///
/// Reads and writes never fail from the processor's point of view; whatever
/// sits behind the bus decides what an unmapped or read-only access means.
pub trait SystemBus {
    fn read(&mut self, addr: u16) -> u8;

    fn write(&mut self, addr: u16, data: u8);
}

bitflags! {
    /// Processor status register. Stored packed, read and written per flag.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Status: u8 {
        const CARRY = 1 << 0;
        const ZERO = 1 << 1;
        const INTERRUPT = 1 << 2;
        const DECIMAL = 1 << 3;
        const BREAK = 1 << 4;
        const UNUSED = 1 << 5;
        const OVERFLOW = 1 << 6;
        const NEGATIVE = 1 << 7;
    }
}
impl From<u8> for Status {
    fn from(value: u8) -> Self {
        Status::from_bits_retain(value) | Status::UNUSED
    }
}
impl From<Status> for u8 {
    fn from(value: Status) -> Self {
        (value | Status::UNUSED).bits()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub status: Status,
}
impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bit = |flag: Status| if self.status.contains(flag) { '1' } else { '0' };
        writeln!(f, " A: {:#04x}  X: {:#04x}  Y: {:#04x}", self.a, self.x, self.y)?;
        writeln!(f, "SP: {:#04x} PC: {:#06x}", self.sp, self.pc)?;
        writeln!(f, "Flags: N V - B D I Z C")?;
        write!(
            f,
            "       {} {} {} {} {} {} {} {}",
            bit(Status::NEGATIVE),
            bit(Status::OVERFLOW),
            bit(Status::UNUSED),
            bit(Status::BREAK),
            bit(Status::DECIMAL),
            bit(Status::INTERRUPT),
            bit(Status::ZERO),
            bit(Status::CARRY),
        )
    }
}

#[derive(Debug, Default, Clone)]
pub struct Cpu {
    regs: Registers,

    /// Ticks left before the in-flight instruction counts as complete.
    cycles: u8,
    clock_count: u64,

    opcode: u8,
    fetched: u8,
    addr_abs: u16,
    addr_rel: u16,
}
impl Cpu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn regs(&self) -> &Registers {
        &self.regs
    }

    pub fn regs_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    pub fn pc(&self) -> u16 {
        self.regs.pc
    }

    pub fn status(&self) -> Status {
        self.regs.status
    }

    pub fn flag(&self, flag: Status) -> bool {
        self.regs.status.contains(flag)
    }

    /// Ticks remaining in the current instruction's budget.
    pub fn cycles(&self) -> u8 {
        self.cycles
    }

    pub fn clock_count(&self) -> u64 {
        self.clock_count
    }

    /// The last opcode byte fetched.
    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    pub fn complete(&self) -> bool {
        self.cycles == 0
    }

    pub fn reset<B: SystemBus>(&mut self, bus: &mut B) {
        self.regs = Registers {
            status: Status::INTERRUPT | Status::BREAK | Status::UNUSED,
            ..Registers::default()
        };

        self.opcode = 0;
        self.fetched = 0;
        self.addr_rel = 0;
        self.addr_abs = RESET_VECTOR;
        self.regs.pc = self.read_word(bus, self.addr_abs);

        self.cycles = RESET_CYCLES;
        self.clock_count = 0;

        debug!("Reset, starting execution at {:#06x}", self.regs.pc);
    }

    /// Advances the processor by one clock tick.
    ///
    /// All effects of an instruction land on the tick that fetches it; the
    /// remaining ticks only drain the budget.
    pub fn clock<B: SystemBus>(&mut self, bus: &mut B) {
        if self.cycles == 0 {
            let pc = self.regs.pc;
            self.opcode = self.next_byte(bus);

            let Opcode { inst, mode, cycles } = decode_inst(self.opcode);
            trace!("{pc:#06x}  {:02x}  {inst} {mode:?}", self.opcode);

            self.cycles = cycles;
            let mode_extra = self.address(bus, mode);
            let inst_extra = self.execute(bus, inst, mode);
            self.cycles += mode_extra & inst_extra;
        }

        self.cycles -= 1;
        self.clock_count += 1;
    }

    /// Runs exactly one instruction and returns the ticks it consumed.
    ///
    /// Any budget still pending (reset or interrupt latency) is drained first
    /// and is not included in the returned count.
    pub fn step<B: SystemBus>(&mut self, bus: &mut B) -> u32 {
        self.finish_instruction(bus);

        let mut ticks = 0;
        loop {
            self.clock(bus);
            ticks += 1;
            if self.complete() {
                break ticks;
            }
        }
    }

    /// Requests a maskable interrupt. Returns `false` if InterruptDisable
    /// masked it.
    pub fn irq<B: SystemBus>(&mut self, bus: &mut B) -> bool {
        self.finish_instruction(bus);
        if self.flag(Status::INTERRUPT) {
            return false;
        }

        debug!("IRQ at {:#06x}", self.regs.pc);
        self.interrupt(bus, IRQ_VECTOR, IRQ_CYCLES);
        true
    }

    pub fn nmi<B: SystemBus>(&mut self, bus: &mut B) {
        self.finish_instruction(bus);

        debug!("NMI at {:#06x}", self.regs.pc);
        self.interrupt(bus, NMI_VECTOR, NMI_CYCLES);
    }

    fn finish_instruction<B: SystemBus>(&mut self, bus: &mut B) {
        while !self.complete() {
            self.clock(bus);
        }
    }

    fn interrupt<B: SystemBus>(&mut self, bus: &mut B, vector: u16, cycles: u8) {
        self.push_word(bus, self.regs.pc);
        let status = (self.regs.status - Status::BREAK) | Status::UNUSED;
        self.push_byte(bus, status.into());
        self.set_flag(Status::INTERRUPT, true);

        self.addr_abs = vector;
        self.regs.pc = self.read_word(bus, self.addr_abs);
        self.cycles = cycles;
    }

    /// Resolves the operand location for `mode`. Returns 1 when the mode
    /// crossed a page and may cost an extra cycle.
    fn address<B: SystemBus>(&mut self, bus: &mut B, mode: AddressingMode) -> u8 {
        match mode {
            AddressingMode::Implied => {
                self.fetched = self.regs.a;
                0
            }
            AddressingMode::Immediate => {
                self.addr_abs = self.regs.pc;
                self.regs.pc = self.regs.pc.wrapping_add(1);
                0
            }
            AddressingMode::ZeroPage => {
                self.addr_abs = self.next_byte(bus) as u16;
                0
            }
            AddressingMode::ZeroPageX => {
                self.addr_abs = self.next_byte(bus).wrapping_add(self.regs.x) as u16;
                0
            }
            AddressingMode::ZeroPageY => {
                self.addr_abs = self.next_byte(bus).wrapping_add(self.regs.y) as u16;
                0
            }
            AddressingMode::Relative => {
                self.addr_rel = self.next_byte(bus) as i8 as u16;
                0
            }
            AddressingMode::Absolute => {
                self.addr_abs = self.next_word(bus);
                0
            }
            AddressingMode::AbsoluteX => {
                let base = self.next_word(bus);
                self.addr_abs = base.wrapping_add(self.regs.x as u16);
                page_crossed(base, self.addr_abs) as u8
            }
            AddressingMode::AbsoluteY => {
                let base = self.next_word(bus);
                self.addr_abs = base.wrapping_add(self.regs.y as u16);
                page_crossed(base, self.addr_abs) as u8
            }
            AddressingMode::Indirect => {
                let ptr = self.next_word(bus);
                // The high byte never carries into the next page.
                let ptr_hi = (ptr & 0xFF00) | (ptr.wrapping_add(1) & 0x00FF);
                let lo = bus.read(ptr) as u16;
                let hi = bus.read(ptr_hi) as u16;
                self.addr_abs = (hi << 8) | lo;
                0
            }
            AddressingMode::XIndirect => {
                let zp = self.next_byte(bus).wrapping_add(self.regs.x);
                self.addr_abs = self.read_zp_word(bus, zp);
                0
            }
            AddressingMode::IndirectY => {
                let zp = self.next_byte(bus);
                let base = self.read_zp_word(bus, zp);
                self.addr_abs = base.wrapping_add(self.regs.y as u16);
                page_crossed(base, self.addr_abs) as u8
            }
        }
    }

    /// Applies `inst`. Returns 1 when the instruction pays the page-cross
    /// penalty of its addressing mode.
    fn execute<B: SystemBus>(&mut self, bus: &mut B, inst: Inst, mode: AddressingMode) -> u8 {
        match inst {
            Inst::LDA => {
                self.regs.a = self.fetch(bus, mode);
                self.check_nz(self.regs.a);
                1
            }
            Inst::LDX => {
                self.regs.x = self.fetch(bus, mode);
                self.check_nz(self.regs.x);
                1
            }
            Inst::LDY => {
                self.regs.y = self.fetch(bus, mode);
                self.check_nz(self.regs.y);
                1
            }

            Inst::STA => {
                bus.write(self.addr_abs, self.regs.a);
                0
            }
            Inst::STX => {
                bus.write(self.addr_abs, self.regs.x);
                0
            }
            Inst::STY => {
                bus.write(self.addr_abs, self.regs.y);
                0
            }

            Inst::TAX => {
                self.regs.x = self.regs.a;
                self.check_nz(self.regs.x);
                0
            }
            Inst::TAY => {
                self.regs.y = self.regs.a;
                self.check_nz(self.regs.y);
                0
            }
            Inst::TSX => {
                self.regs.x = self.regs.sp;
                self.check_nz(self.regs.x);
                0
            }
            Inst::TXA => {
                self.regs.a = self.regs.x;
                self.check_nz(self.regs.a);
                0
            }
            Inst::TXS => {
                self.regs.sp = self.regs.x;
                0
            }
            Inst::TYA => {
                self.regs.a = self.regs.y;
                self.check_nz(self.regs.a);
                0
            }

            Inst::PHA => {
                self.push_byte(bus, self.regs.a);
                0
            }
            Inst::PHP => {
                let status = self.regs.status | Status::BREAK | Status::UNUSED;
                self.push_byte(bus, status.into());
                0
            }
            Inst::PLA => {
                self.regs.a = self.pull_byte(bus);
                self.check_nz(self.regs.a);
                0
            }
            Inst::PLP => {
                self.regs.status = Status::from(self.pull_byte(bus));
                0
            }

            Inst::DEC => {
                let data = self.fetch(bus, mode).wrapping_sub(1);
                bus.write(self.addr_abs, data);
                self.check_nz(data);
                0
            }
            Inst::DEX => {
                self.regs.x = self.regs.x.wrapping_sub(1);
                self.check_nz(self.regs.x);
                0
            }
            Inst::DEY => {
                self.regs.y = self.regs.y.wrapping_sub(1);
                self.check_nz(self.regs.y);
                0
            }
            Inst::INC => {
                let data = self.fetch(bus, mode).wrapping_add(1);
                bus.write(self.addr_abs, data);
                self.check_nz(data);
                0
            }
            Inst::INX => {
                self.regs.x = self.regs.x.wrapping_add(1);
                self.check_nz(self.regs.x);
                0
            }
            Inst::INY => {
                self.regs.y = self.regs.y.wrapping_add(1);
                self.check_nz(self.regs.y);
                0
            }

            Inst::ADC => {
                let operand = self.fetch(bus, mode);
                self.add_with_carry(operand);
                1
            }
            Inst::SBC => {
                let operand = self.fetch(bus, mode);
                self.subtract_with_borrow(operand);
                1
            }

            Inst::AND => {
                self.regs.a &= self.fetch(bus, mode);
                self.check_nz(self.regs.a);
                1
            }
            Inst::EOR => {
                self.regs.a ^= self.fetch(bus, mode);
                self.check_nz(self.regs.a);
                1
            }
            Inst::ORA => {
                self.regs.a |= self.fetch(bus, mode);
                self.check_nz(self.regs.a);
                1
            }
            Inst::BIT => {
                let data = self.fetch(bus, mode);
                self.set_flag(Status::ZERO, self.regs.a & data == 0);
                self.set_flag(Status::OVERFLOW, data & 0x40 != 0);
                self.set_flag(Status::NEGATIVE, data & 0x80 != 0);
                0
            }

            Inst::ASL => {
                self.shift(bus, mode, |data, _| (data << 1, data & 0x80 != 0));
                0
            }
            Inst::LSR => {
                self.shift(bus, mode, |data, _| (data >> 1, data & 0x01 != 0));
                0
            }
            Inst::ROL => {
                self.shift(bus, mode, |data, carry| {
                    ((data << 1) | carry as u8, data & 0x80 != 0)
                });
                0
            }
            Inst::ROR => {
                self.shift(bus, mode, |data, carry| {
                    ((data >> 1) | (carry as u8) << 7, data & 0x01 != 0)
                });
                0
            }

            Inst::CMP => {
                let data = self.fetch(bus, mode);
                self.compare(self.regs.a, data);
                1
            }
            Inst::CPX => {
                let data = self.fetch(bus, mode);
                self.compare(self.regs.x, data);
                0
            }
            Inst::CPY => {
                let data = self.fetch(bus, mode);
                self.compare(self.regs.y, data);
                0
            }

            Inst::BCC => self.branch(!self.flag(Status::CARRY)),
            Inst::BCS => self.branch(self.flag(Status::CARRY)),
            Inst::BEQ => self.branch(self.flag(Status::ZERO)),
            Inst::BNE => self.branch(!self.flag(Status::ZERO)),
            Inst::BMI => self.branch(self.flag(Status::NEGATIVE)),
            Inst::BPL => self.branch(!self.flag(Status::NEGATIVE)),
            Inst::BVC => self.branch(!self.flag(Status::OVERFLOW)),
            Inst::BVS => self.branch(self.flag(Status::OVERFLOW)),

            Inst::JMP => {
                self.regs.pc = self.addr_abs;
                0
            }
            Inst::JSR => {
                self.push_word(bus, self.regs.pc.wrapping_sub(1));
                self.regs.pc = self.addr_abs;
                0
            }
            Inst::RTS => {
                self.regs.pc = self.pull_word(bus).wrapping_add(1);
                0
            }

            Inst::BRK => {
                // The byte after BRK is padding; the return address skips it.
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.push_word(bus, self.regs.pc);
                let status = self.regs.status | Status::BREAK | Status::UNUSED;
                self.push_byte(bus, status.into());
                self.set_flag(Status::INTERRUPT, true);

                self.addr_abs = IRQ_VECTOR;
                self.regs.pc = self.read_word(bus, self.addr_abs);
                debug!("BRK, vectoring to {:#06x}", self.regs.pc);
                0
            }
            Inst::RTI => {
                self.regs.status = Status::from(self.pull_byte(bus));
                self.regs.pc = self.pull_word(bus);
                debug!("RTI, returning to {:#06x}", self.regs.pc);
                0
            }

            Inst::CLC => self.clear_or_set(Status::CARRY, false),
            Inst::CLD => self.clear_or_set(Status::DECIMAL, false),
            Inst::CLI => self.clear_or_set(Status::INTERRUPT, false),
            Inst::CLV => self.clear_or_set(Status::OVERFLOW, false),
            Inst::SEC => self.clear_or_set(Status::CARRY, true),
            Inst::SED => self.clear_or_set(Status::DECIMAL, true),
            Inst::SEI => self.clear_or_set(Status::INTERRUPT, true),

            Inst::NOP => 0,
            Inst::XXX => {
                trace!("Illegal opcode {:#04x} treated as NOP", self.opcode);
                0
            }
        }
    }

    /// Reads the operand the addressing mode resolved to. Implied mode
    /// operates on the accumulator.
    fn fetch<B: SystemBus>(&mut self, bus: &mut B, mode: AddressingMode) -> u8 {
        if mode != AddressingMode::Implied {
            self.fetched = bus.read(self.addr_abs);
        }
        self.fetched
    }

    fn add_with_carry(&mut self, operand: u8) {
        let a = self.regs.a;
        let carry = self.flag(Status::CARRY) as u16;
        let sum = a as u16 + operand as u16 + carry;

        let (result, carry_out) = if self.flag(Status::DECIMAL) {
            let mut lo = (a & 0x0F) as u16 + (operand & 0x0F) as u16 + carry;
            let mut hi = (a >> 4) as u16 + (operand >> 4) as u16;
            if lo > 0x09 {
                lo += 0x06;
            }
            if lo > 0x0F {
                hi += 1;
            }
            if hi > 0x09 {
                hi += 0x06;
            }
            (((hi << 4) | (lo & 0x0F)) as u8, hi > 0x0F)
        } else {
            (sum as u8, sum > 0xFF)
        };

        self.set_flag(Status::CARRY, carry_out);
        self.set_flag(Status::OVERFLOW, overflowed(a, operand, sum as u8));
        self.regs.a = result;
        self.check_nz(result);
    }

    fn subtract_with_borrow(&mut self, operand: u8) {
        let a = self.regs.a;
        let inverted = !operand;
        let borrow = i16::from(!self.flag(Status::CARRY));
        let sum = a as u16 + inverted as u16 + (1 - borrow) as u16;

        let result = if self.flag(Status::DECIMAL) {
            let mut lo = (a & 0x0F) as i16 - (operand & 0x0F) as i16 - borrow;
            let mut hi = (a >> 4) as i16 - (operand >> 4) as i16;
            if lo < 0 {
                lo -= 0x06;
                hi -= 1;
            }
            if hi < 0 {
                hi -= 0x06;
            }
            ((hi << 4) | (lo & 0x0F)) as u8
        } else {
            sum as u8
        };

        self.set_flag(Status::CARRY, sum > 0xFF);
        self.set_flag(Status::OVERFLOW, overflowed(a, inverted, sum as u8));
        self.regs.a = result;
        self.check_nz(result);
    }

    fn shift<B, F>(&mut self, bus: &mut B, mode: AddressingMode, op: F)
    where
        B: SystemBus,
        F: FnOnce(u8, bool) -> (u8, bool),
    {
        let data = self.fetch(bus, mode);
        let (result, carry) = op(data, self.flag(Status::CARRY));

        if mode == AddressingMode::Implied {
            self.regs.a = result;
        } else {
            bus.write(self.addr_abs, result);
        }
        self.set_flag(Status::CARRY, carry);
        self.check_nz(result);
    }

    fn compare(&mut self, reg: u8, data: u8) {
        self.set_flag(Status::CARRY, reg >= data);
        self.check_nz(reg.wrapping_sub(data));
    }

    /// Taken branches cost one cycle, plus one more when the target is on
    /// another page. Charged directly, so the hint is always 0.
    fn branch(&mut self, condition: bool) -> u8 {
        if condition {
            self.cycles += 1;
            let target = self.regs.pc.wrapping_add(self.addr_rel);
            if page_crossed(self.regs.pc, target) {
                self.cycles += 1;
            }
            self.regs.pc = target;
        }
        0
    }

    fn clear_or_set(&mut self, flag: Status, value: bool) -> u8 {
        self.set_flag(flag, value);
        0
    }

    fn set_flag(&mut self, flag: Status, value: bool) {
        self.regs.status.set(flag, value);
    }

    fn check_nz(&mut self, data: u8) {
        self.set_flag(Status::ZERO, data == 0);
        self.set_flag(Status::NEGATIVE, data & 0x80 != 0);
    }

    fn push_byte<B: SystemBus>(&mut self, bus: &mut B, data: u8) {
        bus.write(self.stack_addr(), data);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
    }

    fn pull_byte<B: SystemBus>(&mut self, bus: &mut B) -> u8 {
        self.regs.sp = self.regs.sp.wrapping_add(1);
        bus.read(self.stack_addr())
    }

    fn push_word<B: SystemBus>(&mut self, bus: &mut B, data: u16) {
        self.push_byte(bus, (data >> 8) as u8);
        self.push_byte(bus, data as u8);
    }

    fn pull_word<B: SystemBus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.pull_byte(bus) as u16;
        let hi = self.pull_byte(bus) as u16;
        (hi << 8) | lo
    }

    fn stack_addr(&self) -> u16 {
        STACK_PAGE | self.regs.sp as u16
    }

    fn next_byte<B: SystemBus>(&mut self, bus: &mut B) -> u8 {
        let byte = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        byte
    }

    fn next_word<B: SystemBus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.next_byte(bus) as u16;
        let hi = self.next_byte(bus) as u16;
        (hi << 8) | lo
    }

    fn read_word<B: SystemBus>(&self, bus: &mut B, addr: u16) -> u16 {
        let lo = bus.read(addr) as u16;
        let hi = bus.read(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    fn read_zp_word<B: SystemBus>(&self, bus: &mut B, zp: u8) -> u16 {
        let lo = bus.read(zp as u16) as u16;
        let hi = bus.read(zp.wrapping_add(1) as u16) as u16;
        (hi << 8) | lo
    }
}
impl fmt::Display for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Processor Status")?;
        writeln!(f, "----------------")?;
        writeln!(f, "{}", self.regs)?;
        write!(f, "Clock: {} ticks", self.clock_count)
    }
}

fn page_crossed(from: u16, to: u16) -> bool {
    from & 0xFF00 != to & 0xFF00
}

fn overflowed(a: u8, operand: u8, result: u8) -> bool {
    !(a ^ operand) & (a ^ result) & 0x80 != 0
}
