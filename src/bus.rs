use std::io::{self, Stdout, Write};

use log::{debug, error, info, trace};

use crate::{
    cpu::{Cpu, SystemBus},
    devices::{Acia, Device},
    dump,
    inst::decode_inst,
    layout::{Layout, Slot},
    mem::{MemError, Region},
};

/// Owns every device and the processor, and routes each access the
/// processor makes to the device behind the address.
pub struct Bus<W: Write = Stdout> {
    cpu: Cpu,
    devices: Devices<W>,
}
impl Bus<Stdout> {
    /// A bus whose serial adapter echoes to standard output.
    pub fn new(layout: Layout) -> Self {
        Self::with_output(layout, io::stdout())
    }
}
impl<W: Write> Bus<W> {
    pub fn with_output(layout: Layout, out: W) -> Self {
        let ram = layout.ram();
        let rom = layout.rom();
        debug!("Create bus: {layout}");

        Self {
            cpu: Cpu::new(),
            devices: Devices {
                ram: Region::ram(ram.start as u16, ram.len()),
                rom: Region::rom(rom.start as u16, rom.len()),
                serial: Acia::new(out),
                layout,
                halted: false,
                exit_code: None,
            },
        }
    }

    /// Resets the serial adapter and the processor and clears any halt.
    pub fn reset(&mut self) {
        self.devices.serial.reset();
        self.devices.halted = false;
        self.devices.exit_code = None;
        self.cpu.reset(&mut self.devices);
    }

    /// One processor clock tick.
    pub fn clock(&mut self) {
        self.cpu.clock(&mut self.devices);
    }

    /// Ticks the processor through exactly one instruction and returns the
    /// ticks it took.
    pub fn step(&mut self) -> u32 {
        self.cpu.step(&mut self.devices)
    }

    /// Steps until the bus halts or `limit` instructions have run. Returns
    /// the number of instructions executed.
    pub fn run(&mut self, limit: Option<u64>) -> u64 {
        let mut executed = 0;
        while !self.is_halted() && limit.map_or(true, |max| executed < max) {
            self.step();
            executed += 1;
        }
        executed
    }

    pub fn irq(&mut self) -> bool {
        self.cpu.irq(&mut self.devices)
    }

    pub fn nmi(&mut self) {
        self.cpu.nmi(&mut self.devices);
    }

    /// Stops the run loop at the next instruction boundary.
    pub fn stop(&mut self) {
        info!("Stop requested at {:#06x}", self.cpu.pc());
        self.devices.halted = true;
    }

    pub fn is_halted(&self) -> bool {
        self.devices.halted
    }

    /// The byte last written to the halt register, if any.
    pub fn exit_code(&self) -> Option<u8> {
        self.devices.exit_code
    }

    /// Reads as the processor would. Failures are logged and read as 0.
    pub fn read(&mut self, addr: u16) -> u8 {
        SystemBus::read(&mut self.devices, addr)
    }

    /// Writes as the processor would. Failures are logged and dropped.
    pub fn write(&mut self, addr: u16, data: u8) {
        SystemBus::write(&mut self.devices, addr, data);
    }

    pub fn try_read(&mut self, addr: u16) -> Result<u8, MemError> {
        self.devices.try_read(addr)
    }

    pub fn try_write(&mut self, addr: u16, data: u8) -> Result<(), MemError> {
        self.devices.try_write(addr, data)
    }

    /// Looks at an address without side effects or logging.
    pub fn peek(&self, addr: u16) -> Option<u8> {
        self.devices.peek(addr)
    }

    pub fn dump(&self, start: u16, end: u16) -> String {
        dump::hexdump(start, end, |addr| self.peek(addr))
    }

    /// The instruction at `addr` as assembler text, and its length in bytes.
    pub fn disassemble(&self, addr: u16) -> (String, u16) {
        let opcode = decode_inst(self.peek(addr).unwrap_or(0));
        let len = 1 + opcode.mode.operand_len();
        let operand: Vec<u8> = (1..len)
            .map(|i| self.peek(addr.wrapping_add(i)).unwrap_or(0))
            .collect();
        (opcode.disassemble(addr, &operand), len)
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn ram(&self) -> &Region {
        &self.devices.ram
    }

    pub fn ram_mut(&mut self) -> &mut Region {
        &mut self.devices.ram
    }

    pub fn rom(&self) -> &Region {
        &self.devices.rom
    }

    /// Direct access for image loading; bus writes to ROM stay rejected.
    pub fn rom_mut(&mut self) -> &mut Region {
        &mut self.devices.rom
    }

    pub fn serial(&self) -> &Acia<W> {
        &self.devices.serial
    }

    pub fn serial_mut(&mut self) -> &mut Acia<W> {
        &mut self.devices.serial
    }

    pub fn layout(&self) -> &Layout {
        &self.devices.layout
    }
}

struct Devices<W> {
    layout: Layout,
    ram: Region,
    rom: Region,
    serial: Acia<W>,
    halted: bool,
    exit_code: Option<u8>,
}
impl<W: Write> Devices<W> {
    fn serial_offset(&self, addr: u16) -> usize {
        addr as usize - self.layout.serial().start
    }

    fn try_read(&mut self, addr: u16) -> Result<u8, MemError> {
        match self.layout.decode(addr) {
            Some(Slot::Ram) => self.ram.get(addr),
            Some(Slot::Serial) => {
                let offset = self.serial_offset(addr);
                self.serial.read(offset).ok_or(MemError::OutOfRange(addr))
            }
            Some(Slot::Halt) => Ok(self.exit_code.unwrap_or(0)),
            Some(Slot::Rom) => self.rom.get(addr),
            None => Err(MemError::OutOfRange(addr)),
        }
    }

    fn try_write(&mut self, addr: u16, data: u8) -> Result<(), MemError> {
        match self.layout.decode(addr) {
            Some(Slot::Ram) => self.ram.set(addr, data),
            Some(Slot::Serial) => {
                let offset = self.serial_offset(addr);
                self.serial
                    .write(offset, data)
                    .ok_or(MemError::OutOfRange(addr))
            }
            Some(Slot::Halt) => {
                info!("Halt register written with {data:#04x}");
                self.halted = true;
                self.exit_code = Some(data);
                Ok(())
            }
            Some(Slot::Rom) => self.rom.set(addr, data),
            None => Err(MemError::OutOfRange(addr)),
        }
    }

    fn peek(&self, addr: u16) -> Option<u8> {
        match self.layout.decode(addr)? {
            Slot::Ram => self.ram.get(addr).ok(),
            Slot::Serial => self.serial.register(self.serial_offset(addr)),
            Slot::Halt => Some(self.exit_code.unwrap_or(0)),
            Slot::Rom => self.rom.get(addr).ok(),
        }
    }
}
impl<W: Write> SystemBus for Devices<W> {
    fn read(&mut self, addr: u16) -> u8 {
        match self.try_read(addr) {
            Ok(data) => {
                trace!("Read {data:#04x} from {addr:#06x}");
                data
            }
            Err(e) => {
                error!("Could not read: {e}");
                0
            }
        }
    }

    fn write(&mut self, addr: u16, data: u8) {
        match self.try_write(addr, data) {
            Ok(()) => trace!("Wrote {data:#04x} to {addr:#06x}"),
            Err(e) => error!("Could not write {data:#04x}: {e}"),
        }
    }
}
