use std::{fmt, ops::Range};

use log::{debug, warn};
use thiserror::Error;

use crate::{cpu::RESET_VECTOR, devices::serial::REGISTER_CNT};

const ADDRESS_SPACE: usize = 0x10000;

/// What a decoded address belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Ram,
    Rom,
    Serial,
    Halt,
}
impl Slot {
    fn name(self) -> &'static str {
        match self {
            Slot::Ram => "RAM",
            Slot::Rom => "ROM",
            Slot::Serial => "serial",
            Slot::Halt => "halt register",
        }
    }
}
impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("no {0} range was assigned")]
    Missing(Slot),
    #[error("{0} range is empty")]
    Empty(Slot),
    #[error("{slot} range {start:#06x}+{byte_cnt:#x} runs past the 16-bit address space")]
    VirtualAddressOutOfRange {
        slot: Slot,
        start: usize,
        byte_cnt: usize,
    },
    #[error("{0} and {1} ranges overlap")]
    Overlap(Slot, Slot),
}

/// Collects the memory map before validating it.
#[derive(Debug, Clone, Default)]
pub struct LayoutBuilder {
    ram: Option<(usize, usize)>,
    rom: Option<(usize, usize)>,
    serial: Option<usize>,
    halt: Option<usize>,
}
impl LayoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ram(&mut self, addr_start: usize, byte_cnt: usize) -> &mut Self {
        self.ram = Some((addr_start, byte_cnt));
        self
    }

    pub fn rom(&mut self, addr_start: usize, byte_cnt: usize) -> &mut Self {
        self.rom = Some((addr_start, byte_cnt));
        self
    }

    pub fn serial(&mut self, addr_start: usize) -> &mut Self {
        self.serial = Some(addr_start);
        self
    }

    /// Maps a one-byte register that stops the run loop when written.
    pub fn halt(&mut self, addr: usize) -> &mut Self {
        self.halt = Some(addr);
        self
    }

    pub fn build(&self) -> Result<Layout, BuildError> {
        let ram = self.ram.ok_or(BuildError::Missing(Slot::Ram))?;
        let rom = self.rom.ok_or(BuildError::Missing(Slot::Rom))?;
        let serial = self.serial.ok_or(BuildError::Missing(Slot::Serial))?;

        let ram = span(Slot::Ram, ram)?;
        let rom = span(Slot::Rom, rom)?;
        let serial = span(Slot::Serial, (serial, REGISTER_CNT))?;

        let mut spans = vec![
            (Slot::Ram, ram.clone()),
            (Slot::Rom, rom.clone()),
            (Slot::Serial, serial.clone()),
        ];
        if let Some(addr) = self.halt {
            spans.push((Slot::Halt, span(Slot::Halt, (addr, 1))?));
        }

        for (i, (a, range_a)) in spans.iter().enumerate() {
            for (b, range_b) in spans.iter().skip(i + 1) {
                if range_a.start < range_b.end && range_b.start < range_a.end {
                    return Err(BuildError::Overlap(*a, *b));
                }
            }
        }

        let layout = Layout {
            ram,
            rom,
            serial,
            halt: self.halt,
        };
        if layout.decode(RESET_VECTOR).is_none() {
            warn!("Reset vector {RESET_VECTOR:#06x} is not backed by RAM or ROM");
        }
        debug!("Memory map: {layout}");

        Ok(layout)
    }
}

/// Turns a `(start, byte_cnt)` request into an address range inside 64 KiB.
fn span(slot: Slot, (start, byte_cnt): (usize, usize)) -> Result<Range<usize>, BuildError> {
    if byte_cnt == 0 {
        return Err(BuildError::Empty(slot));
    }
    match start.checked_add(byte_cnt) {
        Some(end) if end <= ADDRESS_SPACE => Ok(start..end),
        _ => Err(BuildError::VirtualAddressOutOfRange {
            slot,
            start,
            byte_cnt,
        }),
    }
}

/// A validated memory map. RAM, ROM, the serial window and the optional
/// halt register never overlap and all fit in 64 KiB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    ram: Range<usize>,
    rom: Range<usize>,
    serial: Range<usize>,
    halt: Option<usize>,
}
impl Layout {
    pub fn ram(&self) -> Range<usize> {
        self.ram.clone()
    }

    pub fn rom(&self) -> Range<usize> {
        self.rom.clone()
    }

    pub fn serial(&self) -> Range<usize> {
        self.serial.clone()
    }

    pub fn halt(&self) -> Option<usize> {
        self.halt
    }

    pub fn decode(&self, addr: u16) -> Option<Slot> {
        let addr = addr as usize;
        if self.ram.contains(&addr) {
            Some(Slot::Ram)
        } else if self.serial.contains(&addr) {
            Some(Slot::Serial)
        } else if self.halt == Some(addr) {
            Some(Slot::Halt)
        } else if self.rom.contains(&addr) {
            Some(Slot::Rom)
        } else {
            None
        }
    }
}
impl Default for Layout {
    /// RAM 0x0000-0x7FFF, ACIA 0x8000-0x8003, ROM 0xC000-0xFFFF.
    fn default() -> Self {
        Self {
            ram: 0x0000..0x8000,
            rom: 0xC000..0x10000,
            serial: 0x8000..0x8000 + REGISTER_CNT,
            halt: None,
        }
    }
}
impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let span = |r: &Range<usize>| format!("{:#06x}-{:#06x}", r.start, r.end - 1);
        write!(
            f,
            "RAM {} ACIA {} ROM {}",
            span(&self.ram),
            span(&self.serial),
            span(&self.rom)
        )?;
        if let Some(addr) = self.halt {
            write!(f, " HALT {addr:#06x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_map() {
        let layout = Layout::default();
        assert_eq!(layout.decode(0x0000), Some(Slot::Ram));
        assert_eq!(layout.decode(0x7FFF), Some(Slot::Ram));
        assert_eq!(layout.decode(0x8000), Some(Slot::Serial));
        assert_eq!(layout.decode(0x8003), Some(Slot::Serial));
        assert_eq!(layout.decode(0x8004), None);
        assert_eq!(layout.decode(0xBFFF), None);
        assert_eq!(layout.decode(0xC000), Some(Slot::Rom));
        assert_eq!(layout.decode(0xFFFF), Some(Slot::Rom));
    }

    #[test]
    fn builder_matches_default() {
        let layout = LayoutBuilder::new()
            .ram(0x0000, 0x8000)
            .serial(0x8000)
            .rom(0xC000, 0x4000)
            .build()
            .unwrap();
        assert_eq!(layout, Layout::default());
        assert_eq!(
            layout.to_string(),
            "RAM 0x0000-0x7fff ACIA 0x8000-0x8003 ROM 0xc000-0xffff"
        );
    }

    #[test]
    fn halt_register_decodes() {
        let layout = LayoutBuilder::new()
            .ram(0x0000, 0x8000)
            .serial(0x8000)
            .halt(0x8010)
            .rom(0xC000, 0x4000)
            .build()
            .unwrap();
        assert_eq!(layout.decode(0x8010), Some(Slot::Halt));
        assert_eq!(layout.halt(), Some(0x8010));
    }

    #[test]
    fn rejects_missing_regions() {
        let err = LayoutBuilder::new().ram(0, 0x100).serial(0x200).build();
        assert_eq!(err, Err(BuildError::Missing(Slot::Rom)));
    }

    #[test]
    fn rejects_overlap() {
        let err = LayoutBuilder::new()
            .ram(0x0000, 0x8000)
            .serial(0x7FFE)
            .rom(0xC000, 0x4000)
            .build();
        assert_eq!(err, Err(BuildError::Overlap(Slot::Ram, Slot::Serial)));

        let err = LayoutBuilder::new()
            .ram(0x0000, 0xC001)
            .serial(0x8000)
            .rom(0xC000, 0x4000)
            .build();
        assert_eq!(err, Err(BuildError::Overlap(Slot::Ram, Slot::Rom)));
    }

    #[test]
    fn rejects_ranges_past_64k() {
        let err = LayoutBuilder::new()
            .ram(0x0000, 0x8000)
            .serial(0x8000)
            .rom(0xC000, 0x4001)
            .build();
        assert_eq!(
            err,
            Err(BuildError::VirtualAddressOutOfRange {
                slot: Slot::Rom,
                start: 0xC000,
                byte_cnt: 0x4001
            })
        );
    }

    #[test]
    fn rejects_sizes_that_overflow() {
        let err = LayoutBuilder::new()
            .ram(0x0010, usize::MAX)
            .serial(0x8000)
            .rom(0xC000, 0x4000)
            .build();
        assert_eq!(
            err,
            Err(BuildError::VirtualAddressOutOfRange {
                slot: Slot::Ram,
                start: 0x0010,
                byte_cnt: usize::MAX
            })
        );

        let err = LayoutBuilder::new()
            .ram(0x0000, 0x8000)
            .serial(usize::MAX)
            .rom(usize::MAX, 1)
            .build();
        assert!(matches!(
            err,
            Err(BuildError::VirtualAddressOutOfRange { .. })
        ));

        let err = LayoutBuilder::new()
            .ram(0x0000, 0x8000)
            .serial(0x8000)
            .halt(usize::MAX)
            .rom(0xC000, 0x4000)
            .build();
        assert!(matches!(
            err,
            Err(BuildError::VirtualAddressOutOfRange {
                slot: Slot::Halt,
                ..
            })
        ));
    }

    #[test]
    fn serial_window_matches_acia_registers() {
        let layout = Layout::default();
        assert_eq!(layout.serial().len(), REGISTER_CNT);
        assert_eq!(layout.decode(0x8000 + REGISTER_CNT as u16), None);
    }

    #[test]
    fn rejects_empty_ranges() {
        let err = LayoutBuilder::new()
            .ram(0x0000, 0)
            .serial(0x8000)
            .rom(0xC000, 0x4000)
            .build();
        assert_eq!(err, Err(BuildError::Empty(Slot::Ram)));
    }
}
