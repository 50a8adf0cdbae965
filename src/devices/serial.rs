use std::io::Write;

use log::{trace, warn};

use crate::devices::Device;

pub const DATA: usize = 0;
pub const STATUS: usize = 1;
pub const CONTROL: usize = 2;
pub const COMMAND: usize = 3;

/// Width of the register window on the bus.
pub const REGISTER_CNT: usize = 4;

/// Minimal 6551-style serial adapter with four byte registers.
///
/// Writing the data register sends the byte to `out` straight away; the
/// other registers are plain storage. A failed transmit is logged and the
/// register keeps the byte.
#[derive(Debug)]
pub struct Acia<W> {
    regs: [u8; REGISTER_CNT],
    out: W,
}
impl<W: Write> Acia<W> {
    pub fn new(out: W) -> Self {
        Self {
            regs: [0; REGISTER_CNT],
            out,
        }
    }

    pub fn register(&self, offset: usize) -> Option<u8> {
        self.regs.get(offset).copied()
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn output_mut(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    fn transmit(&mut self, data: u8) {
        match self.out.write_all(&[data]).and_then(|_| self.out.flush()) {
            Ok(()) => trace!("ACIA: transmitted {data:#04x}"),
            Err(e) => warn!("ACIA: could not transmit {data:#04x}: {e}"),
        }
    }
}
impl<W: Write> Device for Acia<W> {
    fn reset(&mut self) {
        self.regs = [0; REGISTER_CNT];
    }

    fn read(&mut self, offset: usize) -> Option<u8> {
        self.register(offset)
    }

    fn write(&mut self, offset: usize, data: u8) -> Option<()> {
        let reg = self.regs.get_mut(offset)?;
        *reg = data;

        if offset == DATA {
            self.transmit(data);
        }
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_register_echoes_to_output() {
        let mut acia = Acia::new(Vec::new());
        for b in b"Hi\n" {
            assert_eq!(acia.write(DATA, *b), Some(()));
        }
        assert_eq!(acia.output().as_slice(), b"Hi\n");
        assert_eq!(acia.read(DATA), Some(b'\n'));
    }

    #[test]
    fn other_registers_are_plain_storage() {
        let mut acia = Acia::new(Vec::new());
        acia.write(STATUS, 0x10).unwrap();
        acia.write(CONTROL, 0x1F).unwrap();
        acia.write(COMMAND, 0x0B).unwrap();

        assert!(acia.output().is_empty());
        assert_eq!(acia.read(STATUS), Some(0x10));
        assert_eq!(acia.read(CONTROL), Some(0x1F));
        assert_eq!(acia.read(COMMAND), Some(0x0B));
    }

    #[test]
    fn offsets_past_the_window_are_rejected() {
        let mut acia = Acia::new(Vec::new());
        assert_eq!(acia.read(REGISTER_CNT - 1), Some(0));
        assert_eq!(acia.read(REGISTER_CNT), None);
        assert_eq!(acia.write(REGISTER_CNT, 0), None);
    }

    #[test]
    fn reset_clears_registers_but_not_output() {
        let mut acia = Acia::new(Vec::new());
        acia.write(DATA, b'x').unwrap();
        acia.write(CONTROL, 0x1F).unwrap();
        acia.reset();
        assert_eq!(acia.read(DATA), Some(0));
        assert_eq!(acia.read(CONTROL), Some(0));
        assert_eq!(acia.into_output(), b"x");
    }
}
