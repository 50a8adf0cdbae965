use core::fmt::Debug;

use thiserror::Error;

use crate::dump;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemError {
    #[error("address {0:#06x} is outside every mapped region")]
    OutOfRange(u16),
    #[error("address {0:#06x} is read-only")]
    ReadOnly(u16),
}

/// A contiguous block of bytes mapped at `base`.
///
/// Addresses passed to [`Region::get`] and [`Region::set`] are bus addresses,
/// not offsets; anything outside `base..base + len` is rejected.
#[derive(Clone, PartialEq, Eq)]
pub struct Region {
    base: u16,
    data: Vec<u8>,
    read_only: bool,
}
impl Region {
    pub fn new(base: u16, byte_cnt: usize, read_only: bool) -> Self {
        Self {
            base,
            data: vec![0; byte_cnt],
            read_only,
        }
    }

    pub fn ram(base: u16, byte_cnt: usize) -> Self {
        Self::new(base, byte_cnt, false)
    }

    pub fn rom(base: u16, byte_cnt: usize) -> Self {
        Self::new(base, byte_cnt, true)
    }

    pub fn base(&self) -> u16 {
        self.base
    }

    pub fn get_byte_count(&self) -> usize {
        self.data.len()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn contains(&self, addr: u16) -> bool {
        self.offset(addr).is_some()
    }

    pub fn get(&self, addr: u16) -> Result<u8, MemError> {
        let offset = self.offset(addr).ok_or(MemError::OutOfRange(addr))?;
        Ok(self.data[offset])
    }

    pub fn set(&mut self, addr: u16, data: u8) -> Result<(), MemError> {
        let offset = self.offset(addr).ok_or(MemError::OutOfRange(addr))?;
        if self.read_only {
            return Err(MemError::ReadOnly(addr));
        }
        self.data[offset] = data;
        Ok(())
    }

    /// Programs `bytes` starting at bus address `pos`, ignoring the read-only
    /// flag. The whole slice must fit or nothing is written.
    pub fn load(&mut self, pos: u16, bytes: &[u8]) -> Result<(), MemError> {
        let start = self.offset(pos).ok_or(MemError::OutOfRange(pos))?;
        let end = start + bytes.len();
        if end > self.data.len() {
            let last = self.base as usize + end - 1;
            return Err(MemError::OutOfRange(last.min(u16::MAX as usize) as u16));
        }
        self.data[start..end].copy_from_slice(bytes);
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn dump(&self, start: u16, end: u16) -> String {
        dump::hexdump(start, end, |addr| self.get(addr).ok())
    }

    fn offset(&self, addr: u16) -> Option<usize> {
        let offset = (addr as usize).checked_sub(self.base as usize)?;
        (offset < self.data.len()).then_some(offset)
    }
}
impl Debug for Region {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Region")
            .field("base", &format_args!("{:#06x}", self.base))
            .field("byte_cnt", &self.data.len())
            .field("read_only", &self.read_only)
            .finish()
    }
}
