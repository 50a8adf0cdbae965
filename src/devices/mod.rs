pub mod serial;

pub use serial::Acia;

/// A memory-mapped peripheral. Addresses are register offsets from the
/// device's base, and `None` means the offset is not a register.
#[allow(unused_variables)]
pub trait Device {
    fn reset(&mut self) {}

    #[must_use]
    fn read(&mut self, offset: usize) -> Option<u8> {
        None
    }

    fn write(&mut self, offset: usize, data: u8) -> Option<()> {
        None
    }
}
