pub mod bus;
pub mod cpu;
pub mod devices;
pub mod dump;
pub mod inst;
pub mod layout;
pub mod loader;
pub mod mem;

pub use bus::Bus;
pub use cpu::{Cpu, Registers, Status, SystemBus};
pub use devices::{Acia, Device};
pub use dump::hexdump;
pub use inst::{decode_inst, AddressingMode, Inst, Opcode, OPCODES};
pub use layout::{BuildError, Layout, LayoutBuilder, Slot};
pub use loader::{image_len, load_image, load_rom_image, LoadError};
pub use mem::{MemError, Region};
