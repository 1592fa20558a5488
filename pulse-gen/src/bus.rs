//! Memory-context capability used to install the player image
//!
//! The host has two memory contexts. Generated code runs from the alternate
//! context while the host program runs from the main one, so every image
//! byte is written with the alternate context selected and the main context
//! restored right after.

use serde::{Deserialize, Serialize};

/// One of the two memory contexts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MemContext {
    /// Host program context
    #[default]
    Main,
    /// Context the generated image executes from
    Aux,
}

/// Byte-level access to host memory through a selectable write context
pub trait MemoryBus {
    /// Select the context subsequent writes go to
    fn select_write(&mut self, ctx: MemContext);

    /// Write a byte through the selected context
    fn write_byte(&mut self, addr: u16, value: u8);

    /// Read a byte through the current read context
    fn read_byte(&self, addr: u16) -> u8;
}

/// Write one byte into the alternate context, leaving the main context selected.
pub fn write_alternate<B: MemoryBus + ?Sized>(bus: &mut B, addr: u16, value: u8) {
    bus.select_write(MemContext::Aux);
    bus.write_byte(addr, value);
    bus.select_write(MemContext::Main);
}

/// Write a little-endian word through the currently selected context.
pub fn write_word<B: MemoryBus + ?Sized>(bus: &mut B, addr: u16, value: u16) {
    let [low, high] = value.to_le_bytes();
    bus.write_byte(addr, low);
    bus.write_byte(addr.wrapping_add(1), high);
}
