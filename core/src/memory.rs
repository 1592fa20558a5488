//! Host memory with two selectable contexts
//!
//! Zero page, the stack page and everything from $C000 up always resolve to
//! the main bank. $0200-$BFFF follow the selected read and write contexts
//! independently.

use pulse_gen::{MemContext, MemoryBus};

const BANK_SIZE: usize = 0x10000;

/// Two 64 KiB banks plus the current context selection
pub struct Memory {
    main: Box<[u8]>,
    aux: Box<[u8]>,
    read: MemContext,
    write: MemContext,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        Self {
            main: vec![0; BANK_SIZE].into_boxed_slice(),
            aux: vec![0; BANK_SIZE].into_boxed_slice(),
            read: MemContext::Main,
            write: MemContext::Main,
        }
    }

    /// Whether `addr` follows the context selection
    pub fn is_switched(addr: u16) -> bool {
        (0x0200..0xC000).contains(&addr)
    }

    fn resolve(addr: u16, ctx: MemContext) -> MemContext {
        if Self::is_switched(addr) {
            ctx
        } else {
            MemContext::Main
        }
    }

    fn bank(&self, ctx: MemContext) -> &[u8] {
        match ctx {
            MemContext::Main => &self.main,
            MemContext::Aux => &self.aux,
        }
    }

    fn bank_mut(&mut self, ctx: MemContext) -> &mut [u8] {
        match ctx {
            MemContext::Main => &mut self.main,
            MemContext::Aux => &mut self.aux,
        }
    }

    pub fn read_context(&self) -> MemContext {
        self.read
    }

    pub fn write_context(&self) -> MemContext {
        self.write
    }

    pub fn select_read(&mut self, ctx: MemContext) {
        self.read = ctx;
    }

    pub fn read(&self, addr: u16) -> u8 {
        self.bank(Self::resolve(addr, self.read))[addr as usize]
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        let ctx = Self::resolve(addr, self.write);
        self.bank_mut(ctx)[addr as usize] = value;
    }

    /// Read a bank directly, ignoring the selection and the shared ranges
    pub fn peek(&self, ctx: MemContext, addr: u16) -> u8 {
        self.bank(ctx)[addr as usize]
    }

    /// Write a bank directly, ignoring the selection and the shared ranges
    pub fn poke(&mut self, ctx: MemContext, addr: u16, value: u8) {
        self.bank_mut(ctx)[addr as usize] = value;
    }

    /// Copy `len` bytes out of a bank, wrapping at the top of memory
    pub fn dump(&self, ctx: MemContext, addr: u16, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| self.peek(ctx, addr.wrapping_add(i as u16)))
            .collect()
    }
}

impl MemoryBus for Memory {
    fn select_write(&mut self, ctx: MemContext) {
        self.write = ctx;
    }

    fn write_byte(&mut self, addr: u16, value: u8) {
        self.write(addr, value);
    }

    fn read_byte(&self, addr: u16) -> u8 {
        self.read(addr)
    }
}
