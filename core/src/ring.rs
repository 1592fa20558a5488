//! Sample ring buffer
//!
//! The generated image keeps its pre-fetched samples in the stack page: the
//! pull in every routine is a plain stack pull, and the transfer tasks store
//! received bytes `Y` positions into the page. [`RingBuffer`] is the
//! explicit view of that arrangement: a 256 slot array with a read cursor
//! (the stack pointer plus one) and a write cursor (the transfer index).

use pulse_gen::MemContext;
use pulse_gen::layout::{RING_BUF, RW_SKEW, silence_page};

use crate::memory::Memory;

/// Number of slots
pub const CAPACITY: usize = 256;

/// Fixed-capacity byte ring with one producer and one consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingBuffer {
    slots: [u8; CAPACITY],
    read: u8,
    write: u8,
}

impl RingBuffer {
    /// Ring holding the silence samples that carry playback until the first
    /// transfer lands
    pub fn seeded() -> Self {
        let mut ring = Self {
            slots: [0; CAPACITY],
            read: 0,
            write: 0,
        };
        for _ in 0..RW_SKEW {
            ring.push(silence_page(0));
        }
        ring
    }

    /// Live view of the stack page for a given stack pointer and write index
    pub fn from_stack(memory: &Memory, sp: u8, write: u8) -> Self {
        let mut slots = [0; CAPACITY];
        for (i, slot) in slots.iter_mut().enumerate() {
            *slot = memory.peek(MemContext::Main, RING_BUF + i as u16);
        }
        Self {
            slots,
            read: sp.wrapping_add(1),
            write,
        }
    }

    pub fn read_cursor(&self) -> u8 {
        self.read
    }

    pub fn write_cursor(&self) -> u8 {
        self.write
    }

    /// Stack pointer that makes the next pull return the slot under the read cursor
    pub fn stack_pointer(&self) -> u8 {
        self.read.wrapping_sub(1)
    }

    /// Bytes between the read and write cursors
    pub fn len(&self) -> usize {
        self.write.wrapping_sub(self.read) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.read == self.write
    }

    pub fn push(&mut self, value: u8) {
        self.slots[self.write as usize] = value;
        self.write = self.write.wrapping_add(1);
    }

    pub fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let value = self.slots[self.read as usize];
        self.read = self.read.wrapping_add(1);
        Some(value)
    }

    /// Write the live slots into the stack page and return the stack pointer
    /// the image must start with.
    pub fn install(&self, memory: &mut Memory) -> u8 {
        let mut cursor = self.read;
        while cursor != self.write {
            memory.poke(MemContext::Main, RING_BUF + cursor as u16, self.slots[cursor as usize]);
            cursor = cursor.wrapping_add(1);
        }
        self.stack_pointer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_holds_skew_silence() {
        let mut ring = RingBuffer::seeded();
        assert_eq!(ring.len(), RW_SKEW as usize);
        assert_eq!(ring.stack_pointer(), 0xFF);
        for _ in 0..RW_SKEW {
            assert_eq!(ring.pop(), Some(0x52));
        }
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn test_cursors_wrap() {
        let mut ring = RingBuffer::seeded();
        for i in 0..300u32 {
            ring.push(i as u8);
            ring.pop();
        }
        assert_eq!(ring.len(), RW_SKEW as usize);
        assert_eq!(ring.read_cursor(), (300 % 256) as u8);
    }

    #[test]
    fn test_install_writes_only_live_slots() {
        let mut memory = Memory::new();
        memory.poke(MemContext::Main, 0x01E0, 0x99);

        let sp = RingBuffer::seeded().install(&mut memory);

        assert_eq!(sp, 0xFF);
        assert_eq!(memory.dump(MemContext::Main, 0x0100, 5), vec![0x52, 0x52, 0x52, 0x52, 0x00]);
        assert_eq!(memory.peek(MemContext::Main, 0x01E0), 0x99);
    }

    #[test]
    fn test_from_stack_roundtrip() {
        let mut memory = Memory::new();
        let sp = RingBuffer::seeded().install(&mut memory);
        let view = RingBuffer::from_stack(&memory, sp, RW_SKEW);
        assert_eq!(view, RingBuffer::seeded());
    }
}
