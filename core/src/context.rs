//! Context switch pair
//!
//! `enter` hands the processor to the generated image: the live part of the
//! stack page is copied to the save area in the alternate context, the page
//! is reseeded as the sample ring and execution continues at the silence
//! entry point with the alternate context selected. `leave` undoes all of
//! it, so the burst looks like one call to whoever entered.

use pulse_gen::layout::{SAVE_BUF, SILENCE};
use pulse_gen::{MemContext, MemoryBus};
use tracing::trace;

use crate::cpu::Cpu;
use crate::error::ContextError;
use crate::memory::Memory;
use crate::ring::RingBuffer;

const STACK: u16 = 0x0100;

/// What `enter` saved; valid only while the image runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveArea {
    sp: u8,
}

impl SaveArea {
    /// Stack pointer at the time of `enter`
    pub fn stack_pointer(&self) -> u8 {
        self.sp
    }

    /// Number of stack bytes copied, from the stack pointer to the top of the page
    pub fn saved_bytes(&self) -> usize {
        0x100 - self.sp as usize
    }

    fn offsets(&self) -> impl Iterator<Item = u16> {
        self.sp as u16..=0xFF
    }
}

/// Host/image coroutine state
#[derive(Debug, Default)]
pub struct ContextSwitch {
    saved: Option<SaveArea>,
}

impl ContextSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the image currently owns the processor
    pub fn is_entered(&self) -> bool {
        self.saved.is_some()
    }

    pub fn enter(&mut self, cpu: &mut Cpu, memory: &mut Memory) -> Result<(), ContextError> {
        if self.saved.is_some() {
            return Err(ContextError::AlreadyEntered);
        }

        memory.select_read(MemContext::Aux);
        memory.select_write(MemContext::Aux);

        let saved = SaveArea { sp: cpu.sp };
        for offset in saved.offsets() {
            let value = memory.read(STACK + offset);
            memory.write(SAVE_BUF + offset, value);
        }

        cpu.sp = RingBuffer::seeded().install(memory);
        cpu.pc = SILENCE;
        self.saved = Some(saved);

        trace!(sp = saved.sp, saved = saved.saved_bytes(), "entered image");
        Ok(())
    }

    pub fn leave(&mut self, cpu: &mut Cpu, memory: &mut Memory) -> Result<SaveArea, ContextError> {
        let saved = self.saved.take().ok_or(ContextError::NotEntered)?;

        // The save area is only readable with the alternate context selected
        memory.select_read(MemContext::Aux);
        for offset in saved.offsets() {
            let value = memory.read(SAVE_BUF + offset);
            memory.write(STACK + offset, value);
        }
        cpu.sp = saved.sp;

        memory.select_read(MemContext::Main);
        memory.select_write(MemContext::Main);

        trace!(sp = saved.sp, "left image");
        Ok(saved)
    }
}
