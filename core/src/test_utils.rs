//! Shared test utilities for integration and unit tests

use std::collections::VecDeque;

use pulse_gen::MemContext;

use crate::error::ContextError;
use crate::memory::Memory;
use crate::player::{ESC, Leave, LeaveCause, PlaybackHost, PlaybackState};

// ============================================================================
// Scripted Host
// ============================================================================

/// One dispatch iteration as seen by the scripted host
#[derive(Debug, Clone, Copy)]
pub struct Step {
    pub key: Option<u8>,
    /// Buffered byte count reported for this iteration
    pub buffered: usize,
}

impl Step {
    pub fn idle(buffered: usize) -> Self {
        Self { key: None, buffered }
    }

    pub fn key(key: u8, buffered: usize) -> Self {
        Self {
            key: Some(key),
            buffered,
        }
    }
}

/// Playback host driven by a fixed script instead of an emulated machine
///
/// Each call to `key` consumes one script step. The connection stays open
/// while steps remain; once the script is exhausted `key` answers escape.
pub struct ScriptedHost {
    pub script: VecDeque<Step>,
    pub stream: VecDeque<u8>,
    pub available: usize,
    pub memory: Memory,
    pub stores: Vec<(u16, usize, MemContext)>,
    pub shown: Vec<Option<PlaybackState>>,
    pub speed: Option<u8>,
    pub speed_writes: Vec<u8>,
    pub remote_closed: bool,
    pub disconnected: bool,
    pub fail_bursts: bool,
    pub bursts: u32,
    pub idles: u32,
}

impl ScriptedHost {
    /// Host with `available` filler bytes ready to receive
    pub fn new(available: usize, script: Vec<Step>) -> Self {
        Self {
            script: script.into(),
            stream: VecDeque::new(),
            available,
            memory: Memory::new(),
            stores: Vec::new(),
            shown: Vec::new(),
            speed: None,
            speed_writes: Vec::new(),
            remote_closed: false,
            disconnected: false,
            fail_bursts: false,
            bursts: 0,
            idles: 0,
        }
    }

    /// Host whose received bytes come from `stream`
    pub fn with_stream(stream: &[u8], script: Vec<Step>) -> Self {
        let mut host = Self::new(stream.len(), script);
        host.stream = stream.iter().copied().collect();
        host
    }
}

impl PlaybackHost for ScriptedHost {
    fn connected(&self) -> bool {
        !self.remote_closed && !self.disconnected && !self.script.is_empty()
    }

    fn buffered(&self) -> usize {
        self.available
    }

    fn disconnect(&mut self) {
        self.disconnected = true;
    }

    fn receive(&mut self, buf: &mut [u8]) -> usize {
        let len = buf.len().min(self.available);
        for byte in &mut buf[..len] {
            *byte = self.stream.pop_front().unwrap_or(0);
        }
        self.available -= len;
        len
    }

    fn store(&mut self, dest: u16, bytes: &[u8], ctx: MemContext) {
        for (addr, &byte) in (dest..).zip(bytes) {
            self.memory.poke(ctx, addr, byte);
        }
        self.stores.push((dest, bytes.len(), ctx));
    }

    fn key(&mut self) -> Option<u8> {
        match self.script.pop_front() {
            Some(step) => {
                self.available = step.buffered;
                step.key
            }
            None => Some(ESC),
        }
    }

    fn abort_requested(&mut self) -> bool {
        false
    }

    fn speed(&self) -> Option<u8> {
        self.speed
    }

    fn set_speed(&mut self, value: u8) {
        self.speed = Some(value);
        self.speed_writes.push(value);
    }

    fn show(&mut self, status: Option<PlaybackState>) {
        self.shown.push(status);
    }

    fn idle(&mut self) {
        self.idles += 1;
        assert!(self.idles < 10_000, "scripted host idled without progress");
    }

    fn burst(&mut self) -> Result<Leave, ContextError> {
        if self.fail_bursts {
            return Err(ContextError::Runaway { limit: 0 });
        }
        self.bursts += 1;
        Ok(Leave {
            cause: LeaveCause::Starved,
            cycles: 46,
        })
    }
}
