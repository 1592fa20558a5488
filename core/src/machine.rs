//! Emulated host machine
//!
//! Processor, memory contexts, soft switches and the network interface
//! wired together. The machine doubles as the [`PlaybackHost`] the dispatch
//! loop runs on: host-side work (polling, preloading, idling) advances the
//! same cycle counter the image runs on.

use std::collections::VecDeque;

use pulse_gen::layout::{
    KEYBOARD, KEYBOARD_STROBE, LEAVE, MIXED_OFF, MIXED_ON, PAGE_1, PAGE_2, READ_AUX, READ_MAIN,
    SPEAKER, SPEED, TAPE_OUT, WRITE_AUX, WRITE_MAIN,
};
use pulse_gen::{MemContext, MemoryBus, OutputSink, PlayerImage};
use tracing::debug;

use crate::context::{ContextSwitch, SaveArea};
use crate::cpu::{Bus, Cpu};
use crate::error::{ContextError, CpuError};
use crate::memory::Memory;
use crate::net::{Connection, W5100};
use crate::player::{ESC, Leave, LeaveCause, PlaybackHost, PlaybackState};

const IO_PAGE: u16 = 0xC000;
const IO_END: u16 = 0xC0FF;
const NET_BASE: u16 = 0xC080;
const SPEED_DEFAULT: u8 = 0x80;

// =============================================================================
// Devices
// =============================================================================

/// Keyboard with scripted key presses
///
/// A press becomes visible to any access stamped at or after its cycle. The
/// latch keeps the last key with bit 7 set until the strobe is cleared.
#[derive(Debug, Default)]
pub struct Keyboard {
    script: VecDeque<(u64, u8)>,
    latch: u8,
}

impl Keyboard {
    pub fn press_at(&mut self, cycle: u64, key: u8) {
        let at = self.script.partition_point(|&(c, _)| c <= cycle);
        self.script.insert(at, (cycle, key));
    }

    fn sync(&mut self, now: u64) {
        while let Some(&(at, key)) = self.script.front() {
            if at > now {
                break;
            }
            self.script.pop_front();
            self.latch = key | 0x80;
        }
    }

    /// Keyboard data register
    pub fn read(&mut self, now: u64) -> u8 {
        self.sync(now);
        self.latch
    }

    pub fn clear_strobe(&mut self, now: u64) {
        self.sync(now);
        self.latch &= 0x7F;
    }

    /// Key waiting behind the strobe, without clearing it
    pub fn peek(&mut self, now: u64) -> Option<u8> {
        self.sync(now);
        (self.latch & 0x80 != 0).then_some(self.latch & 0x7F)
    }

    /// Key waiting behind the strobe; clears the strobe
    pub fn take(&mut self, now: u64) -> Option<u8> {
        let key = self.peek(now)?;
        self.latch &= 0x7F;
        Some(key)
    }

    /// Scripted presses not yet delivered
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

/// Video switches the player touches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Display {
    /// Four text lines below the graphics
    pub mixed: bool,
    pub page2: bool,
    /// Status shown in the text lines
    pub status: Option<PlaybackState>,
}

// =============================================================================
// System bus
// =============================================================================

/// Everything the processor can address
pub struct SystemBus {
    pub memory: Memory,
    pub keyboard: Keyboard,
    pub display: Display,
    pub net: W5100,
    net_base: u16,
    speed: Option<u8>,
    speaker: Vec<u64>,
    tape: Vec<u64>,
}

impl SystemBus {
    pub fn new(slot: u8, iigs: bool, net: W5100) -> Self {
        Self {
            memory: Memory::new(),
            keyboard: Keyboard::default(),
            display: Display::default(),
            net,
            net_base: NET_BASE | ((slot as u16) << 4),
            speed: iigs.then_some(SPEED_DEFAULT),
            speaker: Vec::new(),
            tape: Vec::new(),
        }
    }

    /// Cycles at which the speaker flipped
    pub fn speaker_toggles(&self) -> &[u64] {
        &self.speaker
    }

    /// Cycles at which the cassette output flipped
    pub fn tape_toggles(&self) -> &[u64] {
        &self.tape
    }

    pub fn toggles(&self, sink: OutputSink) -> &[u64] {
        match sink {
            OutputSink::Speaker => &self.speaker,
            OutputSink::TapeOut => &self.tape,
        }
    }

    /// Drain the toggle log of `sink`
    pub fn take_toggles(&mut self, sink: OutputSink) -> Vec<u64> {
        match sink {
            OutputSink::Speaker => std::mem::take(&mut self.speaker),
            OutputSink::TapeOut => std::mem::take(&mut self.tape),
        }
    }

    pub fn speed(&self) -> Option<u8> {
        self.speed
    }

    fn is_net(&self, addr: u16) -> bool {
        (self.net_base + 4..=self.net_base + 7).contains(&addr)
    }

    /// Switches that react to any access
    fn touch(&mut self, addr: u16, at: u64) {
        match addr {
            SPEAKER => self.speaker.push(at),
            TAPE_OUT => self.tape.push(at),
            MIXED_OFF => self.display.mixed = false,
            MIXED_ON => self.display.mixed = true,
            PAGE_1 => self.display.page2 = false,
            PAGE_2 => self.display.page2 = true,
            KEYBOARD_STROBE => self.keyboard.clear_strobe(at),
            _ => {}
        }
    }

    fn read_net(&mut self, addr: u16, at: u64) -> u8 {
        self.net.tick(at);
        match addr - self.net_base {
            4 => self.net.mode(),
            5 => (self.net.address() >> 8) as u8,
            6 => self.net.address() as u8,
            _ => self.net.read_data(),
        }
    }

    fn write_net(&mut self, addr: u16, value: u8, at: u64) {
        self.net.tick(at);
        match addr - self.net_base {
            4 => self.net.set_mode(value),
            5 => self.net.set_address_high(value),
            6 => self.net.set_address_low(value),
            _ => self.net.write_data(value),
        }
    }
}

impl Bus for SystemBus {
    fn read(&mut self, addr: u16, at: u64) -> u8 {
        match addr {
            KEYBOARD => self.keyboard.read(at),
            SPEED => self.speed.unwrap_or(0),
            a if self.is_net(a) => self.read_net(a, at),
            IO_PAGE..=IO_END => {
                self.touch(addr, at);
                0
            }
            _ => self.memory.read(addr),
        }
    }

    fn write(&mut self, addr: u16, value: u8, at: u64) {
        match addr {
            READ_MAIN => self.memory.select_read(MemContext::Main),
            READ_AUX => self.memory.select_read(MemContext::Aux),
            WRITE_MAIN => self.memory.select_write(MemContext::Main),
            WRITE_AUX => self.memory.select_write(MemContext::Aux),
            SPEED => {
                if let Some(speed) = self.speed.as_mut() {
                    *speed = value;
                }
            }
            a if self.is_net(a) => self.write_net(a, value, at),
            IO_PAGE..=IO_END => self.touch(addr, at),
            _ => self.memory.write(addr, value),
        }
    }
}

// =============================================================================
// Machine
// =============================================================================

/// Hardware and host timing parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineConfig {
    /// Expansion slot of the network interface
    pub slot: u8,
    /// Has the IIgs speed register
    pub iigs: bool,
    /// Remote delivery rate in bytes per 1000 cycles, unlimited when `None`
    pub delivery_rate: Option<u32>,
    /// Cycles one idle iteration of the dispatch loop takes
    pub idle_cycles: u64,
    /// Abort a burst that runs longer than this
    pub burst_cycle_limit: Option<u64>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            slot: 3,
            iigs: false,
            delivery_rate: None,
            idle_cycles: 1024,
            burst_cycle_limit: None,
        }
    }
}

/// Processor, bus and the context switch pair
pub struct Machine {
    pub cpu: Cpu,
    pub bus: SystemBus,
    switch: ContextSwitch,
    config: MachineConfig,
}

impl Machine {
    pub fn new(config: MachineConfig) -> Self {
        let net = match config.delivery_rate {
            Some(rate) => W5100::new().with_rate(rate),
            None => W5100::new(),
        };
        Self {
            cpu: Cpu::new(),
            bus: SystemBus::new(config.slot, config.iigs, net),
            switch: ContextSwitch::new(),
            config,
        }
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn install_image(&mut self, image: &PlayerImage) {
        image.install(&mut self.bus.memory);
    }

    /// Schedule a key press
    pub fn press_at(&mut self, cycle: u64, key: u8) {
        self.bus.keyboard.press_at(cycle, key);
    }

    /// Execute one instruction
    pub fn step(&mut self) -> Result<u8, CpuError> {
        self.cpu.step(&mut self.bus)
    }

    /// Step until `pc` reaches `target`, giving up after `limit` cycles.
    ///
    /// Returns the cycles spent, or `None` when the limit was hit first.
    pub fn run_until(&mut self, target: u16, limit: u64) -> Result<Option<u64>, CpuError> {
        let start = self.cpu.cycles;
        while self.cpu.pc != target {
            if self.cpu.cycles - start >= limit {
                return Ok(None);
            }
            self.step()?;
        }
        Ok(Some(self.cpu.cycles - start))
    }

    pub fn enter(&mut self) -> Result<(), ContextError> {
        self.switch.enter(&mut self.cpu, &mut self.bus.memory)
    }

    pub fn leave(&mut self) -> Result<SaveArea, ContextError> {
        let saved = self.switch.leave(&mut self.cpu, &mut self.bus.memory)?;
        self.bus.display.page2 = false;
        Ok(saved)
    }

    pub fn is_entered(&self) -> bool {
        self.switch.is_entered()
    }

    /// Enter the image and run it until it reaches the leave routine.
    pub fn burst(&mut self) -> Result<Leave, ContextError> {
        self.bus.net.tick(self.cpu.cycles);
        self.enter()?;
        let start = self.cpu.cycles;

        while self.cpu.pc != LEAVE {
            match self.config.burst_cycle_limit {
                Some(limit) if self.cpu.cycles - start > limit => {
                    self.leave()?;
                    return Err(ContextError::Runaway { limit });
                }
                _ => {}
            }
            if let Err(err) = self.step() {
                self.leave()?;
                return Err(err.into());
            }
        }

        self.leave()?;
        let cycles = self.cpu.cycles - start;
        let cause = match self.bus.keyboard.peek(self.cpu.cycles) {
            Some(_) => LeaveCause::Operator,
            None => LeaveCause::Starved,
        };
        debug!(?cause, cycles, buffered = self.bus.net.received(), "burst");
        Ok(Leave { cause, cycles })
    }
}

impl PlaybackHost for Machine {
    fn connected(&self) -> bool {
        self.bus.net.connected()
    }

    fn buffered(&self) -> usize {
        self.bus.net.received()
    }

    fn disconnect(&mut self) {
        self.bus.net.disconnect();
    }

    fn receive(&mut self, buf: &mut [u8]) -> usize {
        self.bus.net.tick(self.cpu.cycles);
        self.bus.net.receive(buf)
    }

    fn store(&mut self, dest: u16, bytes: &[u8], ctx: MemContext) {
        for (addr, &byte) in (dest..).zip(bytes) {
            self.bus.memory.poke(ctx, addr, byte);
        }
    }

    fn key(&mut self) -> Option<u8> {
        self.bus.keyboard.take(self.cpu.cycles)
    }

    fn abort_requested(&mut self) -> bool {
        match self.bus.keyboard.peek(self.cpu.cycles) {
            Some(ESC) => {
                self.bus.keyboard.clear_strobe(self.cpu.cycles);
                true
            }
            _ => false,
        }
    }

    fn speed(&self) -> Option<u8> {
        self.bus.speed
    }

    fn set_speed(&mut self, value: u8) {
        if let Some(speed) = self.bus.speed.as_mut() {
            *speed = value;
        }
    }

    fn show(&mut self, status: Option<PlaybackState>) {
        self.bus.display.mixed = status.is_some();
        self.bus.display.status = status;
    }

    fn idle(&mut self) {
        self.cpu.cycles += self.config.idle_cycles;
        self.bus.net.tick(self.cpu.cycles);
    }

    fn burst(&mut self) -> Result<Leave, ContextError> {
        Machine::burst(self)
    }
}
