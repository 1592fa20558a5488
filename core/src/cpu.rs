//! 65C02 interpreter for the instructions the generated player uses
//!
//! Timing is exact for the supported subset, including the taken-branch and
//! page-crossing penalties. Every data access is stamped with the cycle the
//! instruction completes on, which is when the real processor drives the
//! bus for the last time. Opcode and operand fetches carry the start cycle.

use bitflags::bitflags;

use crate::error::CpuError;

bitflags! {
    /// Processor status register
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Status: u8 {
        const CARRY = 0x01;
        const ZERO = 0x02;
        const IRQ_DISABLE = 0x04;
        const DECIMAL = 0x08;
        const BREAK = 0x10;
        const UNUSED = 0x20;
        const OVERFLOW = 0x40;
        const NEGATIVE = 0x80;
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::UNUSED | Status::IRQ_DISABLE
    }
}

/// Memory and I/O as seen by the processor
pub trait Bus {
    fn read(&mut self, addr: u16, at: u64) -> u8;
    fn write(&mut self, addr: u16, value: u8, at: u64);
}

/// Stack page base
const STACK: u16 = 0x0100;

/// Processor registers and the cycle counter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cpu {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub status: Status,
    /// Cycles executed since reset
    pub cycles: u64,
}

impl Default for Cpu {
    fn default() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0xFF,
            pc: 0,
            status: Status::default(),
            cycles: 0,
        }
    }
}

fn crosses(a: u16, b: u16) -> bool {
    a & 0xFF00 != b & 0xFF00
}

impl Cpu {
    pub fn new() -> Self {
        Self::default()
    }

    fn fetch<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u8 {
        let value = bus.read(self.pc, self.cycles);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    fn fetch_word<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u16 {
        let low = self.fetch(bus);
        let high = self.fetch(bus);
        u16::from_le_bytes([low, high])
    }

    fn set_nz(&mut self, value: u8) -> u8 {
        self.status.set(Status::ZERO, value == 0);
        self.status.set(Status::NEGATIVE, value & 0x80 != 0);
        value
    }

    fn pull<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u8 {
        self.cycles += 4;
        self.sp = self.sp.wrapping_add(1);
        let value = bus.read(STACK | self.sp as u16, self.cycles);
        self.set_nz(value)
    }

    fn branch<B: Bus + ?Sized>(&mut self, bus: &mut B, taken: bool) {
        let disp = self.fetch(bus) as i8;
        if taken {
            let target = self.pc.wrapping_add(disp as u16);
            self.cycles += if crosses(target, self.pc) { 4 } else { 3 };
            self.pc = target;
        } else {
            self.cycles += 2;
        }
    }

    fn zp_pointer<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u16 {
        let zp = self.fetch(bus);
        let low = bus.read(zp as u16, self.cycles);
        let high = bus.read(zp.wrapping_add(1) as u16, self.cycles);
        u16::from_le_bytes([low, high])
    }

    fn load<B: Bus + ?Sized>(&mut self, bus: &mut B, addr: u16, cycles: u64) -> u8 {
        self.cycles += cycles;
        let value = bus.read(addr, self.cycles);
        self.set_nz(value)
    }

    fn store<B: Bus + ?Sized>(&mut self, bus: &mut B, addr: u16, value: u8, cycles: u64) {
        self.cycles += cycles;
        bus.write(addr, value, self.cycles);
    }

    /// Execute one instruction and return the cycles it took.
    pub fn step<B: Bus + ?Sized>(&mut self, bus: &mut B) -> Result<u8, CpuError> {
        let start = self.cycles;
        let pc = self.pc;
        let opcode = self.fetch(bus);

        match opcode {
            // NOP
            0xEA => self.cycles += 2,
            // TAY
            0xA8 => {
                self.y = self.set_nz(self.a);
                self.cycles += 2;
            }
            // INC A
            0x1A => {
                self.a = self.set_nz(self.a.wrapping_add(1));
                self.cycles += 2;
            }
            // INY
            0xC8 => {
                self.y = self.set_nz(self.y.wrapping_add(1));
                self.cycles += 2;
            }
            // PLA
            0x68 => self.a = self.pull(bus),
            // PLX
            0xFA => self.x = self.pull(bus),
            // BRA, BNE, BPL
            0x80 => self.branch(bus, true),
            0xD0 => {
                let taken = !self.status.contains(Status::ZERO);
                self.branch(bus, taken);
            }
            0x10 => {
                let taken = !self.status.contains(Status::NEGATIVE);
                self.branch(bus, taken);
            }
            // JMP abs
            0x4C => {
                self.pc = self.fetch_word(bus);
                self.cycles += 3;
            }
            // AND #, ORA #, LDA #, LDY #
            0x29 => {
                let value = self.fetch(bus);
                self.a = self.set_nz(self.a & value);
                self.cycles += 2;
            }
            0x09 => {
                let value = self.fetch(bus);
                self.a = self.set_nz(self.a | value);
                self.cycles += 2;
            }
            0xA9 => {
                let value = self.fetch(bus);
                self.a = self.set_nz(value);
                self.cycles += 2;
            }
            0xA0 => {
                let value = self.fetch(bus);
                self.y = self.set_nz(value);
                self.cycles += 2;
            }
            // STA zp
            0x85 => {
                let zp = self.fetch(bus);
                self.store(bus, zp as u16, self.a, 3);
            }
            // LDA abs, LDY abs
            0xAD => {
                let addr = self.fetch_word(bus);
                self.a = self.load(bus, addr, 4);
            }
            0xAC => {
                let addr = self.fetch_word(bus);
                self.y = self.load(bus, addr, 4);
            }
            // STA abs, STX abs, STY abs
            0x8D => {
                let addr = self.fetch_word(bus);
                self.store(bus, addr, self.a, 4);
            }
            0x8E => {
                let addr = self.fetch_word(bus);
                self.store(bus, addr, self.x, 4);
            }
            0x8C => {
                let addr = self.fetch_word(bus);
                self.store(bus, addr, self.y, 4);
            }
            // LDA abs,Y
            0xB9 => {
                let base = self.fetch_word(bus);
                let addr = base.wrapping_add(self.y as u16);
                let cycles = if crosses(base, addr) { 5 } else { 4 };
                self.a = self.load(bus, addr, cycles);
            }
            // STA abs,Y
            0x99 => {
                let base = self.fetch_word(bus);
                let addr = base.wrapping_add(self.y as u16);
                self.store(bus, addr, self.a, 5);
            }
            // LDA (zp)
            0xB2 => {
                let addr = self.zp_pointer(bus);
                self.a = self.load(bus, addr, 5);
            }
            // LDA (zp),Y
            0xB1 => {
                let base = self.zp_pointer(bus);
                let addr = base.wrapping_add(self.y as u16);
                let cycles = if crosses(base, addr) { 6 } else { 5 };
                self.a = self.load(bus, addr, cycles);
            }
            // STA (zp)
            0x92 => {
                let addr = self.zp_pointer(bus);
                self.store(bus, addr, self.a, 5);
            }
            _ => {
                self.pc = pc;
                self.cycles = start;
                return Err(CpuError::Unsupported { opcode, pc });
            }
        }

        Ok((self.cycles - start) as u8)
    }
}
