//! Instruction catalog
//!
//! Immutable templates for every 65C02 operation the synthesizer may emit.
//! Each template carries its encoded bytes, base cycle cost and whether its
//! operand addresses a network interface register (and therefore needs the
//! slot relocation applied before emission).
//!
//! Branch-then-jump pairs (`BPL +3 / JMP addr`) are single templates costed
//! as the taken branch: the jump only executes on the path that leaves the
//! image, where timing no longer matters.

use std::fmt;

use crate::layout::{hi, lo};

/// Addressing mode, used for listings only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    Absolute,
    AbsoluteY,
    ZeroPageIndirect,
    ZeroPageIndirectY,
    Relative,
    /// Conditional branch over an absolute jump
    SkipJump,
}

/// One catalog instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MicroOp {
    mnemonic: &'static str,
    mode: Mode,
    bytes: [u8; 5],
    size: u8,
    cycles: u8,
    net: bool,
}

impl MicroOp {
    const fn new(
        mnemonic: &'static str,
        mode: Mode,
        bytes: [u8; 5],
        size: u8,
        cycles: u8,
        net: bool,
    ) -> Self {
        Self {
            mnemonic,
            mode,
            bytes,
            size,
            cycles,
            net,
        }
    }

    const fn implied(mnemonic: &'static str, opcode: u8, cycles: u8) -> Self {
        Self::new(mnemonic, Mode::Implied, [opcode, 0, 0, 0, 0], 1, cycles, false)
    }

    const fn immediate(mnemonic: &'static str, opcode: u8, value: u8) -> Self {
        Self::new(mnemonic, Mode::Immediate, [opcode, value, 0, 0, 0], 2, 2, false)
    }

    const fn zero_page(mnemonic: &'static str, mode: Mode, opcode: u8, zp: u8, cycles: u8) -> Self {
        Self::new(mnemonic, mode, [opcode, zp, 0, 0, 0], 2, cycles, false)
    }

    const fn absolute(
        mnemonic: &'static str,
        mode: Mode,
        opcode: u8,
        addr: u16,
        cycles: u8,
        net: bool,
    ) -> Self {
        Self::new(mnemonic, mode, [opcode, lo(addr), hi(addr), 0, 0], 3, cycles, net)
    }

    const fn skip_jump(mnemonic: &'static str, opcode: u8, addr: u16) -> Self {
        Self::new(
            mnemonic,
            Mode::SkipJump,
            [opcode, 0x03, 0x4C, lo(addr), hi(addr)],
            5,
            3,
            false,
        )
    }

    /// Encoded bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes[..self.size as usize]
    }

    /// First encoded byte
    pub const fn opcode(&self) -> u8 {
        self.bytes[0]
    }

    /// Encoded length in bytes
    pub const fn size(&self) -> u8 {
        self.size
    }

    /// Base cycle cost
    pub const fn cycles(&self) -> u8 {
        self.cycles
    }

    /// Whether the operand addresses a network interface register
    pub const fn is_net(&self) -> bool {
        self.net
    }

    pub const fn mnemonic(&self) -> &'static str {
        self.mnemonic
    }

    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Copy with the interface slot offset applied to network operands.
    ///
    /// Non-network operations are returned unchanged.
    pub const fn relocated(self, slot_offset: u8) -> Self {
        if !self.net {
            return self;
        }
        let mut op = self;
        op.bytes[1] |= slot_offset;
        op
    }

    fn word(&self, at: usize) -> u16 {
        u16::from_le_bytes([self.bytes[at], self.bytes[at + 1]])
    }
}

impl fmt::Display for MicroOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.mnemonic;
        match self.mode {
            Mode::Implied => write!(f, "{m}"),
            Mode::Accumulator => write!(f, "{m} A"),
            Mode::Immediate => write!(f, "{m} #${:02X}", self.bytes[1]),
            Mode::ZeroPage => write!(f, "{m} ${:02X}", self.bytes[1]),
            Mode::Absolute => write!(f, "{m} ${:04X}", self.word(1)),
            Mode::AbsoluteY => write!(f, "{m} ${:04X},Y", self.word(1)),
            Mode::ZeroPageIndirect => write!(f, "{m} (${:02X})", self.bytes[1]),
            Mode::ZeroPageIndirectY => write!(f, "{m} (${:02X}),Y", self.bytes[1]),
            Mode::Relative => write!(f, "{m} {:+}", self.bytes[1] as i8),
            Mode::SkipJump => write!(f, "{m} +3 : JMP ${:04X}", self.word(3)),
        }
    }
}

// =============================================================================
// Implied
// =============================================================================

pub const NOP: MicroOp = MicroOp::implied("NOP", 0xEA, 2);
pub const TAY: MicroOp = MicroOp::implied("TAY", 0xA8, 2);
pub const INY: MicroOp = MicroOp::implied("INY", 0xC8, 2);
pub const PLA: MicroOp = MicroOp::implied("PLA", 0x68, 4);
pub const PLX: MicroOp = MicroOp::implied("PLX", 0xFA, 4);
pub const INC_A: MicroOp = MicroOp::new("INC", Mode::Accumulator, [0x1A, 0, 0, 0, 0], 1, 2, false);

// =============================================================================
// Flow control
// =============================================================================

/// `BRA disp` (always taken)
pub const fn bra(disp: i8) -> MicroOp {
    MicroOp::new("BRA", Mode::Relative, [0x80, disp as u8, 0, 0, 0], 2, 3, false)
}

/// `JMP addr`
pub const fn jmp(addr: u16) -> MicroOp {
    MicroOp::absolute("JMP", Mode::Absolute, 0x4C, addr, 3, false)
}

/// `BNE +3 / JMP addr`, costed as taken
pub const fn bne_jmp(addr: u16) -> MicroOp {
    MicroOp::skip_jump("BNE", 0xD0, addr)
}

/// `BPL +3 / JMP addr`, costed as taken
pub const fn bpl_jmp(addr: u16) -> MicroOp {
    MicroOp::skip_jump("BPL", 0x10, addr)
}

// =============================================================================
// Immediate
// =============================================================================

pub const fn and_imm(value: u8) -> MicroOp {
    MicroOp::immediate("AND", 0x29, value)
}

pub const fn ora_imm(value: u8) -> MicroOp {
    MicroOp::immediate("ORA", 0x09, value)
}

pub const fn lda_imm(value: u8) -> MicroOp {
    MicroOp::immediate("LDA", 0xA9, value)
}

pub const fn ldy_imm(value: u8) -> MicroOp {
    MicroOp::immediate("LDY", 0xA0, value)
}

// =============================================================================
// Zero page
// =============================================================================

pub const fn sta_zp(zp: u8) -> MicroOp {
    MicroOp::zero_page("STA", Mode::ZeroPage, 0x85, zp, 3)
}

/// `LDA (zp)`
pub const fn lda_ind(zp: u8) -> MicroOp {
    MicroOp::zero_page("LDA", Mode::ZeroPageIndirect, 0xB2, zp, 5)
}

/// `LDA (zp),Y`
pub const fn lda_ind_y(zp: u8) -> MicroOp {
    MicroOp::zero_page("LDA", Mode::ZeroPageIndirectY, 0xB1, zp, 5)
}

/// `STA (zp)`
pub const fn sta_ind(zp: u8) -> MicroOp {
    MicroOp::zero_page("STA", Mode::ZeroPageIndirect, 0x92, zp, 5)
}

// =============================================================================
// Absolute
// =============================================================================

pub const fn lda_abs(addr: u16) -> MicroOp {
    MicroOp::absolute("LDA", Mode::Absolute, 0xAD, addr, 4, false)
}

pub const fn sta_abs(addr: u16) -> MicroOp {
    MicroOp::absolute("STA", Mode::Absolute, 0x8D, addr, 4, false)
}

pub const fn stx_abs(addr: u16) -> MicroOp {
    MicroOp::absolute("STX", Mode::Absolute, 0x8E, addr, 4, false)
}

/// `LDA` from a network interface register
pub const fn lda_net(addr: u16) -> MicroOp {
    MicroOp::absolute("LDA", Mode::Absolute, 0xAD, addr, 4, true)
}

/// `LDY` from a network interface register
pub const fn ldy_net(addr: u16) -> MicroOp {
    MicroOp::absolute("LDY", Mode::Absolute, 0xAC, addr, 4, true)
}

/// `STA` to a network interface register
pub const fn sta_net(addr: u16) -> MicroOp {
    MicroOp::absolute("STA", Mode::Absolute, 0x8D, addr, 4, true)
}

/// `STY` to a network interface register
pub const fn sty_net(addr: u16) -> MicroOp {
    MicroOp::absolute("STY", Mode::Absolute, 0x8C, addr, 4, true)
}

pub const fn lda_abs_y(addr: u16) -> MicroOp {
    MicroOp::absolute("LDA", Mode::AbsoluteY, 0xB9, addr, 4, false)
}

pub const fn sta_abs_y(addr: u16) -> MicroOp {
    MicroOp::absolute("STA", Mode::AbsoluteY, 0x99, addr, 5, false)
}
