//! Fixed memory map and timing constants of the generated player
//!
//! All addresses refer to the 65C02 host. The generated image lives in the
//! alternate (auxiliary) memory context; zero page, the stack page and the
//! language card area are shared by both contexts.

// =============================================================================
// Timing
// =============================================================================

/// Number of distinct duty values (pulse widths) per page-set
pub const DUTY_COUNT: u8 = 36;

/// Cycles per pulse generator (22.05 kHz at the 1.0205 MHz baseline clock)
pub const CYCLE_BUDGET: u8 = 46;

/// Baseline host clock in Hz
pub const CLOCK_HZ: u32 = 1_020_484;

/// Duty whose toggle needs the one-cycle-longer instruction
pub const STRETCHED_DUTY: u8 = 1;

/// Duty whose toggle is borrowed from the successor's prologue
pub const BORROWED_DUTY: u8 = 34;

// =============================================================================
// Matrix geometry
// =============================================================================

/// Byte size of one generator slot (and the exclusive body length maximum)
pub const SLOT_SIZE: u8 = 43;

/// Byte size of the shared prologue placed in front of every generator
pub const PROLOGUE_LEN: u8 = 5;

/// Generator slots per memory page
pub const SLOTS_PER_PAGE: u8 = 5;

/// Number of page-sets
pub const PAGE_SET_COUNT: u8 = 2;

/// Byte skew between ring buffer reads and writes
pub const RW_SKEW: u8 = 4;

// =============================================================================
// Memory map
// =============================================================================

/// Zero page pointer to the active toggle register
pub const SPEAKER_PTR: u8 = 0xFA;

/// Zero page pointer to the current visualization slot
pub const VISUAL_PTR: u8 = 0xFC;

/// Stack page, repurposed as the sample ring buffer
pub const RING_BUF: u16 = 0x0100;

/// Stack save area (alternate context)
pub const SAVE_BUF: u16 = 0x1F00;

/// Base of the generated player image (alternate context)
pub const PLAY_BUF: u16 = 0x4000;

/// First visualization slot; its low byte must clear all five generator slots
pub const VISUAL_BUF: u16 = 0x10D8;

/// Number of visualization slots preloaded before playback
pub const VISUAL_PAGES: usize = 140;

/// Index of the last visualization slot below the hires pages
pub const VISUAL_LOW_LAST: usize = 13;

/// Bytes per visualization slot
pub const VISUAL_BYTES: usize = 39;

/// Distance between the low and high visualization regions
pub const VISUAL_HIGH_SHIFT: u16 = 0x3000;

/// Mock receive buffer used without a network interface (language card RAM)
pub const MOCK_BUF: u16 = 0xDF00;

/// Address of the leave routine; reaching it ends a playback burst
pub const LEAVE: u16 = 0xD400;

/// Double hires scanlines 186-191, plotted by the visualization tasks
pub const HIRES_SCANLINES: [u16; 6] = [0x2BD0, 0x2FD0, 0x33D0, 0x37D0, 0x3BD0, 0x3FD0];

// =============================================================================
// Soft switches
// =============================================================================

pub const KEYBOARD: u16 = 0xC000;
pub const KEYBOARD_STROBE: u16 = 0xC010;
pub const READ_MAIN: u16 = 0xC002;
pub const READ_AUX: u16 = 0xC003;
pub const WRITE_MAIN: u16 = 0xC004;
pub const WRITE_AUX: u16 = 0xC005;
pub const TAPE_OUT: u16 = 0xC020;
pub const SPEAKER: u16 = 0xC030;
pub const SPEED: u16 = 0xC036;
pub const MIXED_OFF: u16 = 0xC052;
pub const MIXED_ON: u16 = 0xC053;
pub const PAGE_1: u16 = 0xC054;
pub const PAGE_2: u16 = 0xC055;

// =============================================================================
// Network interface (W5100 indirect bus, slot 0 base)
// =============================================================================

/// Mode register
pub const NET_MODE: u16 = 0xC084;

/// Address register, high byte
pub const NET_ADDR_HI: u16 = 0xC085;

/// Address register, low byte
pub const NET_ADDR_LO: u16 = 0xC086;

/// Data register (auto-incrementing address)
pub const NET_DATA: u16 = 0xC087;

// =============================================================================
// Derived values
// =============================================================================

/// High byte of an address
pub const fn hi(addr: u16) -> u8 {
    (addr >> 8) as u8
}

/// Low byte of an address
pub const fn lo(addr: u16) -> u8 {
    addr as u8
}

/// Memory page holding the generators of `set` for `duty`
pub const fn page_of(set: u8, duty: u8) -> u8 {
    hi(PLAY_BUF) + set * DUTY_COUNT + duty
}

/// Offset of a generator slot within its page
pub const fn slot_offset(slot: u8) -> u8 {
    slot * SLOT_SIZE
}

/// Offset of a generator's regular entry point (behind the shared prologue)
pub const fn entry_offset(slot: u8) -> u8 {
    slot_offset(slot) + PROLOGUE_LEN
}

/// Absolute origin of a generator slot
pub const fn slot_origin(set: u8, duty: u8, slot: u8) -> u16 {
    ((page_of(set, duty) as u16) << 8) | slot_offset(slot) as u16
}

/// Entry point used when the player starts: slot 0, set 0, mid-scale duty
pub const SILENCE: u16 = slot_origin(0, DUTY_COUNT / 2, 0);

/// Silence page of a page-set
pub const fn silence_page(set: u8) -> u8 {
    page_of(set, DUTY_COUNT / 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_entry() {
        assert_eq!(SILENCE, 0x5200);
        assert_eq!(silence_page(0), 0x52);
        assert_eq!(silence_page(1), 0x52 + 36);
    }

    #[test]
    fn test_visual_slots_clear_generators() {
        assert!(lo(VISUAL_BUF) as u16 >= SLOTS_PER_PAGE as u16 * SLOT_SIZE as u16);
    }

    #[test]
    fn test_image_fits_below_io() {
        let last = slot_origin(PAGE_SET_COUNT - 1, DUTY_COUNT - 1, SLOTS_PER_PAGE - 1);
        assert!(last + (SLOT_SIZE as u16) < 0xC000);
        assert_eq!(page_of(1, 35), 0x87);
    }

    #[test]
    fn test_entry_offsets() {
        assert_eq!(entry_offset(0), 5);
        assert_eq!(entry_offset(4), 4 * 43 + 5);
        assert_eq!(slot_origin(1, 2, 3), 0x4000 + 38 * 0x100 + 3 * 43);
    }
}
