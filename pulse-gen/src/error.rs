//! Error types for pulse generator synthesis and image building

use thiserror::Error;

/// Failure to synthesize, link or configure the player image
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthError {
    #[error("Duty {0} is out of range (0..36)")]
    DutyOutOfRange(u8),

    #[error("Successor slot {0} is out of range (0..5)")]
    SlotOutOfRange(u8),

    #[error("Interface slot {0} is outside 1..=7")]
    InvalidInterfaceSlot(u8),

    #[error("Sample value {0} is outside the wire range (0..72)")]
    InvalidSample(u8),

    #[error("Duty {duty}: routine takes {cycles} cycles, expected {expected}")]
    CycleMismatch { duty: u8, cycles: u32, expected: u8 },

    #[error("Duty {duty}: body is {len} bytes, must stay below {max}")]
    BodyTooLong { duty: u8, len: usize, max: u8 },

    #[error("Duty {duty}: {left} payload operation(s) left unscheduled")]
    PayloadPending { duty: u8, left: usize },

    #[error("Duty {duty}: expected one pull and one store, found {pulls} and {stores}")]
    SampleOps { duty: u8, pulls: usize, stores: usize },

    #[error("Duty {duty}: routine does not end in its relocatable jump")]
    MissingJump { duty: u8 },

    #[error("Duty {duty}: closing toggle lands at cycle {actual}, expected {expected}")]
    DutyWidth { duty: u8, actual: u8, expected: u8 },
}
