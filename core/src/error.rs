//! Error types for the emulated host and the playback session

use pulse_gen::SynthError;
use thiserror::Error;

/// Failure inside the instruction interpreter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("Unsupported opcode ${opcode:02X} at ${pc:04X}")]
    Unsupported { opcode: u8, pc: u16 },
}

/// Failure of the context switch pair or of a playback burst
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("Context switch entered while the image is already running")]
    AlreadyEntered,

    #[error("Leave without a matching enter")]
    NotEntered,

    #[error("Burst did not reach the leave routine within {limit} cycles")]
    Runaway { limit: u64 },

    #[error("Image crashed: {0}")]
    Cpu(#[from] CpuError),
}

/// Externally visible failures of a stream session
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Connection lost")]
    ConnectionLost,

    #[error("Unknown stream type {:02X} {:02X}", .header[0], .header[1])]
    MalformedStream { header: [u8; 2] },

    #[error("Aborted by operator")]
    OperatorAbort,

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("Failed to build player image: {0}")]
    Image(#[from] SynthError),
}

/// Configuration loading and validation failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Interface slot {0} is outside 1..=7")]
    InvalidSlot(u8),

    #[error("Buffer threshold {0} exceeds the receive ring")]
    InvalidThreshold(usize),
}
