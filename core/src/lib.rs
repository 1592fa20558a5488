//! Pulse Core - Emulated host for the PWM streaming player
//!
//! This crate runs generated player images on an emulated 65C02 host and
//! drives them the way the real host program does.
//!
//! # Architecture
//!
//! - [`Machine`] - Processor, memory contexts, soft switches and the W5100
//! - [`ContextSwitch`] - Hands the processor to the image and back
//! - [`play`] - Dispatch loop alternating between host work and bursts
//! - [`StreamSession`] - Header check and cover art ahead of playback

pub mod config;
pub mod context;
pub mod cpu;
pub mod error;
#[cfg(test)]
mod integration;
pub mod machine;
pub mod memory;
pub mod net;
pub mod player;
pub mod ring;
pub mod session;
#[cfg(test)]
pub mod test_utils;

pub use config::Config;
pub use context::{ContextSwitch, SaveArea};
pub use cpu::{Bus, Cpu, Status};
pub use error::{ConfigError, ContextError, CpuError, StreamError};
pub use machine::{Display, Keyboard, Machine, MachineConfig, SystemBus};
pub use memory::Memory;
pub use net::{Connection, W5100};
pub use player::{
    ESC, Leave, LeaveCause, PlaybackHost, PlaybackReport, PlaybackSettings, PlaybackState,
    Transition, play, transition,
};
pub use ring::RingBuffer;
pub use session::{STREAM_HEADER, StreamSession};
