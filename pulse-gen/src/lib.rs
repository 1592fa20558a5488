//! Cycle-exact pulse generator synthesis
//!
//! Builds the resident player image of the streaming audio player: a matrix
//! of small 65C02 routines, each exactly 46 cycles long, that toggle the
//! output at a duty-dependent position while running one step of the
//! receive or visualization loop. Wire bytes are written straight into the
//! routines' jump targets, so each byte selects both the next pulse width
//! and which of the two task loops continues.
//!
//! - [`catalog`]: instruction templates
//! - [`flow`]: task routines and their fixed successors
//! - [`synth`]: the scheduler
//! - [`patch`]: link-time patch sites
//! - [`image`]: the full matrix and its installation
//! - [`trace`]: wire values and flow tracing

pub mod bus;
pub mod catalog;
pub mod error;
pub mod flow;
pub mod image;
pub mod layout;
pub mod patch;
pub mod synth;
pub mod trace;

pub use bus::{MemContext, MemoryBus};
pub use catalog::MicroOp;
pub use error::SynthError;
pub use flow::{FLOW, PageSet, TaskKind, TaskRoutine};
pub use image::{
    BuildProgress, ImageBuilder, ImageConfig, ImageSummary, OutputSink, PlayerImage, Routine,
};
pub use patch::{PatchKind, PatchSite};
pub use synth::{Placed, PulseGenerator, Role, Synthesizer};
pub use trace::{FlowTracer, SampleCode, Step};
