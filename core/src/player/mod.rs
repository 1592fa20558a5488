//! Playback dispatch loop
//!
//! Host side of playback: preload the visualization slots, pin the host to
//! its baseline clock, then alternate between polling the operator and the
//! socket and handing the processor to the image for one burst. A burst
//! only returns through the image's leave routine, either because a key was
//! pressed or because less than a page was left to read.

mod state;

pub use state::{ESC, PlaybackState, Transition, transition};

use pulse_gen::MemContext;
use pulse_gen::layout::{VISUAL_BUF, VISUAL_BYTES, VISUAL_HIGH_SHIFT, VISUAL_LOW_LAST, VISUAL_PAGES};
use tracing::{debug, info, warn};

use crate::error::{ContextError, StreamError};

/// Bit 7 of the IIgs speed register selects the fast clock
pub const SPEED_FAST: u8 = 0x80;

/// Default minimum of buffered bytes before a burst may start
pub const DEFAULT_THRESHOLD: usize = 0x100;

/// Why a burst returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveCause {
    /// The keyboard check found a key
    Operator,
    /// Less than one page was left in the receive memory
    Starved,
}

/// Result of one burst
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leave {
    pub cause: LeaveCause,
    /// Cycles spent inside the image
    pub cycles: u64,
}

/// Capabilities the dispatch loop needs from the host
pub trait PlaybackHost {
    fn connected(&self) -> bool;

    /// Bytes received and not yet consumed
    fn buffered(&self) -> usize;

    fn disconnect(&mut self);

    /// Consume up to `buf.len()` buffered bytes
    fn receive(&mut self, buf: &mut [u8]) -> usize;

    /// Write bytes into memory through `ctx`
    fn store(&mut self, dest: u16, bytes: &[u8], ctx: MemContext);

    /// Take the pending key press, if any
    fn key(&mut self) -> Option<u8>;

    /// Take a pending escape key press
    fn abort_requested(&mut self) -> bool;

    /// Speed register, on hosts that have one
    fn speed(&self) -> Option<u8>;

    fn set_speed(&mut self, value: u8);

    /// Mixed mode with a status line, or full graphics while playing
    fn show(&mut self, status: Option<PlaybackState>);

    /// Let host time pass without playing
    fn idle(&mut self);

    /// Run the image until it leaves
    fn burst(&mut self) -> Result<Leave, ContextError>;
}

/// Dispatch loop parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSettings {
    pub threshold: usize,
    /// The image reads the mock buffer; no backpressure or connection checks
    pub mock: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            mock: false,
        }
    }
}

/// What happened during a completed playback
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    /// State after each dispatch iteration
    pub states: Vec<PlaybackState>,
    pub bursts: u32,
    pub starved: u32,
    pub operator: u32,
    pub idles: u32,
    pub burst_cycles: u64,
}

/// Fill `buf` from the connection, waiting for enough data to arrive.
pub fn receive_exact<H: PlaybackHost + ?Sized>(
    host: &mut H,
    buf: &mut [u8],
) -> Result<(), StreamError> {
    while host.buffered() < buf.len() {
        if !host.connected() {
            return Err(StreamError::ConnectionLost);
        }
        if host.abort_requested() {
            return Err(StreamError::OperatorAbort);
        }
        host.idle();
    }
    host.receive(buf);
    Ok(())
}

/// Load `len` bytes from the connection to `dest` in `ctx`.
pub fn load<H: PlaybackHost + ?Sized>(
    host: &mut H,
    dest: u16,
    len: usize,
    ctx: MemContext,
) -> Result<(), StreamError> {
    let mut buf = vec![0; len];
    receive_exact(host, &mut buf)?;
    host.store(dest, &buf, ctx);
    Ok(())
}

/// Address of visualization slot `index`
pub fn visual_slot(index: usize) -> u16 {
    if index <= VISUAL_LOW_LAST {
        VISUAL_BUF + (index as u16) * 0x100
    } else {
        VISUAL_BUF + VISUAL_HIGH_SHIFT + (index - VISUAL_LOW_LAST - 1) as u16 * 0x100
    }
}

/// Load every visualization slot into the alternate context.
pub fn preload_visuals<H: PlaybackHost + ?Sized>(host: &mut H) -> Result<(), StreamError> {
    for index in 0..VISUAL_PAGES {
        load(host, visual_slot(index), VISUAL_BYTES, MemContext::Aux)?;
    }
    debug!(slots = VISUAL_PAGES, "visualization preloaded");
    Ok(())
}

/// Run playback until the connection ends or the operator aborts.
///
/// The speed register is restored on every exit path. Any error leaves the
/// connection closed.
pub fn play<H: PlaybackHost + ?Sized>(
    host: &mut H,
    settings: &PlaybackSettings,
) -> Result<PlaybackReport, StreamError> {
    if let Err(err) = preload_visuals(host) {
        warn!(%err, "visualization preload failed");
        host.disconnect();
        return Err(err);
    }

    if settings.mock {
        // The mock pattern reads slot 0's page selector; show page 1
        host.store(VISUAL_BUF, &[0], MemContext::Aux);
    }

    let saved_speed = host.speed();
    if let Some(speed) = saved_speed {
        host.set_speed(speed & !SPEED_FAST);
    }

    let result = dispatch(host, settings);

    if let Some(speed) = saved_speed {
        host.set_speed(speed);
    }

    match &result {
        Ok(report) => info!(
            bursts = report.bursts,
            starved = report.starved,
            idles = report.idles,
            "playback finished"
        ),
        Err(err) => {
            warn!(%err, "playback ended");
            host.disconnect();
        }
    }
    result
}

fn dispatch<H: PlaybackHost + ?Sized>(
    host: &mut H,
    settings: &PlaybackSettings,
) -> Result<PlaybackReport, StreamError> {
    let mut state = PlaybackState::Playing;
    let mut report = PlaybackReport::default();

    while settings.mock || host.connected() {
        let key = host.key();
        let buffered = if settings.mock {
            None
        } else {
            Some(host.buffered())
        };

        state = match transition(state, key, buffered, settings.threshold) {
            Transition::Abort => return Err(StreamError::OperatorAbort),
            Transition::Next(next) => next,
        };
        report.states.push(state);

        if state == PlaybackState::Playing {
            host.show(None);
            let leave = host.burst()?;
            report.bursts += 1;
            report.burst_cycles += leave.cycles;
            match leave.cause {
                LeaveCause::Operator => report.operator += 1,
                LeaveCause::Starved => report.starved += 1,
            }
        } else {
            host.show(Some(state));
            host.idle();
            report.idles += 1;
        }
    }

    Ok(report)
}
