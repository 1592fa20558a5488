//! Playback state machine
//!
//! Pure transition table evaluated once per dispatch iteration.

use serde::Serialize;

/// Escape key code
pub const ESC: u8 = 0x1B;

/// Host-side playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Playing,
    Pausing,
    Waiting,
}

impl PlaybackState {
    /// Four letter status shown while not playing
    pub const fn label(self) -> &'static str {
        match self {
            PlaybackState::Playing => "Play",
            PlaybackState::Pausing => "Paus",
            PlaybackState::Waiting => "Wait",
        }
    }
}

/// Outcome of one evaluation of the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Next(PlaybackState),
    /// Escape pressed: disconnect and return to the caller
    Abort,
}

/// Evaluate the transition table.
///
/// Any key other than escape flips between pausing and playing. Outside of
/// pausing the buffered byte count decides between playing and waiting;
/// `buffered` is `None` when there is no backpressure to check.
pub fn transition(
    state: PlaybackState,
    key: Option<u8>,
    buffered: Option<usize>,
    threshold: usize,
) -> Transition {
    let mut next = state;

    if let Some(key) = key {
        if key == ESC {
            return Transition::Abort;
        }
        next = if next == PlaybackState::Pausing {
            PlaybackState::Playing
        } else {
            PlaybackState::Pausing
        };
    }

    match buffered {
        Some(buffered) if next != PlaybackState::Pausing => {
            next = if buffered >= threshold {
                PlaybackState::Playing
            } else {
                PlaybackState::Waiting
            };
        }
        _ => {}
    }

    Transition::Next(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use PlaybackState::*;

    const T: usize = 256;

    #[test]
    fn test_backpressure() {
        assert_eq!(transition(Playing, None, Some(256), T), Transition::Next(Playing));
        assert_eq!(transition(Playing, None, Some(255), T), Transition::Next(Waiting));
        assert_eq!(transition(Waiting, None, Some(4096), T), Transition::Next(Playing));
    }

    #[test]
    fn test_key_toggles_pause() {
        assert_eq!(transition(Playing, Some(b' '), Some(4096), T), Transition::Next(Pausing));
        assert_eq!(transition(Pausing, Some(b'p'), Some(4096), T), Transition::Next(Playing));
        // Resuming into an empty buffer waits
        assert_eq!(transition(Pausing, Some(b'p'), Some(0), T), Transition::Next(Waiting));
        assert_eq!(transition(Waiting, Some(b'x'), Some(0), T), Transition::Next(Pausing));
    }

    #[test]
    fn test_pausing_ignores_buffer() {
        assert_eq!(transition(Pausing, None, Some(0), T), Transition::Next(Pausing));
        assert_eq!(transition(Pausing, None, Some(8192), T), Transition::Next(Pausing));
    }

    #[test]
    fn test_escape_aborts_from_any_state() {
        for state in [Playing, Pausing, Waiting] {
            assert_eq!(transition(state, Some(ESC), Some(8192), T), Transition::Abort);
        }
    }

    #[test]
    fn test_without_backpressure_only_keys_matter() {
        assert_eq!(transition(Playing, None, None, T), Transition::Next(Playing));
        assert_eq!(transition(Playing, Some(b' '), None, T), Transition::Next(Pausing));
        assert_eq!(transition(Pausing, None, None, T), Transition::Next(Pausing));
    }
}
