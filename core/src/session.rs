//! Stream session: header check, cover art, then playback

use pulse_gen::MemContext;
use tracing::{info, warn};

use crate::error::StreamError;
use crate::player::{PlaybackHost, PlaybackReport, PlaybackSettings, load, play, receive_exact};

/// First two bytes of every supported stream
pub const STREAM_HEADER: [u8; 2] = [0xA2, 0x01];

/// Double hires page loaded before playback
pub const COVER_ART: u16 = 0x2000;

/// Cover art is transferred in chunks of this many bytes
pub const COVER_CHUNK: usize = 0x800;

/// Cover art chunks per memory context
pub const COVER_CHUNKS: usize = 2;

/// One connection's worth of streaming
#[derive(Debug, Clone, Default)]
pub struct StreamSession {
    settings: PlaybackSettings,
}

impl StreamSession {
    pub fn new(settings: PlaybackSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }

    /// Check the header, show the cover art and play the rest of the stream.
    ///
    /// The connection is closed on every failure.
    pub fn run<H: PlaybackHost + ?Sized>(&self, host: &mut H) -> Result<PlaybackReport, StreamError> {
        if let Err(err) = self.prepare(host) {
            warn!(%err, "stream rejected");
            host.disconnect();
            return Err(err);
        }
        info!("cover art loaded, starting playback");
        play(host, &self.settings)
    }

    fn prepare<H: PlaybackHost + ?Sized>(&self, host: &mut H) -> Result<(), StreamError> {
        let mut header = [0; 2];
        receive_exact(host, &mut header)?;
        if header != STREAM_HEADER {
            return Err(StreamError::MalformedStream { header });
        }

        for ctx in [MemContext::Aux, MemContext::Main] {
            for chunk in 0..COVER_CHUNKS {
                let dest = COVER_ART + (chunk * COVER_CHUNK) as u16;
                load(host, dest, COVER_CHUNK, ctx)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ScriptedHost, Step};
    use pulse_gen::layout::{VISUAL_BYTES, VISUAL_PAGES};

    const COVER: usize = 2 * COVER_CHUNKS * COVER_CHUNK;

    fn stream(header: [u8; 2]) -> Vec<u8> {
        let mut bytes = header.to_vec();
        bytes.extend((0..COVER).map(|i| (i / COVER_CHUNK) as u8 + 1));
        bytes.extend(std::iter::repeat_n(0x52, VISUAL_PAGES * VISUAL_BYTES));
        bytes
    }

    #[test]
    fn test_rejects_unknown_header() {
        let mut host = ScriptedHost::with_stream(&stream([0xA2, 0x02]), vec![Step::idle(0)]);

        let err = StreamSession::default().run(&mut host).unwrap_err();

        assert!(matches!(err, StreamError::MalformedStream { header: [0xA2, 0x02] }));
        assert!(host.disconnected);
        assert!(host.stores.is_empty());
    }

    #[test]
    fn test_cover_art_order() {
        let mut host = ScriptedHost::with_stream(&stream(STREAM_HEADER), vec![]);

        StreamSession::default().run(&mut host).unwrap();

        let cover: Vec<_> = host.stores.iter().take(4).copied().collect();
        assert_eq!(
            cover,
            vec![
                (0x2000, COVER_CHUNK, MemContext::Aux),
                (0x2800, COVER_CHUNK, MemContext::Aux),
                (0x2000, COVER_CHUNK, MemContext::Main),
                (0x2800, COVER_CHUNK, MemContext::Main),
            ]
        );
        assert_eq!(host.memory.peek(MemContext::Aux, 0x2000), 1);
        assert_eq!(host.memory.peek(MemContext::Aux, 0x2800), 2);
        assert_eq!(host.memory.peek(MemContext::Main, 0x2000), 3);
        assert_eq!(host.memory.peek(MemContext::Main, 0x2FFF), 4);
        assert_eq!(host.memory.peek(MemContext::Aux, 0x10D8), 0x52);
    }

    #[test]
    fn test_truncated_cover_loses_connection() {
        let mut bytes = stream(STREAM_HEADER);
        bytes.truncate(2 + COVER_CHUNK + 10);
        let mut host = ScriptedHost::with_stream(&bytes, vec![]);

        let err = StreamSession::default().run(&mut host).unwrap_err();

        assert!(matches!(err, StreamError::ConnectionLost));
        assert!(host.disconnected);
    }
}
