//! Patch sites
//!
//! Synthesis leaves placeholder bytes wherever a value depends on where the
//! routine ends up in memory. Linking writes those values, and only those,
//! through the recorded sites.

/// What a patch site holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchKind {
    /// Operand of the sample store; receives the absolute address of the
    /// routine's own jump page byte (little endian)
    SampleStore,
    /// High byte of the terminal jump; selects the next routine's page
    JumpPage,
}

/// A recorded placeholder inside a generated routine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatchSite {
    pub kind: PatchKind,
    /// Byte offset from the routine origin
    pub offset: usize,
}

impl PatchSite {
    pub const fn new(kind: PatchKind, offset: usize) -> Self {
        Self { kind, offset }
    }

    /// Write `target` into the site.
    ///
    /// A jump page site only holds the high byte; its low byte was fixed
    /// during synthesis and sits right in front of it.
    pub fn apply(&self, bytes: &mut [u8], target: u16) {
        let [low, high] = target.to_le_bytes();
        match self.kind {
            PatchKind::SampleStore => {
                bytes[self.offset] = low;
                bytes[self.offset + 1] = high;
            }
            PatchKind::JumpPage => bytes[self.offset] = high,
        }
    }

    /// Read back the address the site currently designates.
    pub fn decode(&self, bytes: &[u8]) -> u16 {
        match self.kind {
            PatchKind::SampleStore => u16::from_le_bytes([bytes[self.offset], bytes[self.offset + 1]]),
            PatchKind::JumpPage => u16::from_le_bytes([bytes[self.offset - 1], bytes[self.offset]]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_store_roundtrip() {
        let mut bytes = [0x8E, 0x00, 0x00, 0xEA];
        let site = PatchSite::new(PatchKind::SampleStore, 1);

        site.apply(&mut bytes, 0x522A);

        assert_eq!(bytes, [0x8E, 0x2A, 0x52, 0xEA]);
        assert_eq!(site.decode(&bytes), 0x522A);
    }

    #[test]
    fn test_jump_page_keeps_low_byte() {
        let mut bytes = [0x4C, 0x81, 0x00];
        let site = PatchSite::new(PatchKind::JumpPage, 2);

        site.apply(&mut bytes, 0x5281);

        assert_eq!(bytes, [0x4C, 0x81, 0x52]);
        assert_eq!(site.decode(&bytes), 0x5281);
    }
}
