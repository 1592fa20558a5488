//! Player image builder
//!
//! Runs the synthesizer over every (page-set, slot, duty) triple, links each
//! routine at its fixed origin and installs the result into the alternate
//! memory context.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bus::{MemoryBus, write_alternate, write_word};
use crate::error::SynthError;
use crate::flow::{PageSet, TaskKind};
use crate::layout::{
    DUTY_COUNT, MOCK_BUF, PAGE_SET_COUNT, PLAY_BUF, PROLOGUE_LEN, SILENCE, SLOTS_PER_PAGE, SPEAKER,
    SPEAKER_PTR, TAPE_OUT, VISUAL_BUF, VISUAL_PTR, hi, silence_page, slot_origin,
};
use crate::synth::{PulseGenerator, Role, Synthesizer};

/// Analog output the toggles drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputSink {
    #[default]
    Speaker,
    TapeOut,
}

impl OutputSink {
    /// Soft switch toggled by this sink
    pub const fn register(self) -> u16 {
        match self {
            OutputSink::Speaker => SPEAKER,
            OutputSink::TapeOut => TAPE_OUT,
        }
    }
}

/// Offset of the mock pattern's visualization run
const MOCK_VISUAL_RUN: usize = 0xAB;
const MOCK_VISUAL_LEN: usize = 0x50;
/// Mock byte read back as the visualization page
const MOCK_VISUAL_PAGE: usize = 0xAF;

/// Build-time parameters of a player image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageConfig {
    /// Expansion slot of the network interface (1..=7)
    pub slot: u8,
    /// Read from the mock receive buffer instead of the interface
    pub mock: bool,
    pub sink: OutputSink,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            slot: 3,
            mock: false,
            sink: OutputSink::Speaker,
        }
    }
}

impl ImageConfig {
    pub fn validate(&self) -> Result<(), SynthError> {
        if !(1..=7).contains(&self.slot) {
            return Err(SynthError::InvalidInterfaceSlot(self.slot));
        }
        Ok(())
    }

    /// Offset OR-ed into network register addresses
    pub const fn slot_offset(&self) -> u8 {
        self.slot << 4
    }
}

/// Progress report emitted once per task routine
#[derive(Debug, Clone, Copy)]
pub struct BuildProgress {
    pub set: PageSet,
    pub slot: u8,
    pub task: TaskKind,
    pub done: usize,
    pub total: usize,
}

/// A linked routine at its place in the matrix
#[derive(Debug, Clone)]
pub struct Routine {
    pub set: PageSet,
    pub slot: u8,
    pub duty: u8,
    pub task: TaskKind,
    pub origin: u16,
    pub pulse: PulseGenerator,
}

impl Routine {
    /// Address execution enters at from a regular predecessor
    pub fn entry(&self) -> u16 {
        self.origin + PROLOGUE_LEN as u16
    }
}

/// Builds complete player images
pub struct ImageBuilder {
    config: ImageConfig,
}

impl ImageBuilder {
    pub fn new(config: ImageConfig) -> Self {
        Self { config }
    }

    pub fn build(&self) -> Result<PlayerImage, SynthError> {
        self.build_with(|_| {})
    }

    /// Build, reporting after each task routine's 36 variants are done.
    pub fn build_with<F>(&self, mut progress: F) -> Result<PlayerImage, SynthError>
    where
        F: FnMut(BuildProgress),
    {
        self.config.validate()?;

        let synth = Synthesizer::new(self.config.sink);
        let offset = self.config.slot_offset();
        let total = (PAGE_SET_COUNT * SLOTS_PER_PAGE) as usize;
        let mut routines = Vec::with_capacity(total * DUTY_COUNT as usize);

        for set in PageSet::ALL {
            for (slot, task) in (0u8..).zip(set.routines()) {
                let payload: Vec<_> = task
                    .kind
                    .payload(self.config.mock)
                    .into_iter()
                    .map(|op| op.relocated(offset))
                    .collect();

                for duty in 0..DUTY_COUNT {
                    let mut pulse = synth.pulse(&payload, duty, task.next)?;
                    let origin = slot_origin(set.index(), duty, slot);
                    pulse.link(origin, silence_page(set.index()));
                    routines.push(Routine {
                        set,
                        slot,
                        duty,
                        task: task.kind,
                        origin,
                        pulse,
                    });
                }

                debug!(?set, slot, task = task.kind.name(), "generated task routine");
                progress(BuildProgress {
                    set,
                    slot,
                    task: task.kind,
                    done: routines.len() / DUTY_COUNT as usize,
                    total,
                });
            }
        }

        let image = PlayerImage {
            config: self.config,
            routines,
        };
        let summary = image.summary();
        info!(
            routines = summary.routines,
            longest = summary.longest_body,
            slot = self.config.slot,
            mock = self.config.mock,
            "player image built"
        );
        Ok(image)
    }
}

/// Summary of a built image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageSummary {
    pub routines: usize,
    pub bytes: usize,
    pub longest_body: usize,
    pub stretched: usize,
    pub borrowed: usize,
    pub cycle_exact: bool,
    pub slot: u8,
    pub mock: bool,
    pub sink: OutputSink,
}

/// The resident player: every routine of the matrix, linked
#[derive(Debug, Clone)]
pub struct PlayerImage {
    config: ImageConfig,
    routines: Vec<Routine>,
}

impl PlayerImage {
    pub fn config(&self) -> ImageConfig {
        self.config
    }

    pub fn routines(&self) -> &[Routine] {
        &self.routines
    }

    pub fn routine(&self, set: PageSet, slot: u8, duty: u8) -> Option<&Routine> {
        if slot >= SLOTS_PER_PAGE || duty >= DUTY_COUNT {
            return None;
        }
        let index = (set.index() as usize * SLOTS_PER_PAGE as usize + slot as usize)
            * DUTY_COUNT as usize
            + duty as usize;
        self.routines.get(index)
    }

    /// Address playback starts at (silence)
    pub fn entry_point(&self) -> u16 {
        SILENCE
    }

    /// Every routine as (origin, bytes)
    pub fn segments(&self) -> impl Iterator<Item = (u16, &[u8])> + '_ {
        self.routines.iter().map(|r| (r.origin, r.pulse.bytes()))
    }

    pub fn summary(&self) -> ImageSummary {
        let has = |r: &Routine, role| r.pulse.placed().iter().any(|p| p.role == role);
        ImageSummary {
            routines: self.routines.len(),
            bytes: self.routines.iter().map(|r| r.pulse.bytes().len()).sum(),
            longest_body: self
                .routines
                .iter()
                .map(|r| r.pulse.body_len())
                .max()
                .unwrap_or(0),
            stretched: self
                .routines
                .iter()
                .filter(|r| has(r, Role::StretchedDutyEnd))
                .count(),
            borrowed: self.routines.iter().filter(|r| r.pulse.is_borrowed()).count(),
            cycle_exact: self.routines.iter().all(|r| r.pulse.verify().is_ok()),
            slot: self.config.slot,
            mock: self.config.mock,
            sink: self.config.sink,
        }
    }

    /// Flat memory dump of the image pages, starting at the image base.
    pub fn to_bytes(&self) -> Vec<u8> {
        let pages = (PAGE_SET_COUNT * DUTY_COUNT) as usize;
        let mut out = vec![0u8; pages * 0x100];
        for (origin, bytes) in self.segments() {
            let start = (origin - PLAY_BUF) as usize;
            out[start..start + bytes.len()].copy_from_slice(bytes);
        }
        out
    }

    /// Write the image into host memory.
    ///
    /// Routine bytes go to the alternate context one bracketed write at a
    /// time. The zero page pointers and, in mock mode, the mock receive
    /// pattern are written with the main context selected.
    pub fn install<B: MemoryBus + ?Sized>(&self, bus: &mut B) {
        for (origin, bytes) in self.segments() {
            for (addr, &byte) in (origin..).zip(bytes) {
                write_alternate(bus, addr, byte);
            }
        }

        write_word(bus, SPEAKER_PTR as u16, self.config.sink.register());
        write_word(bus, VISUAL_PTR as u16, VISUAL_BUF);

        if self.config.mock {
            for (addr, value) in mock_pattern() {
                bus.write_byte(addr, value);
            }
        }

        debug!(
            routines = self.routines.len(),
            entry = SILENCE,
            "player image installed"
        );
    }
}

/// Silence pattern seeded into the mock receive buffer
pub fn mock_pattern() -> impl Iterator<Item = (u16, u8)> {
    (0..0x100usize).map(|i| {
        let value = if i == MOCK_VISUAL_PAGE {
            hi(VISUAL_BUF)
        } else if (MOCK_VISUAL_RUN..MOCK_VISUAL_RUN + MOCK_VISUAL_LEN).contains(&i) {
            silence_page(1)
        } else {
            silence_page(0)
        };
        (MOCK_BUF + i as u16, value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemContext;
    use crate::bus::tests::{BusEvent, RecordingBus};
    use crate::layout::SLOT_SIZE;
    use crate::patch::PatchKind;

    fn build(config: ImageConfig) -> PlayerImage {
        ImageBuilder::new(config).build().unwrap()
    }

    #[test]
    fn test_full_matrix() {
        let image = build(ImageConfig::default());
        let summary = image.summary();
        assert_eq!(summary.routines, 360);
        assert_eq!(summary.borrowed, 10);
        assert!(summary.cycle_exact);
        assert!(summary.longest_body < SLOT_SIZE as usize);
    }

    #[test]
    fn test_routine_lookup_matches_origin() {
        let image = build(ImageConfig::default());
        let r = image.routine(PageSet::Visualize, 3, 17).unwrap();
        assert_eq!(r.task, TaskKind::SeedVisualPointer);
        assert_eq!(r.origin, slot_origin(1, 17, 3));
        assert!(image.routine(PageSet::Receive, 5, 0).is_none());
        assert!(image.routine(PageSet::Receive, 0, 36).is_none());
    }

    #[test]
    fn test_routines_do_not_overlap() {
        let image = build(ImageConfig::default());
        for r in image.routines() {
            let end = (r.origin & 0xFF) as usize + r.pulse.bytes().len();
            assert!(end <= (r.slot as usize + 1) * SLOT_SIZE as usize);
        }
    }

    #[test]
    fn test_sample_store_targets_own_jump() {
        let image = build(ImageConfig::default());
        for r in image.routines() {
            let store = r
                .pulse
                .sites()
                .iter()
                .find(|s| s.kind == PatchKind::SampleStore)
                .unwrap();
            assert_eq!(
                store.decode(r.pulse.bytes()),
                r.origin + r.pulse.jump_page_offset() as u16
            );
            assert_eq!(r.pulse.jump_target() >> 8, silence_page(r.set.index()) as u16);
        }
    }

    #[test]
    fn test_slot_relocation() {
        let image = build(ImageConfig {
            slot: 5,
            ..ImageConfig::default()
        });
        let r = image.routine(PageSet::Receive, 0, 10).unwrap();
        let bytes = r.pulse.bytes();
        // STY $C086 relocated to slot 5
        assert!(bytes.windows(3).any(|w| w == [0x8C, 0xD6, 0xC0]));
        // Keyboard poll is not relocated
        assert!(bytes.windows(3).any(|w| w == [0xAD, 0x00, 0xC0]));
    }

    #[test]
    fn test_build_is_deterministic() {
        let config = ImageConfig::default();
        assert_eq!(build(config).to_bytes(), build(config).to_bytes());
    }

    #[test]
    fn test_invalid_slot() {
        for slot in [0, 8] {
            let err = ImageBuilder::new(ImageConfig {
                slot,
                ..ImageConfig::default()
            })
            .build()
            .unwrap_err();
            assert_eq!(err, SynthError::InvalidInterfaceSlot(slot));
        }
    }

    #[test]
    fn test_progress_reports_every_task() {
        let mut seen = Vec::new();
        ImageBuilder::new(ImageConfig::default())
            .build_with(|p| seen.push((p.set, p.slot, p.done, p.total)))
            .unwrap();
        assert_eq!(seen.len(), 10);
        assert_eq!(seen[0], (PageSet::Receive, 0, 1, 10));
        assert_eq!(seen[9], (PageSet::Visualize, 4, 10, 10));
    }

    #[test]
    fn test_install_brackets_every_image_byte() {
        let image = build(ImageConfig::default());
        let mut bus = RecordingBus::default();
        image.install(&mut bus);

        let image_bytes: usize = image.segments().map(|(_, b)| b.len()).sum();
        assert_eq!(bus.aux.len(), image_bytes);

        for (i, event) in bus.events.iter().enumerate() {
            if let BusEvent::Write(addr, _) = event {
                if *addr >= PLAY_BUF && *addr < 0xC000 {
                    assert_eq!(bus.events[i - 1], BusEvent::Select(MemContext::Aux));
                    assert_eq!(bus.events[i + 1], BusEvent::Select(MemContext::Main));
                }
            }
        }
        assert_eq!(bus.ctx, MemContext::Main);
    }

    #[test]
    fn test_install_sets_pointers() {
        let image = build(ImageConfig {
            sink: OutputSink::TapeOut,
            ..ImageConfig::default()
        });
        let mut bus = RecordingBus::default();
        image.install(&mut bus);
        assert!(bus.main.contains(&(0x00FA, 0x20)));
        assert!(bus.main.contains(&(0x00FB, 0xC0)));
        assert!(bus.main.contains(&(0x00FC, 0xD8)));
        assert!(bus.main.contains(&(0x00FD, 0x10)));
        assert!(!bus.main.iter().any(|&(addr, _)| addr >= MOCK_BUF));
    }

    #[test]
    fn test_mock_install_seeds_pattern() {
        let image = build(ImageConfig {
            mock: true,
            ..ImageConfig::default()
        });
        let mut bus = RecordingBus::default();
        image.install(&mut bus);

        let mock: Vec<(u16, u8)> = bus
            .main
            .iter()
            .copied()
            .filter(|&(addr, _)| addr >= MOCK_BUF)
            .collect();
        assert_eq!(mock.len(), 256);
        assert_eq!(mock[0], (0xDF00, 0x52));
        assert_eq!(mock[0xAA], (0xDFAA, 0x52));
        assert_eq!(mock[0xAB], (0xDFAB, 0x52 + 36));
        assert_eq!(mock[0xAF], (0xDFAF, 0x10));
        assert_eq!(mock[0xFA], (0xDFFA, 0x52 + 36));
        assert_eq!(mock[0xFB], (0xDFFB, 0x52));
    }
}
