//! Integration tests for the emulated host
//!
//! Runs generated images on the interpreter: cycle exactness of every
//! routine, whole bursts in mock and network mode, and full stream sessions.

#[cfg(test)]
mod routine_tests;

#[cfg(test)]
pub(crate) mod test_utils {
    use pulse_gen::image::mock_pattern;
    use pulse_gen::{ImageBuilder, ImageConfig, PlayerImage};

    use crate::machine::{Machine, MachineConfig};

    pub fn build_image(mock: bool) -> PlayerImage {
        ImageBuilder::new(ImageConfig {
            mock,
            ..ImageConfig::default()
        })
        .build()
        .unwrap()
    }

    /// Machine with the default slot and an installed image
    pub fn machine_with(image: &PlayerImage, config: MachineConfig) -> Machine {
        let mut machine = Machine::new(config);
        machine.install_image(image);
        machine
    }

    /// One page of wire values aligned with the ring's read/write skew
    pub fn audio_page() -> Vec<u8> {
        let mock: Vec<u8> = mock_pattern().map(|(_, value)| value).collect();
        (0..0x100).map(|k| mock[(k + 4) & 0xFF]).collect()
    }

    pub fn gaps(toggles: &[u64]) -> Vec<u64> {
        toggles.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Every gap after the first two belongs to a steady 22/24 alternation
    pub fn assert_steady(toggles: &[u64]) {
        let gaps = gaps(toggles);
        assert!(gaps.len() > 2);
        assert!(gaps[2..].iter().all(|&g| g == 22 || g == 24), "{:?}", &gaps[..16.min(gaps.len())]);
    }

    /// Cycles of a burst that plays `pages` full pages and then starves
    pub fn starved_burst_cycles(pages: u64) -> u64 {
        11_621 + (pages - 1) * 11_730
    }
}
