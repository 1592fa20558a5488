//! PWM to PCM rendering
//!
//! The toggle log is a square wave; averaging it over each output sample
//! period recovers the pulse-width-modulated signal.

use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use pulse_gen::layout::CLOCK_HZ;
use std::path::Path;

const AMPLITUDE: f64 = i16::MAX as f64 * 0.8;

/// Average the square wave described by `toggles` over each sample period.
///
/// The output starts low and flips at every toggle. Rendering stops at cycle `end`.
pub fn render(toggles: &[u64], end: u64, sample_rate: u32) -> Vec<i16> {
    let period = CLOCK_HZ as f64 / sample_rate as f64;
    let count = (end as f64 * sample_rate as f64 / CLOCK_HZ as f64) as usize;

    let mut out = Vec::with_capacity(count);
    let mut pending = toggles.iter().copied().peekable();
    let mut level = -1.0;
    let mut at = 0.0;

    for n in 0..count {
        let stop = (n + 1) as f64 * period;
        let mut sum = 0.0;
        while let Some(toggle) = pending.next_if(|&t| (t as f64) < stop) {
            let toggle = (toggle as f64).max(at);
            sum += level * (toggle - at);
            at = toggle;
            level = -level;
        }
        sum += level * (stop - at);
        at = stop;
        out.push((sum / period * AMPLITUDE) as i16);
    }
    out
}

/// Write mono 16-bit PCM samples to a WAV file
pub fn write_wav(path: &Path, samples: &[i16], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {}", path.display()))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize().context("Failed to finalize WAV file")?;
    Ok(())
}
