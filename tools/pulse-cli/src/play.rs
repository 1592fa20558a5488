//! Play command - stream a file through the emulated host
//!
//! The file is what the server would send: the stream header, cover art,
//! visualization data and the wire values. Everything is queued on the
//! emulated socket at once; `--rate` limits how fast it arrives.

use anyhow::{Context, Result};
use clap::Args;
use pulse_core::{ESC, Machine, PlaybackReport, StreamError, StreamSession};
use pulse_gen::ImageBuilder;
use pulse_gen::layout::{CLOCK_HZ, CYCLE_BUDGET};
use std::path::PathBuf;

use crate::build::{image_config, load_config};
use crate::render::{render, write_wav};

/// Arguments for the play command
#[derive(Args)]
pub struct PlayArgs {
    /// Stream file (header, cover art, visualization data, wire values)
    pub stream: PathBuf,

    /// Play the mock buffer instead of the stream's wire values
    #[arg(long)]
    pub mock: bool,

    /// Toggle the cassette output instead of the speaker
    #[arg(long)]
    pub tape: bool,

    /// Expansion slot of the network interface (default: from config)
    #[arg(long)]
    pub slot: Option<u8>,

    /// Emulate the IIgs speed register
    #[arg(long)]
    pub iigs: bool,

    /// Delivery rate in bytes per 1000 cycles (default: from config, unlimited)
    #[arg(long)]
    pub rate: Option<u32>,

    /// Press escape after this many seconds of emulated time
    #[arg(long, default_value_t = 30.0)]
    pub seconds: f64,

    /// Config file (default: platform config directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Render the output to a WAV file
    #[arg(long)]
    pub wav: Option<PathBuf>,

    /// Sample rate of the WAV file
    #[arg(long, default_value_t = 44_100)]
    pub sample_rate: u32,
}

/// Execute the play command
pub fn execute(args: PlayArgs) -> Result<()> {
    let config = load_config(args.config.as_ref())?;
    let image_config = image_config(&config, args.slot, args.mock, args.tape)?;

    let mut settings = config.playback_settings();
    settings.mock = image_config.mock;

    let mut machine_config = config.machine_config();
    machine_config.slot = image_config.slot;
    machine_config.iigs |= args.iigs;
    machine_config.delivery_rate = args.rate.or(machine_config.delivery_rate);

    let stream = std::fs::read(&args.stream)
        .with_context(|| format!("Failed to read stream: {}", args.stream.display()))?;

    let image = ImageBuilder::new(image_config)
        .build()
        .context("Failed to synthesize player image")?;

    let mut machine = Machine::new(machine_config);
    machine.install_image(&image);
    machine.bus.net.push(&stream);
    machine.bus.net.close_remote();
    let stop = (args.seconds * CLOCK_HZ as f64) as u64;
    machine.press_at(stop, ESC);

    println!("=== Playing ===");
    println!("  Stream: {} ({} bytes)", args.stream.display(), stream.len());

    match StreamSession::new(settings).run(&mut machine) {
        Ok(report) => print_report(&report),
        Err(StreamError::OperatorAbort) => println!("  Stopped at {:.2}s", args.seconds),
        Err(err) => return Err(err).context("Playback failed"),
    }

    let cycles = machine.cpu.cycles;
    let toggles = machine.bus.take_toggles(image_config.sink);
    println!("  Emulated time: {:.2}s", cycles as f64 / CLOCK_HZ as f64);
    println!("  Toggles: {}", toggles.len());

    if let Some(path) = &args.wav {
        let samples = render(&toggles, cycles, args.sample_rate);
        write_wav(path, &samples, args.sample_rate)?;
        println!("  Wrote {} samples to {}", samples.len(), path.display());
    }
    Ok(())
}

fn print_report(report: &PlaybackReport) {
    println!("  Bursts: {}", report.bursts);
    println!("  Starved: {}", report.starved);
    println!("  Paused by key: {}", report.operator);
    println!("  Idle iterations: {}", report.idles);
    println!(
        "  Samples played: {}",
        report.burst_cycles / CYCLE_BUDGET as u64
    );
}
