//! Pulse CLI - Build and audition PWM streaming player images
//!
//! # Commands
//!
//! - `pulse build` - Synthesize the player image and report on it
//! - `pulse trace` - Show which routines a sequence of wire values selects
//! - `pulse play` - Stream a file through the emulated host, optionally to WAV
//!
//! # Usage
//!
//! ```bash
//! # Check the image for slot 5 and save it
//! pulse build --slot 5 --out player.bin
//!
//! # Listing of every duty of one task
//! pulse build --list --set 0 --task-slot 2
//!
//! # Play a stream and render what the speaker would do
//! pulse play song.a2s --wav song.wav
//! ```

mod build;
mod play;
mod render;
mod trace;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Pulse CLI - Build and audition PWM streaming player images
#[derive(Parser)]
#[command(name = "pulse")]
#[command(about = "Build and audition PWM streaming player images")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize the player image
    Build(build::BuildArgs),

    /// Trace wire values through the flow graph
    Trace(trace::TraceArgs),

    /// Play a stream file on the emulated host
    Play(play::PlayArgs),
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build(args) => build::execute(args),
        Commands::Trace(args) => trace::execute(args),
        Commands::Play(args) => play::execute(args),
    }
}
