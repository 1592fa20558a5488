//! Build command - synthesize the player image and report on it

use anyhow::{Context, Result};
use clap::Args;
use pulse_core::{Config, config};
use pulse_gen::{ImageBuilder, ImageConfig, OutputSink, PageSet, PlayerImage};
use std::path::PathBuf;
use xxhash_rust::xxh3::xxh3_64;

/// Arguments for the build command
#[derive(Args)]
pub struct BuildArgs {
    /// Expansion slot of the network interface (default: from config)
    #[arg(long)]
    pub slot: Option<u8>,

    /// Read the mock buffer instead of the interface
    #[arg(long)]
    pub mock: bool,

    /// Toggle the cassette output instead of the speaker
    #[arg(long)]
    pub tape: bool,

    /// Config file (default: platform config directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the image pages to this file
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Print an assembly listing
    #[arg(long)]
    pub list: bool,

    /// Restrict the listing to one page-set (0 or 1)
    #[arg(long, requires = "list")]
    pub set: Option<u8>,

    /// Restrict the listing to one task slot (0-4)
    #[arg(long, requires = "list")]
    pub task_slot: Option<u8>,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Load the given config file, or the one in the platform config directory
pub fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => config::load_from(path)
            .with_context(|| format!("Failed to load config: {}", path.display())),
        None => config::load().context("Failed to load config"),
    }
}

/// Merge the config file with command line overrides
pub fn image_config(
    config: &Config,
    slot: Option<u8>,
    mock: bool,
    tape: bool,
) -> Result<ImageConfig> {
    let mut image = config.image_config();
    if let Some(slot) = slot {
        image.slot = slot;
    }
    image.mock |= mock;
    if tape {
        image.sink = OutputSink::TapeOut;
    }
    image.validate()?;
    Ok(image)
}

/// Execute the build command
pub fn execute(args: BuildArgs) -> Result<()> {
    let config = load_config(args.config.as_ref())?;
    let config = image_config(&config, args.slot, args.mock, args.tape)?;
    let image = ImageBuilder::new(config)
        .build()
        .context("Failed to synthesize player image")?;

    let bytes = image.to_bytes();
    let checksum = xxh3_64(&bytes);
    let summary = image.summary();

    if args.json {
        let mut value = serde_json::to_value(&summary)?;
        value["checksum"] = serde_json::Value::String(format!("{checksum:016x}"));
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("=== Player Image ===");
        println!("  Slot: {}", summary.slot);
        println!("  Source: {}", if summary.mock { "mock buffer" } else { "W5100" });
        println!("  Output: {:?}", summary.sink);
        println!("  Routines: {}", summary.routines);
        println!("  Code bytes: {}", summary.bytes);
        println!("  Longest body: {} bytes", summary.longest_body);
        println!("  Stretched toggles: {}", summary.stretched);
        println!("  Borrowed prologues: {}", summary.borrowed);
        println!("  Cycle exact: {}", if summary.cycle_exact { "yes" } else { "NO" });
        println!("  Checksum: {checksum:016x}");
    }

    if args.list {
        let set = match args.set {
            Some(index) => Some(PageSet::from_index(index).context("Page-set must be 0 or 1")?),
            None => None,
        };
        print_listing(&image, set, args.task_slot);
    }

    if let Some(path) = &args.out {
        std::fs::write(path, &bytes)
            .with_context(|| format!("Failed to write image: {}", path.display()))?;
        println!("  Wrote {} bytes to {}", bytes.len(), path.display());
    }

    if !summary.cycle_exact {
        anyhow::bail!("Image failed the cycle check");
    }
    Ok(())
}

fn print_listing(image: &PlayerImage, set: Option<PageSet>, slot: Option<u8>) {
    let selected = image
        .routines()
        .iter()
        .filter(|r| set.is_none_or(|set| r.set == set))
        .filter(|r| slot.is_none_or(|slot| r.slot == slot));

    for routine in selected {
        println!();
        println!(
            "; {:?} slot {} duty {} ({}) -> ${:04X}",
            routine.set,
            routine.slot,
            routine.duty,
            routine.task.name(),
            routine.pulse.jump_target(),
        );
        for placed in routine.pulse.placed() {
            println!(
                "  ${:04X}  {:>2}  {:<20} ; {:?}",
                routine.origin as usize + placed.offset,
                placed.cycle,
                placed.op.to_string(),
                placed.role,
            );
        }
    }
}
