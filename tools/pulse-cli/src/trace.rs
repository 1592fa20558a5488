//! Trace command - follow wire values through the flow graph

use anyhow::{Context, Result};
use clap::Args;
use pulse_gen::{FlowTracer, SampleCode, Step};
use std::path::PathBuf;

/// Arguments for the trace command
#[derive(Args)]
pub struct TraceArgs {
    /// Wire values (0-71)
    pub codes: Vec<u8>,

    /// Read page bytes from a stream file instead (header and cover art are skipped)
    #[arg(long, conflicts_with = "codes")]
    pub file: Option<PathBuf>,

    /// Bytes to skip at the start of the file
    #[arg(long, default_value_t = 0, requires = "file")]
    pub skip: usize,

    /// Stop after this many steps
    #[arg(long, default_value_t = 64)]
    pub limit: usize,

    /// Print the steps as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the trace command
pub fn execute(args: TraceArgs) -> Result<()> {
    let codes = match &args.file {
        Some(path) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read stream: {}", path.display()))?;
            pages_to_codes(bytes.iter().skip(args.skip).take(args.limit).copied())?
        }
        None => args
            .codes
            .iter()
            .take(args.limit)
            .map(|&value| SampleCode::try_from(value))
            .collect::<Result<Vec<_>, _>>()?,
    };

    let mut tracer = FlowTracer::new();
    let mut steps = vec![tracer.current()];
    steps.extend(tracer.trace(codes));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&steps)?);
    } else {
        for (index, step) in steps.iter().enumerate() {
            println!("{}", format_step(index, step));
        }
    }
    Ok(())
}

fn pages_to_codes(pages: impl Iterator<Item = u8>) -> Result<Vec<SampleCode>> {
    pages
        .enumerate()
        .map(|(index, page)| {
            SampleCode::from_page(page)
                .with_context(|| format!("Byte {index} (${page:02X}) is not a player page"))
        })
        .collect()
}

fn format_step(index: usize, step: &Step) -> String {
    format!(
        "{index:>5}  {:<9} slot {}  duty {:>2}  {}",
        format!("{:?}", step.set),
        step.slot,
        step.duty,
        step.task.name()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_to_codes() {
        let codes = pages_to_codes([0x40, 0x52, 0x87].into_iter()).unwrap();
        let values: Vec<u8> = codes.iter().map(|c| c.value()).collect();
        assert_eq!(values, vec![0, 18, 71]);
    }

    #[test]
    fn test_pages_outside_image_are_rejected() {
        assert!(pages_to_codes([0x52, 0x10].into_iter()).is_err());
    }

    #[test]
    fn test_format_step() {
        let step = FlowTracer::new().current();
        let line = format_step(0, &step);
        assert!(line.contains("slot 0"));
        assert!(line.contains("duty 18"));
    }
}
