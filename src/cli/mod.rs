// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses command line arguments with clap and routes them to the
// application layer. Printing results happens here and only here.
//
//   1. `prepare` — build a packed dataset from a JSONL file
//   2. `inspect` — verify a packed dataset on disk

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, InspectArgs, PrepareArgs};

#[derive(Parser, Debug)]
#[command(
    name = "dolly-packer",
    version,
    about = "Pack instruction datasets into fixed-length causal-LM training blocks."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Prepare(args) => run_prepare(args),
            Commands::Inspect(args) => run_inspect(args),
        }
    }
}

fn run_prepare(args: PrepareArgs) -> Result<()> {
    use crate::application::prepare_use_case::PrepareUseCase;

    tracing::info!("Preparing dataset from: {}", args.input);
    let output_dir = args.output_dir.clone();

    let summary = PrepareUseCase::new(args.into()).execute()?;

    println!(
        "Packed {} records into {} blocks ({} tokens dropped). Output: {}",
        summary.records, summary.blocks, summary.dropped_tokens, output_dir
    );
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    use crate::application::inspect_use_case::InspectUseCase;

    let report = InspectUseCase::new(&args.output_dir).execute()?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
