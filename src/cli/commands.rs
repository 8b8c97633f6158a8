// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `prepare` and `inspect`, and all
// their configurable flags.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::prepare_use_case::{PrepareConfig, DEFAULT_MAP_BATCH_SIZE};
use crate::data::formatter::DEFAULT_EOS_TOKEN;
use crate::data::packer::DEFAULT_BLOCK_LENGTH;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Format, tokenize and pack a JSONL instruction dataset
    Prepare(PrepareArgs),

    /// Verify the blocks written by `prepare`
    Inspect(InspectArgs),
}

/// All arguments for the `prepare` command.
#[derive(Args, Debug)]
pub struct PrepareArgs {
    /// JSON-lines file with instruction/context/response records
    #[arg(long)]
    pub input: String,

    /// tokenizer.json, or a model directory containing it
    #[arg(long)]
    pub tokenizer: String,

    /// Directory for blocks.jsonl, metrics and config
    #[arg(long, default_value = "lm_dataset")]
    pub output_dir: String,

    /// Tokens per packed block
    #[arg(long, default_value_t = DEFAULT_BLOCK_LENGTH)]
    pub block_length: usize,

    /// Samples tokenized and packed per call
    #[arg(long, default_value_t = DEFAULT_MAP_BATCH_SIZE)]
    pub map_batch_size: usize,

    /// Only use the first N samples
    #[arg(long)]
    pub max_samples: Option<usize>,

    /// Appended to every formatted sample
    #[arg(long, default_value = DEFAULT_EOS_TOKEN)]
    pub eos_token: String,

    /// Seed for picking the preview sample
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Do not let the tokenizer add its special tokens (e.g. BOS)
    #[arg(long)]
    pub no_special_tokens: bool,

    /// Also emit a token_type_ids field
    #[arg(long)]
    pub token_type_ids: bool,
}

/// Boundary between Layer 1 and Layer 2 — the application layer
/// never sees clap types.
impl From<PrepareArgs> for PrepareConfig {
    fn from(a: PrepareArgs) -> Self {
        PrepareConfig {
            input:              a.input,
            tokenizer:          a.tokenizer,
            output_dir:         a.output_dir,
            block_length:       a.block_length,
            map_batch_size:     a.map_batch_size,
            max_samples:        a.max_samples,
            eos_token:          a.eos_token,
            seed:               a.seed,
            add_special_tokens: !a.no_special_tokens,
            token_type_ids:     a.token_type_ids,
        }
    }
}

/// All arguments for the `inspect` command
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Directory written by `prepare`
    #[arg(long, default_value = "lm_dataset")]
    pub output_dir: String,
}
