// ============================================================
// Layer 2 — PrepareUseCase
// ============================================================
// Orchestrates the dataset preparation pipeline in order:
//
//   Step 1: Load JSONL samples          (Layer 4 - data)
//   Step 2: Select first N samples      (Layer 4 - data)
//   Step 3: Preview one formatted text  (Layer 4 - data)
//   Step 4: Format + append EOS         (Layer 4 - data)
//   Step 5: Tokenize in map batches     (Layer 6 - infra)
//   Step 6: Pack into fixed blocks      (Layer 4 - data)
//   Step 7: Write blocks + metrics      (Layer 6 - infra)
//   Step 8: Save config                 (Layer 6 - infra)
//
// Steps 5–7 repeat per batch of `map_batch_size` texts. One
// PackerState is threaded through all batches so tokens that do
// not fill a block are carried into the next one.
//
// Reference: Rust Book §13 (Iterators and Closures)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::{
    formatter::{PromptFormatter, DEFAULT_EOS_TOKEN},
    loader::JsonlLoader,
    packer::{PackerConfig, PackerState, SequencePacker, DEFAULT_BLOCK_LENGTH},
    sampler::{preview_index, select_first},
};
use crate::domain::traits::{BatchEncoder, SampleSource};
use crate::infra::{
    block_store::BlockStore,
    metrics::{BatchMetrics, MetricsLogger, PackingSummary},
    tokenizer_store::TokenizerStore,
};

/// Rows per batched map call, as in `datasets.Dataset.map(batched=True)`
pub const DEFAULT_MAP_BATCH_SIZE: usize = 1000;

// ─── Preparation Configuration ───────────────────────────────────────────────
// Everything a run needs. Saved next to the output so the packed
// dataset can be verified and reproduced later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareConfig {
    pub input:              String,
    pub tokenizer:          String,
    pub output_dir:         String,
    pub block_length:       usize,
    pub map_batch_size:     usize,
    pub max_samples:        Option<usize>,
    pub eos_token:          String,
    pub seed:               u64,
    pub add_special_tokens: bool,
    pub token_type_ids:     bool,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            input:              "databricks-dolly-15k.jsonl".to_string(),
            tokenizer:          "tokenizer.json".to_string(),
            output_dir:         "lm_dataset".to_string(),
            block_length:       DEFAULT_BLOCK_LENGTH,
            map_batch_size:     DEFAULT_MAP_BATCH_SIZE,
            max_samples:        None,
            eos_token:          DEFAULT_EOS_TOKEN.to_string(),
            seed:               42,
            add_special_tokens: true,
            token_type_ids:     false,
        }
    }
}

impl PrepareConfig {
    /// Reject settings that cannot produce a dataset.
    pub fn validate(&self) -> Result<PackerConfig> {
        if self.map_batch_size == 0 {
            anyhow::bail!("map_batch_size must be at least 1");
        }
        Ok(PackerConfig::new(self.block_length)?)
    }
}

// ─── PrepareUseCase ───────────────────────────────────────────────────────────
pub struct PrepareUseCase {
    config: PrepareConfig,
}

impl PrepareUseCase {
    pub fn new(config: PrepareConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline end to end against the configured files.
    pub fn execute(&self) -> Result<PackingSummary> {
        let cfg = &self.config;
        cfg.validate()?;

        let loader  = JsonlLoader::new(&cfg.input);
        let encoder = TokenizerStore::load(&cfg.tokenizer)?
            .with_special_tokens(cfg.add_special_tokens)
            .with_type_ids(cfg.token_type_ids);

        if encoder.token_id(&cfg.eos_token).is_none() {
            tracing::warn!(
                "EOS token '{}' is not in the tokenizer vocabulary; \
                 packed samples will have no single-token boundary",
                cfg.eos_token
            );
        }

        run_pipeline(cfg, &loader, &encoder)
    }
}

/// The pipeline proper, generic over where samples and token ids
/// come from.
pub fn run_pipeline(
    cfg:     &PrepareConfig,
    source:  &dyn SampleSource,
    encoder: &dyn BatchEncoder,
) -> Result<PackingSummary> {
    let packer = SequencePacker::new(cfg.validate()?);

    // ── Step 1 + 2: Load and select ───────────────────────────────────────────
    let samples = select_first(source.load_all()?, cfg.max_samples);
    tracing::info!("Dataset size: {}", samples.len());

    // ── Step 3: Preview ───────────────────────────────────────────────────────
    let formatter = PromptFormatter::new(cfg.eos_token.clone());
    if let Some(i) = preview_index(samples.len(), cfg.seed) {
        tracing::info!("Sample {}:\n{}", i, formatter.format(&samples[i]));
    }

    // ── Step 4: Template every sample ─────────────────────────────────────────
    let texts: Vec<String> = samples.iter().map(|s| formatter.template(s)).collect();

    // ── Steps 5–7: Tokenize, pack, write ──────────────────────────────────────
    // The old config goes first: until this run saves its own,
    // `inspect` must not accept the blocks being rewritten below.
    let store       = BlockStore::new(&cfg.output_dir);
    store.clear_config()?;
    let mut writer  = store.create_writer()?;
    let mut metrics = MetricsLogger::create(store.dir())?;
    let mut state   = PackerState::new();
    let mut summary = PackingSummary::default();

    for (i, chunk) in texts.chunks(cfg.map_batch_size).enumerate() {
        let batch = encoder.encode_batch(chunk)?;
        let packed = packer
            .pack(&mut state, &batch)
            .with_context(|| format!("Packing failed on batch {}", i + 1))?;
        let blocks = writer.write_batch(&packed)?;

        let row = BatchMetrics {
            batch:        i + 1,
            records:      batch.record_count(),
            input_tokens: batch.token_count(),
            blocks,
            carried:      state.carried_len(),
        };
        metrics.log(&row)?;
        summary.record(&row);
    }

    summary.dropped_tokens = state.finish();
    if summary.dropped_tokens > 0 {
        tracing::warn!(
            "Dropping {} trailing tokens that do not fill a block of {}",
            summary.dropped_tokens,
            cfg.block_length
        );
    }

    writer.finish()?;
    metrics.finish()?;

    // ── Step 8: Save config ───────────────────────────────────────────────────
    store.save_config(cfg)?;

    tracing::info!(
        "Total number of samples: {} ({:.1}% of {} tokens packed)",
        summary.blocks,
        summary.utilisation(cfg.block_length) * 100.0,
        summary.input_tokens
    );
    Ok(summary)
}
