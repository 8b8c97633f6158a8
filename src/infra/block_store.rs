// ============================================================
// Layer 6 — Block Store
// ============================================================
// Persists the packed dataset and the configuration it was
// produced with.
//
// File layout:
//   lm_dataset/
//     blocks.jsonl          ← one packed block per line
//     prepare_config.json   ← PrepareConfig used for the run
//     packing_metrics.csv   ← written by MetricsLogger
//
// Each line of blocks.jsonl is a flat object keyed by field:
//   {"attention_mask":[1,1,...],"input_ids":[1,835,...],"labels":[1,835,...]}
//
// Why save the config?
//   `inspect` needs the block length to verify the output, and
//   a trainer reading the dataset later should know how it was
//   cut without guessing from the first row.

use anyhow::{Context, Result};
use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::application::prepare_use_case::PrepareConfig;
use crate::data::packer::PackedBatch;

pub const BLOCKS_FILE: &str = "blocks.jsonl";
pub const CONFIG_FILE: &str = "prepare_config.json";

/// One block as read back from disk: field name → token values
pub type StoredBlock = BTreeMap<String, Vec<u32>>;

/// Owns the output directory of a preparation run.
pub struct BlockStore {
    dir: PathBuf,
}

impl BlockStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn blocks_path(&self) -> PathBuf {
        self.dir.join(BLOCKS_FILE)
    }

    /// Create the output directory and start a fresh blocks file.
    /// Any blocks from a previous run are truncated.
    pub fn create_writer(&self) -> Result<BlockWriter> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create output dir '{}'", self.dir.display()))?;

        let path = self.blocks_path();
        let file = File::create(&path)
            .with_context(|| format!("Cannot create '{}'", path.display()))?;

        Ok(BlockWriter { out: BufWriter::new(file), path, written: 0 })
    }

    /// Remove the config of a previous run. A run calls this before
    /// touching blocks.jsonl, so a config on disk always belongs to
    /// a run that finished.
    pub fn clear_config(&self) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!("Removed stale config '{}'", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Cannot remove stale config '{}'", path.display())),
        }
    }

    pub fn save_config(&self, cfg: &PrepareConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved prepare config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<PrepareConfig> {
        let path = self.dir.join(CONFIG_FILE);

        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. \
                 Make sure you have run 'prepare' before 'inspect'.",
                path.display()
            )
        })?;

        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config '{}'", path.display()))
    }

    /// Stream stored blocks in file order as `(line_number, block)`.
    pub fn read_blocks(&self) -> Result<impl Iterator<Item = Result<(usize, StoredBlock)>>> {
        let path = self.blocks_path();
        let file = File::open(&path)
            .with_context(|| format!("Cannot open '{}'", path.display()))?;

        Ok(BufReader::new(file)
            .lines()
            .enumerate()
            .map(move |(i, line)| {
                let line_no = i + 1;
                let line    = line.with_context(|| {
                    format!("Cannot read line {} of '{}'", line_no, path.display())
                })?;
                let block = serde_json::from_str::<StoredBlock>(&line).with_context(|| {
                    format!("Malformed block on line {} of '{}'", line_no, path.display())
                })?;
                Ok((line_no, block))
            }))
    }
}

/// Appends packed blocks to `blocks.jsonl`.
pub struct BlockWriter {
    out:     BufWriter<File>,
    path:    PathBuf,
    written: usize,
}

impl BlockWriter {
    /// Write every block of `batch`; returns how many were written.
    pub fn write_batch(&mut self, batch: &PackedBatch) -> Result<usize> {
        for block in batch.blocks() {
            serde_json::to_writer(&mut self.out, &block)?;
            self.out.write_all(b"\n")?;
        }
        self.written += batch.block_count();
        Ok(batch.block_count())
    }

    /// Flush buffered output; returns the total number of blocks.
    pub fn finish(mut self) -> Result<usize> {
        self.out
            .flush()
            .with_context(|| format!("Cannot flush '{}'", self.path.display()))?;
        Ok(self.written)
    }
}
