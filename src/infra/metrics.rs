// ============================================================
// Layer 6 — Packing Metrics
// ============================================================
// Records one CSV row per packing call so packing efficiency can
// be checked after a run:
//
//   batch,records,input_tokens,blocks,carried
//   1,1000,412345,201,697
//   2,1000,409876,200,573
//
//   records      — samples tokenized in this batch
//   input_tokens — tokens those samples produced
//   blocks       — full blocks emitted by this call
//   carried      — tokens left over for the next batch
//
// Output file: <output_dir>/packing_metrics.csv, rewritten at the
// start of every run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

pub const METRICS_FILE: &str = "packing_metrics.csv";

/// One row of metrics for a single packing call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMetrics {
    pub batch:        usize,
    pub records:      usize,
    pub input_tokens: usize,
    pub blocks:       usize,
    pub carried:      usize,
}

/// Running totals for a whole preparation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackingSummary {
    pub batches:        usize,
    pub records:        usize,
    pub input_tokens:   usize,
    pub blocks:         usize,
    /// Trailing tokens that never filled a block
    pub dropped_tokens: usize,
}

impl PackingSummary {
    pub fn record(&mut self, m: &BatchMetrics) {
        self.batches      += 1;
        self.records      += m.records;
        self.input_tokens += m.input_tokens;
        self.blocks       += m.blocks;
    }

    /// Fraction of input tokens that ended up inside a block
    pub fn utilisation(&self, block_length: usize) -> f64 {
        if self.input_tokens == 0 {
            return 0.0;
        }
        (self.blocks * block_length) as f64 / self.input_tokens as f64
    }
}

/// Writes BatchMetrics rows to a CSV file.
pub struct MetricsLogger {
    out:      BufWriter<File>,
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create (or truncate) the CSV in `dir` and write the header.
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let csv_path = dir.join(METRICS_FILE);
        let file     = File::create(&csv_path)
            .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;

        let mut out = BufWriter::new(file);
        writeln!(out, "batch,records,input_tokens,blocks,carried")?;
        tracing::debug!("Created metrics CSV: '{}'", csv_path.display());

        Ok(Self { out, csv_path })
    }

    pub fn log(&mut self, m: &BatchMetrics) -> Result<()> {
        writeln!(
            self.out,
            "{},{},{},{},{}",
            m.batch, m.records, m.input_tokens, m.blocks, m.carried,
        )?;

        tracing::debug!(
            "Batch {}: {} records, {} tokens → {} blocks, {} carried",
            m.batch,
            m.records,
            m.input_tokens,
            m.blocks,
            m.carried,
        );
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.out
            .flush()
            .with_context(|| format!("Cannot flush '{}'", self.csv_path.display()))
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn row(batch: usize, input_tokens: usize, blocks: usize) -> BatchMetrics {
        BatchMetrics { batch, records: 2, input_tokens, blocks, carried: 0 }
    }

    #[test]
    fn test_summary_accumulates() {
        let mut s = PackingSummary::default();
        s.record(&row(1, 10, 2));
        s.record(&row(2, 6, 1));
        assert_eq!(s.batches, 2);
        assert_eq!(s.records, 4);
        assert_eq!(s.blocks, 3);
        // 3 blocks * 4 tokens out of 16 input tokens
        assert!((s.utilisation(4) - 0.75).abs() < 1e-9);
        assert_eq!(PackingSummary::default().utilisation(4), 0.0);
    }

    #[test]
    fn test_csv_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = MetricsLogger::create(dir.path()).unwrap();
        let path = logger.csv_path().to_path_buf();
        logger.log(&row(1, 10, 2)).unwrap();
        logger.finish().unwrap();

        let csv = fs::read_to_string(path).unwrap();
        assert_eq!(csv, "batch,records,input_tokens,blocks,carried\n1,2,10,2,0\n");
    }
}
