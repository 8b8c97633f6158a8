// ============================================================
// Layer 4 — JSON-lines Sample Loader
// ============================================================
// Loads instruction samples from a JSON-lines export such as
// databricks-dolly-15k.jsonl: one JSON object per line.
//
// Blank lines are ignored. A line that does not parse is logged
// and skipped so one bad record never sinks a 15k-record run;
// the number of skipped lines is reported at the end.
//
// Reference: serde_json documentation
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::PathBuf,
};

use crate::domain::sample::InstructionSample;
use crate::domain::traits::SampleSource;

/// Reads `InstructionSample`s from a `.jsonl` file.
pub struct JsonlLoader {
    path: PathBuf,
}

impl JsonlLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SampleSource for JsonlLoader {
    fn load_all(&self) -> Result<Vec<InstructionSample>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Cannot open dataset '{}'", self.path.display()))?;

        let mut samples = Vec::new();
        let mut skipped = 0usize;

        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line_no = i + 1;
            let line    = line.with_context(|| {
                format!("Cannot read line {} of '{}'", line_no, self.path.display())
            })?;

            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<InstructionSample>(&line) {
                Ok(sample) => samples.push(sample),
                Err(e) => {
                    tracing::warn!(
                        "Skipping line {} of '{}': {}",
                        line_no,
                        self.path.display(),
                        e
                    );
                    skipped += 1;
                }
            }
        }

        tracing::info!(
            "Loaded {} samples from '{}' ({} skipped)",
            samples.len(),
            self.path.display(),
            skipped
        );
        Ok(samples)
    }
}
