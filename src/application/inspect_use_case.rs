// ============================================================
// Layer 2 — InspectUseCase
// ============================================================
// Re-reads a prepared dataset and checks it is fit for a
// fixed-shape training loop:
//
//   - every field of every block has exactly block_length values
//   - every block carries the same set of fields
//   - labels equal input_ids element-wise
//
// The block length comes from the prepare_config.json saved by
// the `prepare` run, never from the data itself.

use anyhow::Result;
use serde::Serialize;

use crate::domain::record::{INPUT_IDS, LABELS};
use crate::infra::block_store::BlockStore;

/// What `inspect` found in an output directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectReport {
    pub block_length: usize,
    pub blocks:       usize,
    pub fields:       Vec<String>,
    /// Token positions across all blocks (blocks * block_length)
    pub tokens:       usize,
}

pub struct InspectUseCase {
    store: BlockStore,
}

impl InspectUseCase {
    pub fn new(output_dir: impl Into<std::path::PathBuf>) -> Self {
        Self { store: BlockStore::new(output_dir) }
    }

    pub fn execute(&self) -> Result<InspectReport> {
        let cfg          = self.store.load_config()?;
        let block_length = cfg.block_length;

        let mut fields: Option<Vec<String>> = None;
        let mut blocks  = 0usize;

        for entry in self.store.read_blocks()? {
            let (line, block) = entry?;
            let names: Vec<String> = block.keys().cloned().collect();

            if let Some(expected) = &fields {
                if *expected != names {
                    anyhow::bail!(
                        "Block on line {} has fields {:?}, expected {:?}",
                        line, names, expected
                    );
                }
            } else {
                fields = Some(names);
            }

            for (name, values) in &block {
                if values.len() != block_length {
                    anyhow::bail!(
                        "Block on line {}: field '{}' has {} values, expected {}",
                        line, name, values.len(), block_length
                    );
                }
            }

            if let Some(ids) = block.get(INPUT_IDS) {
                if block.get(LABELS) != Some(ids) {
                    anyhow::bail!("Block on line {}: labels differ from input_ids", line);
                }
            }

            blocks += 1;
        }

        let report = InspectReport {
            block_length,
            blocks,
            fields: fields.unwrap_or_default(),
            tokens: blocks * block_length,
        };
        tracing::info!(
            "Verified {} blocks of {} tokens in '{}'",
            report.blocks,
            report.block_length,
            self.store.dir().display()
        );
        Ok(report)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::prepare_use_case::PrepareConfig;
    use crate::domain::record::ATTENTION_MASK;
    use crate::infra::block_store::BLOCKS_FILE;

    fn prepared_dir(block_length: usize, rows: &[&str]) -> tempfile::TempDir {
        let dir   = tempfile::tempdir().unwrap();
        let store = BlockStore::new(dir.path());
        store
            .save_config(&PrepareConfig { block_length, ..PrepareConfig::default() })
            .unwrap();
        std::fs::write(dir.path().join(BLOCKS_FILE), rows.join("\n")).unwrap();
        dir
    }

    #[test]
    fn test_valid_blocks_pass() {
        let dir = prepared_dir(2, &[
            r#"{"attention_mask":[1,1],"input_ids":[5,6],"labels":[5,6]}"#,
            r#"{"attention_mask":[1,0],"input_ids":[7,8],"labels":[7,8]}"#,
        ]);
        let report = InspectUseCase::new(dir.path()).execute().unwrap();

        assert_eq!(report.blocks, 2);
        assert_eq!(report.tokens, 4);
        assert_eq!(report.fields, vec![ATTENTION_MASK, INPUT_IDS, LABELS]);
    }

    #[test]
    fn test_short_block_fails() {
        let dir = prepared_dir(2, &[
            r#"{"attention_mask":[1,1],"input_ids":[5,6],"labels":[5,6]}"#,
            r#"{"attention_mask":[1],"input_ids":[7],"labels":[7]}"#,
        ]);
        let err = InspectUseCase::new(dir.path()).execute().unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_labels_mismatch_fails() {
        let dir = prepared_dir(2, &[r#"{"input_ids":[5,6],"labels":[5,7]}"#]);
        assert!(InspectUseCase::new(dir.path()).execute().is_err());
    }

    #[test]
    fn test_field_set_change_fails() {
        let dir = prepared_dir(1, &[
            r#"{"input_ids":[5],"labels":[5]}"#,
            r#"{"attention_mask":[1],"input_ids":[6],"labels":[6]}"#,
        ]);
        assert!(InspectUseCase::new(dir.path()).execute().is_err());
    }

    #[test]
    fn test_missing_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(InspectUseCase::new(dir.path()).execute().is_err());
    }
}
