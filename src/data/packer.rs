// ============================================================
// Layer 4 — Sequence Packer
// ============================================================
// Concatenates tokenized records and cuts them into blocks of
// exactly `block_length` tokens for causal-LM training.
//
// Why pack instead of pad?
//   The training loop needs uniform tensor shapes. Padding every
//   short sample up to 2048 tokens would waste most of the
//   compute on [PAD]. Instead, samples are laid end to end (each
//   one already ends with an EOS token from the formatter) and
//   sliced into full windows.
//
// How it works with block_length = 4:
//
//   remainder:  [5]                      (left over from last call)
//   batch:      [[6, 7, 8], [9, 10]]
//   flat:       [5, 6, 7, 8, 9, 10]
//   blocks:     [5, 6, 7, 8]
//   remainder:  [9, 10]                  (carried to the next call)
//
// Every field ("input_ids", "attention_mask", ...) describes the
// same token positions, so all fields are cut at the same
// offsets. `labels` is a copy of each `input_ids` block.
//
// The remainder lives in a caller-owned PackerState. A call that
// fails validation never touches it, so the caller can repair
// the batch and retry without losing carried tokens.
//
// Each worker must own its own PackerState. Token order is only
// preserved within the stream of batches fed to one state.
//
// Reference: Rust Book §8 (Vectors and Slices)
//            Rust Book §9 (Recoverable Errors with Result)

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::record::{TokenBatch, INPUT_IDS, LABELS};

/// Context length of Llama-2, the usual fine-tuning target
pub const DEFAULT_BLOCK_LENGTH: usize = 2048;

// ─── Errors ───────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackError {
    /// Fields disagree on how many tokens they describe.
    /// `record` is set when the mismatch was found inside one record.
    #[error(
        "field '{field}' has {found} tokens but reference field '{reference}' has {expected}{}",
        .record.map(|r| format!(" (record {r})")).unwrap_or_default()
    )]
    InconsistentFieldLength {
        field:     String,
        reference: String,
        expected:  usize,
        found:     usize,
        record:    Option<usize>,
    },

    #[error("invalid packer configuration: {0}")]
    InvalidConfiguration(String),
}

// ─── Configuration ────────────────────────────────────────────────────────────
/// Validated packer settings. `block_length` is the only option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackerConfig {
    block_length: usize,
}

impl PackerConfig {
    /// Fails fast on a zero block length, before any data is seen.
    pub fn new(block_length: usize) -> Result<Self, PackError> {
        if block_length == 0 {
            return Err(PackError::InvalidConfiguration(
                "block_length must be a positive number of tokens".to_string(),
            ));
        }
        Ok(Self { block_length })
    }

    pub fn block_length(&self) -> usize {
        self.block_length
    }
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self { block_length: DEFAULT_BLOCK_LENGTH }
    }
}

// ─── PackerState (the remainder) ──────────────────────────────────────────────
/// Tokens carried from one `pack` call to the next, per field.
///
/// Invariant: every field holds fewer than `block_length` values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackerState {
    remainder: BTreeMap<String, Vec<u32>>,
}

impl PackerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Carried tokens for one field (empty slice if none)
    pub fn remainder(&self, field: &str) -> &[u32] {
        self.remainder.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of carried token positions
    pub fn carried_len(&self) -> usize {
        self.remainder
            .get(INPUT_IDS)
            .or_else(|| self.remainder.values().next())
            .map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.remainder.values().all(Vec::is_empty)
    }

    /// End of stream: the trailing remainder can never form a full
    /// block and is dropped. Returns how many positions were lost.
    pub fn finish(self) -> usize {
        self.carried_len()
    }
}

// ─── PackedBatch ──────────────────────────────────────────────────────────────
/// Output of one `pack` call: field name → emitted blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackedBatch {
    fields: BTreeMap<String, Vec<Vec<u32>>>,
}

impl PackedBatch {
    /// Number of blocks emitted (identical for every field)
    pub fn block_count(&self) -> usize {
        self.fields.values().next().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.block_count() == 0
    }

    pub fn get(&self, field: &str) -> Option<&[Vec<u32>]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Row view over the batch: one `Block` per emitted window
    pub fn blocks(&self) -> impl Iterator<Item = Block<'_>> {
        (0..self.block_count()).map(move |index| Block { batch: self, index })
    }
}

/// One fixed-length training example across all fields.
#[derive(Debug, Clone, Copy)]
pub struct Block<'a> {
    batch: &'a PackedBatch,
    index: usize,
}

impl<'a> Block<'a> {
    pub fn get(&self, field: &str) -> Option<&'a [u32]> {
        self.batch
            .fields
            .get(field)
            .map(|blocks| blocks[self.index].as_slice())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'a str, &'a [u32])> + 'a {
        let index = self.index;
        self.batch
            .fields
            .iter()
            .map(move |(k, blocks)| (k.as_str(), blocks[index].as_slice()))
    }
}

impl Serialize for Block<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.batch.fields.len()))?;
        for (field, values) in self.fields() {
            map.serialize_entry(field, values)?;
        }
        map.end()
    }
}

// ─── SequencePacker ───────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, Default)]
pub struct SequencePacker {
    config: PackerConfig,
}

impl SequencePacker {
    pub fn new(config: PackerConfig) -> Self {
        Self { config }
    }

    pub fn block_length(&self) -> usize {
        self.config.block_length()
    }

    /// Pack one batch, prefixing the carried remainder from `state`.
    ///
    /// All checks run before `state` is modified; on error it is
    /// exactly as it was before the call.
    pub fn pack(
        &self,
        state: &mut PackerState,
        batch: &TokenBatch,
    ) -> Result<PackedBatch, PackError> {
        // Empty batch → nothing new to cut; remainder already < block_length
        if batch.is_empty() {
            return Ok(PackedBatch::default());
        }

        let total_length = validate(state, batch)?;
        let block_length = self.config.block_length();
        let n_blocks     = total_length / block_length;
        let cut          = n_blocks * block_length;

        let mut fields    = BTreeMap::new();
        let mut remainder = BTreeMap::new();

        for (name, rows) in batch.fields() {
            // Remainder first, then records in order
            let carried  = state.remainder(name);
            let mut flat = Vec::with_capacity(total_length);
            flat.extend_from_slice(carried);
            for row in rows {
                flat.extend_from_slice(row);
            }

            let blocks: Vec<Vec<u32>> = flat[..cut]
                .chunks_exact(block_length)
                .map(<[u32]>::to_vec)
                .collect();

            remainder.insert(name.to_string(), flat[cut..].to_vec());
            fields.insert(name.to_string(), blocks);
        }

        if let Some(ids) = fields.get(INPUT_IDS) {
            let labels = ids.clone();
            fields.insert(LABELS.to_string(), labels);
        }

        tracing::trace!(
            total_length,
            n_blocks,
            carried = total_length - cut,
            "packed batch"
        );

        state.remainder = remainder;
        Ok(PackedBatch { fields })
    }
}

/// Check that every field agrees on length, record by record and
/// in total after remainder prefixing. Returns the total length.
fn validate(state: &PackerState, batch: &TokenBatch) -> Result<usize, PackError> {
    if batch.contains_field(LABELS) {
        return Err(PackError::InvalidConfiguration(format!(
            "'{LABELS}' is derived from '{INPUT_IDS}' and cannot be supplied in a batch"
        )));
    }

    let reference = if batch.contains_field(INPUT_IDS) {
        INPUT_IDS
    } else {
        // is_empty() was checked by the caller, so a field exists
        batch.field_names().next().unwrap_or(INPUT_IDS)
    };
    let ref_rows  = batch.get(reference).unwrap_or(&[]);
    let ref_total = state.remainder(reference).len()
        + ref_rows.iter().map(Vec::len).sum::<usize>();

    for (name, rows) in batch.fields() {
        if name == reference {
            continue;
        }

        for (i, row) in rows.iter().enumerate() {
            let expected = ref_rows.get(i).map_or(0, Vec::len);
            if row.len() != expected {
                return Err(mismatch(name, reference, expected, row.len(), Some(i)));
            }
        }

        let total = state.remainder(name).len() + rows.iter().map(Vec::len).sum::<usize>();
        if total != ref_total {
            return Err(mismatch(name, reference, ref_total, total, None));
        }
    }

    // A field carried in the remainder must still be present
    for (name, carried) in &state.remainder {
        if !carried.is_empty() && !batch.contains_field(name) {
            return Err(mismatch(name, reference, ref_total, carried.len(), None));
        }
    }

    Ok(ref_total)
}

fn mismatch(
    field:     &str,
    reference: &str,
    expected:  usize,
    found:     usize,
    record:    Option<usize>,
) -> PackError {
    PackError::InconsistentFieldLength {
        field:     field.to_string(),
        reference: reference.to_string(),
        expected,
        found,
        record,
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{ATTENTION_MASK, TOKEN_TYPE_IDS};

    fn packer(block_length: usize) -> SequencePacker {
        SequencePacker::new(PackerConfig::new(block_length).unwrap())
    }

    /// Batch whose attention mask is all ones, matching input_ids
    fn ids_batch(rows: Vec<Vec<u32>>) -> TokenBatch {
        let mask = rows.iter().map(|r| vec![1; r.len()]).collect();
        TokenBatch::new()
            .with_field(INPUT_IDS, rows)
            .with_field(ATTENTION_MASK, mask)
    }

    #[test]
    fn test_two_batch_scenario() {
        let p         = packer(4);
        let mut state = PackerState::new();

        let out = p.pack(&mut state, &ids_batch(vec![vec![1, 2, 3], vec![4, 5]])).unwrap();
        assert_eq!(out.get(INPUT_IDS).unwrap(), &[vec![1, 2, 3, 4]]);
        assert_eq!(state.remainder(INPUT_IDS), &[5]);

        let out = p.pack(&mut state, &ids_batch(vec![vec![6, 7, 8, 9, 10]])).unwrap();
        assert_eq!(out.get(INPUT_IDS).unwrap(), &[vec![5, 6, 7, 8]]);
        assert_eq!(state.remainder(INPUT_IDS), &[9, 10]);
        assert_eq!(state.remainder(ATTENTION_MASK), &[1, 1]);
    }

    #[test]
    fn test_labels_copy_input_ids() {
        let p         = packer(3);
        let mut state = PackerState::new();
        let out = p.pack(&mut state, &ids_batch(vec![(0..10).collect()])).unwrap();

        assert_eq!(out.block_count(), 3);
        assert_eq!(out.get(LABELS), out.get(INPUT_IDS));
        for block in out.blocks() {
            assert_eq!(block.get(LABELS), block.get(INPUT_IDS));
            for (_, values) in block.fields() {
                assert_eq!(values.len(), 3);
            }
        }
    }

    #[test]
    fn test_no_labels_without_input_ids() {
        let p         = packer(2);
        let mut state = PackerState::new();
        let batch     = TokenBatch::new().with_field(ATTENTION_MASK, vec![vec![1, 1, 1]]);
        let out       = p.pack(&mut state, &batch).unwrap();

        assert_eq!(out.block_count(), 1);
        assert!(out.get(LABELS).is_none());
        assert_eq!(state.remainder(ATTENTION_MASK), &[1]);
    }

    #[test]
    fn test_exact_fit_leaves_empty_remainder() {
        let p         = packer(4);
        let mut state = PackerState::new();
        let out = p.pack(&mut state, &ids_batch(vec![vec![1, 2], vec![3, 4]])).unwrap();

        assert_eq!(out.block_count(), 1);
        assert!(state.is_empty());
        assert_eq!(state.finish(), 0);
    }

    #[test]
    fn test_short_input_emits_nothing_and_carries_all() {
        let p         = packer(8);
        let mut state = PackerState::new();
        let out = p.pack(&mut state, &ids_batch(vec![vec![1, 2, 3]])).unwrap();

        assert!(out.is_empty());
        assert_eq!(state.remainder(INPUT_IDS), &[1, 2, 3]);
    }

    #[test]
    fn test_empty_batch_keeps_remainder() {
        let p         = packer(4);
        let mut state = PackerState::new();
        p.pack(&mut state, &ids_batch(vec![vec![1, 2, 3, 4, 5]])).unwrap();
        let before = state.clone();

        let out = p.pack(&mut state, &TokenBatch::new()).unwrap();
        assert!(out.is_empty());
        assert_eq!(state, before);

        let out = p.pack(&mut state, &ids_batch(Vec::new())).unwrap();
        assert!(out.is_empty());
        assert_eq!(state, before);
    }

    #[test]
    fn test_mismatched_totals_leave_state_untouched() {
        let p         = packer(4);
        let mut state = PackerState::new();
        p.pack(&mut state, &ids_batch(vec![vec![1, 2, 3, 4, 5]])).unwrap();
        let before = state.clone();

        // 10 ids against 9 mask values, spread over different record counts
        let batch = TokenBatch::new()
            .with_field(INPUT_IDS, vec![(0..10).collect()])
            .with_field(ATTENTION_MASK, vec![vec![1; 9]]);
        let err = p.pack(&mut state, &batch).unwrap_err();

        assert!(matches!(
            err,
            PackError::InconsistentFieldLength { ref field, record: Some(0), .. }
                if field == ATTENTION_MASK
        ));
        assert_eq!(state, before);
    }

    #[test]
    fn test_mismatched_totals_across_records() {
        let p         = packer(4);
        let mut state = PackerState::new();

        // Per-record lengths agree for record 0, but ids have an extra record
        let batch = TokenBatch::new()
            .with_field(INPUT_IDS, vec![vec![1; 9], vec![2]])
            .with_field(ATTENTION_MASK, vec![vec![1; 9]]);
        let err = p.pack(&mut state, &batch).unwrap_err();

        assert_eq!(
            err,
            PackError::InconsistentFieldLength {
                field:     ATTENTION_MASK.to_string(),
                reference: INPUT_IDS.to_string(),
                expected:  10,
                found:     9,
                record:    None,
            }
        );
        assert!(state.is_empty());
    }

    #[test]
    fn test_field_dropped_while_carrying_remainder_is_rejected() {
        let p         = packer(4);
        let mut state = PackerState::new();
        p.pack(&mut state, &ids_batch(vec![vec![1, 2, 3, 4, 5]])).unwrap();

        let batch = TokenBatch::new().with_field(INPUT_IDS, vec![vec![6, 7, 8]]);
        let err   = p.pack(&mut state, &batch).unwrap_err();
        assert!(matches!(err, PackError::InconsistentFieldLength { .. }));
        assert_eq!(state.remainder(INPUT_IDS), &[5]);
    }

    #[test]
    fn test_supplied_labels_are_rejected() {
        let p         = packer(4);
        let mut state = PackerState::new();
        p.pack(&mut state, &ids_batch(vec![vec![1, 2, 3, 4, 5]])).unwrap();
        let before = state.clone();

        let batch = ids_batch(vec![vec![6, 7, 8]]).with_field(LABELS, vec![vec![9, 9, 9]]);
        let err   = p.pack(&mut state, &batch).unwrap_err();

        assert!(matches!(err, PackError::InvalidConfiguration(_)));
        assert_eq!(state, before);
        assert!(state.remainder(LABELS).is_empty());
    }

    #[test]
    fn test_mask_stays_aligned_across_carry() {
        let p         = packer(3);
        let mut state = PackerState::new();

        let first = TokenBatch::new()
            .with_field(INPUT_IDS, vec![vec![1, 2], vec![3, 4]])
            .with_field(ATTENTION_MASK, vec![vec![1, 0], vec![0, 1]]);
        let out = p.pack(&mut state, &first).unwrap();
        assert_eq!(out.get(INPUT_IDS).unwrap(), &[vec![1, 2, 3]]);
        assert_eq!(out.get(ATTENTION_MASK).unwrap(), &[vec![1, 0, 0]]);
        assert_eq!(state.remainder(INPUT_IDS), &[4]);
        assert_eq!(state.remainder(ATTENTION_MASK), &[1]);

        // The carried mask value must lead the next block, not a fresh one
        let second = TokenBatch::new()
            .with_field(INPUT_IDS, vec![vec![5, 6]])
            .with_field(ATTENTION_MASK, vec![vec![0, 0]]);
        let out = p.pack(&mut state, &second).unwrap();
        assert_eq!(out.get(INPUT_IDS).unwrap(), &[vec![4, 5, 6]]);
        assert_eq!(out.get(ATTENTION_MASK).unwrap(), &[vec![1, 0, 0]]);
        assert_eq!(out.get(LABELS).unwrap(), &[vec![4, 5, 6]]);
        assert!(state.is_empty());
    }

    #[test]
    fn test_extra_field_is_packed_uniformly() {
        let p         = packer(2);
        let mut state = PackerState::new();
        let batch = ids_batch(vec![vec![1, 2, 3]])
            .with_field(TOKEN_TYPE_IDS, vec![vec![0, 0, 1]]);
        let out = p.pack(&mut state, &batch).unwrap();

        assert_eq!(out.get(TOKEN_TYPE_IDS).unwrap(), &[vec![0, 0]]);
        assert_eq!(state.remainder(TOKEN_TYPE_IDS), &[1]);
        let names: Vec<&str> = out.field_names().collect();
        assert_eq!(names, vec![ATTENTION_MASK, INPUT_IDS, LABELS, TOKEN_TYPE_IDS]);
    }

    #[test]
    fn test_conservation_and_remainder_bound() {
        let block_length = 5;
        let p            = packer(block_length);
        let mut state    = PackerState::new();

        let batches: Vec<Vec<Vec<u32>>> = vec![
            vec![vec![1], vec![2, 3, 4, 5, 6, 7]],
            vec![],
            vec![vec![8, 9]],
            vec![(10..23).collect(), vec![23]],
            vec![vec![24, 25, 26]],
        ];

        let mut seen    = Vec::new();
        let mut emitted = Vec::new();
        for rows in batches {
            seen.extend(rows.iter().flatten().copied());
            let out = p.pack(&mut state, &ids_batch(rows)).unwrap();
            for block in out.get(INPUT_IDS).unwrap_or(&[]) {
                assert_eq!(block.len(), block_length);
                emitted.extend_from_slice(block);
            }
            assert!(state.remainder(INPUT_IDS).len() < block_length);
            assert!(state.remainder(ATTENTION_MASK).len() < block_length);
        }

        emitted.extend_from_slice(state.remainder(INPUT_IDS));
        assert_eq!(emitted, seen);
    }

    #[test]
    fn test_deterministic_across_runs() {
        let run = || {
            let p         = packer(3);
            let mut state = PackerState::new();
            let a = p.pack(&mut state, &ids_batch(vec![vec![1, 2], vec![3, 4]])).unwrap();
            let b = p.pack(&mut state, &ids_batch(vec![vec![5, 6, 7, 8]])).unwrap();
            (a, b, state)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_zero_block_length_is_rejected() {
        assert!(matches!(
            PackerConfig::new(0),
            Err(PackError::InvalidConfiguration(_))
        ));
        assert_eq!(PackerConfig::default().block_length(), DEFAULT_BLOCK_LENGTH);
    }

    #[test]
    fn test_block_serialises_as_flat_object() {
        let p         = packer(2);
        let mut state = PackerState::new();
        let out       = p.pack(&mut state, &ids_batch(vec![vec![7, 8]])).unwrap();
        let block     = out.blocks().next().unwrap();

        let json = serde_json::to_string(&block).unwrap();
        assert_eq!(
            json,
            r#"{"attention_mask":[1,1],"input_ids":[7,8],"labels":[7,8]}"#
        );
    }
}
