// ============================================================
// Layer 3 — Token Records and Batches
// ============================================================
// A TokenRecord is what the tokenizer produces for ONE formatted
// sample: parallel arrays that all describe the same token
// positions.
//
//   text:            "### Instruction\nSay hi\n\n### Answer\nhi</s>"
//   input_ids:       [   1,  835, 2799, ...,    2]
//   attention_mask:  [   1,    1,    1, ...,    1]
//
// A TokenBatch is the column-oriented view of many records —
// the shape a batched dataset map hands to a transformation:
//
//   {
//     "input_ids":      [[1, 835, ...], [1, 29871, ...], ...],
//     "attention_mask": [[1, 1, ...],   [1, 1, ...],     ...],
//   }
//
// Field names are plain strings kept in a BTreeMap, so extra
// fields such as "token_type_ids" flow through without any
// special-casing and iteration order is always the same.
//
// Reference: Rust Book §8 (Collections)

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Token identifiers produced by the tokenizer
pub const INPUT_IDS: &str = "input_ids";

/// Per-token attention flags (1 = attend, 0 = ignore)
pub const ATTENTION_MASK: &str = "attention_mask";

/// Segment ids, emitted only by tokenizers that use them
pub const TOKEN_TYPE_IDS: &str = "token_type_ids";

/// Next-token-prediction targets, derived from `input_ids`
pub const LABELS: &str = "labels";

/// The tokenizer output for one formatted sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub input_ids:      Vec<u32>,
    pub attention_mask: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type_ids: Option<Vec<u32>>,
}

impl TokenRecord {
    pub fn new(input_ids: Vec<u32>, attention_mask: Vec<u32>) -> Self {
        Self { input_ids, attention_mask, token_type_ids: None }
    }

    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

/// Column-oriented batch: field name → one token sequence per record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenBatch {
    fields: BTreeMap<String, Vec<Vec<u32>>>,
}

impl TokenBatch {
    /// An empty batch with no fields
    pub fn new() -> Self {
        Self::default()
    }

    /// Transpose row-oriented records into field columns.
    ///
    /// `token_type_ids` becomes a column as soon as any record
    /// carries it; records without it contribute an empty entry,
    /// which the packer will reject as a length mismatch.
    pub fn from_records(records: &[TokenRecord]) -> Self {
        let mut batch = Self::new();
        if records.is_empty() {
            return batch;
        }

        batch.insert(INPUT_IDS, records.iter().map(|r| r.input_ids.clone()).collect());
        batch.insert(
            ATTENTION_MASK,
            records.iter().map(|r| r.attention_mask.clone()).collect(),
        );

        if records.iter().any(|r| r.token_type_ids.is_some()) {
            batch.insert(
                TOKEN_TYPE_IDS,
                records
                    .iter()
                    .map(|r| r.token_type_ids.clone().unwrap_or_default())
                    .collect(),
            );
        }

        batch
    }

    /// Insert (or replace) a whole field column
    pub fn insert(&mut self, field: impl Into<String>, values: Vec<Vec<u32>>) {
        self.fields.insert(field.into(), values);
    }

    /// Builder-style variant of [`TokenBatch::insert`]
    pub fn with_field(mut self, field: impl Into<String>, values: Vec<Vec<u32>>) -> Self {
        self.insert(field, values);
        self
    }

    pub fn get(&self, field: &str) -> Option<&[Vec<u32>]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    /// Iterate fields in key order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &[Vec<u32>])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// True when there are no fields, or no field has any record
    pub fn is_empty(&self) -> bool {
        self.fields.values().all(Vec::is_empty)
    }

    /// Number of records in the reference field
    pub fn record_count(&self) -> usize {
        self.reference_column().map_or(0, <[Vec<u32>]>::len)
    }

    /// Number of tokens across all records of the reference field
    pub fn token_count(&self) -> usize {
        self.reference_column()
            .map_or(0, |rows| rows.iter().map(Vec::len).sum())
    }

    fn reference_column(&self) -> Option<&[Vec<u32>]> {
        self.get(INPUT_IDS)
            .or_else(|| self.fields.values().next().map(Vec::as_slice))
    }
}

impl From<BTreeMap<String, Vec<Vec<u32>>>> for TokenBatch {
    fn from(fields: BTreeMap<String, Vec<Vec<u32>>>) -> Self {
        Self { fields }
    }
}
