// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches files or external libraries:
//
//   tokenizer_store.rs — loads a HuggingFace tokenizer.json and
//                        encodes formatted texts in batches
//
//   block_store.rs     — writes packed blocks as JSONL, saves and
//                        reloads the PrepareConfig of a run
//
//   metrics.rs         — per-batch packing statistics as CSV

/// Tokenizer loading and batch encoding
pub mod tokenizer_store;

/// Packed dataset and config persistence
pub mod block_store;

/// Packing metrics CSV logger
pub mod metrics;
