// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits that define what the pipeline
// works on: instruction samples going in, token batches coming
// out of the tokenizer.
//
// Rules for this layer:
//   - NO tokenizer library types here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits

// One dolly-style instruction record
pub mod sample;

// Tokenized records and column-oriented batches
pub mod record;

// Core abstractions (traits) that other layers implement
pub mod traits;
