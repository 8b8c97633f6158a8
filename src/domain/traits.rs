// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The pipeline only talks to its collaborators through these
// traits, so a different dataset export (CSV, parquet, a remote
// hub) or a different tokenizer backend can be plugged in
// without touching the application layer.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::record::TokenBatch;
use crate::domain::sample::InstructionSample;

// ─── SampleSource ─────────────────────────────────────────────────────────────
/// Any component that can produce instruction samples.
///
/// Implementations:
///   - JsonlLoader → reads a dolly-style JSON-lines export
pub trait SampleSource {
    /// Load every available sample, in source order.
    fn load_all(&self) -> Result<Vec<InstructionSample>>;
}

// ─── BatchEncoder ─────────────────────────────────────────────────────────────
/// Any component that turns formatted texts into a column batch.
///
/// Implementations:
///   - TokenizerStore → HuggingFace `tokenizer.json`
pub trait BatchEncoder {
    /// Encode `texts` in order; one record per text.
    fn encode_batch(&self, texts: &[String]) -> Result<TokenBatch>;
}
