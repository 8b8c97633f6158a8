// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between a raw JSONL record and a packed block:
//
//   dolly.jsonl
//       │
//       ▼
//   JsonlLoader       → parses one InstructionSample per line
//       │
//       ▼
//   select_first      → optional cap on the number of samples
//       │
//       ▼
//   PromptFormatter   → "### Instruction ... ### Answer ...</s>"
//       │
//       ▼
//   Tokenizer         → (Layer 6) column TokenBatch
//       │
//       ▼
//   SequencePacker    → fixed-length blocks + carried remainder
//
// Each module is responsible for exactly one step.

/// Reads JSON-lines instruction datasets
pub mod loader;

/// Renders samples into prompt strings
pub mod formatter;

/// Sample capping and seeded preview selection
pub mod sampler;

/// Packs token batches into fixed-length blocks
pub mod packer;
