// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers to accomplish one goal each.
//
// Rules for this layer:
//   - No packing or tokenisation logic here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination

// Format → tokenize → pack → write
pub mod prepare_use_case;

// Verify a prepared dataset on disk
pub mod inspect_use_case;
