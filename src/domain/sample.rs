// ============================================================
// Layer 3 — InstructionSample Domain Type
// ============================================================
// One record of an instruction-following dataset in the
// databricks-dolly-15k layout:
//
//   {
//     "instruction": "What is world of warcraft",
//     "context":     "",
//     "response":    "World of warcraft is a massive online ...",
//     "category":    "open_qa"
//   }
//
// `context` is optional in practice — many records leave it
// empty, and some exports drop the key entirely — so it
// defaults to an empty string. `category` is carried only for
// traceability; it never reaches the prompt.
//
// Reference: Rust Book §5 (Structs and Methods)
//            serde documentation (field attributes)

use serde::{Deserialize, Serialize};

/// A single instruction / optional context / response triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionSample {
    /// The task the model is asked to perform
    pub instruction: String,

    /// Optional supporting passage; empty when the task has none
    #[serde(default)]
    pub context: String,

    /// The reference answer the model should learn to produce
    pub response: String,

    /// Dataset category label (e.g. "closed_qa"), if present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl InstructionSample {
    /// Create a sample without a category label.
    pub fn new(
        instruction: impl Into<String>,
        context:     impl Into<String>,
        response:    impl Into<String>,
    ) -> Self {
        Self {
            instruction: instruction.into(),
            context:     context.into(),
            response:    response.into(),
            category:    None,
        }
    }

    /// True when the sample carries a non-empty context passage
    pub fn has_context(&self) -> bool {
        !self.context.is_empty()
    }
}
