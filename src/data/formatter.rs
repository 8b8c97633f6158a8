// ============================================================
// Layer 4 — Prompt Formatter
// ============================================================
// Turns one structured InstructionSample into the flat training
// string the tokenizer sees.
//
// Layout (the context section is omitted when empty):
//
//   ### Instruction
//   What is world of warcraft
//
//   ### Context
//   ...
//
//   ### Answer
//   World of warcraft is a massive online ...</s>
//
// The trailing EOS token matters: after packing, several samples
// share one block, and EOS is the only boundary the model sees
// between them.

use crate::domain::sample::InstructionSample;

/// End-of-sequence token of the Llama-2 tokenizer
pub const DEFAULT_EOS_TOKEN: &str = "</s>";

pub struct PromptFormatter {
    eos_token: String,
}

impl PromptFormatter {
    pub fn new(eos_token: impl Into<String>) -> Self {
        Self { eos_token: eos_token.into() }
    }

    pub fn eos_token(&self) -> &str {
        &self.eos_token
    }

    /// Render the prompt sections, without the EOS token.
    pub fn format(&self, sample: &InstructionSample) -> String {
        let instruction = format!("### Instruction\n{}", sample.instruction);
        let context     = sample
            .has_context()
            .then(|| format!("### Context\n{}", sample.context));
        let response    = format!("### Answer\n{}", sample.response);

        [Some(instruction), context, Some(response)]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// The full training text: formatted prompt followed by EOS.
    pub fn template(&self, sample: &InstructionSample) -> String {
        let mut text = self.format(sample);
        text.push_str(&self.eos_token);
        text
    }
}

impl Default for PromptFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_EOS_TOKEN)
    }
}
