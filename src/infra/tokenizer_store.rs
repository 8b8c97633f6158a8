// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Loads a HuggingFace `tokenizer.json` (for example the one
// shipped with NousResearch/Llama-2-7b-hf) and encodes batches
// of formatted texts into column-oriented TokenBatches.
//
// `path` may point at the JSON file itself or at a model
// directory that contains it.
//
// Reference: tokenizers crate documentation

use anyhow::Result;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

use crate::domain::record::{TokenBatch, TokenRecord};
use crate::domain::traits::BatchEncoder;

pub const TOKENIZER_FILE: &str = "tokenizer.json";

pub struct TokenizerStore {
    tokenizer:          Tokenizer,
    add_special_tokens: bool,
    with_type_ids:      bool,
}

impl TokenizerStore {
    /// Load from a `tokenizer.json` file or a directory containing one.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = resolve(path.as_ref());
        let tokenizer = Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!(
                "Cannot load tokenizer from '{}': {}", path.display(), e
            ))?;

        tracing::info!(
            "Loaded tokenizer from '{}' (vocab size {})",
            path.display(),
            tokenizer.get_vocab_size(true)
        );

        Ok(Self {
            tokenizer,
            add_special_tokens: true,
            with_type_ids:      false,
        })
    }

    /// Whether the tokenizer's post-processor adds BOS/EOS etc.
    pub fn with_special_tokens(mut self, add: bool) -> Self {
        self.add_special_tokens = add;
        self
    }

    /// Emit a `token_type_ids` column alongside ids and mask
    pub fn with_type_ids(mut self, emit: bool) -> Self {
        self.with_type_ids = emit;
        self
    }

    pub fn token_id(&self, token: &str) -> Option<u32> {
        self.tokenizer.token_to_id(token)
    }
}

impl BatchEncoder for TokenizerStore {
    fn encode_batch(&self, texts: &[String]) -> Result<TokenBatch> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), self.add_special_tokens)
            .map_err(|e| anyhow::anyhow!("Tokenisation error: {e}"))?;

        let records: Vec<TokenRecord> = encodings
            .iter()
            .map(|enc| TokenRecord {
                input_ids:      enc.get_ids().to_vec(),
                attention_mask: enc.get_attention_mask().to_vec(),
                token_type_ids: self.with_type_ids.then(|| enc.get_type_ids().to_vec()),
            })
            .collect();

        Ok(TokenBatch::from_records(&records))
    }
}

fn resolve(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(TOKENIZER_FILE)
    } else {
        path.to_path_buf()
    }
}

/// Write a tiny whitespace/word-level tokenizer for tests.
/// Vocabulary: [UNK]=0, </s>=1, then `words` from id 2.
#[cfg(test)]
pub(crate) fn write_test_tokenizer(dir: &Path, words: &[&str]) -> PathBuf {
    let mut vocab = serde_json::json!({ "[UNK]": 0, "</s>": 1 });
    for (i, w) in words.iter().enumerate() {
        vocab[*w] = serde_json::json!(i + 2);
    }

    let special = |id: u32, content: &str| serde_json::json!({
        "id": id, "content": content, "single_word": false, "lstrip": false,
        "rstrip": false, "normalized": false, "special": true
    });

    let json = serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [special(0, "[UNK]"), special(1, "</s>")],
        "normalizer": null,
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": { "type": "WordLevel", "vocab": vocab, "unk_token": "[UNK]" }
    });

    let path = dir.join(TOKENIZER_FILE);
    std::fs::write(&path, serde_json::to_string_pretty(&json).unwrap()).unwrap();
    path
}
