// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Wraps the pretrained checkpoint's `tokenizer.json` so the rest
// of the crate only deals in fixed-length id vectors.
//
// Every encoded sequence is framed the way BART expects:
//
//   <s> content... </s> <pad> <pad> ...
//   └──────── exactly max_len ids ────────┘
//
// Content longer than max_len - 2 is cut before </s> is added,
// so the end-of-sequence marker always survives truncation.
//
// The same tokenizer file is copied into the export directory
// so a reloaded model always decodes with the vocabulary it was
// trained with.

use anyhow::{anyhow, bail, Context, Result};
use std::path::Path;
use tokenizers::Tokenizer;

pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Ids plus attention mask for one framed sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedText {
    pub ids:            Vec<u32>,
    pub attention_mask: Vec<u32>,
}

pub struct SummaryTokenizer {
    inner:  Tokenizer,
    bos_id: u32,
    eos_id: u32,
    pad_id: u32,
}

impl SummaryTokenizer {
    pub fn new(inner: Tokenizer, bos_id: u32, eos_id: u32, pad_id: u32) -> Self {
        Self { inner, bos_id, eos_id, pad_id }
    }

    /// Load `<dir>/tokenizer.json`.
    pub fn from_dir(dir: &Path, bos_id: u32, eos_id: u32, pad_id: u32) -> Result<Self> {
        let path = dir.join(TOKENIZER_FILE);
        let inner = Tokenizer::from_file(&path)
            .map_err(|e| anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))?;
        tracing::debug!(
            "Tokenizer loaded from '{}' (vocab={})",
            path.display(),
            inner.get_vocab_size(true)
        );
        Ok(Self::new(inner, bos_id, eos_id, pad_id))
    }

    /// Write `<dir>/tokenizer.json`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;
        let path = dir.join(TOKENIZER_FILE);
        self.inner
            .save(&path, false)
            .map_err(|e| anyhow!("Cannot write tokenizer to '{}': {}", path.display(), e))
    }

    pub fn pad_id(&self) -> u32 { self.pad_id }

    /// Encode a column of texts into framed, padded sequences of `max_len` ids.
    pub fn encode_column(&self, texts: &[String], max_len: usize) -> Result<Vec<EncodedText>> {
        if max_len < 2 {
            bail!("max_len must leave room for <s> and </s>, got {max_len}");
        }
        let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let encodings = self
            .inner
            .encode_batch(inputs, false)
            .map_err(|e| anyhow!("Tokenisation error: {e}"))?;

        Ok(encodings
            .iter()
            .map(|enc| frame_ids(enc.get_ids(), max_len, self.bos_id, self.eos_id, self.pad_id))
            .collect())
    }

    /// Decode generated ids back to text, dropping special tokens.
    pub fn decode_batch(&self, sequences: &[Vec<u32>]) -> Result<Vec<String>> {
        let refs: Vec<&[u32]> = sequences.iter().map(Vec::as_slice).collect();
        let decoded = self
            .inner
            .decode_batch(&refs, true)
            .map_err(|e| anyhow!("Decode: {e}"))?;
        Ok(decoded.into_iter().map(|s| s.trim().to_string()).collect())
    }
}

/// Wrap `content` as `bos content eos`, truncated and right-padded to `max_len`.
pub fn frame_ids(content: &[u32], max_len: usize, bos: u32, eos: u32, pad: u32) -> EncodedText {
    let keep = content.len().min(max_len.saturating_sub(2));

    let mut ids = Vec::with_capacity(max_len);
    ids.push(bos);
    ids.extend_from_slice(&content[..keep]);
    ids.push(eos);

    let mut attention_mask = vec![1u32; ids.len()];
    ids.resize(max_len, pad);
    attention_mask.resize(max_len, 0);

    EncodedText { ids, attention_mask }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use std::str::FromStr;

    /// A tiny word-level tokenizer with BART's special token ids.
    pub fn word_level() -> SummaryTokenizer {
        let json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [
                {"id": 0, "content": "<s>",   "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": 1, "content": "<pad>", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": 2, "content": "</s>",  "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": 3, "content": "<unk>", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}
            ],
            "normalizer": null,
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": {
                    "<s>": 0, "<pad>": 1, "</s>": 2, "<unk>": 3,
                    "the": 4, "cat": 5, "sat": 6, "on": 7, "mat": 8, "a": 9
                },
                "unk_token": "<unk>"
            }
        });
        let inner = Tokenizer::from_str(&json.to_string()).unwrap();
        SummaryTokenizer::new(inner, 0, 2, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_pads_short_content() {
        let e = frame_ids(&[7, 8], 6, 0, 2, 1);
        assert_eq!(e.ids, vec![0, 7, 8, 2, 1, 1]);
        assert_eq!(e.attention_mask, vec![1, 1, 1, 1, 0, 0]);
    }

    #[test]
    fn test_frame_truncates_before_eos() {
        let e = frame_ids(&[10, 11, 12, 13, 14], 4, 0, 2, 1);
        assert_eq!(e.ids, vec![0, 10, 11, 2]);
        assert_eq!(e.attention_mask, vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_frame_empty_content() {
        let e = frame_ids(&[], 3, 0, 2, 1);
        assert_eq!(e.ids, vec![0, 2, 1]);
    }

    #[test]
    fn test_encode_column_fixed_length() {
        let tok = fixtures::word_level();
        let out = tok
            .encode_column(&["the cat sat".to_string(), "a".to_string()], 5)
            .unwrap();
        assert_eq!(out[0].ids, vec![0, 4, 5, 6, 2]);
        assert_eq!(out[1].ids, vec![0, 9, 2, 1, 1]);
    }

    #[test]
    fn test_encode_rejects_tiny_max_len() {
        let tok = fixtures::word_level();
        assert!(tok.encode_column(&["the".to_string()], 1).is_err());
    }

    #[test]
    fn test_decode_skips_special_tokens() {
        let tok = fixtures::word_level();
        let out = tok.decode_batch(&[vec![2, 0, 4, 5, 2, 1, 1]]).unwrap();
        assert_eq!(out, vec!["the cat".to_string()]);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let tok = fixtures::word_level();
        tok.save(dir.path()).unwrap();

        let reloaded = SummaryTokenizer::from_dir(dir.path(), 0, 2, 1).unwrap();
        let ids = reloaded.encode_column(&["on the mat".to_string()], 6).unwrap();
        assert_eq!(ids[0].ids, vec![0, 7, 4, 8, 2, 1]);
    }
}
