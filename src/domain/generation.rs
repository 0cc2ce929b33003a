// ============================================================
// Layer 3 — Generation Settings
// ============================================================
// Everything beam search needs to know, independent of the
// model that produces the scores. The defaults mirror the
// summarization settings shipped with the bart-large-cnn
// checkpoint; `HfBartConfig` overrides them from config.json.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Number of hypotheses kept alive per article
    pub num_beams: usize,

    /// Maximum length of a generated sequence, decoder start token included
    pub max_length: usize,

    /// EOS is banned until the sequence reaches this length
    pub min_length: usize,

    /// Exponent applied to the hypothesis length when ranking finished beams.
    /// Values > 1.0 favour longer summaries.
    pub length_penalty: f32,

    /// Forbid any n-gram of this size from appearing twice (0 = off)
    pub no_repeat_ngram_size: usize,

    /// Stop an article as soon as `num_beams` hypotheses are finished
    pub early_stopping: bool,

    pub bos_token_id:           u32,
    pub decoder_start_token_id: u32,
    pub eos_token_id:           u32,
    pub pad_token_id:           u32,

    /// Token forced at the first generated position
    pub forced_bos_token_id: Option<u32>,

    /// Token forced when `max_length` is reached
    pub forced_eos_token_id: Option<u32>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            num_beams:              4,
            max_length:             142,
            min_length:             56,
            length_penalty:         2.0,
            no_repeat_ngram_size:   3,
            early_stopping:         true,
            bos_token_id:           0,
            decoder_start_token_id: 2,
            eos_token_id:           2,
            pad_token_id:           1,
            forced_bos_token_id:    Some(0),
            forced_eos_token_id:    Some(2),
        }
    }
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_beams == 0 {
            bail!("num_beams must be at least 1");
        }
        if self.max_length < 2 {
            bail!("max_length must be at least 2, got {}", self.max_length);
        }
        if self.min_length > self.max_length {
            bail!(
                "min_length ({}) cannot exceed max_length ({})",
                self.min_length,
                self.max_length
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(GenerationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_beams() {
        let cfg = GenerationConfig { num_beams: 0, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_min_above_max() {
        let cfg = GenerationConfig { min_length: 50, max_length: 20, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_tiny_max_length() {
        let cfg = GenerationConfig { min_length: 0, max_length: 1, ..Default::default() };
        assert!(cfg.validate().is_err());
    }
}
