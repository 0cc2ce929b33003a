// ============================================================
// Layer 4 — Summary Dataset
// ============================================================
// Tokenised samples held in memory behind burn's `Dataset`.

use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// One tokenised (article, summary) example, padded to fixed lengths.
///
/// Encoder side:  <s> article </s> <pad>...
/// Labels:        <s> summary </s> <pad>...
/// Decoder input: labels shifted one step right behind the decoder start token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarySample {
    pub input_ids:         Vec<u32>,
    pub attention_mask:    Vec<u32>,
    pub decoder_input_ids: Vec<u32>,
    pub labels:            Vec<u32>,
}

impl SummarySample {
    pub fn new(
        input_ids:        Vec<u32>,
        attention_mask:   Vec<u32>,
        labels:           Vec<u32>,
        decoder_start_id: u32,
    ) -> Self {
        let decoder_input_ids = shift_tokens_right(&labels, decoder_start_id);
        Self { input_ids, attention_mask, decoder_input_ids, labels }
    }

    /// Number of label positions that count towards the loss.
    pub fn target_tokens(&self, pad_id: u32) -> usize {
        self.labels.iter().filter(|&&t| t != pad_id).count()
    }
}

/// Teacher forcing input: `[start, l0, l1, ..., l(n-2)]`.
pub fn shift_tokens_right(labels: &[u32], decoder_start_id: u32) -> Vec<u32> {
    let mut shifted = Vec::with_capacity(labels.len());
    if labels.is_empty() {
        return shifted;
    }
    shifted.push(decoder_start_id);
    shifted.extend_from_slice(&labels[..labels.len() - 1]);
    shifted
}

pub struct SummaryDataset {
    samples: Vec<SummarySample>,
}

impl SummaryDataset {
    pub fn new(samples: Vec<SummarySample>) -> Self { Self { samples } }
}

impl Dataset<SummarySample> for SummaryDataset {
    fn get(&self, index: usize) -> Option<SummarySample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_tokens_right() {
        assert_eq!(shift_tokens_right(&[0, 10, 11, 2, 1], 2), vec![2, 0, 10, 11, 2]);
        assert!(shift_tokens_right(&[], 2).is_empty());
    }

    #[test]
    fn test_sample_keeps_lengths() {
        let s = SummarySample::new(vec![0, 5, 2, 1], vec![1, 1, 1, 0], vec![0, 7, 2], 2);
        assert_eq!(s.decoder_input_ids.len(), s.labels.len());
        assert_eq!(s.target_tokens(1), 3);
    }

    #[test]
    fn test_dataset_get() {
        let s  = SummarySample::new(vec![0, 2], vec![1, 1], vec![0, 2], 2);
        let ds = SummaryDataset::new(vec![s.clone()]);
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.get(0), Some(s));
        assert_eq!(ds.get(1), None);
    }
}
