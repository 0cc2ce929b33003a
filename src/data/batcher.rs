// ============================================================
// Layer 4 — Summary Batcher
// ============================================================
// Implements Burn's Batcher trait to stack Vec<SummarySample>
// into Int tensors.
//
//   Input:  N samples, sources padded to S, targets padded to T
//   Output: input_ids / attention_mask      [N, S]
//           decoder_input_ids / labels      [N, T]
//
// Samples are padded ahead of time by the tokenizer wrapper,
// so every row in a batch already has the same length.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::SummarySample;

#[derive(Debug, Clone)]
pub struct SummaryBatch<B: Backend> {
    /// Article token ids, [batch, src_len]
    pub input_ids: Tensor<B, 2, Int>,

    /// 1 = real token, 0 = padding, [batch, src_len]
    pub attention_mask: Tensor<B, 2, Int>,

    /// Teacher-forced decoder input, [batch, tgt_len]
    pub decoder_input_ids: Tensor<B, 2, Int>,

    /// Summary token ids the model must predict, [batch, tgt_len]
    pub labels: Tensor<B, 2, Int>,
}

#[derive(Clone, Debug)]
pub struct SummaryBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> SummaryBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    fn stack(&self, rows: Vec<&[u32]>) -> Tensor<B, 2, Int> {
        let batch_size = rows.len();
        let seq_len    = rows.first().map(|r| r.len()).unwrap_or(0);
        let flat: Vec<i32> = rows
            .iter()
            .flat_map(|r| r.iter().map(|&x| x as i32))
            .collect();

        Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len])
    }
}

impl<B: Backend> Batcher<SummarySample, SummaryBatch<B>> for SummaryBatcher<B> {
    fn batch(&self, items: Vec<SummarySample>) -> SummaryBatch<B> {
        let input_ids         = self.stack(items.iter().map(|s| s.input_ids.as_slice()).collect());
        let attention_mask    = self.stack(items.iter().map(|s| s.attention_mask.as_slice()).collect());
        let decoder_input_ids = self.stack(items.iter().map(|s| s.decoder_input_ids.as_slice()).collect());
        let labels            = self.stack(items.iter().map(|s| s.labels.as_slice()).collect());

        SummaryBatch { input_ids, attention_mask, decoder_input_ids, labels }
    }
}
