// ============================================================
// Layer 5 — Sequence Loss
// ============================================================
// Token-level cross entropy for the summary decoder:
//
//   loss = -Σ log p(target_t) / max(1, #non-pad targets)
//
// Padding positions are masked out of both the numerator and
// the count, so a batch with short summaries is weighted by the
// tokens it actually contains rather than by its padded length.

use burn::{prelude::*, tensor::activation::log_softmax};

#[derive(Debug, Clone, Copy)]
pub struct SequenceLoss {
    pad_id: u32,
}

impl SequenceLoss {
    pub fn new(pad_id: u32) -> Self {
        Self { pad_id }
    }

    /// logits: [batch, tgt, vocab], targets: [batch, tgt] → scalar loss [1]
    pub fn forward<B: Backend>(&self, logits: Tensor<B, 3>, targets: Tensor<B, 2, Int>) -> Tensor<B, 1> {
        let [batch_size, tgt_len, _] = logits.dims();

        let log_probs = log_softmax(logits, 2);
        let picked = log_probs
            .gather(2, targets.clone().reshape([batch_size, tgt_len, 1]))
            .reshape([batch_size, tgt_len]);

        let mask  = targets.not_equal_elem(self.pad_id as i32).float();
        let count = mask.clone().sum().clamp_min(1.0);

        (picked * mask).sum().neg() / count
    }
}
