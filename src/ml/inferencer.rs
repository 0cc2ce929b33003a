// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Turns article texts into summaries with the exported model:
//
//   texts ──tokenize──► [chunk, src] ──encode once──► encoder states
//                                                       │
//   beam search ◄── log_softmax(last decoder position) ◄┘
//        │              (states selected per beam row)
//        ▼
//   best ids ──decode──► summary strings
//
// Each step re-runs the decoder over the full prefix; there is
// no key/value cache.

use anyhow::{anyhow, ensure, Result};
use burn::{prelude::*, tensor::activation::log_softmax};

use crate::domain::{generation::GenerationConfig, traits::Summarizer};
use crate::infra::{checkpoint::ExportedModel, tokenizer_store::SummaryTokenizer};
use crate::ml::{
    beam::{BeamRow, BeamSearch, StepScorer},
    model::BartModel,
};

pub type InferBackend = burn::backend::Wgpu;

/// Scores beam prefixes against one encoded chunk of articles.
struct ModelScorer<'a, B: Backend> {
    model:          &'a BartModel<B>,
    encoder_states: Tensor<B, 3>,
    attention_mask: Tensor<B, 2, Int>,
    device:         B::Device,
}

impl<B: Backend> StepScorer for ModelScorer<'_, B> {
    fn next_log_probs(&mut self, rows: &[BeamRow<'_>]) -> Result<Vec<Vec<f32>>> {
        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        let n_rows  = rows.len();
        let tgt_len = first.tokens.len();
        ensure!(
            rows.iter().all(|r| r.tokens.len() == tgt_len),
            "beam rows of one step must share a length"
        );

        let items: Vec<i32> = rows.iter().map(|r| r.item as i32).collect();
        let index  = Tensor::<B, 1, Int>::from_ints(items.as_slice(), &self.device);
        let states = self.encoder_states.clone().select(0, index.clone());
        let mask   = self.attention_mask.clone().select(0, index);

        let flat: Vec<i32> = rows
            .iter()
            .flat_map(|r| r.tokens.iter().map(|&t| t as i32))
            .collect();
        let prefix = Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &self.device)
            .reshape([n_rows, tgt_len]);

        let logits = self.model.decode(prefix, states, mask);
        let [_, _, vocab] = logits.dims();
        let last = logits
            .slice([0..n_rows, tgt_len - 1..tgt_len, 0..vocab])
            .reshape([n_rows, vocab]);

        let values = log_softmax(last, 1)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("Cannot read decoder scores: {e:?}"))?;

        Ok(values.chunks(vocab).map(<[f32]>::to_vec).collect())
    }
}

/// Fine-tuned BART + beam search.
pub struct BeamSummarizer<B: Backend> {
    model:          BartModel<B>,
    tokenizer:      SummaryTokenizer,
    search:         BeamSearch,
    max_source_len: usize,
    batch_size:     usize,
    device:         B::Device,
}

impl<B: Backend> BeamSummarizer<B> {
    pub fn new(
        model:          BartModel<B>,
        tokenizer:      SummaryTokenizer,
        generation:     GenerationConfig,
        max_source_len: usize,
        max_positions:  usize,
        batch_size:     usize,
        device:         B::Device,
    ) -> Result<Self> {
        ensure!(batch_size > 0, "batch_size must be at least 1");
        ensure!(
            generation.max_length <= max_positions && max_source_len <= max_positions,
            "max_length ({}) and max_source_len ({}) must not exceed the model's {} positions",
            generation.max_length,
            max_source_len,
            max_positions
        );
        let search = BeamSearch::new(generation)?;
        Ok(Self { model, tokenizer, search, max_source_len, batch_size, device })
    }

    /// Use the export's model, tokenizer and source length with `generation`.
    pub fn from_export(
        exported:   ExportedModel<B>,
        generation: GenerationConfig,
        batch_size: usize,
        device:     B::Device,
    ) -> Result<Self> {
        let max_source_len = exported.train_config.max_source_len;
        let max_positions  = exported.model_config.max_position_embeddings;
        Self::new(
            exported.model,
            exported.tokenizer,
            generation,
            max_source_len,
            max_positions,
            batch_size,
            device,
        )
    }

    fn summarize_chunk(&self, texts: &[String]) -> Result<Vec<String>> {
        let encoded = self.tokenizer.encode_column(texts, self.max_source_len)?;
        let n       = encoded.len();
        let src_len = self.max_source_len;

        let stack = |rows: Vec<i32>| {
            Tensor::<B, 1, Int>::from_ints(rows.as_slice(), &self.device).reshape([n, src_len])
        };
        let input_ids = stack(encoded.iter().flat_map(|e| e.ids.iter().map(|&x| x as i32)).collect());
        let attention_mask =
            stack(encoded.iter().flat_map(|e| e.attention_mask.iter().map(|&x| x as i32)).collect());

        let encoder_states = self.model.encode(input_ids, attention_mask.clone());
        let mut scorer = ModelScorer {
            model: &self.model,
            encoder_states,
            attention_mask,
            device: self.device.clone(),
        };

        let best = self.search.generate(&mut scorer, n)?;
        self.tokenizer.decode_batch(&best)
    }
}

impl<B: Backend> Summarizer for BeamSummarizer<B> {
    fn summarize(&self, texts: &[String]) -> Result<Vec<String>> {
        let mut summaries = Vec::with_capacity(texts.len());
        for (i, chunk) in texts.chunks(self.batch_size).enumerate() {
            tracing::debug!("Summarizing chunk {} ({} articles)", i + 1, chunk.len());
            summaries.extend(self.summarize_chunk(chunk)?);
        }
        Ok(summaries)
    }
}
