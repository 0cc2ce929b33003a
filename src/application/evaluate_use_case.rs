// ============================================================
// Layer 2 — Evaluate Use Case
// ============================================================
// Scores the exported summarizer on the held-out test split:
//
//   train_config.json ──► same table, same cleaning, same seed
//                     ──► identical test split
//   first `limit` test articles ──► summaries ──► ROUGE-1/2/L
//
// The split is rebuilt from the saved config, so evaluating a
// changed data file gives a different (and meaningless) split.

use anyhow::{bail, Result};
use serde::Serialize;
use std::path::Path;

use crate::application::train_use_case::{prepare_splits, TrainConfig};
use crate::domain::traits::Summarizer;
use crate::infra::{checkpoint::CheckpointManager, pretrained::GenerationOverrides};
use crate::ml::{
    inferencer::{BeamSummarizer, InferBackend},
    rouge::RougeScores,
};

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub articles: usize,
    pub scores:   RougeScores,
}

pub struct EvaluateUseCase<S: Summarizer> {
    summarizer: S,
    config:     TrainConfig,
    limit:      usize,
}

impl EvaluateUseCase<BeamSummarizer<InferBackend>> {
    pub fn from_export(
        output_dir: impl AsRef<Path>,
        overrides:  &GenerationOverrides,
        batch_size: usize,
        limit:      usize,
    ) -> Result<Self> {
        let device   = burn::backend::wgpu::WgpuDevice::default();
        let exported = CheckpointManager::open(output_dir).load_export::<InferBackend>(&device)?;
        let config   = exported.train_config.clone();

        let mut generation = exported.generation.clone();
        overrides.apply(&mut generation);

        let summarizer = BeamSummarizer::from_export(exported, generation, batch_size, device)?;
        Ok(Self::new(summarizer, config, limit))
    }
}

impl<S: Summarizer> EvaluateUseCase<S> {
    pub fn new(summarizer: S, config: TrainConfig, limit: usize) -> Self {
        Self { summarizer, config, limit }
    }

    pub fn execute(&self) -> Result<EvaluationReport> {
        let splits = prepare_splits(&self.config)?;
        let test: Vec<_> = splits.test.into_iter().take(self.limit).collect();
        if test.is_empty() {
            bail!(
                "The test split of '{}' is empty (test_frac = {})",
                self.config.data_path,
                self.config.test_frac
            );
        }
        tracing::info!("Evaluating on {} test article(s)", test.len());

        let texts: Vec<String> = test.iter().map(|p| p.text.clone()).collect();
        let generated = self.summarizer.summarize(&texts)?;

        let per_article: Vec<RougeScores> = generated
            .iter()
            .zip(&test)
            .map(|(candidate, pair)| RougeScores::score(candidate, &pair.summary))
            .collect();

        Ok(EvaluationReport {
            articles: per_article.len(),
            scores:   RougeScores::aggregate(&per_article),
        })
    }
}
