// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full fine-tuning pipeline in order:
//
//   Step 1: Load the table               (Layer 4 - data)
//   Step 2: Clean the text               (Layer 4 - data)
//   Step 3: Drop rows without a summary  (Layer 3 - domain)
//   Step 4: Split train/valid/test       (Layer 4 - data)
//   Step 5: Tokenize both columns        (Layer 6 - infra)
//   Step 6: Build datasets               (Layer 4 - data)
//   Step 7: Save config                  (Layer 6 - infra)
//   Step 8: Staged training              (Layer 5 - ml)
//   Step 9: Export                       (Layer 6 - infra)
//   Step 10: Preview summaries           (Layer 5 - ml)
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::{bail, Context, Result};
use burn::module::AutodiffModule;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::data::{
    dataset::{SummaryDataset, SummarySample},
    loader::TableLoader,
    preprocessor::Preprocessor,
    splitter::{split_three_way, Splits},
};
use crate::domain::{
    article::SummaryPair,
    traits::{RecordSource, Summarizer},
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::MetricsLogger,
    pretrained::PretrainedDir,
    tokenizer_store::SummaryTokenizer,
};
use crate::ml::{
    freeze::ParamGroup,
    inferencer::{BeamSummarizer, InferBackend},
    model::BartConfig,
    trainer::run_training,
};

// ─── Training Configuration ──────────────────────────────────────────────────
// All settings for a fine-tuning run. Saved next to the export so
// `evaluate` can reproduce the exact split.

/// One unfreeze stage: the top `trainable_groups` parameter groups
/// are trained for `epochs` with a one-cycle peak of `lr_max`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainStage {
    pub trainable_groups: usize,
    pub epochs:           usize,
    pub lr_max:           f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_path:      String,
    pub text_column:    String,
    pub summary_column: String,
    pub pretrained_dir: String,
    pub output_dir:     String,
    pub max_source_len: usize,
    pub max_target_len: usize,
    pub batch_size:     usize,
    pub valid_frac:     f64,
    pub test_frac:      f64,
    pub seed:           u64,
    pub stages:         Vec<TrainStage>,
    pub weight_decay:   f64,
    pub grad_clip:      f64,
    /// Test articles summarized after export (0 = skip)
    pub preview:        usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_path:      "data/articles.csv".to_string(),
            text_column:    "text".to_string(),
            summary_column: "summary".to_string(),
            pretrained_dir: "models/bart-large-cnn".to_string(),
            output_dir:     "runs/summarizer".to_string(),
            max_source_len: 512,
            max_target_len: 128,
            batch_size:     4,
            valid_frac:     0.1,
            test_frac:      0.1,
            seed:           42,
            stages: vec![
                TrainStage { trainable_groups: 2, epochs: 1, lr_max: 1e-4 },
                TrainStage { trainable_groups: 4, epochs: 2, lr_max: 4e-5 },
            ],
            weight_decay:   0.01,
            grad_clip:      1.0,
            preview:        3,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }
        if self.max_source_len < 2 || self.max_target_len < 2 {
            bail!("max_source_len and max_target_len must be at least 2");
        }
        if self.stages.is_empty() {
            bail!("at least one training stage is required");
        }
        for (i, stage) in self.stages.iter().enumerate() {
            if stage.trainable_groups == 0 || stage.trainable_groups > ParamGroup::ALL.len() {
                bail!(
                    "stage {}: trainable_groups must be within 1..={}, got {}",
                    i + 1,
                    ParamGroup::ALL.len(),
                    stage.trainable_groups
                );
            }
            if stage.epochs == 0 {
                bail!("stage {}: epochs must be at least 1", i + 1);
            }
            if stage.lr_max.is_nan() || stage.lr_max <= 0.0 {
                bail!("stage {}: lr_max must be positive, got {}", i + 1, stage.lr_max);
            }
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Cannot write config to '{}'", path.display()))
    }
}

/// Counts and preview output of a finished run.
#[derive(Debug, Clone, Default)]
pub struct TrainReport {
    pub train_pairs: usize,
    pub valid_pairs: usize,
    pub test_pairs:  usize,
    /// (article, reference summary, generated summary)
    pub previews:    Vec<(String, String, String)>,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TrainReport> {
        let cfg = &self.config;
        cfg.validate()?;

        // ── Steps 1-4: load, clean, filter, split ─────────────────────────────
        let splits = prepare_splits(cfg)?;
        if splits.train.is_empty() {
            bail!("No usable (text, summary) pairs left for training in '{}'", cfg.data_path);
        }
        tracing::info!(
            "Split: {} train, {} valid, {} test",
            splits.train.len(),
            splits.valid.len(),
            splits.test.len()
        );

        // ── Step 5: pretrained config + tokenizer ─────────────────────────────
        let pretrained = PretrainedDir::new(&cfg.pretrained_dir);
        let hf         = pretrained.config()?;
        let model_cfg  = hf.to_bart_config();
        let generation = hf.to_generation_config();
        let tokenizer  = pretrained.tokenizer(&hf)?;
        check_lengths(cfg, &model_cfg)?;

        let decoder_start = generation.decoder_start_token_id;
        let train_samples = build_samples(&splits.train, &tokenizer, cfg, decoder_start)?;
        let valid_samples = build_samples(&splits.valid, &tokenizer, cfg, decoder_start)?;
        let target_tokens: usize = train_samples
            .iter()
            .map(|s| s.target_tokens(tokenizer.pad_id()))
            .sum();
        tracing::info!(
            "Tokenized {} train samples ({} summary tokens per epoch)",
            train_samples.len(),
            target_tokens
        );

        // ── Step 6: Burn datasets ─────────────────────────────────────────────
        let train_dataset = SummaryDataset::new(train_samples);
        let valid_dataset = SummaryDataset::new(valid_samples);

        // ── Step 7: save config ───────────────────────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.output_dir)?;
        let metrics      = MetricsLogger::new(&cfg.output_dir)?;
        cfg.save(&Path::new(&cfg.output_dir).join("train_config.json"))?;

        // ── Step 8: staged training (Layer 5) ─────────────────────────────────
        let model = run_training(
            cfg,
            &model_cfg,
            &pretrained,
            train_dataset,
            valid_dataset,
            &ckpt_manager,
            &metrics,
        )?;
        let last = ckpt_manager.latest_checkpoint()?;
        tracing::info!("Last checkpoint: stage {} epoch {}", last.stage, last.epoch);

        // ── Step 9: export ────────────────────────────────────────────────────
        ckpt_manager.export(&model.valid(), &model_cfg, &generation, cfg, &tokenizer)?;

        let mut report = TrainReport {
            train_pairs: splits.train.len(),
            valid_pairs: splits.valid.len(),
            test_pairs:  splits.test.len(),
            previews:    Vec::new(),
        };

        // ── Step 10: reload the export and preview a few test articles ───────
        let preview: Vec<SummaryPair> = splits.test.into_iter().take(cfg.preview).collect();
        if !preview.is_empty() {
            let device   = burn::backend::wgpu::WgpuDevice::default();
            let exported = ckpt_manager.load_export::<InferBackend>(&device)?;
            let summarizer =
                BeamSummarizer::from_export(exported, generation, cfg.batch_size, device)?;

            let texts: Vec<String> = preview.iter().map(|p| p.text.clone()).collect();
            let generated = summarizer.summarize(&texts)?;
            report.previews = preview
                .into_iter()
                .zip(generated)
                .map(|(pair, summary)| (pair.text, pair.summary, summary))
                .collect();
        }

        Ok(report)
    }
}

/// Load, clean and split the configured table. `evaluate` calls this
/// with the saved config to get the same test split back.
pub fn prepare_splits(cfg: &TrainConfig) -> Result<Splits<SummaryPair>> {
    tracing::info!("Loading articles from '{}'", cfg.data_path);
    let loader  = TableLoader::new(&cfg.data_path, &cfg.text_column, &cfg.summary_column);
    let records = loader.load_records()?;
    let total   = records.len();

    let preprocessor = Preprocessor::new();
    let pairs: Vec<SummaryPair> = records
        .into_iter()
        .filter_map(|r| r.into_pair())
        .map(|p| preprocessor.clean_pair(p))
        .filter(|p| !p.text.is_empty() && !p.summary.is_empty())
        .collect();
    tracing::info!("Kept {} of {} rows with a non-empty summary", pairs.len(), total);

    split_three_way(pairs, cfg.valid_frac, cfg.test_frac, cfg.seed)
}

/// Tokenize both columns into fixed-length samples.
pub fn build_samples(
    pairs:         &[SummaryPair],
    tokenizer:     &SummaryTokenizer,
    cfg:           &TrainConfig,
    decoder_start: u32,
) -> Result<Vec<SummarySample>> {
    let texts:     Vec<String> = pairs.iter().map(|p| p.text.clone()).collect();
    let summaries: Vec<String> = pairs.iter().map(|p| p.summary.clone()).collect();

    let sources = tokenizer.encode_column(&texts, cfg.max_source_len)?;
    let targets = tokenizer.encode_column(&summaries, cfg.max_target_len)?;

    Ok(sources
        .into_iter()
        .zip(targets)
        .map(|(src, tgt)| SummarySample::new(src.ids, src.attention_mask, tgt.ids, decoder_start))
        .collect())
}

fn check_lengths(cfg: &TrainConfig, model_cfg: &BartConfig) -> Result<()> {
    let limit = model_cfg.max_position_embeddings;
    if cfg.max_source_len > limit || cfg.max_target_len > limit {
        bail!(
            "max_source_len ({}) and max_target_len ({}) must not exceed the model's {} positions",
            cfg.max_source_len,
            cfg.max_target_len,
            limit
        );
    }
    Ok(())
}
