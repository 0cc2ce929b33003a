// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Owns two directories under the run's output directory:
//
//   <output>/checkpoints/
//     stage1_epoch1.mpk        ← CompactRecorder (half precision)
//     stage2_epoch1.mpk
//     ...
//     latest_checkpoint.json   ← {"stage": 2, "epoch": 2}
//
//   <output>/export/
//     summarizer.mpk.gz        ← full-precision weights
//     model_config.json        ← BartConfig, rebuilds the network
//     generation_config.json   ← beam search settings
//     train_config.json        ← split seed and fractions for `evaluate`
//     tokenizer.json           ← the vocabulary the model was trained with
//
// Epoch checkpoints are for resuming by hand; the export is
// the only thing `summarize` and `evaluate` read.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{anyhow, Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, FullPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::domain::generation::GenerationConfig;
use crate::infra::tokenizer_store::SummaryTokenizer;
use crate::ml::model::{BartConfig, BartModel};

const CHECKPOINT_DIR:    &str = "checkpoints";
const EXPORT_DIR:        &str = "export";
const LATEST_FILE:       &str = "latest_checkpoint.json";
const WEIGHTS_STEM:      &str = "summarizer";
const MODEL_CONFIG:      &str = "model_config.json";
const GENERATION_CONFIG: &str = "generation_config.json";
const TRAIN_CONFIG:      &str = "train_config.json";

type ExportRecorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestCheckpoint {
    pub stage: usize,
    pub epoch: usize,
}

/// Everything needed to run a trained summarizer.
pub struct ExportedModel<B: Backend> {
    pub model:        BartModel<B>,
    pub model_config: BartConfig,
    pub generation:   GenerationConfig,
    pub train_config: TrainConfig,
    pub tokenizer:    SummaryTokenizer,
}

pub struct CheckpointManager {
    checkpoint_dir: PathBuf,
    export_dir:     PathBuf,
}

impl CheckpointManager {
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self> {
        let output_dir     = output_dir.as_ref();
        let checkpoint_dir = output_dir.join(CHECKPOINT_DIR);
        let export_dir     = output_dir.join(EXPORT_DIR);
        fs::create_dir_all(&checkpoint_dir)
            .with_context(|| format!("Cannot create '{}'", checkpoint_dir.display()))?;
        Ok(Self { checkpoint_dir, export_dir })
    }

    /// Only for readers of an existing export; creates nothing.
    pub fn open(output_dir: impl AsRef<Path>) -> Self {
        let output_dir = output_dir.as_ref();
        Self {
            checkpoint_dir: output_dir.join(CHECKPOINT_DIR),
            export_dir:     output_dir.join(EXPORT_DIR),
        }
    }

    /// Save the weights reached at the end of `epoch` of `stage`.
    pub fn save_model<B: Backend>(&self, model: &BartModel<B>, stage: usize, epoch: usize) -> Result<()> {
        let path = self.checkpoint_dir.join(format!("stage{stage}_epoch{epoch}"));

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        let latest = LatestCheckpoint { stage, epoch };
        let latest_path = self.checkpoint_dir.join(LATEST_FILE);
        fs::write(&latest_path, serde_json::to_string(&latest)?)
            .with_context(|| format!("Failed to write '{}'", latest_path.display()))?;

        tracing::debug!("Saved checkpoint: stage {} epoch {}", stage, epoch);
        Ok(())
    }

    pub fn latest_checkpoint(&self) -> Result<LatestCheckpoint> {
        let path = self.checkpoint_dir.join(LATEST_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot find '{}'. Has training saved an epoch yet?", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn export<B: Backend>(
        &self,
        model:        &BartModel<B>,
        model_config: &BartConfig,
        generation:   &GenerationConfig,
        train_config: &TrainConfig,
        tokenizer:    &SummaryTokenizer,
    ) -> Result<()> {
        let dir = &self.export_dir;
        fs::create_dir_all(dir).with_context(|| format!("Cannot create '{}'", dir.display()))?;

        let weights = dir.join(WEIGHTS_STEM);
        ExportRecorder::new()
            .record(model.clone().into_record(), weights.clone())
            .with_context(|| format!("Failed to export weights to '{}'", weights.display()))?;

        let model_path = dir.join(MODEL_CONFIG);
        model_config
            .save(&model_path)
            .with_context(|| format!("Cannot write '{}'", model_path.display()))?;

        write_json(&dir.join(GENERATION_CONFIG), generation)?;
        write_json(&dir.join(TRAIN_CONFIG), train_config)?;
        tokenizer.save(dir)?;

        tracing::info!("Exported summarizer to '{}'", dir.display());
        Ok(())
    }

    /// Rebuild the exported model on `device`.
    pub fn load_export<B: Backend>(&self, device: &B::Device) -> Result<ExportedModel<B>> {
        let dir = &self.export_dir;
        let model_path = dir.join(MODEL_CONFIG);
        if !model_path.exists() {
            return Err(anyhow!(
                "No exported model in '{}'. Run 'train' first.",
                dir.display()
            ));
        }

        let model_config = BartConfig::load(&model_path)
            .map_err(|e| anyhow!("Cannot read '{}': {}", model_path.display(), e))?;
        let generation: GenerationConfig = read_json(&dir.join(GENERATION_CONFIG))?;
        let train_config: TrainConfig    = read_json(&dir.join(TRAIN_CONFIG))?;
        let tokenizer = SummaryTokenizer::from_dir(
            dir,
            generation.bos_token_id,
            generation.eos_token_id,
            generation.pad_token_id,
        )?;

        let weights = dir.join(WEIGHTS_STEM);
        let record = ExportRecorder::new()
            .load(weights.clone(), device)
            .with_context(|| format!("Cannot load exported weights '{}'", weights.display()))?;
        let model = model_config.init::<B>(device).load_record(record);

        tracing::info!("Loaded summarizer from '{}'", dir.display());
        Ok(ExportedModel { model, model_config, generation, train_config, tokenizer })
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Cannot write '{}'", path.display()))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Invalid JSON in '{}'", path.display()))
}
