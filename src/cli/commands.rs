// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands `train`, `summarize` and
// `evaluate` with all their configurable flags.
//
// Reference: Rust Book §12 (Building a CLI Program)

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::train_use_case::{TrainConfig, TrainStage};
use crate::infra::pretrained::GenerationOverrides;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fine-tune a pretrained BART checkpoint on (text, summary) pairs
    Train(TrainArgs),

    /// Summarize text with an exported model
    Summarize(SummarizeArgs),

    /// ROUGE scores of an exported model on its held-out test split
    Evaluate(EvaluateArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Table with one article per row (.csv, .tsv, .parquet, .jsonl)
    #[arg(long, default_value = "data/articles.csv")]
    pub data_path: String,

    #[arg(long, default_value = "text")]
    pub text_column: String,

    #[arg(long, default_value = "summary")]
    pub summary_column: String,

    /// Local directory with config.json, tokenizer.json and pytorch_model.bin
    #[arg(long, default_value = "models/bart-large-cnn")]
    pub pretrained_dir: String,

    /// Receives checkpoints/, export/ and metrics.csv
    #[arg(long, default_value = "runs/summarizer")]
    pub output_dir: String,

    /// Article tokens kept per sample, <s> and </s> included
    #[arg(long, default_value_t = 512)]
    pub max_source_len: usize,

    /// Summary tokens kept per sample, <s> and </s> included
    #[arg(long, default_value_t = 128)]
    pub max_target_len: usize,

    #[arg(long, default_value_t = 4)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 0.1)]
    pub valid_frac: f64,

    #[arg(long, default_value_t = 0.1)]
    pub test_frac: f64,

    /// Seed for the split and the data loader shuffle
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Unfreeze stage as GROUPS:EPOCHS:LR_MAX, repeat for more stages.
    /// GROUPS counts parameter groups from the top of the network (1-5).
    #[arg(long = "stage", value_parser = parse_stage, default_values = ["2:1:1e-4", "4:2:4e-5"])]
    pub stages: Vec<TrainStage>,

    #[arg(long, default_value_t = 0.01)]
    pub weight_decay: f64,

    /// Gradient L2 norm limit
    #[arg(long, default_value_t = 1.0)]
    pub grad_clip: f64,

    /// Test articles to summarize after training (0 = skip)
    #[arg(long, default_value_t = 3)]
    pub preview: usize,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_path:      a.data_path,
            text_column:    a.text_column,
            summary_column: a.summary_column,
            pretrained_dir: a.pretrained_dir,
            output_dir:     a.output_dir,
            max_source_len: a.max_source_len,
            max_target_len: a.max_target_len,
            batch_size:     a.batch_size,
            valid_frac:     a.valid_frac,
            test_frac:      a.test_frac,
            seed:           a.seed,
            stages:         a.stages,
            weight_decay:   a.weight_decay,
            grad_clip:      a.grad_clip,
            preview:        a.preview,
        }
    }
}

fn parse_stage(s: &str) -> Result<TrainStage> {
    let parts: Vec<&str> = s.split(':').collect();
    let [groups, epochs, lr] = parts.as_slice() else {
        return Err(anyhow!("expected GROUPS:EPOCHS:LR_MAX, got '{s}'"));
    };
    Ok(TrainStage {
        trainable_groups: groups.trim().parse()?,
        epochs:           epochs.trim().parse()?,
        lr_max:           lr.trim().parse()?,
    })
}

/// Beam search settings; unset flags keep the exported values.
#[derive(Args, Debug, Clone, Default)]
pub struct GenerationArgs {
    #[arg(long)]
    pub num_beams: Option<usize>,

    #[arg(long)]
    pub max_length: Option<usize>,

    #[arg(long)]
    pub min_length: Option<usize>,

    #[arg(long)]
    pub length_penalty: Option<f32>,

    /// 0 disables n-gram blocking
    #[arg(long)]
    pub no_repeat_ngram_size: Option<usize>,

    #[arg(long)]
    pub early_stopping: Option<bool>,
}

impl From<GenerationArgs> for GenerationOverrides {
    fn from(a: GenerationArgs) -> Self {
        GenerationOverrides {
            num_beams:            a.num_beams,
            max_length:           a.max_length,
            min_length:           a.min_length,
            length_penalty:       a.length_penalty,
            no_repeat_ngram_size: a.no_repeat_ngram_size,
            early_stopping:       a.early_stopping,
        }
    }
}

#[derive(Args, Debug)]
pub struct SummarizeArgs {
    /// Text to summarize
    #[arg(long, conflicts_with = "input", required_unless_present = "input")]
    pub text: Option<String>,

    /// Table whose text column is summarized row by row
    #[arg(long)]
    pub input: Option<PathBuf>,

    #[arg(long, default_value = "text")]
    pub text_column: String,

    /// Output directory of a finished `train` run
    #[arg(long, default_value = "runs/summarizer")]
    pub output_dir: String,

    #[arg(long, default_value_t = 4)]
    pub batch_size: usize,

    #[command(flatten)]
    pub generation: GenerationArgs,
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Output directory of a finished `train` run
    #[arg(long, default_value = "runs/summarizer")]
    pub output_dir: String,

    /// Maximum number of test articles to score
    #[arg(long, default_value_t = 100)]
    pub limit: usize,

    #[arg(long, default_value_t = 4)]
    pub batch_size: usize,

    #[command(flatten)]
    pub generation: GenerationArgs,
}
