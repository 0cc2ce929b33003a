// ============================================================
// Layer 6 — Pretrained Checkpoint
// ============================================================
// Reads a Hugging Face style BART directory from local disk:
//
//   <dir>/config.json        architecture + generation defaults
//   <dir>/tokenizer.json     byte-level BPE tokenizer
//   <dir>/pytorch_model.bin  weights
//
// Weights are read with burn-import's PyTorchFileRecorder. The
// recorder already transposes Linear weights and renames norm
// weight/bias to gamma/beta; the remaps below only translate
// attention projection names and strip the `model.` prefix.
//
// Keys with no counterpart (the duplicated `embed_tokens`
// tables and `lm_head.weight`, all tied to `shared`) are ignored.

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, Recorder},
};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use regex::Regex;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::generation::GenerationConfig;
use crate::infra::tokenizer_store::SummaryTokenizer;
use crate::ml::model::{BartConfig, BartModel, BartModelRecord};

pub const CONFIG_FILE:  &str = "config.json";
pub const WEIGHTS_FILE: &str = "pytorch_model.bin";

const KEY_REMAPS: [(&str, &str); 5] = [
    ("^model\\.(.+)$",           "$1"),
    ("(.+)\\.q_proj\\.(.+)",     "$1.query.$2"),
    ("(.+)\\.k_proj\\.(.+)",     "$1.key.$2"),
    ("(.+)\\.v_proj\\.(.+)",     "$1.value.$2"),
    ("(.+)\\.out_proj\\.(.+)",   "$1.output.$2"),
];

/// Generation fields that may appear at the top level of config.json
/// or under `task_specific_params.summarization`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationOverrides {
    pub num_beams:            Option<usize>,
    pub max_length:           Option<usize>,
    pub min_length:           Option<usize>,
    pub length_penalty:       Option<f32>,
    pub no_repeat_ngram_size: Option<usize>,
    pub early_stopping:       Option<bool>,
}

impl GenerationOverrides {
    pub fn apply(&self, cfg: &mut GenerationConfig) {
        if let Some(v) = self.num_beams            { cfg.num_beams = v; }
        if let Some(v) = self.max_length           { cfg.max_length = v; }
        if let Some(v) = self.min_length           { cfg.min_length = v; }
        if let Some(v) = self.length_penalty       { cfg.length_penalty = v; }
        if let Some(v) = self.no_repeat_ngram_size { cfg.no_repeat_ngram_size = v; }
        if let Some(v) = self.early_stopping       { cfg.early_stopping = v; }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskSpecificParams {
    pub summarization: Option<GenerationOverrides>,
}

/// The subset of a BART `config.json` this crate understands.
#[derive(Debug, Clone, Deserialize)]
pub struct HfBartConfig {
    pub vocab_size:              usize,
    pub d_model:                 usize,
    pub encoder_layers:          usize,
    pub decoder_layers:          usize,
    pub encoder_attention_heads: usize,
    pub decoder_attention_heads: usize,
    pub encoder_ffn_dim:         usize,
    pub decoder_ffn_dim:         usize,
    pub max_position_embeddings: usize,

    #[serde(default = "default_dropout")]
    pub dropout:           f64,
    #[serde(default)]
    pub attention_dropout: f64,
    #[serde(default)]
    pub scale_embedding:   bool,
    #[serde(default = "default_activation")]
    pub activation_function: String,

    #[serde(default)]
    pub bos_token_id:           u32,
    #[serde(default = "default_pad")]
    pub pad_token_id:           u32,
    #[serde(default = "default_eos")]
    pub eos_token_id:           u32,
    #[serde(default = "default_eos")]
    pub decoder_start_token_id: u32,
    #[serde(default)]
    pub forced_bos_token_id:    Option<u32>,
    #[serde(default)]
    pub forced_eos_token_id:    Option<u32>,

    #[serde(flatten)]
    pub generation: GenerationOverrides,
    #[serde(default)]
    pub task_specific_params: Option<TaskSpecificParams>,
}

fn default_dropout() -> f64 { 0.1 }
fn default_activation() -> String { "gelu".to_string() }
fn default_pad() -> u32 { 1 }
fn default_eos() -> u32 { 2 }

impl HfBartConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_bart_config(&self) -> BartConfig {
        if self.activation_function != "gelu" {
            tracing::warn!(
                "Checkpoint uses activation '{}', model is built with gelu",
                self.activation_function
            );
        }
        BartConfig::new(
            self.vocab_size,
            self.d_model,
            self.encoder_layers,
            self.decoder_layers,
            self.encoder_attention_heads,
            self.decoder_attention_heads,
            self.encoder_ffn_dim,
            self.decoder_ffn_dim,
            self.max_position_embeddings,
        )
        .with_dropout(self.dropout)
        .with_attention_dropout(self.attention_dropout)
        .with_scale_embedding(self.scale_embedding)
        .with_pad_token_id(self.pad_token_id as usize)
    }

    /// Special tokens from the checkpoint; beam settings from the
    /// summarization task params, then top-level fields, then defaults.
    pub fn to_generation_config(&self) -> GenerationConfig {
        let mut cfg = GenerationConfig {
            bos_token_id:           self.bos_token_id,
            decoder_start_token_id: self.decoder_start_token_id,
            eos_token_id:           self.eos_token_id,
            pad_token_id:           self.pad_token_id,
            forced_bos_token_id:    self.forced_bos_token_id,
            forced_eos_token_id:    self.forced_eos_token_id,
            ..GenerationConfig::default()
        };
        self.generation.apply(&mut cfg);
        if let Some(task) = self.task_specific_params.as_ref().and_then(|t| t.summarization.as_ref()) {
            task.apply(&mut cfg);
        }
        cfg
    }
}

/// A local pretrained checkpoint directory.
pub struct PretrainedDir {
    root: PathBuf,
}

impl PretrainedDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn config(&self) -> Result<HfBartConfig> {
        let path = self.root.join(CONFIG_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        HfBartConfig::from_json(&json)
            .with_context(|| format!("Invalid BART config in '{}'", path.display()))
    }

    pub fn tokenizer(&self, hf: &HfBartConfig) -> Result<SummaryTokenizer> {
        SummaryTokenizer::from_dir(&self.root, hf.bos_token_id, hf.eos_token_id, hf.pad_token_id)
    }

    pub fn weights_path(&self) -> PathBuf {
        self.root.join(WEIGHTS_FILE)
    }

    pub fn load_weights<B: Backend>(&self, model: BartModel<B>, device: &B::Device) -> Result<BartModel<B>> {
        load_pretrained_weights(model, &self.weights_path(), device)
    }
}

/// The record path a checkpoint key is read into, remaps applied in
/// order the way burn-import applies them.
pub fn remap_key(key: &str) -> Result<String> {
    let mut name = key.to_string();
    for (from, to) in KEY_REMAPS {
        let pattern = Regex::new(from)?;
        if pattern.is_match(&name) {
            name = pattern.replace_all(&name, to).into_owned();
        }
    }
    Ok(name)
}

/// Load PyTorch weights at `path` into a freshly initialised model.
pub fn load_pretrained_weights<B: Backend>(
    model:  BartModel<B>,
    path:   &Path,
    device: &B::Device,
) -> Result<BartModel<B>> {
    let args = KEY_REMAPS
        .iter()
        .fold(LoadArgs::new(path.to_path_buf()), |args, (from, to)| args.with_key_remap(from, to));

    let record: BartModelRecord<B> = PyTorchFileRecorder::<FullPrecisionSettings>::default()
        .load(args, device)
        .with_context(|| format!("Cannot load pretrained weights from '{}'", path.display()))?;

    tracing::info!("Pretrained weights loaded from '{}'", path.display());
    Ok(model.load_record(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::fixtures::tiny_config;
    use burn::{backend::NdArray, record::Record};
    use serde_json::Value;
    use std::collections::BTreeSet;

    const BART_LARGE_CNN: &str = r#"{
        "activation_function": "gelu",
        "d_model": 1024,
        "decoder_attention_heads": 16,
        "decoder_ffn_dim": 4096,
        "decoder_layers": 12,
        "decoder_start_token_id": 2,
        "encoder_attention_heads": 16,
        "encoder_ffn_dim": 4096,
        "encoder_layers": 12,
        "eos_token_id": 2,
        "forced_bos_token_id": 0,
        "forced_eos_token_id": 2,
        "length_penalty": 2.0,
        "max_length": 142,
        "max_position_embeddings": 1024,
        "min_length": 56,
        "no_repeat_ngram_size": 3,
        "num_beams": 4,
        "pad_token_id": 1,
        "scale_embedding": false,
        "task_specific_params": {
            "summarization": { "length_penalty": 1.0, "max_length": 128, "min_length": 12, "num_beams": 4 }
        },
        "vocab_size": 50264
    }"#;

    #[test]
    fn test_parse_architecture() {
        let hf  = HfBartConfig::from_json(BART_LARGE_CNN).unwrap();
        let cfg = hf.to_bart_config();
        assert_eq!(cfg.vocab_size, 50264);
        assert_eq!(cfg.d_model, 1024);
        assert_eq!(cfg.encoder_layers, 12);
        assert_eq!(cfg.max_position_embeddings, 1024);
        assert_eq!(cfg.dropout, 0.1);
        assert!(!cfg.scale_embedding);
    }

    #[test]
    fn test_task_params_override_top_level() {
        let hf  = HfBartConfig::from_json(BART_LARGE_CNN).unwrap();
        let gen = hf.to_generation_config();
        assert_eq!(gen.max_length, 128);
        assert_eq!(gen.min_length, 12);
        assert_eq!(gen.length_penalty, 1.0);
        assert_eq!(gen.no_repeat_ngram_size, 3);
        assert_eq!(gen.forced_bos_token_id, Some(0));
        assert_eq!(gen.forced_eos_token_id, Some(2));
        assert_eq!(gen.decoder_start_token_id, 2);
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let hf = HfBartConfig::from_json(
            r#"{"vocab_size": 100, "d_model": 16, "encoder_layers": 1, "decoder_layers": 1,
                "encoder_attention_heads": 2, "decoder_attention_heads": 2,
                "encoder_ffn_dim": 32, "decoder_ffn_dim": 32, "max_position_embeddings": 64}"#,
        )
        .unwrap();
        assert_eq!(hf.pad_token_id, 1);
        assert_eq!(hf.eos_token_id, 2);
        assert_eq!(hf.forced_bos_token_id, None);
        assert_eq!(hf.to_generation_config().num_beams, GenerationConfig::default().num_beams);
    }

    /// State dict keys of a BART conditional-generation checkpoint.
    fn hf_keys(encoder_layers: usize, decoder_layers: usize) -> Vec<String> {
        let mut keys = vec![
            "final_logits_bias".to_string(),
            "lm_head.weight".to_string(),
            "model.shared.weight".to_string(),
        ];
        let wb = |keys: &mut Vec<String>, prefix: String| {
            keys.push(format!("{prefix}.weight"));
            keys.push(format!("{prefix}.bias"));
        };
        let attention = |keys: &mut Vec<String>, prefix: String| {
            for proj in ["k_proj", "v_proj", "q_proj", "out_proj"] {
                wb(keys, format!("{prefix}.{proj}"));
            }
        };

        for (side, layers) in [("encoder", encoder_layers), ("decoder", decoder_layers)] {
            keys.push(format!("model.{side}.embed_tokens.weight"));
            keys.push(format!("model.{side}.embed_positions.weight"));
            for i in 0..layers {
                let layer = format!("model.{side}.layers.{i}");
                attention(&mut keys, format!("{layer}.self_attn"));
                wb(&mut keys, format!("{layer}.self_attn_layer_norm"));
                if side == "decoder" {
                    attention(&mut keys, format!("{layer}.encoder_attn"));
                    wb(&mut keys, format!("{layer}.encoder_attn_layer_norm"));
                }
                wb(&mut keys, format!("{layer}.fc1"));
                wb(&mut keys, format!("{layer}.fc2"));
                wb(&mut keys, format!("{layer}.final_layer_norm"));
            }
            wb(&mut keys, format!("model.{side}.layernorm_embedding"));
        }
        keys
    }

    /// Dotted paths of every float parameter in a serialized record.
    fn param_paths(value: &serde_json::Value, prefix: &str, out: &mut BTreeSet<String>) {
        let join = |k: &str| if prefix.is_empty() { k.to_string() } else { format!("{prefix}.{k}") };
        match value {
            Value::Object(map) if map.contains_key("id") && map.contains_key("param") => {
                out.insert(prefix.to_string());
            }
            Value::Object(map) => {
                for (k, v) in map {
                    param_paths(v, &join(k), out);
                }
            }
            Value::Array(items) => {
                for (i, v) in items.iter().enumerate() {
                    param_paths(v, &join(&i.to_string()), out);
                }
            }
            _ => {}
        }
    }

    /// burn-import's adapter renames norm weight/bias to gamma/beta.
    fn adapt_norm(path: String) -> String {
        if path.contains("layer_norm") || path.contains("layernorm") {
            if let Some(stem) = path.strip_suffix(".weight") {
                return format!("{stem}.gamma");
            }
            if let Some(stem) = path.strip_suffix(".bias") {
                return format!("{stem}.beta");
            }
        }
        path
    }

    #[test]
    fn test_remap_key_examples() {
        assert_eq!(
            remap_key("model.encoder.layers.0.self_attn.q_proj.weight").unwrap(),
            "encoder.layers.0.self_attn.query.weight"
        );
        assert_eq!(
            remap_key("model.decoder.layers.3.encoder_attn.out_proj.bias").unwrap(),
            "decoder.layers.3.encoder_attn.output.bias"
        );
        assert_eq!(
            remap_key("model.decoder.layernorm_embedding.bias").unwrap(),
            "decoder.layernorm_embedding.bias"
        );
        assert_eq!(remap_key("final_logits_bias").unwrap(), "final_logits_bias");
        assert_eq!(remap_key("lm_head.weight").unwrap(), "lm_head.weight");
    }

    #[test]
    fn test_remapped_keys_cover_model_record() {
        let cfg   = tiny_config();
        let model: BartModel<NdArray> = cfg.init(&Default::default());
        let item  = model.into_record().into_item::<FullPrecisionSettings>();
        let json  = serde_json::to_value(item).unwrap();

        let mut expected = BTreeSet::new();
        param_paths(&json, "", &mut expected);

        let mut loaded  = BTreeSet::new();
        let mut ignored = BTreeSet::new();
        for key in hf_keys(cfg.encoder_layers, cfg.decoder_layers) {
            let path = adapt_norm(remap_key(&key).unwrap());
            if expected.contains(&path) {
                loaded.insert(path);
            } else {
                ignored.insert(path);
            }
        }

        assert_eq!(loaded, expected);
        let ignored: Vec<&str> = ignored.iter().map(String::as_str).collect();
        assert_eq!(
            ignored,
            vec!["decoder.embed_tokens.weight", "encoder.embed_tokens.weight", "lm_head.weight"]
        );
    }

    #[test]
    fn test_loaded_record_keeps_configured_constants() {
        let device = Default::default();
        let scaled: BartModel<NdArray> = tiny_config().with_scale_embedding(true).init(&device);
        let plain:  BartModel<NdArray> = tiny_config().init(&device);

        let model = scaled.load_record(plain.into_record());
        assert_eq!(model.embed_scale, (tiny_config().d_model as f64).sqrt());
    }

    #[test]
    fn test_missing_dir_is_error() {
        let dir = PretrainedDir::new("/definitely/not/here");
        assert!(dir.config().is_err());
    }
}
