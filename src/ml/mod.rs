// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All tensor code lives here:
//
//   model.rs        BART encoder-decoder built from burn::nn
//   loss.rs         padding-masked token cross entropy
//   freeze.rs       the five parameter groups and freeze_to
//   schedule.rs     one-cycle cosine learning rate
//   trainer.rs      staged fine-tuning loop
//   beam.rs         batched beam search over a StepScorer
//   inferencer.rs   model-backed scorer + BeamSummarizer
//   rouge.rs        ROUGE-1/2/L for `evaluate`
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Lewis et al. (2020) BART

pub mod model;

pub mod loss;

pub mod freeze;

pub mod schedule;

/// Staged training loop with validation and checkpointing
pub mod trainer;

pub mod beam;

/// Inference engine: reloads the export and generates summaries
pub mod inferencer;

pub mod rouge;
