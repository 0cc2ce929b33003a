// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem on behalf of the
// other layers:
//
//   pretrained.rs        reads config.json + pytorch_model.bin
//                        from a local BART checkpoint directory
//
//   tokenizer_store.rs   the checkpoint's tokenizer.json, framed
//                        into fixed-length <s> … </s> sequences
//
//   checkpoint.rs        per-epoch CompactRecorder checkpoints
//                        and the final export directory
//
//   metrics.rs           one CSV row per epoch
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Pretrained checkpoint directory and weight loading
pub mod pretrained;

/// Tokenizer loading, framing and decoding
pub mod tokenizer_store;

/// Model checkpoint saving and export
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
