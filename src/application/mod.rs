// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// one user-facing goal each.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Fine-tune the pretrained checkpoint and export it
pub mod train_use_case;

// Summarize new text with the export
pub mod summarize_use_case;

// ROUGE on the held-out test split
pub mod evaluate_use_case;
