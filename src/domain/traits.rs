// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer talks to loaders and summarizers through
// these traits, so a new input format or a different decoding
// strategy only has to implement one of them.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use crate::domain::article::ArticleRecord;

// ─── RecordSource ─────────────────────────────────────────────────────────────
/// Any component that can produce article rows.
///
/// Implementations:
///   - TableLoader → CSV / TSV / Parquet / JSON Lines files
pub trait RecordSource {
    /// Load every usable row from this source.
    fn load_records(&self) -> Result<Vec<ArticleRecord>>;
}

// ─── Summarizer ───────────────────────────────────────────────────────────────
/// Any component that turns article texts into summaries.
///
/// Implementations:
///   - BeamSummarizer → fine-tuned BART + beam search
pub trait Summarizer {
    /// Returns exactly one summary per input text, in order.
    fn summarize(&self, texts: &[String]) -> Result<Vec<String>>;
}
