// ============================================================
// Layer 3 — Article Domain Types
// ============================================================
// An ArticleRecord is one row of the input table. The summary
// column is optional so the same loader can feed inference,
// where only the text is known.
//
// A SummaryPair is the training form: it only exists when the
// summary is present and not blank.
//
// Reference: Rust Book §5 (Structs and Methods)
//            Rust Book §6 (Option)

use serde::{Deserialize, Serialize};

/// One row of the input table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// The article body
    pub text: String,

    /// The reference summary, if the table carries one
    pub summary: Option<String>,
}

impl ArticleRecord {
    pub fn new(text: impl Into<String>, summary: Option<String>) -> Self {
        Self { text: text.into(), summary }
    }

    /// Convert into a training pair, dropping rows whose summary
    /// is missing or only whitespace.
    pub fn into_pair(self) -> Option<SummaryPair> {
        match self.summary {
            Some(summary) if !summary.trim().is_empty() => Some(SummaryPair {
                text: self.text,
                summary,
            }),
            _ => None,
        }
    }
}

/// An (article, summary) example with a non-empty summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryPair {
    pub text:    String,
    pub summary: String,
}

impl SummaryPair {
    pub fn new(text: impl Into<String>, summary: impl Into<String>) -> Self {
        Self { text: text.into(), summary: summary.into() }
    }
}
