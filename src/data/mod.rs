// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from a table file on disk to tensor batches.
//
//   table file (csv / tsv / parquet / jsonl)
//       │
//       ▼
//   TableLoader       → ArticleRecord rows
//       │
//       ▼
//   Preprocessor      → whitespace-normalised text
//       │
//       ▼
//   split_three_way   → train / valid / test
//       │
//       ▼
//   SummaryTokenizer  → fixed-length id sequences (infra)
//       │
//       ▼
//   SummaryDataset    → implements Burn's Dataset trait
//       │
//       ▼
//   SummaryBatcher    → stacks samples into tensor batches
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads csv / tsv / parquet / jsonl tables
pub mod loader;

/// Normalises raw article and summary text
pub mod preprocessor;

/// Implements Burn's Dataset trait for summary samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Seeded train / valid / test split
pub mod splitter;
