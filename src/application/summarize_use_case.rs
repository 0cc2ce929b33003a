// ============================================================
// Layer 2 — Summarize Use Case
// ============================================================
// Reloads the exported summarizer and runs it on either one
// piece of text or every row of a table's text column. Input
// text gets the same cleaning as the training data.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

use crate::data::{loader::TableLoader, preprocessor::Preprocessor};
use crate::domain::traits::{RecordSource, Summarizer};
use crate::infra::{checkpoint::CheckpointManager, pretrained::GenerationOverrides};
use crate::ml::inferencer::{BeamSummarizer, InferBackend};

/// What to summarize.
#[derive(Debug, Clone)]
pub enum SummarizeInput {
    Text(String),
    File { path: PathBuf, text_column: String },
}

pub struct SummarizeUseCase<S: Summarizer> {
    summarizer: S,
}

impl SummarizeUseCase<BeamSummarizer<InferBackend>> {
    /// Load `<output_dir>/export` on the default GPU device.
    pub fn from_export(
        output_dir: impl AsRef<Path>,
        overrides:  &GenerationOverrides,
        batch_size: usize,
    ) -> Result<Self> {
        let device   = burn::backend::wgpu::WgpuDevice::default();
        let exported = CheckpointManager::open(output_dir).load_export::<InferBackend>(&device)?;

        let mut generation = exported.generation.clone();
        overrides.apply(&mut generation);

        let summarizer = BeamSummarizer::from_export(exported, generation, batch_size, device)?;
        Ok(Self::new(summarizer))
    }
}

impl<S: Summarizer> SummarizeUseCase<S> {
    pub fn new(summarizer: S) -> Self {
        Self { summarizer }
    }

    /// Returns (input text, summary) in input order.
    pub fn execute(&self, input: SummarizeInput) -> Result<Vec<(String, String)>> {
        let preprocessor = Preprocessor::new();
        let texts: Vec<String> = match input {
            SummarizeInput::Text(text) => vec![preprocessor.clean(&text)],
            SummarizeInput::File { path, text_column } => {
                let loader = TableLoader::new(path, text_column, "summary");
                loader
                    .load_records()?
                    .into_iter()
                    .map(|r| preprocessor.clean(&r.text))
                    .collect()
            }
        };

        let texts: Vec<String> = texts.into_iter().filter(|t| !t.is_empty()).collect();
        if texts.is_empty() {
            bail!("Nothing to summarize: the input text is empty");
        }
        tracing::info!("Summarizing {} article(s)", texts.len());

        let summaries = self.summarizer.summarize(&texts)?;
        Ok(texts.into_iter().zip(summaries).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Returns the first word of each text.
    struct FirstWord;

    impl Summarizer for FirstWord {
        fn summarize(&self, texts: &[String]) -> Result<Vec<String>> {
            Ok(texts
                .iter()
                .map(|t| t.split_whitespace().next().unwrap_or_default().to_string())
                .collect())
        }
    }

    #[test]
    fn test_single_text_is_cleaned() {
        let use_case = SummarizeUseCase::new(FirstWord);
        let out = use_case
            .execute(SummarizeInput::Text("  Breaking\u{00A0}news   today ".to_string()))
            .unwrap();
        assert_eq!(out, vec![("Breaking news today".to_string(), "Breaking".to_string())]);
    }

    #[test]
    fn test_file_rows_in_order() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.jsonl");
        std::fs::write(
            &path,
            "{\"body\": \"alpha one\"}\n{\"body\": \"   \"}\n{\"body\": \"beta two\"}\n",
        )
        .unwrap();

        let use_case = SummarizeUseCase::new(FirstWord);
        let out = use_case
            .execute(SummarizeInput::File { path, text_column: "body".to_string() })
            .unwrap();
        let summaries: Vec<&str> = out.iter().map(|(_, s)| s.as_str()).collect();
        assert_eq!(summaries, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_blank_text_is_error() {
        let use_case = SummarizeUseCase::new(FirstWord);
        assert!(use_case.execute(SummarizeInput::Text(" \n ".to_string())).is_err());
    }
}
