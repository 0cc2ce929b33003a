// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// clap, hands off to a use case and prints what comes back.
//
//   1. `train`       fine-tune and export a summarizer
//   2. `summarize`   summarize --text or a table of articles
//   3. `evaluate`    ROUGE on the held-out test split
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvaluateArgs, SummarizeArgs, TrainArgs};

use crate::application::summarize_use_case::SummarizeInput;

#[derive(Parser, Debug)]
#[command(
    name = "article-summarizer",
    version = "0.1.0",
    about = "Fine-tune a pretrained BART checkpoint on article/summary pairs, then summarize with beam search."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case. The CLI layer only routes
    /// and prints.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)     => run_train(args),
            Commands::Summarize(args) => run_summarize(args),
            Commands::Evaluate(args)  => run_evaluate(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Fine-tuning '{}' on '{}'", args.pretrained_dir, args.data_path);
    let output_dir = args.output_dir.clone();

    let report = TrainUseCase::new(args.into()).execute()?;

    println!(
        "Training complete: {} train / {} valid / {} test pairs. Export saved under '{}/export'.",
        report.train_pairs, report.valid_pairs, report.test_pairs, output_dir,
    );
    for (i, (text, reference, generated)) in report.previews.iter().enumerate() {
        println!("\n── Preview {} ──", i + 1);
        println!("Article:   {}", preview_text(text, 300));
        println!("Reference: {reference}");
        println!("Generated: {generated}");
    }
    Ok(())
}

fn run_summarize(args: SummarizeArgs) -> Result<()> {
    use crate::application::summarize_use_case::SummarizeUseCase;

    let use_case = SummarizeUseCase::from_export(
        &args.output_dir,
        &args.generation.into(),
        args.batch_size,
    )?;

    let input = match (args.text, args.input) {
        (Some(text), _)    => SummarizeInput::Text(text),
        (None, Some(path)) => SummarizeInput::File { path, text_column: args.text_column },
        (None, None)       => anyhow::bail!("Pass --text or --input"),
    };

    let results = use_case.execute(input)?;
    if let [(_, summary)] = results.as_slice() {
        println!("\nSummary: {summary}");
    } else {
        for (i, (text, summary)) in results.iter().enumerate() {
            println!("\n[{}] {}", i + 1, preview_text(text, 120));
            println!("    → {summary}");
        }
    }
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let use_case = EvaluateUseCase::from_export(
        &args.output_dir,
        &args.generation.into(),
        args.batch_size,
        args.limit,
    )?;
    let report = use_case.execute()?;

    println!("\nROUGE on {} test articles", report.articles);
    println!("  rouge1  = {:.4}", report.scores.rouge1);
    println!("  rouge2  = {:.4}", report.scores.rouge2);
    println!("  rougeL  = {:.4}", report.scores.rouge_l);
    Ok(())
}

/// First `max_chars` characters, with an ellipsis when cut.
fn preview_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None           => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_text() {
        assert_eq!(preview_text("short", 10), "short");
        assert_eq!(preview_text("héllo world", 5), "héllo…");
    }
}
