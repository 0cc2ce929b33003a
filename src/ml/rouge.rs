// ============================================================
// Layer 5 — ROUGE
// ============================================================
// ROUGE-1, ROUGE-2 and ROUGE-L F1 between generated and
// reference summaries. Text is lowercased and split on anything
// that is not alphanumeric.

use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RougeScores {
    pub rouge1: f64,
    pub rouge2: f64,
    pub rouge_l: f64,
}

impl RougeScores {
    pub fn score(candidate: &str, reference: &str) -> Self {
        let c = tokens(candidate);
        let r = tokens(reference);
        Self {
            rouge1:  ngram_f1(&c, &r, 1),
            rouge2:  ngram_f1(&c, &r, 2),
            rouge_l: f1(lcs_len(&c, &r), c.len(), r.len()),
        }
    }

    /// Mean of each metric; zeros for an empty slice.
    pub fn aggregate(scores: &[RougeScores]) -> Self {
        if scores.is_empty() {
            return Self::default();
        }
        let n = scores.len() as f64;
        Self {
            rouge1:  scores.iter().map(|s| s.rouge1).sum::<f64>() / n,
            rouge2:  scores.iter().map(|s| s.rouge2).sum::<f64>() / n,
            rouge_l: scores.iter().map(|s| s.rouge_l).sum::<f64>() / n,
        }
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn ngram_counts(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    if tokens.len() >= n {
        for gram in tokens.windows(n) {
            *counts.entry(gram).or_insert(0) += 1;
        }
    }
    counts
}

fn ngram_f1(candidate: &[String], reference: &[String], n: usize) -> f64 {
    let c = ngram_counts(candidate, n);
    let r = ngram_counts(reference, n);
    let overlap: usize = c
        .iter()
        .map(|(gram, &count)| count.min(r.get(gram).copied().unwrap_or(0)))
        .sum();
    f1(overlap, c.values().sum(), r.values().sum())
}

fn lcs_len(a: &[String], b: &[String]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for x in a {
        for (j, y) in b.iter().enumerate() {
            curr[j + 1] = if x == y { prev[j] + 1 } else { prev[j + 1].max(curr[j]) };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn f1(overlap: usize, candidate_total: usize, reference_total: usize) -> f64 {
    if overlap == 0 || candidate_total == 0 || reference_total == 0 {
        return 0.0;
    }
    let p = overlap as f64 / candidate_total as f64;
    let r = overlap as f64 / reference_total as f64;
    2.0 * p * r / (p + r)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_text_scores_one() {
        let s = RougeScores::score("The cat sat.", "the cat sat");
        assert_eq!(s, RougeScores { rouge1: 1.0, rouge2: 1.0, rouge_l: 1.0 });
    }

    #[test]
    fn test_partial_overlap() {
        // candidate: the cat ran ; reference: the cat sat down
        let s = RougeScores::score("the cat ran", "the cat sat down");
        // unigram overlap 2: p = 2/3, r = 2/4
        assert!((s.rouge1 - 2.0 * (2.0 / 3.0) * 0.5 / (2.0 / 3.0 + 0.5)).abs() < 1e-12);
        // bigram overlap 1 ("the cat"): p = 1/2, r = 1/3
        assert!((s.rouge2 - 2.0 * 0.5 * (1.0 / 3.0) / (0.5 + 1.0 / 3.0)).abs() < 1e-12);
        assert!((s.rouge_l - s.rouge1).abs() < 1e-12);
    }

    #[test]
    fn test_lcs_skips_gaps() {
        let a = tokens("a b c d");
        let b = tokens("a x c y d");
        assert_eq!(lcs_len(&a, &b), 3);
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(RougeScores::score("", "something"), RougeScores::default());
        assert_eq!(RougeScores::score("something", ""), RougeScores::default());
    }

    #[test]
    fn test_aggregate_means() {
        let agg = RougeScores::aggregate(&[
            RougeScores { rouge1: 1.0, rouge2: 0.5, rouge_l: 0.0 },
            RougeScores { rouge1: 0.0, rouge2: 0.5, rouge_l: 1.0 },
        ]);
        assert_eq!(agg, RougeScores { rouge1: 0.5, rouge2: 0.5, rouge_l: 0.5 });
        assert_eq!(RougeScores::aggregate(&[]), RougeScores::default());
    }
}
