// ============================================================
// Layer 5 — Beam Search
// ============================================================
// Batched beam search over any next-token scorer.
//
// Every step asks the scorer once for the log-probabilities of
// all live beams of all unfinished articles. Live beams of one
// article always share the same length, so the scorer can stack
// them into a rectangular decoder input.
//
// Per article and per step:
//   1. mask the scores:  min_length (ban EOS), no-repeat n-grams,
//                        forced BOS at the first position,
//                        forced EOS at max_length - 1
//   2. rank beam score + token log-prob, keep the best 2 × beams
//   3. an EOS candidate ranked inside the first `num_beams`
//      closes a hypothesis scored  sum_logprobs / len^penalty
//   4. every other candidate extends a live beam, until
//      `num_beams` live beams exist again
//
// An article is done once it holds `num_beams` finished
// hypotheses and either early stopping is on or no live beam
// can still beat the worst of them. With one beam the search is
// greedy and ends as soon as EOS is the best token. At max_length
// the remaining live beams are finalised as they are.

use anyhow::{ensure, Result};
use std::cmp::Ordering;

use crate::domain::generation::GenerationConfig;

/// One live beam handed to the scorer.
#[derive(Debug, Clone, Copy)]
pub struct BeamRow<'a> {
    /// Index of the article inside the batch
    pub item:   usize,
    /// Tokens generated so far, decoder start token included
    pub tokens: &'a [u32],
}

/// Produces next-token log-probabilities, one vocabulary row per beam.
pub trait StepScorer {
    fn next_log_probs(&mut self, rows: &[BeamRow<'_>]) -> Result<Vec<Vec<f32>>>;
}

#[derive(Debug, Clone)]
struct Hypothesis {
    tokens: Vec<u32>,
    score:  f32,
}

#[derive(Debug)]
struct FinishedBeams {
    /// (length-normalised score, tokens without the closing EOS)
    hyps:           Vec<(f32, Vec<u32>)>,
    capacity:       usize,
    length_penalty: f32,
    early_stopping: bool,
    done:           bool,
}

impl FinishedBeams {
    fn new(cfg: &GenerationConfig) -> Self {
        Self {
            hyps:           Vec::with_capacity(cfg.num_beams + 1),
            capacity:       cfg.num_beams,
            length_penalty: cfg.length_penalty,
            early_stopping: cfg.early_stopping,
            done:           false,
        }
    }

    fn normalise(&self, sum_logprobs: f32, len: usize) -> f32 {
        sum_logprobs / (len as f32).powf(self.length_penalty)
    }

    fn worst(&self) -> f32 {
        self.hyps.iter().map(|(s, _)| *s).fold(f32::INFINITY, f32::min)
    }

    fn add(&mut self, tokens: Vec<u32>, sum_logprobs: f32) {
        let score = self.normalise(sum_logprobs, tokens.len());
        if self.hyps.len() < self.capacity || score > self.worst() {
            self.hyps.push((score, tokens));
            if self.hyps.len() > self.capacity {
                let worst = self
                    .hyps
                    .iter()
                    .enumerate()
                    .min_by(|a, b| a.1 .0.total_cmp(&b.1 .0))
                    .map(|(i, _)| i);
                if let Some(i) = worst {
                    self.hyps.swap_remove(i);
                }
            }
        }
    }

    fn is_done(&self, best_live: Option<f32>, cur_len: usize) -> bool {
        if self.hyps.len() < self.capacity {
            return false;
        }
        if self.early_stopping {
            return true;
        }
        match best_live {
            Some(sum) => self.normalise(sum, cur_len) <= self.worst(),
            None      => true,
        }
    }

    fn best(&self) -> Option<&Vec<u32>> {
        self.hyps
            .iter()
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, tokens)| tokens)
    }
}

pub struct BeamSearch {
    cfg: GenerationConfig,
}

impl BeamSearch {
    pub fn new(cfg: GenerationConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    /// Run beam search for `batch_size` articles and return the best
    /// token sequence of each, decoder start token included.
    pub fn generate<S: StepScorer>(&self, scorer: &mut S, batch_size: usize) -> Result<Vec<Vec<u32>>> {
        let cfg = &self.cfg;
        let start = Hypothesis { tokens: vec![cfg.decoder_start_token_id], score: 0.0 };

        let mut live: Vec<Vec<Hypothesis>> = vec![vec![start]; batch_size];
        let mut finished: Vec<FinishedBeams> = (0..batch_size).map(|_| FinishedBeams::new(cfg)).collect();
        let mut cur_len = 1;

        while cur_len < cfg.max_length {
            let active: Vec<usize> = (0..batch_size).filter(|&i| !finished[i].done).collect();
            if active.is_empty() {
                break;
            }

            let mut scores = {
                let rows: Vec<BeamRow<'_>> = active
                    .iter()
                    .flat_map(|&i| live[i].iter().map(move |h| BeamRow { item: i, tokens: &h.tokens }))
                    .collect();
                let scores = scorer.next_log_probs(&rows)?;
                ensure!(
                    scores.len() == rows.len(),
                    "scorer returned {} rows for {} beams",
                    scores.len(),
                    rows.len()
                );
                scores
            };

            let mut offset = 0;
            for &i in &active {
                let beams = std::mem::take(&mut live[i]);
                let rows  = &mut scores[offset..offset + beams.len()];
                offset += beams.len();

                let next = self.step_item(&beams, rows, cur_len, &mut finished[i]);
                let best_live = next.first().map(|h| h.score);
                let item = &mut finished[i];
                item.done = next.is_empty() || item.is_done(best_live, cur_len + 1);
                live[i] = next;
            }

            cur_len += 1;
        }

        Ok(live
            .into_iter()
            .zip(finished)
            .map(|(beams, mut done)| {
                if !done.done {
                    for h in beams {
                        done.add(h.tokens, h.score);
                    }
                }
                let mut tokens = done
                    .best()
                    .cloned()
                    .unwrap_or_else(|| vec![cfg.decoder_start_token_id]);
                if tokens.len() < cfg.max_length {
                    tokens.push(cfg.eos_token_id);
                }
                tokens
            })
            .collect())
    }

    /// Advance one article by one token; returns its next live beams.
    fn step_item(
        &self,
        beams:    &[Hypothesis],
        rows:     &mut [Vec<f32>],
        cur_len:  usize,
        finished: &mut FinishedBeams,
    ) -> Vec<Hypothesis> {
        let k   = self.cfg.num_beams;
        let eos = self.cfg.eos_token_id;

        let mut candidates: Vec<(f32, usize, u32)> = Vec::with_capacity(beams.len() * 2 * k);
        for (b, (hyp, row)) in beams.iter().zip(rows.iter_mut()).enumerate() {
            self.mask_scores(&hyp.tokens, row, cur_len);
            for (token, lp) in top_k(row, 2 * k) {
                if lp.is_finite() {
                    candidates.push((hyp.score + lp, b, token));
                }
            }
        }
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));
        candidates.truncate(2 * k);

        let mut next = Vec::with_capacity(k);
        for (rank, (score, b, token)) in candidates.into_iter().enumerate() {
            if token == eos {
                if rank < k {
                    finished.add(beams[b].tokens.clone(), score);
                }
                // greedy stops on an argmax EOS
                if k == 1 && rank == 0 {
                    return Vec::new();
                }
            } else {
                let mut tokens = beams[b].tokens.clone();
                tokens.push(token);
                next.push(Hypothesis { tokens, score });
            }
            if next.len() == k {
                break;
            }
        }
        next
    }

    fn mask_scores(&self, tokens: &[u32], row: &mut [f32], cur_len: usize) {
        let cfg = &self.cfg;

        if cur_len < cfg.min_length {
            ban(row, cfg.eos_token_id);
        }
        for token in banned_ngram_tokens(tokens, cfg.no_repeat_ngram_size) {
            ban(row, token);
        }
        if cur_len == 1 {
            if let Some(bos) = cfg.forced_bos_token_id {
                force(row, bos);
            }
        }
        if cur_len + 1 == cfg.max_length {
            if let Some(eos) = cfg.forced_eos_token_id {
                force(row, eos);
            }
        }
    }
}

fn ban(row: &mut [f32], token: u32) {
    if let Some(v) = row.get_mut(token as usize) {
        *v = f32::NEG_INFINITY;
    }
}

fn force(row: &mut [f32], token: u32) {
    for (i, v) in row.iter_mut().enumerate() {
        *v = if i == token as usize { 0.0 } else { f32::NEG_INFINITY };
    }
}

/// Tokens that would complete an n-gram already present in `tokens`.
pub fn banned_ngram_tokens(tokens: &[u32], n: usize) -> Vec<u32> {
    if n == 0 || tokens.len() + 1 < n {
        return Vec::new();
    }
    let prefix = &tokens[tokens.len() + 1 - n..];
    tokens
        .windows(n)
        .filter(|w| &w[..n - 1] == prefix)
        .map(|w| w[n - 1])
        .collect()
}

/// Indices and values of the `k` largest entries, best first.
fn top_k(values: &[f32], k: usize) -> Vec<(u32, f32)> {
    let mut idx: Vec<u32> = (0..values.len() as u32).collect();
    let by_value_desc = |a: &u32, b: &u32| -> Ordering {
        values[*b as usize].total_cmp(&values[*a as usize])
    };
    if k < idx.len() {
        idx.select_nth_unstable_by(k, by_value_desc);
        idx.truncate(k);
    }
    idx.sort_by(by_value_desc);
    idx.into_iter().map(|i| (i, values[i as usize])).collect()
}
