// ============================================================
// Layer 5 — Learning-Rate Schedule
// ============================================================
// One-cycle schedule with cosine annealing, restarted per stage:
//
//   phase 1 (first `pct_start` of the steps)
//       cosine from lr_max / div up to lr_max
//   phase 2 (remaining steps)
//       cosine from lr_max down to lr_max / div_final

use std::f64::consts::PI;

#[derive(Debug, Clone, PartialEq)]
pub struct OneCycleSchedule {
    lr_max:      f64,
    total_steps: usize,
    pct_start:   f64,
    div:         f64,
    div_final:   f64,
}

impl OneCycleSchedule {
    pub fn new(lr_max: f64, total_steps: usize) -> Self {
        Self {
            lr_max,
            total_steps: total_steps.max(1),
            pct_start: 0.25,
            div: 25.0,
            div_final: 1e5,
        }
    }

    pub fn with_pct_start(mut self, pct_start: f64) -> Self {
        self.pct_start = pct_start.clamp(0.0, 1.0);
        self
    }

    fn warmup_steps(&self) -> usize {
        ((self.total_steps as f64) * self.pct_start).round() as usize
    }

    /// Learning rate for the 0-based optimiser `step`.
    pub fn lr_at(&self, step: usize) -> f64 {
        let warmup = self.warmup_steps();
        let start  = self.lr_max / self.div;
        let end    = self.lr_max / self.div_final;

        if step < warmup {
            return cosine(start, self.lr_max, step as f64 / warmup as f64);
        }

        let decay = self.total_steps - warmup;
        if decay == 0 {
            return end;
        }
        let progress = (step - warmup).min(decay) as f64 / decay as f64;
        cosine(self.lr_max, end, progress)
    }
}

fn cosine(start: f64, end: f64, pct: f64) -> f64 {
    end + (start - end) / 2.0 * (1.0 + (PI * pct).cos())
}
