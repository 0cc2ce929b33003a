// ============================================================
// Layer 4 — Train/Valid/Test Splitter
// ============================================================
// Shuffles samples and splits them into three sets:
//   - train: updates model weights
//   - valid: tracks loss on unseen data during training
//   - test:  held out for generation and ROUGE evaluation
//
// The shuffle uses a seeded StdRng so `evaluate` can rebuild
// exactly the same test set from the seed stored next to the
// exported model.
//
// Sizes:
//   test  = round(total * test_frac)
//   valid = round(total * valid_frac), clamped to what remains
//   train = everything else
//
// Reference: rand crate documentation (SliceRandom, SeedableRng)

use anyhow::{bail, Result};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// The three partitions of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Splits<T> {
    pub train: Vec<T>,
    pub valid: Vec<T>,
    pub test:  Vec<T>,
}

/// Shuffle `samples` with `seed` and split into train / valid / test.
pub fn split_three_way<T>(
    mut samples: Vec<T>,
    valid_frac:  f64,
    test_frac:   f64,
    seed:        u64,
) -> Result<Splits<T>> {
    for (name, frac) in [("valid", valid_frac), ("test", test_frac)] {
        if !(0.0..=1.0).contains(&frac) {
            bail!("{name} fraction must be within [0, 1], got {frac}");
        }
    }
    if valid_frac + test_frac > 1.0 {
        bail!("valid + test fractions exceed 1.0 ({valid_frac} + {test_frac})");
    }

    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total   = samples.len();
    let n_test  = ((total as f64) * test_frac).round() as usize;
    let n_test  = n_test.min(total);
    let n_valid = ((total as f64) * valid_frac).round() as usize;
    let n_valid = n_valid.min(total - n_test);

    // split_off(n) keeps [0..n) in place and returns [n..)
    let test  = samples.split_off(total - n_test);
    let valid = samples.split_off(total - n_test - n_valid);
    let train = samples;

    tracing::debug!(
        "Dataset split: {} train, {} valid, {} test",
        train.len(),
        valid.len(),
        test.len(),
    );

    Ok(Splits { train, valid, test })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let s = split_three_way(items, 0.1, 0.2, 7).unwrap();
        assert_eq!(s.train.len(), 70);
        assert_eq!(s.valid.len(), 10);
        assert_eq!(s.test.len(),  20);
    }

    #[test]
    fn test_all_items_preserved() {
        let items: Vec<usize> = (0..53).collect();
        let s = split_three_way(items, 0.15, 0.15, 1).unwrap();
        let mut all: Vec<usize> = s.train.into_iter().chain(s.valid).chain(s.test).collect();
        all.sort_unstable();
        assert_eq!(all, (0..53).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_split() {
        let a = split_three_way((0..40).collect::<Vec<u32>>(), 0.1, 0.1, 42).unwrap();
        let b = split_three_way((0..40).collect::<Vec<u32>>(), 0.1, 0.1, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_dataset() {
        let s = split_three_way(Vec::<usize>::new(), 0.1, 0.1, 0).unwrap();
        assert!(s.train.is_empty() && s.valid.is_empty() && s.test.is_empty());
    }

    #[test]
    fn test_no_holdout() {
        let s = split_three_way((0..10).collect::<Vec<usize>>(), 0.0, 0.0, 3).unwrap();
        assert_eq!(s.train.len(), 10);
        assert!(s.valid.is_empty() && s.test.is_empty());
    }

    #[test]
    fn test_rejects_bad_fractions() {
        assert!(split_three_way(vec![1, 2, 3], -0.1, 0.1, 0).is_err());
        assert!(split_three_way(vec![1, 2, 3], 0.6, 0.6, 0).is_err());
    }
}
