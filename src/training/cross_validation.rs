//! K-fold cross-validation splits

use crate::error::{MlError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// A single train/test split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

impl CVSplit {
    /// Materialize the four arrays of this split
    pub fn select(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> (Array2<f64>, Array1<f64>, Array2<f64>, Array1<f64>) {
        (
            x.select(Axis(0), &self.train_indices),
            y.select(Axis(0), &self.train_indices),
            x.select(Axis(0), &self.test_indices),
            y.select(Axis(0), &self.test_indices),
        )
    }
}

/// K-Fold splitter. Without shuffling, folds are contiguous blocks in row
/// order and the first `n % k` folds get one extra row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KFold {
    pub n_splits: usize,
    pub shuffle: bool,
    pub random_state: Option<u64>,
}

impl Default for KFold {
    fn default() -> Self {
        Self::new(3)
    }
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: false,
            random_state: None,
        }
    }

    /// Shuffle rows before folding, with a fixed seed
    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.shuffle = true;
        self.random_state = Some(seed);
        self
    }

    pub fn split(&self, n_samples: usize) -> Result<Vec<CVSplit>> {
        let n_splits = self.n_splits;
        if n_splits < 2 {
            return Err(MlError::invalid_param("n_splits", n_splits, "must be at least 2"));
        }
        if n_samples < n_splits {
            return Err(MlError::InvalidInput(format!(
                "cannot split {n_samples} samples into {n_splits} folds"
            )));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if self.shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(0));
            indices.shuffle(&mut rng);
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;
        let mut splits = Vec::with_capacity(n_splits);
        let mut start = 0;

        for fold_idx in 0..n_splits {
            let size = if fold_idx < remainder { base + 1 } else { base };
            let end = start + size;
            splits.push(CVSplit {
                test_indices: indices[start..end].to_vec(),
                train_indices: indices[..start].iter().chain(&indices[end..]).copied().collect(),
                fold_idx,
            });
            start = end;
        }

        Ok(splits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kfold_contiguous_folds() {
        let splits = KFold::new(3).split(10).unwrap();
        assert_eq!(splits.len(), 3);
        assert_eq!(splits[0].test_indices, vec![0, 1, 2, 3]);
        assert_eq!(splits[1].test_indices, vec![4, 5, 6]);
        assert_eq!(splits[2].test_indices, vec![7, 8, 9]);
        assert_eq!(splits[1].train_indices, vec![0, 1, 2, 3, 7, 8, 9]);
    }

    #[test]
    fn test_kfold_partitions_rows() {
        let splits = KFold::new(4).with_shuffle(7).split(23).unwrap();
        let mut seen: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..23).collect::<Vec<_>>());
        for split in &splits {
            assert_eq!(split.train_indices.len() + split.test_indices.len(), 23);
            assert!(split.test_indices.iter().all(|i| !split.train_indices.contains(i)));
        }
    }

    #[test]
    fn test_shuffled_split_is_seeded() {
        let a = KFold::new(3).with_shuffle(1).split(30).unwrap();
        let b = KFold::new(3).with_shuffle(1).split(30).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_kfold_rejects_bad_sizes() {
        assert!(KFold::new(1).split(10).is_err());
        assert!(KFold::new(5).split(3).is_err());
    }

    #[test]
    fn test_select() {
        let x = Array2::from_shape_fn((4, 2), |(i, j)| (i * 2 + j) as f64);
        let y = Array1::from_vec(vec![0.0, 1.0, 2.0, 3.0]);
        let split = CVSplit {
            train_indices: vec![0, 3],
            test_indices: vec![1, 2],
            fold_idx: 0,
        };
        let (xt, yt, xv, yv) = split.select(&x, &y);
        assert_eq!(xt.row(1).to_vec(), vec![6.0, 7.0]);
        assert_eq!(yt.to_vec(), vec![0.0, 3.0]);
        assert_eq!(xv.nrows(), 2);
        assert_eq!(yv.to_vec(), vec![1.0, 2.0]);
    }
}
