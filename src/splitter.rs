//! Splitter
//!
//! Cross-validation strategies. A cross validator turns a sample into an ordered list
//! of (train positions, test positions) pairs; positions index the rows of the sample.
use crate::data::Matrix;
use crate::errors::FitCvError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// One round of cross-validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    /// Positions used to fit the model.
    pub train: Vec<usize>,
    /// Held-out positions the fitted model is evaluated on.
    pub test: Vec<usize>,
}

impl Split {
    pub fn new(train: Vec<usize>, test: Vec<usize>) -> Self {
        Split { train, test }
    }
}

/// A strategy producing a finite, deterministic sequence of splits.
pub trait CrossValidator: Send + Sync {
    /// Number of splits [`split`](Self::split) will produce for this data.
    fn n_splits(&self, features: &Matrix<f64>, target: &[f64]) -> usize;

    /// Generate the splits, in order.
    fn split(&self, features: &Matrix<f64>, target: &[f64]) -> Result<Vec<Split>, FitCvError>;
}

/// K-Fold cross-validator.
///
/// Partitions the rows into `n_splits` consecutive folds (optionally after a seeded
/// shuffle). Each fold is held out once while the rest is used for training. The first
/// `n % n_splits` folds get one extra row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KFold {
    n_splits: usize,
    shuffle: bool,
    seed: u64,
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        KFold {
            n_splits,
            shuffle: false,
            seed: 0,
        }
    }

    /// Shuffle rows before folding.
    /// * `seed` - Integer value used to seed the shuffle.
    pub fn set_shuffle(mut self, shuffle: bool, seed: u64) -> Self {
        self.shuffle = shuffle;
        self.seed = seed;
        self
    }
}

impl CrossValidator for KFold {
    fn n_splits(&self, _features: &Matrix<f64>, _target: &[f64]) -> usize {
        self.n_splits
    }

    fn split(&self, _features: &Matrix<f64>, target: &[f64]) -> Result<Vec<Split>, FitCvError> {
        let n = target.len();
        if self.n_splits < 2 {
            return Err(FitCvError::InvalidParameter(
                "n_splits".to_string(),
                "at least 2".to_string(),
                self.n_splits.to_string(),
            ));
        }
        if self.n_splits > n {
            return Err(FitCvError::InvalidParameter(
                "n_splits".to_string(),
                format!("at most the number of observations ({})", n),
                self.n_splits.to_string(),
            ));
        }

        let mut positions: Vec<usize> = (0..n).collect();
        if self.shuffle {
            let mut rng = StdRng::seed_from_u64(self.seed);
            positions.shuffle(&mut rng);
        }

        let base = n / self.n_splits;
        let extra = n % self.n_splits;
        let mut splits = Vec::with_capacity(self.n_splits);
        let mut start = 0;
        for fold in 0..self.n_splits {
            let size = base + usize::from(fold < extra);
            let end = start + size;
            let test = positions[start..end].to_vec();
            let train = positions[..start].iter().chain(&positions[end..]).copied().collect();
            splits.push(Split { train, test });
            start = end;
        }
        Ok(splits)
    }
}

/// Bootstrap cross-validator.
///
/// Every split draws `n` training positions with replacement; the positions never
/// drawn (out-of-bag) form the test set. Test sets of different splits overlap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapCV {
    n_splits: usize,
    seed: u64,
}

impl BootstrapCV {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        BootstrapCV { n_splits, seed }
    }
}

impl CrossValidator for BootstrapCV {
    fn n_splits(&self, _features: &Matrix<f64>, _target: &[f64]) -> usize {
        self.n_splits
    }

    fn split(&self, _features: &Matrix<f64>, target: &[f64]) -> Result<Vec<Split>, FitCvError> {
        let n = target.len();
        if n == 0 {
            return Err(FitCvError::EmptyData("cannot bootstrap an empty sample".to_string()));
        }
        let mut rng = StdRng::seed_from_u64(self.seed);
        let splits = (0..self.n_splits)
            .map(|_| {
                let mut in_bag = vec![false; n];
                let train: Vec<usize> = (0..n)
                    .map(|_| {
                        let p = rng.gen_range(0..n);
                        in_bag[p] = true;
                        p
                    })
                    .collect();
                let test = (0..n).filter(|&p| !in_bag[p]).collect();
                Split { train, test }
            })
            .collect();
        Ok(splits)
    }
}

/// An explicit, fixed list of splits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredefinedSplits {
    splits: Vec<Split>,
}

impl PredefinedSplits {
    pub fn new(splits: Vec<Split>) -> Self {
        PredefinedSplits { splits }
    }
}

impl CrossValidator for PredefinedSplits {
    fn n_splits(&self, _features: &Matrix<f64>, _target: &[f64]) -> usize {
        self.splits.len()
    }

    fn split(&self, _features: &Matrix<f64>, _target: &[f64]) -> Result<Vec<Split>, FitCvError> {
        Ok(self.splits.clone())
    }
}
