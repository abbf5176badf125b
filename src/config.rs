//! Parallel Configuration
//!
//! Settings controlling how per-split jobs are executed: degree of parallelism,
//! shared-memory threads versus isolated workers, and verbosity.
use crate::errors::FitCvError;
use serde::{Deserialize, Serialize};
use std::fs;

fn default_n_jobs() -> Option<i32> {
    Some(1)
}
fn default_shared_memory() -> bool {
    true
}
fn default_verbose() -> usize {
    0
}

/// Execution settings shared by every cross-validated fit.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ParallelConfig {
    /// Number of jobs to run in parallel. `None` or `-1` uses all available cores,
    /// other negative values `-n` leave `n - 1` cores unused.
    #[serde(default = "default_n_jobs")]
    pub n_jobs: Option<i32>,
    /// If `true` run jobs on a shared-memory thread pool. If `false` every job gets an
    /// isolated worker thread, and a panicking job is reported as an error.
    #[serde(default = "default_shared_memory")]
    pub shared_memory: bool,
    /// Verbosity of the parallel computation. `0` is silent, `1` logs a summary per
    /// batch, `2` and above additionally log every job.
    #[serde(default = "default_verbose")]
    pub verbose: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        ParallelConfig {
            n_jobs: default_n_jobs(),
            shared_memory: default_shared_memory(),
            verbose: default_verbose(),
        }
    }
}

impl ParallelConfig {
    /// Set the number of parallel jobs.
    /// * `n_jobs` - Worker count; `None` or `-1` means all cores.
    pub fn set_n_jobs(mut self, n_jobs: Option<i32>) -> Self {
        self.n_jobs = n_jobs;
        self
    }

    /// Set whether jobs share memory on a thread pool.
    /// * `shared_memory` - `false` isolates every job on its own worker.
    pub fn set_shared_memory(mut self, shared_memory: bool) -> Self {
        self.shared_memory = shared_memory;
        self
    }

    /// Set the verbosity level.
    pub fn set_verbose(mut self, verbose: usize) -> Self {
        self.verbose = verbose;
        self
    }

    /// Resolve `n_jobs` into a concrete, positive worker count.
    pub fn num_threads(&self) -> Result<usize, FitCvError> {
        let n_available = std::thread::available_parallelism().map_or(1, |n| n.get());
        match self.n_jobs {
            None | Some(-1) => Ok(n_available),
            Some(0) => Err(FitCvError::InvalidParameter(
                "n_jobs".to_string(),
                "a non-zero integer or None".to_string(),
                "0".to_string(),
            )),
            Some(n) if n > 0 => Ok(n as usize),
            Some(n) => {
                let unused = n.unsigned_abs() as usize - 1;
                Ok(n_available.saturating_sub(unused).max(1))
            }
        }
    }

    /// Dump the configuration as a json object.
    pub fn json_dump(&self) -> Result<String, FitCvError> {
        serde_json::to_string(self).map_err(|e| FitCvError::UnableToWrite(e.to_string()))
    }

    /// Load a configuration from a json string. Missing fields take their defaults.
    pub fn from_json(json_str: &str) -> Result<Self, FitCvError> {
        serde_json::from_str::<ParallelConfig>(json_str).map_err(|e| FitCvError::UnableToRead(e.to_string()))
    }

    /// Save the configuration to a file.
    pub fn save(&self, path: &str) -> Result<(), FitCvError> {
        let cfg = self.json_dump()?;
        fs::write(path, cfg).map_err(|e| FitCvError::UnableToWrite(e.to_string()))
    }

    /// Load a configuration from a file.
    pub fn load(path: &str) -> Result<Self, FitCvError> {
        let json_str = fs::read_to_string(path).map_err(|e| FitCvError::UnableToRead(e.to_string()))?;
        Self::from_json(&json_str)
    }
}
