//! Executor
//!
//! Job-parallel map used to fit one model per split. A batch of zero-argument jobs is
//! dispatched together and the call blocks until every job is done; results come back
//! in submission order regardless of completion order.
use crate::config::ParallelConfig;
use crate::errors::FitCvError;
use log::{debug, info};
use rayon::prelude::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

/// Runs batches of jobs according to a [`ParallelConfig`].
#[derive(Debug, Clone, Default)]
pub struct Executor {
    cfg: ParallelConfig,
}

impl Executor {
    pub fn new(cfg: ParallelConfig) -> Self {
        Executor { cfg }
    }

    pub fn config(&self) -> &ParallelConfig {
        &self.cfg
    }

    /// Run all `jobs` and collect their results in submission order.
    ///
    /// The first failing job fails the whole batch and no partial results are
    /// returned.
    pub fn run<T, F>(&self, jobs: Vec<F>) -> Result<Vec<T>, FitCvError>
    where
        F: FnOnce() -> Result<T, FitCvError> + Send,
        T: Send,
    {
        let num_threads = self.cfg.num_threads()?;
        let n_jobs = jobs.len();
        let start = Instant::now();

        let results = if self.cfg.shared_memory {
            self.run_shared(jobs, num_threads)
        } else {
            self.run_isolated(jobs, num_threads)
        };

        if self.cfg.verbose > 0 {
            info!(
                "Completed {} jobs on {} {} in {:.3} seconds.",
                n_jobs,
                num_threads,
                if self.cfg.shared_memory { "threads" } else { "isolated workers" },
                start.elapsed().as_secs_f32()
            );
        }
        results
    }

    fn run_shared<T, F>(&self, jobs: Vec<F>, num_threads: usize) -> Result<Vec<T>, FitCvError>
    where
        F: FnOnce() -> Result<T, FitCvError> + Send,
        T: Send,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| FitCvError::ThreadPool(e.to_string()))?;
        let verbose = self.cfg.verbose;
        pool.install(|| {
            jobs.into_par_iter()
                .enumerate()
                .map(|(i, job)| {
                    let result = panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
                        Err(FitCvError::JobPanicked(format!("job {}: {}", i, panic_message(&payload))))
                    });
                    if verbose > 1 {
                        debug!("Job {} finished, success: {}.", i, result.is_ok());
                    }
                    result
                })
                .collect::<Result<Vec<T>, FitCvError>>()
        })
    }

    // Every job runs on its own scoped thread, at most `num_threads` at a time.
    fn run_isolated<T, F>(&self, jobs: Vec<F>, num_threads: usize) -> Result<Vec<T>, FitCvError>
    where
        F: FnOnce() -> Result<T, FitCvError> + Send,
        T: Send,
    {
        let mut results = Vec::with_capacity(jobs.len());
        let mut pending = jobs.into_iter().enumerate().peekable();

        while pending.peek().is_some() {
            let wave: Vec<(usize, F)> = pending.by_ref().take(num_threads).collect();
            let wave_results: Vec<Result<T, FitCvError>> = std::thread::scope(|scope| {
                let handles: Vec<_> = wave.into_iter().map(|(i, job)| (i, scope.spawn(job))).collect();
                handles
                    .into_iter()
                    .map(|(i, handle)| {
                        let result = handle.join().unwrap_or_else(|payload| {
                            Err(FitCvError::JobPanicked(format!("job {}: {}", i, panic_message(&payload))))
                        });
                        if self.cfg.verbose > 1 {
                            debug!("Isolated job {} finished, success: {}.", i, result.is_ok());
                        }
                        result
                    })
                    .collect()
            });
            for result in wave_results {
                results.push(result?);
            }
        }
        Ok(results)
    }
}

fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("unknown panic payload")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn jobs(n: usize) -> Vec<impl FnOnce() -> Result<usize, FitCvError> + Send> {
        (0..n)
            .map(|i| {
                move || {
                    // later jobs finish first
                    std::thread::sleep(Duration::from_millis(((n - i) * 3) as u64));
                    Ok(i * 10)
                }
            })
            .collect()
    }

    #[test]
    fn test_shared_preserves_order() {
        let executor = Executor::new(ParallelConfig::default().set_n_jobs(Some(4)));
        assert_eq!(executor.run(jobs(6)).unwrap(), vec![0, 10, 20, 30, 40, 50]);
    }

    #[test]
    fn test_isolated_preserves_order() {
        let executor = Executor::new(ParallelConfig::default().set_n_jobs(Some(4)).set_shared_memory(false));
        assert_eq!(executor.run(jobs(6)).unwrap(), vec![0, 10, 20, 30, 40, 50]);
    }

    #[test]
    fn test_failure_aborts_batch() {
        for shared_memory in [true, false] {
            let cfg = ParallelConfig::default()
                .set_n_jobs(Some(2))
                .set_shared_memory(shared_memory);
            let executor = Executor::new(cfg);
            let jobs: Vec<Box<dyn FnOnce() -> Result<usize, FitCvError> + Send>> = vec![
                Box::new(|| Ok(1)),
                Box::new(|| Err(FitCvError::EmptyData("boom".to_string()))),
                Box::new(|| Ok(3)),
            ];
            assert!(matches!(executor.run(jobs), Err(FitCvError::EmptyData(_))));
        }
    }

    #[test]
    fn test_captures_panic() {
        for shared_memory in [true, false] {
            let cfg = ParallelConfig::default()
                .set_n_jobs(Some(2))
                .set_shared_memory(shared_memory);
            let executor = Executor::new(cfg);
            let jobs: Vec<Box<dyn FnOnce() -> Result<usize, FitCvError> + Send>> =
                vec![Box::new(|| Ok(1)), Box::new(|| panic!("worker exploded"))];
            match executor.run(jobs) {
                Err(FitCvError::JobPanicked(msg)) => assert!(msg.contains("worker exploded")),
                other => panic!("unexpected result: {:?}", other),
            }
        }
    }

    #[test]
    fn test_jobs_borrow_shared_data() {
        let data = vec![1.0, 2.0, 3.0];
        let executor = Executor::new(ParallelConfig::default().set_n_jobs(Some(3)));
        let jobs: Vec<_> = (0..3)
            .map(|i| {
                let data = &data;
                move || Ok(data[i] * 2.0)
            })
            .collect();
        assert_eq!(executor.run(jobs).unwrap(), vec![2.0, 4.0, 6.0]);
    }
}
