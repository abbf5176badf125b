//! Memo
//!
//! A lazily computed, write-once cache cell. The value starts empty and is computed by
//! the first caller of [`Memo::get_or_try_init`]; concurrent callers wait for that
//! computation instead of starting their own. A failed computation leaves the cell
//! empty so the next call retries from scratch.
use crate::errors::FitCvError;
use std::fmt;
use std::sync::{Mutex, OnceLock, PoisonError};

pub struct Memo<T> {
    value: OnceLock<T>,
    init_lock: Mutex<()>,
}

impl<T> Memo<T> {
    pub fn new() -> Self {
        Memo {
            value: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    /// The cached value, if it has been computed.
    pub fn get(&self) -> Option<&T> {
        self.value.get()
    }

    pub fn is_computed(&self) -> bool {
        self.value.get().is_some()
    }

    /// Return the cached value, computing it with `init` if the cell is empty.
    pub fn get_or_try_init<F>(&self, init: F) -> Result<&T, FitCvError>
    where
        F: FnOnce() -> Result<T, FitCvError>,
    {
        if let Some(value) = self.value.get() {
            return Ok(value);
        }
        // The lock guards no data, so a panic in an earlier `init` leaves nothing to repair.
        let _guard = self.init_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = self.value.get() {
            return Ok(value);
        }
        let value = init()?;
        Ok(self.value.get_or_init(|| value))
    }
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value.get() {
            Some(value) => f.debug_tuple("Memo").field(value).finish(),
            None => f.write_str("Memo(<empty>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_computes_once() {
        let memo = Memo::new();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let v = memo
                .get_or_try_init(|| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .unwrap();
            assert_eq!(*v, 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_leaves_empty() {
        let memo: Memo<usize> = Memo::new();
        let err = memo.get_or_try_init(|| Err(FitCvError::EmptyData("nothing".to_string())));
        assert!(err.is_err());
        assert!(!memo.is_computed());
        assert_eq!(*memo.get_or_try_init(|| Ok(7)).unwrap(), 7);
        assert!(memo.is_computed());
    }

    #[test]
    fn test_retry_after_panic() {
        let memo: Memo<usize> = Memo::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = memo.get_or_try_init(|| panic!("init exploded"));
        }));
        assert!(result.is_err());
        assert!(!memo.is_computed());
        assert_eq!(*memo.get_or_try_init(|| Ok(3)).unwrap(), 3);
    }

    #[test]
    fn test_single_flight_across_threads() {
        let memo = Arc::new(Memo::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let memo = Arc::clone(&memo);
                let calls = Arc::clone(&calls);
                std::thread::spawn(move || {
                    *memo
                        .get_or_try_init(|| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(10));
                            Ok(1usize)
                        })
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
