//! Fixed-size worker pool with order-preserving parallel maps.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::Result;

/// A dedicated rayon pool of `num_workers` threads.
///
/// Results are always collected in submission order, never completion order,
/// so row `i` of any output corresponds to input line `i`.
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    pub fn new(num_workers: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .thread_name(|i| format!("rustmolprep-worker-{}", i))
            .build()?;
        log::debug!("Started worker pool with {} threads", num_workers);
        Ok(Self { pool })
    }

    /// Map `f` over `items` in parallel, stopping at the first error.
    pub fn try_map<T, R, F>(&self, items: &[T], f: F) -> Result<Vec<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(usize, &T) -> Result<R> + Sync + Send,
    {
        self.pool.install(|| {
            items
                .par_iter()
                .enumerate()
                .map(|(i, item)| f(i, item))
                .collect()
        })
    }

    /// Map an infallible `f` over `items` in parallel.
    pub fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(usize, &T) -> R + Sync + Send,
    {
        self.pool.install(|| {
            items
                .par_iter()
                .enumerate()
                .map(|(i, item)| f(i, item))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PrepError;

    #[test]
    fn test_map_preserves_order() {
        let items: Vec<usize> = (0..1000).collect();
        for workers in [1, 2, 8] {
            let pool = WorkerPool::new(workers).unwrap();
            let out = pool.map(&items, |i, &x| (i, x * 2));
            assert_eq!(out.len(), items.len());
            for (i, &(idx, doubled)) in out.iter().enumerate() {
                assert_eq!(idx, i);
                assert_eq!(doubled, i * 2);
            }
        }
    }

    #[test]
    fn test_try_map_propagates_error() {
        let pool = WorkerPool::new(4).unwrap();
        let items: Vec<usize> = (0..100).collect();
        let result = pool.try_map(&items, |_, &x| {
            if x == 57 {
                Err(PrepError::UnknownToken(x.to_string()))
            } else {
                Ok(x)
            }
        });
        assert!(matches!(result, Err(PrepError::UnknownToken(t)) if t == "57"));
    }
}
