//! Worker pool used for per-pair generation and per-product matching.

use biocat_core::Result;

/// A fixed-size pool. With the `parallel` feature this is a dedicated rayon
/// pool; without it, work runs on the calling thread.
pub struct Workers {
    #[cfg(feature = "parallel")]
    pool: rayon::ThreadPool,
}

impl Workers {
    /// A pool of `parallelism` threads; 0 means one per core.
    pub fn new(parallelism: usize) -> Result<Self> {
        #[cfg(feature = "parallel")]
        {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(parallelism)
                .build()
                .map_err(|e| biocat_core::BiocatError::ThreadPool(e.to_string()))?;
            Ok(Workers { pool })
        }
        #[cfg(not(feature = "parallel"))]
        {
            let _ = parallelism;
            Ok(Workers {})
        }
    }

    pub fn threads(&self) -> usize {
        #[cfg(feature = "parallel")]
        {
            self.pool.current_num_threads()
        }
        #[cfg(not(feature = "parallel"))]
        {
            1
        }
    }

    /// Apply `f` to every item. Results come back in input order.
    pub fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            self.pool.install(|| items.par_iter().map(f).collect())
        }
        #[cfg(not(feature = "parallel"))]
        {
            items.iter().map(f).collect()
        }
    }
}
