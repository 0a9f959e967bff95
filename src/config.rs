use crate::threading::thread_pool;

/// Default problem width above which the engines trade up to the next cache
/// level for the L1 and L2 budgets.
pub const WIDE_N: usize = 4096;

/// Cache size hints, in bytes, used to choose the macro tile sizes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CacheSizes {
    pub l1: usize,
    pub l2: usize,
    pub l3: usize,
}

impl Default for CacheSizes {
    fn default() -> Self {
        CacheSizes {
            l1: 32 * 1024,
            l2: 256 * 1024,
            l3: 2 * 1024 * 1024,
        }
    }
}

impl CacheSizes {
    /// Return the budgets to use for a problem with `n` output columns.
    ///
    /// For very wide outputs the K and M tiles are sized against L2 and L3
    /// respectively, which keeps `macroK` large enough to amortize C updates.
    pub fn for_n(&self, n: usize) -> CacheSizes {
        self.promoted(n, Some(WIDE_N))
    }

    /// Variant of [`for_n`](CacheSizes::for_n) with an explicit width
    /// threshold. `None` disables promotion.
    pub fn promoted(&self, n: usize, wide_n: Option<usize>) -> CacheSizes {
        if wide_n.is_some_and(|wide_n| n > wide_n) {
            CacheSizes {
                l1: self.l2,
                l2: self.l3,
                l3: self.l3,
            }
        } else {
            *self
        }
    }
}

/// Configuration shared by the GEMM engines.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GemmConfig {
    pub cache: CacheSizes,

    /// Maximum number of worker threads, or `None` to use the size of the
    /// global thread pool. Problems below the parallel threshold always run
    /// on one thread.
    pub num_threads: Option<usize>,
}

impl GemmConfig {
    pub fn with_cache_sizes(mut self, cache: CacheSizes) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads.max(1));
        self
    }

    /// Return the configured thread count, falling back to the global pool.
    pub fn max_threads(&self) -> usize {
        self.num_threads
            .unwrap_or_else(|| thread_pool().num_threads())
            .max(1)
    }
}
