use std::env;
use std::sync::OnceLock;

/// A wrapper around the Rayon thread pool used to run GEMM workers.
///
/// On platforms where threads are not supported (eg. WebAssembly) this runs
/// operations directly on the calling thread.
pub struct ThreadPool {
    /// The wrapped thread pool, or None if we failed to construct one.
    pool: Option<rayon::ThreadPool>,
}

impl ThreadPool {
    /// Run a function in the thread pool.
    ///
    /// This corresponds to [`rayon::ThreadPool::install`], except on platforms
    /// where threading is not supported, where it just runs `op` directly.
    pub fn run<R: Send, Op: FnOnce() -> R + Send>(&self, op: Op) -> R {
        if let Some(pool) = self.pool.as_ref() {
            pool.install(op)
        } else {
            op()
        }
    }

    /// Return the number of worker threads in the pool.
    pub fn num_threads(&self) -> usize {
        self.pool
            .as_ref()
            .map(|pool| pool.current_num_threads())
            .unwrap_or(1)
    }

    /// Create a thread pool with a given number of threads.
    pub fn with_num_threads(num_threads: usize) -> ThreadPool {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|index| format!("simd-gemm-{}", index))
            .build();

        ThreadPool { pool: pool.ok() }
    }
}

/// Parse a thread count override, clamping it to the logical core count.
fn parse_num_threads(value: &str, max: usize) -> Option<usize> {
    value.trim().parse::<usize>().ok().map(|n| n.clamp(1, max))
}

/// Return the [Rayon][rayon] thread pool used by the GEMM engines.
///
/// The default size is the number of physical cores, since GEMM is compute
/// bound and gains little from hyper-threads. It can be overridden at the
/// process level by setting the `SIMD_GEMM_NUM_THREADS` environment variable
/// to a number between 1 and the logical core count. Individual engines can
/// use fewer threads via [`GemmConfig`](crate::GemmConfig).
///
/// [rayon]: https://github.com/rayon-rs/rayon
pub fn thread_pool() -> &'static ThreadPool {
    static THREAD_POOL: OnceLock<ThreadPool> = OnceLock::new();
    THREAD_POOL.get_or_init(|| {
        let physical_cpus = num_cpus::get_physical().max(1);
        let num_threads = env::var("SIMD_GEMM_NUM_THREADS")
            .ok()
            .and_then(|var| parse_num_threads(&var, num_cpus::get()))
            .unwrap_or(physical_cpus);

        tracing::debug!(num_threads, "creating GEMM thread pool");
        ThreadPool::with_num_threads(num_threads)
    })
}

#[cfg(test)]
mod tests {
    use super::{parse_num_threads, thread_pool, ThreadPool};

    #[test]
    fn test_parse_num_threads() {
        assert_eq!(parse_num_threads("4", 8), Some(4));
        assert_eq!(parse_num_threads(" 2 ", 8), Some(2));
        assert_eq!(parse_num_threads("0", 8), Some(1));
        assert_eq!(parse_num_threads("64", 8), Some(8));
        assert_eq!(parse_num_threads("many", 8), None);
    }

    #[test]
    fn test_thread_pool_run() {
        let pool = ThreadPool::with_num_threads(2);
        assert_eq!(pool.num_threads(), 2);
        assert_eq!(pool.run(|| 1 + 1), 2);
        assert!(thread_pool().num_threads() >= 1);
    }
}
