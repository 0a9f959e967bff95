use std::ops::Range;

use crate::blocking::{thread_count, InputPtr, MacroTiles, OutputPtr};
use crate::config::GemmConfig;
use crate::iter_util::{range_chunks, split_range, MaybeParIter};
use crate::kernels::{NtKernelFn, NtKernels};
use crate::threading::thread_pool;

/// Sizes and kernels shared by every worker.
#[derive(Clone, Copy)]
struct Plan {
    m: usize,
    n: usize,
    k: usize,
    tiles: MacroTiles,
    kernels: NtKernels,
}

/// Engine for `C = alpha * A * B^T + beta * C` where A is `M x K`, B is
/// `N x K` and C is `M x N`.
///
/// Each output is a dot product of a row of A with a row of B, so neither
/// input is packed. The kernels compute up to 6 rows of A against 4 rows of
/// B at a time.
pub struct GemmNT {
    plan: Plan,
    num_threads: usize,
}

impl GemmNT {
    pub fn new(m: usize, n: usize, k: usize, kernels: NtKernels, config: &GemmConfig) -> GemmNT {
        let cache = config.cache.for_n(n);
        let micro_m = kernels.micro_m();
        let micro_n = NtKernels::MICRO_N;
        let tiles = MacroTiles::new(&cache, m, n, k, micro_m, micro_n);
        let num_threads = thread_count(m, n, k, micro_n, config.max_threads());

        tracing::debug!(
            m,
            n,
            k,
            micro_m,
            macro_m = tiles.macro_m,
            macro_n = tiles.macro_n,
            macro_k = tiles.macro_k,
            num_threads,
            "prepared GemmNT"
        );

        GemmNT {
            plan: Plan {
                m,
                n,
                k,
                tiles,
                kernels,
            },
            num_threads,
        }
    }

    pub fn micro_m(&self) -> usize {
        self.plan.kernels.micro_m()
    }

    pub fn micro_n(&self) -> usize {
        NtKernels::MICRO_N
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Compute `C = alpha * A * B^T + beta * C`.
    ///
    /// As with [`GemmNN::run`](crate::GemmNN::run), C is not read if `beta`
    /// is zero.
    ///
    /// # Safety
    ///
    /// - `a` must be valid for reads of an `M x K` matrix with row stride
    ///   `lda >= K`.
    /// - `b` must be valid for reads of an `N x K` matrix with row stride
    ///   `ldb >= K`.
    /// - `c` must be valid for reads and writes of an `M x N` matrix with row
    ///   stride `ldc >= N`, and must not overlap `a` or `b`.
    pub unsafe fn run(
        &self,
        alpha: f32,
        a: *const f32,
        lda: usize,
        b: *const f32,
        ldb: usize,
        beta: f32,
        c: *mut f32,
        ldc: usize,
    ) {
        let plan = self.plan;
        if plan.m == 0 || plan.n == 0 {
            return;
        }
        if plan.k == 0 {
            (plan.kernels.scale_c)(plan.m, plan.n, beta, c, ldc);
            return;
        }

        let a = InputPtr::new(a);
        let b = InputPtr::new(b);
        let c = OutputPtr::new(c);

        let ranges = split_range(plan.n, self.num_threads, NtKernels::MICRO_N);
        let parallel = ranges.len() > 1;
        let run_thread = |cols: Range<usize>| {
            // Safety: Workers write to disjoint column ranges of C.
            unsafe {
                thread_kernel(
                    &plan,
                    cols,
                    alpha,
                    a.get(),
                    lda,
                    b.get(),
                    ldb,
                    beta,
                    c.get(),
                    ldc,
                )
            }
        };

        if parallel {
            thread_pool().run(|| ranges.maybe_par_iter(true).for_each(run_thread));
        } else {
            ranges.into_iter().for_each(run_thread);
        }
    }
}

unsafe fn thread_kernel(
    plan: &Plan,
    cols: Range<usize>,
    alpha: f32,
    a: *const f32,
    lda: usize,
    b: *const f32,
    ldb: usize,
    beta: f32,
    c: *mut f32,
    ldc: usize,
) {
    let MacroTiles {
        macro_m,
        macro_n,
        macro_k,
    } = plan.tiles;

    for col_block in range_chunks(cols, macro_n) {
        for depth_block in range_chunks(0..plan.k, macro_k) {
            for row_block in range_chunks(0..plan.m, macro_m) {
                let c_block = c.add(row_block.start * ldc + col_block.start);
                if depth_block.start == 0 {
                    (plan.kernels.scale_c)(row_block.len(), col_block.len(), beta, c_block, ldc);
                }
                macro_kernel(
                    &plan.kernels,
                    row_block.len(),
                    col_block.len(),
                    depth_block.len(),
                    alpha,
                    a.add(row_block.start * lda + depth_block.start),
                    lda,
                    b.add(col_block.start * ldb + depth_block.start),
                    ldb,
                    c_block,
                    ldc,
                );
            }
        }
    }
}

/// Update an `m x n` block of C with dot products over `k` elements.
///
/// Rows are covered by 6-row kernels where available, then 3, 2 and 1-row
/// kernels. Columns are covered in groups of 4, then one at a time.
unsafe fn macro_kernel(
    kernels: &NtKernels,
    m: usize,
    n: usize,
    k: usize,
    alpha: f32,
    a: *const f32,
    lda: usize,
    b: *const f32,
    ldb: usize,
    c: *mut f32,
    ldc: usize,
) {
    let n4 = n / NtKernels::MICRO_N * NtKernels::MICRO_N;

    let row_panel = |row: usize, wide: NtKernelFn, narrow: NtKernelFn| {
        let a = a.add(row * lda);
        let c = c.add(row * ldc);
        for col in (0..n4).step_by(NtKernels::MICRO_N) {
            wide(k, alpha, a, lda, b.add(col * ldb), ldb, c.add(col), ldc);
        }
        for col in n4..n {
            narrow(k, alpha, a, lda, b.add(col * ldb), ldb, c.add(col), ldc);
        }
    };

    let mut row = 0;
    if let (Some(k6x4), Some(k6x1)) = (kernels.k6x4, kernels.k6x1) {
        while row + 6 <= m {
            row_panel(row, k6x4, k6x1);
            row += 6;
        }
    }
    while row + 3 <= m {
        row_panel(row, kernels.k3x4, kernels.k3x1);
        row += 3;
    }
    if row + 2 <= m {
        row_panel(row, kernels.k2x4, kernels.k2x1);
        row += 2;
    }
    if row < m {
        row_panel(row, kernels.k1x4, kernels.k1x1);
    }
}
