use std::ops::Range;

use crate::blocking::{macro_kernel, thread_count, ABlock, BBlock, InputPtr, MacroTiles, OutputPtr};
use crate::config::GemmConfig;
use crate::iter_util::{range_chunks, split_range, MaybeParIter};
use crate::kernels::NnKernels;
use crate::threading::thread_pool;

/// Packing buffers owned by one worker thread.
struct PackBuffers {
    /// Packed `macro_m x macro_k` block of A. Empty if A is read in place.
    a: Vec<f32>,
    /// Packed `macro_k x macro_n` block of B.
    b: Vec<f32>,
}

/// Sizes and kernels shared by every worker.
#[derive(Clone, Copy)]
struct Plan {
    m: usize,
    n: usize,
    k: usize,
    tiles: MacroTiles,
    kernels: NnKernels,
}

/// Engine for `C = alpha * A * B + beta * C` where A is `M x K`, B is
/// `K x N` and C is `M x N`, all row-major with explicit row strides.
///
/// This implements the three-level blocking of the Goto / BLIS approach[^1].
/// The N dimension is split into column ranges which are processed by
/// separate threads. Each thread then walks its range in `macro_n` wide
/// blocks, packs `macro_k x macro_n` blocks of B (and optionally
/// `macro_m x macro_k` blocks of A) into its own buffers, and calls the
/// micro-kernels for each tile of the block.
///
/// Packing buffers are allocated when the engine is created and reused by
/// every call to [`GemmNN::run`].
///
/// [^1]: Low, Tze Meng, et al. "Analytical modeling is enough for
///       high-performance BLIS." ACM Transactions on Mathematical Software
///       (TOMS) 43.2 (2016): 1-18.
pub struct GemmNN {
    plan: Plan,
    num_threads: usize,
    buffers: Vec<PackBuffers>,
}

impl GemmNN {
    /// Prepare an engine for `m x n x k` products using the given kernels.
    pub fn new(m: usize, n: usize, k: usize, kernels: NnKernels, config: &GemmConfig) -> GemmNN {
        let cache = config.cache.promoted(n, kernels.wide_n);
        let tiles = MacroTiles::new(&cache, m, n, k, kernels.micro_m, kernels.micro_n);
        let num_threads = thread_count(m, n, k, kernels.micro_n, config.max_threads());

        let a_len = if kernels.pack_a.is_some() {
            tiles.macro_m * tiles.macro_k
        } else {
            0
        };
        let b_len = tiles.macro_n * tiles.macro_k;
        let buffers = (0..num_threads)
            .map(|_| PackBuffers {
                a: vec![0.; a_len],
                b: vec![0.; b_len],
            })
            .collect();

        tracing::debug!(
            m,
            n,
            k,
            micro_m = kernels.micro_m,
            micro_n = kernels.micro_n,
            macro_m = tiles.macro_m,
            macro_n = tiles.macro_n,
            macro_k = tiles.macro_k,
            num_threads,
            pack_a = kernels.pack_a.is_some(),
            "prepared GemmNN"
        );

        GemmNN {
            plan: Plan {
                m,
                n,
                k,
                tiles,
                kernels,
            },
            num_threads,
            buffers,
        }
    }

    pub fn micro_m(&self) -> usize {
        self.plan.kernels.micro_m
    }

    pub fn micro_n(&self) -> usize {
        self.plan.kernels.micro_n
    }

    pub fn macro_m(&self) -> usize {
        self.plan.tiles.macro_m
    }

    pub fn macro_n(&self) -> usize {
        self.plan.tiles.macro_n
    }

    pub fn macro_k(&self) -> usize {
        self.plan.tiles.macro_k
    }

    /// Number of threads [`GemmNN::run`] splits the N dimension across.
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Compute `C = alpha * A * B + beta * C`.
    ///
    /// If `beta` is zero, C is overwritten without being read, so it may hold
    /// uninitialized garbage such as NaN. If `K` is zero, C is only scaled by
    /// `beta`.
    ///
    /// # Safety
    ///
    /// - `a` must be valid for reads of an `M x K` matrix with row stride
    ///   `lda >= K`.
    /// - `b` must be valid for reads of a `K x N` matrix with row stride
    ///   `ldb >= N`.
    /// - `c` must be valid for reads and writes of an `M x N` matrix with row
    ///   stride `ldc >= N`, and must not overlap `a` or `b`.
    pub unsafe fn run(
        &mut self,
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

        let ranges = split_range(plan.n, self.num_threads, plan.kernels.micro_n);
        let parallel = ranges.len() > 1;
        let work: Vec<(Range<usize>, &mut PackBuffers)> =
            ranges.into_iter().zip(self.buffers.iter_mut()).collect();

        let run_thread = |(cols, buffers): (Range<usize>, &mut PackBuffers)| {
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
                    buffers,
                )
            }
        };

        if parallel {
            thread_pool().run(|| work.maybe_par_iter(true).for_each(run_thread));
        } else {
            work.into_iter().for_each(run_thread);
        }
    }
}

/// Compute the columns `cols` of C.
///
/// Blocks are visited in the order N, K, M. B is packed once per
/// `(N, K)` block and reused across all row blocks, and `beta` is applied
/// to each block of C before its first update.
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
    buffers: &mut PackBuffers,
) {
    let kernels = &plan.kernels;
    let MacroTiles {
        macro_m,
        macro_n,
        macro_k,
    } = plan.tiles;

    for col_block in range_chunks(cols, macro_n) {
        let nc = col_block.len();
        for depth_block in range_chunks(0..plan.k, macro_k) {
            let kc = depth_block.len();
            for row_block in range_chunks(0..plan.m, macro_m) {
                let mc = row_block.len();
                let c_block = c.add(row_block.start * ldc + col_block.start);

                if depth_block.start == 0 {
                    (kernels.scale_c)(mc, nc, beta, c_block, ldc);
                }

                if row_block.start == 0 {
                    (kernels.pack_b)(
                        b.add(depth_block.start * ldb + col_block.start),
                        ldb,
                        kc,
                        nc,
                        kernels.micro_n,
                        buffers.b.as_mut_ptr(),
                        kernels.micro_n * kc,
                    );
                }

                let a_block = a.add(row_block.start * lda + depth_block.start);
                let a_block = match kernels.pack_a {
                    Some(pack_a) => {
                        pack_a(a_block, lda, mc, kc, kernels.micro_m, buffers.a.as_mut_ptr());
                        ABlock::Packed {
                            ptr: buffers.a.as_ptr(),
                        }
                    }
                    None => ABlock::Strided { ptr: a_block, lda },
                };

                macro_kernel(
                    kernels,
                    mc,
                    nc,
                    kc,
                    alpha,
                    a_block,
                    BBlock {
                        ptr: buffers.b.as_ptr(),
                        panel_stride: kernels.micro_n * kc,
                    },
                    c_block,
                    ldc,
                );
            }
        }
    }
}
