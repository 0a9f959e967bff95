//! Cache blocking shared by the GEMM engines.

use crate::config::CacheSizes;
use crate::iter_util::{align_hi, align_lo};
use crate::kernels::{NnKernelFn, NnKernels};

/// Problem volume (`M * N * K`) below which GEMM runs on a single thread.
pub const PARALLEL_THRESHOLD: usize = 256 * 256 * 256 * 2;

const F32_SIZE: usize = size_of::<f32>();

/// Macro tile sizes for one problem.
///
/// `macro_k` is chosen so one packed B panel of `micro_n x macro_k` fits in
/// L1, `macro_m` so a `macro_m x macro_k` block of A fits in L2 and `macro_n`
/// so a `macro_k x macro_n` block of B fits in L3. `macro_m` and `macro_n`
/// are multiples of the micro tile and are clamped to the rounded-up matrix
/// size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MacroTiles {
    pub macro_m: usize,
    pub macro_n: usize,
    pub macro_k: usize,
}

impl MacroTiles {
    pub fn new(
        cache: &CacheSizes,
        m: usize,
        n: usize,
        k: usize,
        micro_m: usize,
        micro_n: usize,
    ) -> MacroTiles {
        let macro_k = (cache.l1 / F32_SIZE / micro_n).min(k).max(1);
        MacroTiles {
            macro_m: macro_m_limit(cache, macro_k, micro_m).min(align_hi(m.max(1), micro_m)),
            macro_n: (align_lo(cache.l3 / F32_SIZE / macro_k, micro_n).max(micro_n))
                .min(align_hi(n.max(1), micro_n)),
            macro_k,
        }
    }

    /// Return the tiles for a run with `m` rows instead of the size these
    /// tiles were computed for. Only `macro_m` changes.
    pub fn with_rows(&self, cache: &CacheSizes, m: usize, micro_m: usize) -> MacroTiles {
        MacroTiles {
            macro_m: macro_m_limit(cache, self.macro_k, micro_m).min(align_hi(m.max(1), micro_m)),
            ..*self
        }
    }
}

fn macro_m_limit(cache: &CacheSizes, macro_k: usize, micro_m: usize) -> usize {
    align_lo(cache.l2 / F32_SIZE / macro_k, micro_m).max(micro_m)
}

/// Return the number of threads to use for an `m x n x k` problem, given an
/// upper limit.
///
/// Small problems run on one thread, and there is never more than one thread
/// per column panel.
pub fn thread_count(m: usize, n: usize, k: usize, micro_n: usize, max_threads: usize) -> usize {
    let volume = m.saturating_mul(n).saturating_mul(k);
    if volume < PARALLEL_THRESHOLD {
        1
    } else {
        max_threads.clamp(1, n.div_ceil(micro_n).max(1))
    }
}

/// Raw pointer to an input matrix, shared with worker threads.
#[derive(Clone, Copy)]
pub struct InputPtr(*const f32);

impl InputPtr {
    pub fn new(ptr: *const f32) -> Self {
        InputPtr(ptr)
    }

    // Accessed via a method so closures capture the whole wrapper.
    pub fn get(self) -> *const f32 {
        self.0
    }
}

// Safety: Inputs are only read during a GEMM call.
unsafe impl Send for InputPtr {}
unsafe impl Sync for InputPtr {}

/// Raw pointer to the output matrix, shared with worker threads.
#[derive(Clone, Copy)]
pub struct OutputPtr(*mut f32);

impl OutputPtr {
    pub fn new(ptr: *mut f32) -> Self {
        OutputPtr(ptr)
    }

    pub fn get(self) -> *mut f32 {
        self.0
    }
}

// Safety: Each worker writes to a disjoint range of output columns.
unsafe impl Send for OutputPtr {}
unsafe impl Sync for OutputPtr {}

/// Location of the A block read by [`macro_kernel`].
#[derive(Clone, Copy)]
pub enum ABlock {
    /// A is read in place with row stride `lda`.
    Strided { ptr: *const f32, lda: usize },
    /// A was packed into panels by a `PackAFn`, with `k` values per row.
    Packed { ptr: *const f32 },
}

/// Packed B block read by [`macro_kernel`]. Column panel `p` starts at
/// `ptr + p * panel_stride`.
#[derive(Clone, Copy)]
pub struct BBlock {
    pub ptr: *const f32,
    pub panel_stride: usize,
}

/// Compute `C += alpha * A * B` for an `m x n` block of C with reduction
/// size `k`, by calling micro-kernels for each tile.
///
/// Full tiles use `main`, the last column panel uses `main_tail` if `n` is
/// not a multiple of `micro_n`, and the last row panel uses the row-tail
/// kernels. The block must start on a `micro_n` boundary of C and the ragged
/// edge, if any, must be the right edge of C.
///
/// Safety: The kernels must be supported on the current system and all
/// pointers must be valid for the block.
pub unsafe fn macro_kernel(
    kernels: &NnKernels,
    m: usize,
    n: usize,
    k: usize,
    alpha: f32,
    a: ABlock,
    b: BBlock,
    c: *mut f32,
    ldc: usize,
) {
    let micro_m = kernels.micro_m;
    let micro_n = kernels.micro_n;
    let full_lanes = kernels.vec_len;
    let m_main = align_lo(m, micro_m);
    let n_main = align_lo(n, micro_n);

    // Return (ptr, lda, sa) for the A panel starting at row `i`.
    let a_panel = |i: usize| match a {
        ABlock::Strided { ptr, lda } => (ptr.add(i * lda), lda, 1),
        ABlock::Packed { ptr } => (ptr.add(i * k), 1, micro_m.min(m - i)),
    };

    let column = |j: usize, main: NnKernelFnPair, lanes: usize| {
        let b_panel = b.ptr.add((j / micro_n) * b.panel_stride);
        let mut i = 0;
        while i < m_main {
            let (a_ptr, lda, sa) = a_panel(i);
            (main.full)(k, alpha, a_ptr, lda, sa, b_panel, micro_n, c.add(i * ldc + j), ldc, lanes);
            i += micro_m;
        }
        if i < m {
            if let Some(tail) = main.rows_tail {
                let (a_ptr, lda, sa) = a_panel(i);
                tail(k, alpha, a_ptr, lda, sa, b_panel, micro_n, c.add(i * ldc + j), ldc, lanes);
            } else {
                debug_assert!(false, "row tail kernel missing");
            }
        }
    };

    let mut j = 0;
    while j < n_main {
        column(
            j,
            NnKernelFnPair {
                full: kernels.main,
                rows_tail: kernels.tail_main,
            },
            full_lanes,
        );
        j += micro_n;
    }
    if j < n {
        column(
            j,
            NnKernelFnPair {
                full: kernels.main_tail,
                rows_tail: kernels.tail_tail,
            },
            kernels.tail_lanes,
        );
    }
}

/// Kernels used for one column panel: full row panels and the row tail.
#[derive(Clone, Copy)]
struct NnKernelFnPair {
    full: NnKernelFn,
    rows_tail: Option<NnKernelFn>,
}
