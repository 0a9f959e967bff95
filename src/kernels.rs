//! Micro-kernel sets and the policies that choose between them.
//!
//! A micro-kernel computes a small `micro_m x micro_n` tile of the output.
//! Each instruction set provides a [`MicroKernelSet`], which hands out tables
//! of kernel function pointers ([`NnKernels`], [`NtKernels`]) chosen for a
//! particular problem shape. The GEMM engines only see the tables.

use crate::config::WIDE_N;
use crate::iter_util::align_lo;

mod generic;
mod packing;
mod selection;
mod simd_generic;

#[cfg(target_arch = "aarch64")]
mod aarch64;
#[cfg(target_arch = "x86_64")]
mod x86_64;

pub use generic::GenericKernels;
#[cfg(target_arch = "aarch64")]
pub use aarch64::NeonKernels;
#[cfg(feature = "avx512")]
#[cfg(target_arch = "x86_64")]
pub use x86_64::Avx512Kernels;
#[cfg(target_arch = "x86_64")]
pub use x86_64::{Avx2Kernels, AvxKernels, Sse41Kernels};

/// Outer-product micro-kernel.
///
/// Computes `C += alpha * A * B` for a tile of `MR` rows (fixed by the kernel)
/// and `NR_REGS * F` columns, reducing over `k` steps.
///
/// - Element `(i, kk)` of A is read from `a[i * lda + kk * sa]`. Unpacked A
///   uses `sa = 1`, a packed A panel uses `lda = 1, sa = rows in panel`.
/// - Row `kk` of B starts at `b[kk * sb]` and must hold `NR_REGS * F` readable
///   values (B is always packed).
/// - `tail` is the number of lanes of the last vector column to read and
///   write in C. `tail == F` updates the full tile.
///
/// If `k == 0` the kernel returns without touching C.
pub type NnKernelFn = unsafe fn(
    k: usize,
    alpha: f32,
    a: *const f32,
    lda: usize,
    sa: usize,
    b: *const f32,
    sb: usize,
    c: *mut f32,
    ldc: usize,
    tail: usize,
);

/// Dot-product micro-kernel.
///
/// Computes `C += alpha * A * B^T` for a tile of `MR x NR` outputs, where A
/// and B are both read along rows of length `k`.
pub type NtKernelFn = unsafe fn(
    k: usize,
    alpha: f32,
    a: *const f32,
    lda: usize,
    b: *const f32,
    ldb: usize,
    c: *mut f32,
    ldc: usize,
);

/// Pack an `m x k` block of A into panels of `micro_m` rows.
pub type PackAFn =
    unsafe fn(a: *const f32, lda: usize, m: usize, k: usize, micro_m: usize, dst: *mut f32);

/// Pack a `k x n` block of B into panels of `micro_n` columns, spaced
/// `panel_stride` elements apart in `dst`.
pub type PackBFn = unsafe fn(
    b: *const f32,
    ldb: usize,
    k: usize,
    n: usize,
    micro_n: usize,
    dst: *mut f32,
    panel_stride: usize,
);

/// Scale an `m x n` block of C by `beta`.
pub type ScaleCFn = unsafe fn(m: usize, n: usize, beta: f32, c: *mut f32, ldc: usize);

/// Return the outer-product kernel specialized for a tile of `rows` rows and
/// `cols` columns (rounded up to whole vectors).
pub type SelectNnFn = fn(rows: usize, cols: usize) -> NnKernelFn;

/// Micro-tile width tier used by the packed-B engine.
///
/// `F1` tiles are one vector wide, `F2` two vectors and so on. `Any` lets the
/// selection policy choose. Requesting a tier which does not fit the problem
/// width falls back to the next narrower tier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum KernelTier {
    #[default]
    Any = 0,
    F1 = 1,
    F2 = 2,
    F3 = 3,
    F4 = 4,
}

impl KernelTier {
    /// Convert a numeric tier as used by the C API. Unknown values map to
    /// `Any`.
    pub fn from_u32(value: u32) -> KernelTier {
        match value {
            1 => KernelTier::F1,
            2 => KernelTier::F2,
            3 => KernelTier::F3,
            4 => KernelTier::F4,
            _ => KernelTier::Any,
        }
    }
}

/// Shape of the output tile computed by one micro-kernel call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileShape {
    pub micro_m: usize,
    pub micro_n: usize,
}

impl TileShape {
    pub const fn new(micro_m: usize, micro_n: usize) -> TileShape {
        TileShape { micro_m, micro_n }
    }
}

/// Outer-product kernels resolved for a particular `(M, N)`.
///
/// `main` handles full tiles and `main_tail` the rightmost, partial column
/// panel. `tail_main` and `tail_tail` handle the final partial row panel and
/// are `None` when `M` is a multiple of `micro_m`.
#[derive(Clone, Copy)]
pub struct NnKernels {
    pub micro_m: usize,
    pub micro_n: usize,

    /// Vector width in f32 lanes.
    pub vec_len: usize,

    pub main: NnKernelFn,
    pub main_tail: NnKernelFn,
    pub tail_main: Option<NnKernelFn>,
    pub tail_tail: Option<NnKernelFn>,

    /// Lanes written by the last vector of the partial column panel.
    pub tail_lanes: usize,

    /// A-packing is skipped when `None`, and kernels read A in place.
    pub pack_a: Option<PackAFn>,
    pub pack_b: PackBFn,
    pub scale_c: ScaleCFn,

    /// Problem width above which the cache budgets are promoted, see
    /// [`CacheSizes::promoted`](crate::CacheSizes::promoted).
    pub wide_n: Option<usize>,

    select: SelectNnFn,
    n: usize,
}

impl NnKernels {
    /// Resolve the kernels for an `m x n` output using tiles of `shape`.
    pub fn new(
        shape: TileShape,
        vec_len: usize,
        select: SelectNnFn,
        m: usize,
        n: usize,
        pack_a: Option<PackAFn>,
        pack_b: PackBFn,
        scale_c: ScaleCFn,
    ) -> NnKernels {
        let TileShape { micro_m, micro_n } = shape;
        debug_assert!(micro_n % vec_len == 0);

        let n_tail = match n - align_lo(n, micro_n) {
            0 => micro_n,
            tail => tail,
        };
        let tail_lanes = match n % vec_len {
            0 => vec_len,
            lanes => lanes,
        };

        let mut kernels = NnKernels {
            micro_m,
            micro_n,
            vec_len,
            main: select(micro_m, micro_n),
            main_tail: select(micro_m, n_tail),
            tail_main: None,
            tail_tail: None,
            tail_lanes,
            pack_a,
            pack_b,
            scale_c,
            wide_n: Some(WIDE_N),
            select,
            n,
        };
        kernels.set_rows(m);
        kernels
    }

    /// Replace the wide-N cache promotion threshold.
    pub fn with_wide_n(mut self, wide_n: Option<usize>) -> NnKernels {
        self.wide_n = wide_n;
        self
    }

    /// Return a copy of these kernels with the row tails resolved for an
    /// output of `m` rows.
    pub fn with_rows(&self, m: usize) -> NnKernels {
        let mut kernels = *self;
        kernels.set_rows(m);
        kernels
    }

    fn set_rows(&mut self, m: usize) {
        let rows = m % self.micro_m;
        if rows == 0 {
            self.tail_main = None;
            self.tail_tail = None;
        } else {
            let n_tail = match self.n - align_lo(self.n, self.micro_n) {
                0 => self.micro_n,
                tail => tail,
            };
            self.tail_main = Some((self.select)(rows, self.micro_n));
            self.tail_tail = Some((self.select)(rows, n_tail));
        }
    }
}

/// Dot-product kernels used by the transposed-B engine.
///
/// `kRxC` computes `R` rows of A against `C` rows of B.
#[derive(Clone, Copy)]
pub struct NtKernels {
    pub k1x1: NtKernelFn,
    pub k1x4: NtKernelFn,
    pub k2x1: NtKernelFn,
    pub k2x4: NtKernelFn,
    pub k3x1: NtKernelFn,
    pub k3x4: NtKernelFn,
    pub k6x1: Option<NtKernelFn>,
    pub k6x4: Option<NtKernelFn>,
    pub scale_c: ScaleCFn,
}

impl NtKernels {
    /// Number of rows in the widest kernel.
    pub fn micro_m(&self) -> usize {
        if self.k6x4.is_some() && self.k6x1.is_some() {
            6
        } else {
            3
        }
    }

    /// Number of B rows (output columns) handled by the wide kernels.
    pub const MICRO_N: usize = 4;
}

/// Set of micro-kernels for one instruction set.
///
/// # Safety
///
/// Implementations must only return kernels which can run on the current
/// system. [`MicroKernelSet::new`] is responsible for the runtime check.
pub unsafe trait MicroKernelSet: Send + Sync {
    /// Construct the kernel set if it is supported on the current system.
    fn new() -> Option<Self>
    where
        Self: Sized;

    /// Short name of the instruction set, for logging and debugging.
    fn name(&self) -> &'static str;

    /// Vector width in f32 lanes.
    fn vec_len(&self) -> usize;

    /// Kernels for a one-shot `M x N x K` product.
    fn nn_kernels(&self, m: usize, n: usize, k: usize) -> NnKernels;

    /// Kernels for the packed-B engine, honoring a requested tier.
    ///
    /// Returns the kernels and the tier that was actually chosen.
    fn nncb_kernels(&self, m: usize, n: usize, k: usize, tier: KernelTier)
        -> (NnKernels, KernelTier);

    /// Dot-product kernels for the transposed-B engine.
    fn nt_kernels(&self) -> NtKernels;
}

#[cfg(test)]
mod tests {
    use super::KernelTier;

    #[test]
    fn test_kernel_tier_from_u32() {
        assert_eq!(KernelTier::from_u32(0), KernelTier::Any);
        assert_eq!(KernelTier::from_u32(3), KernelTier::F3);
        assert_eq!(KernelTier::from_u32(99), KernelTier::Any);
    }
}
