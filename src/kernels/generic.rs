use simd_gemm_vec::F32x4;

use super::packing::{pack_a, pack_b};
use super::simd_generic::isa_kernels;
use super::selection::{sse_nn_shape, three_tier_cascade};
use super::{KernelTier, MicroKernelSet, NnKernels, NtKernels};

isa_kernels!(
    simd = F32x4,
    features = [],
    rows = [1, 2, 3, 4, 5, 6],
    regs = [1, 2, 3],
);

/// Kernels using 4-lane arrays, which are supported on all platforms.
///
/// These rely on autovectorization and serve as a fallback when no native
/// kernel set is available.
#[derive(Default)]
pub struct GenericKernels {
    _private: (),
}

// Safety: Generic kernels only use portable Rust.
unsafe impl MicroKernelSet for GenericKernels {
    fn new() -> Option<Self> {
        Some(GenericKernels { _private: () })
    }

    fn name(&self) -> &'static str {
        "generic"
    }

    fn vec_len(&self) -> usize {
        VEC_LEN
    }

    fn nn_kernels(&self, m: usize, n: usize, k: usize) -> NnKernels {
        NnKernels::new(sse_nn_shape(n, k), VEC_LEN, select_nn, m, n, None, pack_b, scale_c)
    }

    fn nncb_kernels(
        &self,
        m: usize,
        n: usize,
        _k: usize,
        tier: KernelTier,
    ) -> (NnKernels, KernelTier) {
        let (shape, tier) = three_tier_cascade(m, n, VEC_LEN, tier);
        let kernels = NnKernels::new(shape, VEC_LEN, select_nn, m, n, Some(pack_a), pack_b, scale_c);
        (kernels, tier)
    }

    fn nt_kernels(&self) -> NtKernels {
        nt_kernels(false)
    }
}
