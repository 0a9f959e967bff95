use std::arch::aarch64::float32x4_t;

use super::packing::{pack_a, pack_b};
use super::selection::{neon_cascade, neon_nn_shape};
use super::simd_generic::isa_kernels;
use super::{KernelTier, MicroKernelSet, NnKernels, NtKernels};

isa_kernels!(
    simd = float32x4_t,
    features = [],
    rows = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
    regs = [1, 2, 3, 4],
);

/// Kernels using 128-bit Arm Neon vectors.
///
/// Neon has 32 vector registers, which allows tiles of up to 12 rows. A is
/// always packed, since the tall tiles otherwise stride across many rows of
/// A per reduction step.
pub struct NeonKernels {
    _private: (),
}

// Safety: Neon is always available on aarch64.
unsafe impl MicroKernelSet for NeonKernels {
    fn new() -> Option<Self> {
        Some(NeonKernels { _private: () })
    }

    fn name(&self) -> &'static str {
        "neon"
    }

    fn vec_len(&self) -> usize {
        VEC_LEN
    }

    fn nn_kernels(&self, m: usize, n: usize, _k: usize) -> NnKernels {
        NnKernels::new(
            neon_nn_shape(m, n),
            VEC_LEN,
            select_nn,
            m,
            n,
            Some(pack_a),
            pack_b,
            scale_c,
        )
    }

    fn nncb_kernels(
        &self,
        m: usize,
        n: usize,
        _k: usize,
        tier: KernelTier,
    ) -> (NnKernels, KernelTier) {
        let (shape, tier) = neon_cascade(m, n, tier);
        let kernels =
            NnKernels::new(shape, VEC_LEN, select_nn, m, n, Some(pack_a), pack_b, scale_c);
        (kernels, tier)
    }

    fn nt_kernels(&self) -> NtKernels {
        nt_kernels(true)
    }
}
