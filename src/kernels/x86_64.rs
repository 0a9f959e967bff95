use simd_gemm_vec::isa_detection::{is_avx2_fma_supported, is_avx_supported};

use super::packing::{pack_a, pack_b};
use super::selection::{avx2_nn_shape, avx_nn_shape, sse_nn_shape, three_tier_cascade};
use super::{KernelTier, MicroKernelSet, NnKernels, NtKernels};

mod sse {
    use std::arch::x86_64::__m128;

    use crate::kernels::simd_generic::isa_kernels;

    isa_kernels!(
        simd = __m128,
        features = ["sse4.1"],
        rows = [1, 2, 3, 4, 5, 6],
        regs = [1, 2, 3],
    );
}

mod avx {
    use simd_gemm_vec::AvxF32x8;

    use crate::kernels::simd_generic::isa_kernels;

    isa_kernels!(
        simd = AvxF32x8,
        features = ["avx"],
        rows = [1, 2, 3, 4, 5, 6],
        regs = [1, 2, 3],
    );
}

mod avx2 {
    use std::arch::x86_64::__m256;

    use crate::kernels::simd_generic::isa_kernels;

    isa_kernels!(
        simd = __m256,
        features = ["avx2", "fma"],
        rows = [1, 2, 3, 4, 5, 6],
        regs = [1, 2, 3],
    );
}

/// Kernels using 128-bit SSE vectors.
///
/// SSE has 16 vector registers, which is not enough for the six-row
/// dot-product kernels.
pub struct Sse41Kernels {
    _private: (),
}

// Safety: `new` checks for SSE 4.1 support.
unsafe impl MicroKernelSet for Sse41Kernels {
    fn new() -> Option<Self> {
        if !is_x86_feature_detected!("sse4.1") {
            return None;
        }
        Some(Sse41Kernels { _private: () })
    }

    fn name(&self) -> &'static str {
        "sse4.1"
    }

    fn vec_len(&self) -> usize {
        sse::VEC_LEN
    }

    fn nn_kernels(&self, m: usize, n: usize, k: usize) -> NnKernels {
        NnKernels::new(
            sse_nn_shape(n, k),
            sse::VEC_LEN,
            sse::select_nn,
            m,
            n,
            None,
            pack_b,
            sse::scale_c,
        )
    }

    fn nncb_kernels(
        &self,
        m: usize,
        n: usize,
        _k: usize,
        tier: KernelTier,
    ) -> (NnKernels, KernelTier) {
        let (shape, tier) = three_tier_cascade(m, n, sse::VEC_LEN, tier);
        let kernels = NnKernels::new(
            shape,
            sse::VEC_LEN,
            sse::select_nn,
            m,
            n,
            Some(pack_a),
            pack_b,
            sse::scale_c,
        );
        (kernels, tier)
    }

    fn nt_kernels(&self) -> NtKernels {
        sse::nt_kernels(false)
    }
}

/// Kernels using 256-bit AVX vectors, for CPUs without FMA.
pub struct AvxKernels {
    _private: (),
}

impl AvxKernels {
    /// Problem width above which the cache budgets are promoted.
    const WIDE_N: usize = 4024;
}

// Safety: `new` checks for AVX support.
unsafe impl MicroKernelSet for AvxKernels {
    fn new() -> Option<Self> {
        if !is_avx_supported() {
            return None;
        }
        Some(AvxKernels { _private: () })
    }

    fn name(&self) -> &'static str {
        "avx"
    }

    fn vec_len(&self) -> usize {
        avx::VEC_LEN
    }

    fn nn_kernels(&self, m: usize, n: usize, k: usize) -> NnKernels {
        NnKernels::new(
            avx_nn_shape(k),
            avx::VEC_LEN,
            avx::select_nn,
            m,
            n,
            None,
            pack_b,
            avx::scale_c,
        )
        .with_wide_n(Some(Self::WIDE_N))
    }

    fn nncb_kernels(
        &self,
        m: usize,
        n: usize,
        _k: usize,
        tier: KernelTier,
    ) -> (NnKernels, KernelTier) {
        let (shape, tier) = three_tier_cascade(m, n, avx::VEC_LEN, tier);
        let kernels = NnKernels::new(
            shape,
            avx::VEC_LEN,
            avx::select_nn,
            m,
            n,
            Some(pack_a),
            pack_b,
            avx::scale_c,
        )
        .with_wide_n(Some(Self::WIDE_N));
        (kernels, tier)
    }

    fn nt_kernels(&self) -> NtKernels {
        avx::nt_kernels(true)
    }
}

/// Kernels using 256-bit AVX2 vectors and fused multiply-add.
pub struct Avx2Kernels {
    _private: (),
}

// Safety: `new` checks for AVX2 and FMA support.
unsafe impl MicroKernelSet for Avx2Kernels {
    fn new() -> Option<Self> {
        if !is_avx2_fma_supported() {
            return None;
        }
        Some(Avx2Kernels { _private: () })
    }

    fn name(&self) -> &'static str {
        "avx2"
    }

    fn vec_len(&self) -> usize {
        avx2::VEC_LEN
    }

    fn nn_kernels(&self, m: usize, n: usize, k: usize) -> NnKernels {
        NnKernels::new(
            avx2_nn_shape(n, k),
            avx2::VEC_LEN,
            avx2::select_nn,
            m,
            n,
            None,
            pack_b,
            avx2::scale_c,
        )
    }

    fn nncb_kernels(
        &self,
        m: usize,
        n: usize,
        _k: usize,
        tier: KernelTier,
    ) -> (NnKernels, KernelTier) {
        let (shape, tier) = three_tier_cascade(m, n, avx2::VEC_LEN, tier);
        let kernels = NnKernels::new(
            shape,
            avx2::VEC_LEN,
            avx2::select_nn,
            m,
            n,
            Some(pack_a),
            pack_b,
            avx2::scale_c,
        );
        (kernels, tier)
    }

    fn nt_kernels(&self) -> NtKernels {
        avx2::nt_kernels(true)
    }
}

#[cfg(feature = "avx512")]
mod avx512 {
    use std::arch::x86_64::__m512;

    use crate::kernels::simd_generic::isa_kernels;

    isa_kernels!(
        simd = __m512,
        features = ["avx512f"],
        rows = [1, 2, 3, 4, 5, 6],
        regs = [1, 2, 3],
    );
}

/// Kernels using 512-bit AVX-512 vectors and hardware lane masks.
///
/// Problems with at most 8 columns are handed to the AVX2 kernels, since a
/// 16-lane tile would be mostly masked out. The cache budgets are never
/// promoted for wide problems.
#[cfg(feature = "avx512")]
pub struct Avx512Kernels {
    avx2: Avx2Kernels,
}

#[cfg(feature = "avx512")]
impl Avx512Kernels {
    /// Problem width at or below which the AVX2 kernels are used.
    const NARROW_N: usize = 8;
}

// Safety: `new` checks for AVX-512F, AVX2 and FMA support.
#[cfg(feature = "avx512")]
unsafe impl MicroKernelSet for Avx512Kernels {
    fn new() -> Option<Self> {
        if !simd_gemm_vec::isa_detection::is_avx512_supported() {
            return None;
        }
        let avx2 = Avx2Kernels::new()?;
        Some(Avx512Kernels { avx2 })
    }

    fn name(&self) -> &'static str {
        "avx512"
    }

    fn vec_len(&self) -> usize {
        avx512::VEC_LEN
    }

    fn nn_kernels(&self, m: usize, n: usize, k: usize) -> NnKernels {
        if n <= Self::NARROW_N {
            return self.avx2.nn_kernels(m, n, k);
        }
        NnKernels::new(
            super::selection::avx512_nn_shape(m, n, k),
            avx512::VEC_LEN,
            avx512::select_nn,
            m,
            n,
            None,
            pack_b,
            avx512::scale_c,
        )
        .with_wide_n(None)
    }

    fn nncb_kernels(
        &self,
        m: usize,
        n: usize,
        k: usize,
        tier: KernelTier,
    ) -> (NnKernels, KernelTier) {
        if n <= Self::NARROW_N {
            return self.avx2.nncb_kernels(m, n, k, tier);
        }
        let (shape, tier) = super::selection::avx512_cascade(m, n, tier);
        let kernels = NnKernels::new(
            shape,
            avx512::VEC_LEN,
            avx512::select_nn,
            m,
            n,
            Some(pack_a),
            pack_b,
            avx512::scale_c,
        )
        .with_wide_n(None);
        (kernels, tier)
    }

    fn nt_kernels(&self) -> NtKernels {
        avx512::nt_kernels(true)
    }
}
