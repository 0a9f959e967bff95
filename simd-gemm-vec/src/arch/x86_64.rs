use std::arch::x86_64::{
    __m128, __m256, __m256i, _mm256_add_ps, _mm256_castps256_ps128, _mm256_extractf128_ps,
    _mm256_fmadd_ps, _mm256_loadu_ps, _mm256_loadu_si256, _mm256_maskload_ps,
    _mm256_maskstore_ps, _mm256_mul_ps, _mm256_set1_ps, _mm256_storeu_ps, _mm_add_ps,
    _mm_cvtss_f32, _mm_loadu_ps, _mm_movehl_ps, _mm_mul_ps, _mm_set1_ps,
    _mm_shuffle_ps, _mm_storeu_ps,
};
use std::mem::transmute;

use crate::SimdFloat;

/// Lane masks for 8 x 32-bit vectors. Loading 8 values starting at offset
/// `8 - n` yields a mask with the first `n` lanes set.
static MASK_TABLE_X8: [i32; 16] = [-1, -1, -1, -1, -1, -1, -1, -1, 0, 0, 0, 0, 0, 0, 0, 0];

/// Reduce four lanes to a scalar sum.
///
/// See https://stackoverflow.com/a/13222410/434243.
#[inline(always)]
unsafe fn sum_m128(x: __m128) -> f32 {
    let hi_2 = _mm_movehl_ps(x, x);
    let sum_2 = _mm_add_ps(x, hi_2);
    let hi = _mm_shuffle_ps(sum_2, sum_2, 0x1);
    _mm_cvtss_f32(_mm_add_ps(sum_2, hi))
}

// SSE is part of the x86_64 baseline, so no target features are needed.
impl SimdFloat for __m128 {
    const LEN: usize = 4;

    type Mask = usize;
    type Array = [f32; 4];

    #[inline]
    unsafe fn splat(val: f32) -> Self {
        _mm_set1_ps(val)
    }

    #[inline]
    unsafe fn load(ptr: *const f32) -> Self {
        _mm_loadu_ps(ptr)
    }

    #[inline]
    unsafe fn store(self, ptr: *mut f32) {
        _mm_storeu_ps(ptr, self)
    }

    #[inline]
    unsafe fn to_array(self) -> [f32; 4] {
        transmute::<__m128, [f32; 4]>(self)
    }

    #[inline]
    unsafe fn tail_mask(len: usize) -> usize {
        len.min(4)
    }

    #[inline]
    unsafe fn load_masked(ptr: *const f32, mask: usize) -> Self {
        Self::load_partial(ptr, mask)
    }

    #[inline]
    unsafe fn store_masked(self, ptr: *mut f32, mask: usize) {
        self.store_partial(ptr, mask)
    }

    #[inline]
    unsafe fn mul(self, rhs: Self) -> Self {
        _mm_mul_ps(self, rhs)
    }

    #[inline]
    unsafe fn mul_add(self, a: Self, b: Self) -> Self {
        _mm_add_ps(_mm_mul_ps(self, a), b)
    }

    #[inline]
    unsafe fn sum(self) -> f32 {
        sum_m128(self)
    }
}

#[inline]
#[target_feature(enable = "avx")]
unsafe fn tail_mask_x8(len: usize) -> __m256i {
    let len = len.min(8);
    _mm256_loadu_si256(MASK_TABLE_X8.as_ptr().add(8 - len) as *const __m256i)
}

#[inline]
#[target_feature(enable = "avx")]
unsafe fn sum_m256(x: __m256) -> f32 {
    let hi_4 = _mm256_extractf128_ps(x, 1);
    let lo_4 = _mm256_castps256_ps128(x);
    sum_m128(_mm_add_ps(lo_4, hi_4))
}

/// 256-bit vector for CPUs which have AVX but not FMA.
///
/// `mul_add` is computed as a separate multiply and add.
#[derive(Copy, Clone)]
#[repr(transparent)]
pub struct AvxF32x8(pub __m256);

impl SimdFloat for AvxF32x8 {
    const LEN: usize = 8;

    type Mask = __m256i;
    type Array = [f32; 8];

    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn splat(val: f32) -> Self {
        AvxF32x8(_mm256_set1_ps(val))
    }

    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn load(ptr: *const f32) -> Self {
        AvxF32x8(_mm256_loadu_ps(ptr))
    }

    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn store(self, ptr: *mut f32) {
        _mm256_storeu_ps(ptr, self.0)
    }

    #[inline]
    unsafe fn to_array(self) -> [f32; 8] {
        transmute::<__m256, [f32; 8]>(self.0)
    }

    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn tail_mask(len: usize) -> __m256i {
        tail_mask_x8(len)
    }

    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn load_masked(ptr: *const f32, mask: __m256i) -> Self {
        AvxF32x8(_mm256_maskload_ps(ptr, mask))
    }

    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn store_masked(self, ptr: *mut f32, mask: __m256i) {
        _mm256_maskstore_ps(ptr, mask, self.0)
    }

    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn mul(self, rhs: Self) -> Self {
        AvxF32x8(_mm256_mul_ps(self.0, rhs.0))
    }

    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn mul_add(self, a: Self, b: Self) -> Self {
        AvxF32x8(_mm256_add_ps(_mm256_mul_ps(self.0, a.0), b.0))
    }

    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn sum(self) -> f32 {
        sum_m256(self.0)
    }
}

impl SimdFloat for __m256 {
    const LEN: usize = 8;

    type Mask = __m256i;
    type Array = [f32; 8];

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn splat(val: f32) -> Self {
        _mm256_set1_ps(val)
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn load(ptr: *const f32) -> Self {
        _mm256_loadu_ps(ptr)
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn store(self, ptr: *mut f32) {
        _mm256_storeu_ps(ptr, self)
    }

    #[inline]
    unsafe fn to_array(self) -> [f32; 8] {
        transmute::<__m256, [f32; 8]>(self)
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn tail_mask(len: usize) -> __m256i {
        tail_mask_x8(len)
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn load_masked(ptr: *const f32, mask: __m256i) -> Self {
        _mm256_maskload_ps(ptr, mask)
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn store_masked(self, ptr: *mut f32, mask: __m256i) {
        _mm256_maskstore_ps(ptr, mask, self)
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn mul(self, rhs: Self) -> Self {
        _mm256_mul_ps(self, rhs)
    }

    #[inline]
    #[target_feature(enable = "fma")]
    unsafe fn mul_add(self, a: Self, b: Self) -> Self {
        _mm256_fmadd_ps(self, a, b)
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn sum(self) -> f32 {
        sum_m256(self)
    }
}

#[cfg(feature = "avx512")]
use std::arch::x86_64::{
    __m512, __mmask16, _mm512_fmadd_ps, _mm512_loadu_ps, _mm512_mask_storeu_ps,
    _mm512_maskz_loadu_ps, _mm512_mul_ps, _mm512_reduce_add_ps, _mm512_set1_ps,
    _mm512_storeu_ps,
};

#[cfg(feature = "avx512")]
impl SimdFloat for __m512 {
    const LEN: usize = 16;

    type Mask = __mmask16;
    type Array = [f32; 16];

    #[inline]
    #[target_feature(enable = "avx512f")]
    unsafe fn splat(val: f32) -> Self {
        _mm512_set1_ps(val)
    }

    #[inline]
    #[target_feature(enable = "avx512f")]
    unsafe fn load(ptr: *const f32) -> Self {
        _mm512_loadu_ps(ptr)
    }

    #[inline]
    #[target_feature(enable = "avx512f")]
    unsafe fn store(self, ptr: *mut f32) {
        _mm512_storeu_ps(ptr, self)
    }

    #[inline]
    unsafe fn to_array(self) -> [f32; 16] {
        transmute::<__m512, [f32; 16]>(self)
    }

    #[inline]
    unsafe fn tail_mask(len: usize) -> __mmask16 {
        ((1u32 << len.min(16)) - 1) as __mmask16
    }

    #[inline]
    #[target_feature(enable = "avx512f")]
    unsafe fn load_masked(ptr: *const f32, mask: __mmask16) -> Self {
        _mm512_maskz_loadu_ps(mask, ptr)
    }

    #[inline]
    #[target_feature(enable = "avx512f")]
    unsafe fn store_masked(self, ptr: *mut f32, mask: __mmask16) {
        _mm512_mask_storeu_ps(ptr, mask, self)
    }

    #[inline]
    #[target_feature(enable = "avx512f")]
    unsafe fn mul(self, rhs: Self) -> Self {
        _mm512_mul_ps(self, rhs)
    }

    #[inline]
    #[target_feature(enable = "avx512f")]
    unsafe fn mul_add(self, a: Self, b: Self) -> Self {
        _mm512_fmadd_ps(self, a, b)
    }

    #[inline]
    #[target_feature(enable = "avx512f")]
    unsafe fn sum(self) -> f32 {
        _mm512_reduce_add_ps(self)
    }
}
