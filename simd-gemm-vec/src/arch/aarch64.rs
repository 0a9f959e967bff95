use std::arch::aarch64::{
    float32x4_t, vaddvq_f32, vdupq_n_f32, vfmaq_f32, vld1q_f32, vmulq_f32, vst1q_f32,
};
use std::mem::transmute;

use crate::SimdFloat;

// Neon is part of the aarch64 baseline, so no target features are needed.
impl SimdFloat for float32x4_t {
    const LEN: usize = 4;

    type Mask = usize;
    type Array = [f32; 4];

    #[inline]
    unsafe fn splat(val: f32) -> Self {
        vdupq_n_f32(val)
    }

    #[inline]
    unsafe fn load(ptr: *const f32) -> Self {
        vld1q_f32(ptr)
    }

    #[inline]
    unsafe fn store(self, ptr: *mut f32) {
        vst1q_f32(ptr, self)
    }

    #[inline]
    unsafe fn to_array(self) -> [f32; 4] {
        transmute::<float32x4_t, [f32; 4]>(self)
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
        vmulq_f32(self, rhs)
    }

    #[inline]
    unsafe fn mul_add(self, a: Self, b: Self) -> Self {
        vfmaq_f32(b, self, a)
    }

    #[inline]
    unsafe fn sum(self) -> f32 {
        vaddvq_f32(self)
    }
}
