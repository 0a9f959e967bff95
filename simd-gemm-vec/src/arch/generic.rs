use std::array;

use crate::SimdFloat;

/// 128-bit vector of four `f32` lanes backed by an array.
///
/// The operations are simple per-lane loops which the compiler can
/// autovectorize, so this doubles as a portable fallback and a reference
/// for the native implementations.
#[repr(align(16))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct F32x4(pub [f32; 4]);

impl From<[f32; 4]> for F32x4 {
    fn from(val: [f32; 4]) -> F32x4 {
        F32x4(val)
    }
}

impl SimdFloat for F32x4 {
    const LEN: usize = 4;

    type Mask = usize;
    type Array = [f32; 4];

    #[inline]
    unsafe fn splat(val: f32) -> Self {
        F32x4([val; 4])
    }

    #[inline]
    unsafe fn load(ptr: *const f32) -> Self {
        F32x4(array::from_fn(|i| *ptr.add(i)))
    }

    #[inline]
    unsafe fn store(self, ptr: *mut f32) {
        for i in 0..4 {
            *ptr.add(i) = self.0[i];
        }
    }

    #[inline]
    unsafe fn to_array(self) -> [f32; 4] {
        self.0
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
        F32x4(array::from_fn(|i| self.0[i] * rhs.0[i]))
    }

    #[inline]
    unsafe fn mul_add(self, a: Self, b: Self) -> Self {
        F32x4(array::from_fn(|i| self.0[i] * a.0[i] + b.0[i]))
    }

    #[inline]
    unsafe fn sum(self) -> f32 {
        (self.0[0] + self.0[2]) + (self.0[1] + self.0[3])
    }
}
