/// SIMD vector of `f32` lanes.
///
/// All methods are unsafe due to limitations of Rust's `#[target_feature]`
/// attribute. See
/// <https://rust-lang.github.io/rfcs/2396-target-feature-1.1.html>. For the
/// same reason arithmetic is exposed as methods rather than through
/// `std::ops`.
#[allow(clippy::missing_safety_doc)]
pub trait SimdFloat: Copy {
    /// Number of `f32` lanes in the vector.
    const LEN: usize;

    /// Lane selector used by [`load_masked`](SimdFloat::load_masked) and
    /// [`store_masked`](SimdFloat::store_masked).
    ///
    /// On ISAs with native masked memory operations this is the hardware mask
    /// representation (eg. `__mmask16` for AVX-512). Elsewhere it is the lane
    /// count.
    type Mask: Copy;

    /// The contents of a vector as an array. Always `[f32; Self::LEN]`.
    type Array: Copy + std::fmt::Debug + AsRef<[f32]> + AsMut<[f32]>;

    /// Broadcast `val` to all lanes.
    unsafe fn splat(val: f32) -> Self;

    /// Return a vector with all lanes set to zero.
    #[inline]
    unsafe fn zero() -> Self {
        Self::splat(0.)
    }

    /// Load `Self::LEN` values from `ptr`.
    ///
    /// Implementations must not require `ptr` to be aligned.
    unsafe fn load(ptr: *const f32) -> Self;

    /// Store `Self::LEN` values to `ptr`.
    ///
    /// Implementations must not require `ptr` to be aligned.
    unsafe fn store(self, ptr: *mut f32);

    /// Return the contents of this vector as an array.
    unsafe fn to_array(self) -> Self::Array;

    /// Load `len` values from `ptr` into a vector and zero the unused lanes.
    ///
    /// Panics if `len > Self::LEN`.
    #[inline]
    unsafe fn load_partial(ptr: *const f32, len: usize) -> Self {
        assert!(len <= Self::LEN);
        let mut remainder = Self::zero().to_array();
        for i in 0..len {
            remainder.as_mut()[i] = *ptr.add(i);
        }
        Self::load(remainder.as_ref().as_ptr())
    }

    /// Store the first `len` lanes from `self` into `dest`.
    ///
    /// Panics if `len > Self::LEN`.
    #[inline]
    unsafe fn store_partial(self, dest: *mut f32, len: usize) {
        assert!(len <= Self::LEN);
        let remainder = self.to_array();
        for i in 0..len {
            dest.add(i).write(remainder.as_ref()[i]);
        }
    }

    /// Return a mask selecting the first `len` lanes.
    unsafe fn tail_mask(len: usize) -> Self::Mask;

    /// Load the lanes selected by `mask` and zero the others. Memory for
    /// unselected lanes is not accessed.
    unsafe fn load_masked(ptr: *const f32, mask: Self::Mask) -> Self;

    /// Store the lanes selected by `mask`. Memory for unselected lanes is
    /// not accessed.
    unsafe fn store_masked(self, ptr: *mut f32, mask: Self::Mask);

    unsafe fn mul(self, rhs: Self) -> Self;

    /// Compute `self * a + b`.
    ///
    /// This is a fused operation on ISAs which have one.
    unsafe fn mul_add(self, a: Self, b: Self) -> Self;

    /// Return the sum of all lanes.
    unsafe fn sum(self) -> f32;
}

/// Return the number of SIMD vectors required to hold `count` elements.
pub const fn vec_count<S: SimdFloat>(count: usize) -> usize {
    count.div_ceil(S::LEN)
}
