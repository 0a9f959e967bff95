//! Runtime checks for the instruction sets used by the vector types.

/// Test if the current CPU supports the AVX-512 subset used by `__m512`.
///
/// Only AVX512F is needed for f32 arithmetic, masked loads and stores.
///
/// On macOS `is_x86_feature_detected` can report AVX-512 as unavailable even
/// when it is present (see https://github.com/golang/go/issues/43089), in
/// which case AVX-512 is simply not used.
#[cfg(feature = "avx512")]
#[cfg(target_arch = "x86_64")]
pub fn is_avx512_supported() -> bool {
    is_x86_feature_detected!("avx512f")
}

/// Test if the current CPU supports AVX2 together with FMA, as used by
/// `__m256`.
#[cfg(target_arch = "x86_64")]
pub fn is_avx2_fma_supported() -> bool {
    is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma")
}

/// Test if the current CPU supports AVX, as used by `AvxF32x8`.
#[cfg(target_arch = "x86_64")]
pub fn is_avx_supported() -> bool {
    is_x86_feature_detected!("avx")
}
