//! C ABI for the GEMM functions.
//!
//! All matrices are row-major. `alpha` and `beta` are passed by pointer and
//! the kernel tier is a number from 0 (`Any`) to 4 (`F4`). These functions
//! use the default executor and perform no validation.

use crate::gemm::default_executor;
use crate::kernels::KernelTier;

/// Compute `C = alpha * A * B + beta * C`.
///
/// # Safety
///
/// `alpha` and `beta` must be valid pointers. The matrix pointers must
/// satisfy the requirements of [`GemmNN::run`](crate::GemmNN::run).
#[no_mangle]
pub unsafe extern "C" fn simd_gemm32f_nn(
    m: usize,
    n: usize,
    k: usize,
    alpha: *const f32,
    a: *const f32,
    lda: usize,
    b: *const f32,
    ldb: usize,
    beta: *const f32,
    c: *mut f32,
    ldc: usize,
) {
    default_executor().gemm_nn_unchecked(m, n, k, *alpha, a, lda, b, ldb, *beta, c, ldc)
}

/// Compute `C = alpha * A * B^T + beta * C`.
///
/// # Safety
///
/// `alpha` and `beta` must be valid pointers. The matrix pointers must
/// satisfy the requirements of [`GemmNT::run`](crate::GemmNT::run).
#[no_mangle]
pub unsafe extern "C" fn simd_gemm32f_nt(
    m: usize,
    n: usize,
    k: usize,
    alpha: *const f32,
    a: *const f32,
    lda: usize,
    b: *const f32,
    ldb: usize,
    beta: *const f32,
    c: *mut f32,
    ldc: usize,
) {
    default_executor().gemm_nt_unchecked(m, n, k, *alpha, a, lda, b, ldb, *beta, c, ldc)
}

/// Return the number of floats needed for a packed B matrix.
#[no_mangle]
pub extern "C" fn simd_gemm32f_nncb_buffer_size(
    m: usize,
    n: usize,
    k: usize,
    tier: u32,
    compatible: bool,
) -> usize {
    default_executor().nncb_buffer_size(m, n, k, KernelTier::from_u32(tier), compatible)
}

/// Pack the contiguous `K x N` matrix `b` into `packed_b`.
///
/// # Safety
///
/// `b` must be valid for reads of `k * n` floats and `packed_b` for writes of
/// [`simd_gemm32f_nncb_buffer_size`] floats.
#[no_mangle]
pub unsafe extern "C" fn simd_gemm32f_nncb_reorder_b(
    m: usize,
    n: usize,
    k: usize,
    b: *const f32,
    packed_b: *mut f32,
    tier: u32,
    compatible: bool,
) {
    default_executor().nncb_reorder_b_unchecked(
        m,
        n,
        k,
        b,
        n,
        packed_b,
        KernelTier::from_u32(tier),
        compatible,
    )
}

/// Compute `C = A * B` for contiguous A (`M x K`) and C (`M x N`), with B
/// packed by [`simd_gemm32f_nncb_reorder_b`].
///
/// # Safety
///
/// `a` must be valid for reads of `m * k` floats, `c` for writes of `m * n`
/// floats and `packed_b` must have been filled using the same `m`, `n`, `k`,
/// `tier` and `compatible` values.
#[no_mangle]
pub unsafe extern "C" fn simd_gemm32f_nncb_run(
    m: usize,
    n: usize,
    k: usize,
    a: *const f32,
    packed_b: *const f32,
    c: *mut f32,
    tier: u32,
    compatible: bool,
) {
    default_executor().nncb_run_unchecked(
        m,
        n,
        k,
        a,
        k,
        packed_b,
        c,
        n,
        KernelTier::from_u32(tier),
        compatible,
    )
}
