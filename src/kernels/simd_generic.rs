use simd_gemm_vec::SimdFloat;

/// Compute a `MR x (NR_REGS * S::LEN)` tile of `C += alpha * A * B` by
/// outer-product accumulation. See [`NnKernelFn`](super::NnKernelFn) for the
/// addressing of A, B and C.
///
/// Only the first `tail` lanes of the last vector column of C are read and
/// written, which lets the same kernel cover the ragged right edge of C.
///
/// Safety: The `SimdFloat` type must be supported on the current system and
/// the pointers must be valid for the tile.
#[inline(always)]
pub unsafe fn gemm_nn_kernel<S: SimdFloat, const MR: usize, const NR_REGS: usize>(
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
) {
    if k == 0 {
        return;
    }

    let mut acc = [[S::zero(); NR_REGS]; MR];
    let mut b_rows = [S::zero(); NR_REGS];

    for kk in 0..k {
        let b_row = b.add(kk * sb);
        for r in 0..NR_REGS {
            b_rows[r] = S::load(b_row.add(r * S::LEN));
        }

        let a_col = a.add(kk * sa);
        for i in 0..MR {
            let a_elt = S::splat(*a_col.add(i * lda));
            for r in 0..NR_REGS {
                acc[i][r] = a_elt.mul_add(b_rows[r], acc[i][r]);
            }
        }
    }

    let alpha = S::splat(alpha);
    if tail >= S::LEN {
        for i in 0..MR {
            let c_row = c.add(i * ldc);
            for r in 0..NR_REGS {
                let c_ptr = c_row.add(r * S::LEN);
                acc[i][r].mul_add(alpha, S::load(c_ptr)).store(c_ptr);
            }
        }
    } else {
        let mask = S::tail_mask(tail);
        for i in 0..MR {
            let c_row = c.add(i * ldc);
            for r in 0..NR_REGS - 1 {
                let c_ptr = c_row.add(r * S::LEN);
                acc[i][r].mul_add(alpha, S::load(c_ptr)).store(c_ptr);
            }
            let c_ptr = c_row.add((NR_REGS - 1) * S::LEN);
            acc[i][NR_REGS - 1]
                .mul_add(alpha, S::load_masked(c_ptr, mask))
                .store_masked(c_ptr, mask);
        }
    }
}

/// Compute a `MR x NR` tile of `C += alpha * A * B^T`, where each output is
/// the dot product of a row of A and a row of B.
///
/// The reduction runs over whole vectors of K, then a masked final vector
/// for the remaining `k % S::LEN` values, so rows of A and B are never read
/// past `k`.
///
/// Safety: The `SimdFloat` type must be supported on the current system and
/// the pointers must be valid for the tile.
#[inline(always)]
pub unsafe fn gemm_nt_kernel<S: SimdFloat, const MR: usize, const NR: usize>(
    k: usize,
    alpha: f32,
    a: *const f32,
    lda: usize,
    b: *const f32,
    ldb: usize,
    c: *mut f32,
    ldc: usize,
) {
    let mut acc = [[S::zero(); NR]; MR];
    let mut b_vecs = [S::zero(); NR];

    let k_main = k - k % S::LEN;
    let mut kk = 0;
    while kk < k_main {
        for j in 0..NR {
            b_vecs[j] = S::load(b.add(j * ldb + kk));
        }
        for i in 0..MR {
            let a_vec = S::load(a.add(i * lda + kk));
            for j in 0..NR {
                acc[i][j] = a_vec.mul_add(b_vecs[j], acc[i][j]);
            }
        }
        kk += S::LEN;
    }

    if kk < k {
        let mask = S::tail_mask(k - kk);
        for j in 0..NR {
            b_vecs[j] = S::load_masked(b.add(j * ldb + kk), mask);
        }
        for i in 0..MR {
            let a_vec = S::load_masked(a.add(i * lda + kk), mask);
            for j in 0..NR {
                acc[i][j] = a_vec.mul_add(b_vecs[j], acc[i][j]);
            }
        }
    }

    for i in 0..MR {
        let c_row = c.add(i * ldc);
        for j in 0..NR {
            *c_row.add(j) += alpha * acc[i][j].sum();
        }
    }
}

/// Scale an `m x n` block of C by `beta`.
///
/// `beta == 1` leaves C untouched and `beta == 0` overwrites it with zeros
/// without reading it, so C may hold garbage (including NaN) in that case.
///
/// Safety: The `SimdFloat` type must be supported on the current system and
/// `c` must be valid for the block.
#[inline(always)]
pub unsafe fn scale_c<S: SimdFloat>(m: usize, n: usize, beta: f32, c: *mut f32, ldc: usize) {
    if beta == 1. {
        return;
    }

    if beta == 0. {
        for i in 0..m {
            std::ptr::write_bytes(c.add(i * ldc), 0, n);
        }
        return;
    }

    let beta_vec = S::splat(beta);
    let n_main = n - n % S::LEN;
    for i in 0..m {
        let c_row = c.add(i * ldc);
        let mut j = 0;
        while j < n_main {
            let c_ptr = c_row.add(j);
            S::load(c_ptr).mul(beta_vec).store(c_ptr);
            j += S::LEN;
        }
        if j < n {
            let mask = S::tail_mask(n - j);
            let c_ptr = c_row.add(j);
            S::load_masked(c_ptr, mask)
                .mul(beta_vec)
                .store_masked(c_ptr, mask);
        }
    }
}

/// Match `(rows, regs)` against the instantiated kernel shapes and return the
/// matching monomorphized kernel as a function pointer.
macro_rules! select_kernel {
    ($kernel:ident, $rows:expr, $regs:expr, [$($row:literal),+], $reg_list:tt) => {
        match $rows {
            $($row => $crate::kernels::simd_generic::select_kernel!(@regs $kernel, $row, $regs, $reg_list),)+
            rows => panic!("no kernel for {} rows", rows),
        }
    };
    (@regs $kernel:ident, $row:literal, $regs:expr, [$($reg:literal),+]) => {
        match $regs {
            $($reg => $kernel::<$row, $reg> as $crate::kernels::NnKernelFn,)+
            regs => panic!("no kernel for {} registers", regs),
        }
    };
}

/// Define the target-feature wrappers for one instruction set.
///
/// This expands to `nn_kernel`, `nt_kernel` and `scale_c` functions which
/// instantiate the generic kernels for the vector type `$simd` with the given
/// target features enabled. `select_nn` returns the outer-product kernel for
/// a tile of `rows` rows and `cols` columns, with `rows` taken from
/// `$row_list` and the register count from `$reg_list`. `nt_kernels` builds
/// the dot-product table.
macro_rules! isa_kernels {
    (
        simd = $simd:ty,
        features = [$($feature:literal),*],
        rows = $row_list:tt,
        regs = $reg_list:tt $(,)?
    ) => {
        $(#[target_feature(enable = $feature)])*
        pub(super) unsafe fn nn_kernel<const MR: usize, const NR_REGS: usize>(
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
        ) {
            $crate::kernels::simd_generic::gemm_nn_kernel::<$simd, MR, NR_REGS>(
                k, alpha, a, lda, sa, b, sb, c, ldc, tail,
            )
        }

        $(#[target_feature(enable = $feature)])*
        pub(super) unsafe fn nt_kernel<const MR: usize, const NR: usize>(
            k: usize,
            alpha: f32,
            a: *const f32,
            lda: usize,
            b: *const f32,
            ldb: usize,
            c: *mut f32,
            ldc: usize,
        ) {
            $crate::kernels::simd_generic::gemm_nt_kernel::<$simd, MR, NR>(
                k, alpha, a, lda, b, ldb, c, ldc,
            )
        }

        $(#[target_feature(enable = $feature)])*
        pub(super) unsafe fn scale_c(m: usize, n: usize, beta: f32, c: *mut f32, ldc: usize) {
            $crate::kernels::simd_generic::scale_c::<$simd>(m, n, beta, c, ldc)
        }

        pub(super) const VEC_LEN: usize = <$simd as simd_gemm_vec::SimdFloat>::LEN;

        pub(super) fn select_nn(rows: usize, cols: usize) -> $crate::kernels::NnKernelFn {
            let regs = cols.div_ceil(VEC_LEN);
            $crate::kernels::simd_generic::select_kernel!(nn_kernel, rows, regs, $row_list, $reg_list)
        }

        /// Dot-product kernels. The six-row kernels are included if `wide`
        /// is set, for ISAs with enough registers to hold 24 accumulators.
        pub(super) fn nt_kernels(wide: bool) -> $crate::kernels::NtKernels {
            $crate::kernels::NtKernels {
                k1x1: nt_kernel::<1, 1>,
                k1x4: nt_kernel::<1, 4>,
                k2x1: nt_kernel::<2, 1>,
                k2x4: nt_kernel::<2, 4>,
                k3x1: nt_kernel::<3, 1>,
                k3x4: nt_kernel::<3, 4>,
                k6x1: wide.then_some(nt_kernel::<6, 1> as $crate::kernels::NtKernelFn),
                k6x4: wide.then_some(nt_kernel::<6, 4> as $crate::kernels::NtKernelFn),
                scale_c,
            }
        }
    };
}

pub(crate) use {isa_kernels, select_kernel};
