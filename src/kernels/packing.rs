//! Packing of A and B blocks into the layouts read by the outer-product
//! kernels.

use crate::iter_util::range_chunks;

/// Helper for incrementally filling a buffer through a raw pointer.
struct PtrWriter {
    ptr: *mut f32,
}

impl PtrWriter {
    /// Write the next element and advance.
    ///
    /// Safety: The buffer must have space for the element.
    #[inline(always)]
    unsafe fn write(&mut self, val: f32) {
        self.ptr.write(val);
        self.ptr = self.ptr.add(1);
    }
}

/// Pack an `m x k` block of A, with row stride `lda`, into panels of
/// `micro_m` rows.
///
/// Each panel is stored "column-major": the `rows` values for reduction step
/// `kk` are contiguous, so a kernel reads the panel with `lda = 1,
/// sa = rows`. The panel starting at row `i` is at offset `i * k`. The final
/// panel has `m % micro_m` rows if `m` is not a multiple of `micro_m`.
///
/// Safety: `a` must be valid for the block and `dst` must have space for
/// `m * k` values.
#[inline] // Allow caller to control `target_feature`s
pub unsafe fn pack_a(a: *const f32, lda: usize, m: usize, k: usize, micro_m: usize, dst: *mut f32) {
    let mut out = PtrWriter { ptr: dst };
    for panel_rows in range_chunks(0..m, micro_m) {
        for kk in 0..k {
            for row in panel_rows.clone() {
                out.write(*a.add(row * lda + kk));
            }
        }
    }
}

/// Pack a `k x n` block of B, with row stride `ldb`, into panels of
/// `micro_n` columns.
///
/// Panel `p` starts at `dst + p * panel_stride` and holds `k` rows of
/// `micro_n` contiguous values. If `n` is not a multiple of `micro_n`, the
/// final panel is zero-padded. Only the `n` columns of each B row are read.
///
/// Safety: `b` must be valid for the block. `dst` must have space for
/// `panel_stride * (ceil(n / micro_n) - 1) + k * micro_n` values.
#[inline]
pub unsafe fn pack_b(
    b: *const f32,
    ldb: usize,
    k: usize,
    n: usize,
    micro_n: usize,
    dst: *mut f32,
    panel_stride: usize,
) {
    for (panel, panel_cols) in range_chunks(0..n, micro_n).enumerate() {
        let panel_dst = dst.add(panel * panel_stride);
        let cols = panel_cols.len();
        let b_panel = b.add(panel_cols.start);

        if cols == micro_n {
            for kk in 0..k {
                std::ptr::copy_nonoverlapping(
                    b_panel.add(kk * ldb),
                    panel_dst.add(kk * micro_n),
                    micro_n,
                );
            }
        } else {
            let mut out = PtrWriter {
                ptr: panel_dst,
            };
            for kk in 0..k {
                let b_row = b_panel.add(kk * ldb);
                for col in 0..cols {
                    out.write(*b_row.add(col));
                }
                for _ in cols..micro_n {
                    out.write(0.);
                }
            }
        }
    }
}
