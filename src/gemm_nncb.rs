use std::cell::RefCell;

use crate::blocking::{macro_kernel, ABlock, BBlock, MacroTiles};
use crate::config::{CacheSizes, GemmConfig};
use crate::iter_util::{align_hi, range_chunks};
use crate::kernels::{KernelTier, NnKernels};

/// Engine for `C = A * B` where B is a constant matrix, such as a weight
/// matrix, which is packed once with [`GemmNNcb::reorder_b`] and then reused
/// by many calls to [`GemmNNcb::run`].
///
/// The packed buffer holds `align_hi(N, micro_n) * K` values. It can be laid
/// out in two ways:
///
/// - The default layout follows the macro blocking, so each `(N, K)` block
///   of B is contiguous.
/// - The compatible layout stores whole-K column panels, which makes the
///   buffer independent of the cache sizes. Engines created with different
///   [`CacheSizes`] can share a buffer in this layout, as long as they use
///   the same tile width.
///
/// `run` always overwrites C and runs on the calling thread, so callers can
/// parallelize over independent batches.
pub struct GemmNNcb {
    m: usize,
    n: usize,
    k: usize,
    kernels: NnKernels,
    tier: KernelTier,
    cache: CacheSizes,
    tiles: MacroTiles,
    compatible: bool,
    pack_a: bool,
}

impl GemmNNcb {
    /// Prepare an engine for `m x n x k` products, using `kernels` chosen for
    /// `tier`.
    pub fn new(
        m: usize,
        n: usize,
        k: usize,
        kernels: NnKernels,
        tier: KernelTier,
        config: &GemmConfig,
        compatible: bool,
    ) -> GemmNNcb {
        let cache = config.cache.promoted(n, kernels.wide_n);
        let tiles = MacroTiles::new(&cache, m, n, k, kernels.micro_m, kernels.micro_n);
        let pack_a = kernels.pack_a.is_some() && (compatible || default_layout_packs_a(m, n, k));

        tracing::debug!(
            m,
            n,
            k,
            ?tier,
            micro_m = kernels.micro_m,
            micro_n = kernels.micro_n,
            macro_m = tiles.macro_m,
            macro_n = tiles.macro_n,
            macro_k = tiles.macro_k,
            compatible,
            pack_a,
            "prepared GemmNNcb"
        );

        GemmNNcb {
            m,
            n,
            k,
            kernels,
            tier,
            cache,
            tiles,
            compatible,
            pack_a,
        }
    }

    /// Tier of the kernels in use. This is never [`KernelTier::Any`].
    pub fn tier(&self) -> KernelTier {
        self.tier
    }

    pub fn micro_m(&self) -> usize {
        self.kernels.micro_m
    }

    pub fn micro_n(&self) -> usize {
        self.kernels.micro_n
    }

    pub fn compatible(&self) -> bool {
        self.compatible
    }

    /// Return true if [`run`](GemmNNcb::run) packs blocks of A before
    /// calling the kernels. This is always the case for the compatible
    /// layout.
    pub fn need_pack_a(&self) -> bool {
        self.pack_a
    }

    /// Return the number of `f32` values needed for the packed B buffer.
    pub fn buffer_size(&self) -> usize {
        align_hi(self.n, self.kernels.micro_n) * self.k
    }

    /// Pack the `K x N` matrix `b` into `packed_b`.
    ///
    /// The padding columns of the last panel are zero-filled, so the result
    /// depends only on `b`.
    ///
    /// # Safety
    ///
    /// `b` must be valid for reads of a `K x N` matrix with row stride
    /// `ldb >= N`, and `packed_b` must be valid for writes of
    /// [`buffer_size`](GemmNNcb::buffer_size) values.
    pub unsafe fn reorder_b(&self, b: *const f32, ldb: usize, packed_b: *mut f32) {
        let micro_n = self.kernels.micro_n;
        let pack_b = self.kernels.pack_b;

        tracing::trace!(n = self.n, k = self.k, compatible = self.compatible, "reordering B");

        if self.compatible {
            pack_b(b, ldb, self.k, self.n, micro_n, packed_b, micro_n * self.k);
            return;
        }

        for col_block in range_chunks(0..self.n, self.tiles.macro_n) {
            let block_width = align_hi(col_block.len(), micro_n);
            for depth_block in range_chunks(0..self.k, self.tiles.macro_k) {
                let dst = packed_b.add(col_block.start * self.k + depth_block.start * block_width);
                pack_b(
                    b.add(depth_block.start * ldb + col_block.start),
                    ldb,
                    depth_block.len(),
                    col_block.len(),
                    micro_n,
                    dst,
                    micro_n * depth_block.len(),
                );
            }
        }
    }

    /// Compute `C = A * B` using a buffer filled by
    /// [`reorder_b`](GemmNNcb::reorder_b).
    ///
    /// # Safety
    ///
    /// - `a` must be valid for reads of an `M x K` matrix with row stride
    ///   `lda >= K`.
    /// - `packed_b` must hold the output of `reorder_b` from an engine with
    ///   the same `N`, `K`, kernels and layout.
    /// - `c` must be valid for writes of an `M x N` matrix with row stride
    ///   `ldc >= N`.
    pub unsafe fn run(&self, a: *const f32, lda: usize, packed_b: *const f32, c: *mut f32, ldc: usize) {
        self.run_rows(self.m, a, lda, packed_b, c, ldc)
    }

    /// Variant of [`run`](GemmNNcb::run) for an A with `m` rows instead of
    /// the `M` the engine was created for.
    ///
    /// The packed B layout does not depend on `M`, so one buffer can serve
    /// inputs with varying batch sizes.
    ///
    /// # Safety
    ///
    /// As for [`run`](GemmNNcb::run), with `m` in place of `M`.
    pub unsafe fn run_rows(
        &self,
        m: usize,
        a: *const f32,
        lda: usize,
        packed_b: *const f32,
        c: *mut f32,
        ldc: usize,
    ) {
        if m == 0 || self.n == 0 {
            return;
        }

        let (kernels, tiles) = if m == self.m {
            (self.kernels, self.tiles)
        } else {
            (
                self.kernels.with_rows(m),
                self.tiles.with_rows(&self.cache, m, self.kernels.micro_m),
            )
        };
        if self.k == 0 {
            (kernels.scale_c)(m, self.n, 0., c, ldc);
            return;
        }

        let pack_a = if self.pack_a { kernels.pack_a } else { None };
        match pack_a {
            Some(_) => PACKED_A.with_borrow_mut(|packed_a| {
                let len = tiles.macro_m * tiles.macro_k;
                if packed_a.len() < len {
                    packed_a.resize(len, 0.);
                }
                self.run_blocks(&kernels, &tiles, m, a, lda, packed_b, c, ldc, Some(packed_a));
            }),
            None => self.run_blocks(&kernels, &tiles, m, a, lda, packed_b, c, ldc, None),
        }
    }

    unsafe fn run_blocks(
        &self,
        kernels: &NnKernels,
        tiles: &MacroTiles,
        m: usize,
        a: *const f32,
        lda: usize,
        packed_b: *const f32,
        c: *mut f32,
        ldc: usize,
        mut packed_a: Option<&mut Vec<f32>>,
    ) {
        let micro_n = kernels.micro_n;

        for col_block in range_chunks(0..self.n, tiles.macro_n) {
            let block_width = align_hi(col_block.len(), micro_n);
            for depth_block in range_chunks(0..self.k, tiles.macro_k) {
                let kc = depth_block.len();
                let b_block = if self.compatible {
                    BBlock {
                        ptr: packed_b.add(col_block.start * self.k + depth_block.start * micro_n),
                        panel_stride: micro_n * self.k,
                    }
                } else {
                    BBlock {
                        ptr: packed_b.add(col_block.start * self.k + depth_block.start * block_width),
                        panel_stride: micro_n * kc,
                    }
                };

                for row_block in range_chunks(0..m, tiles.macro_m) {
                    let mc = row_block.len();
                    let c_block = c.add(row_block.start * ldc + col_block.start);
                    if depth_block.start == 0 {
                        (kernels.scale_c)(mc, col_block.len(), 0., c_block, ldc);
                    }

                    let a_block = a.add(row_block.start * lda + depth_block.start);
                    let a_block = match (kernels.pack_a, packed_a.as_deref_mut()) {
                        (Some(pack_a), Some(buf)) => {
                            pack_a(a_block, lda, mc, kc, kernels.micro_m, buf.as_mut_ptr());
                            ABlock::Packed { ptr: buf.as_ptr() }
                        }
                        _ => ABlock::Strided { ptr: a_block, lda },
                    };

                    macro_kernel(kernels, mc, col_block.len(), kc, 1., a_block, b_block, c_block, ldc);
                }
            }
        }
    }
}

thread_local! {
    /// Scratch space for packed blocks of A, shared by all engines that run
    /// on the current thread.
    static PACKED_A: RefCell<Vec<f32>> = const { RefCell::new(Vec::new()) };
}

/// Return true if A should be packed for an `m x n x k` product in the
/// default layout.
///
/// Packing A costs a pass over it per column block, which pays off when A is
/// large or when it is reused across many column panels.
fn default_layout_packs_a(m: usize, n: usize, k: usize) -> bool {
    (k >= 256 && m >= 256) || (n >= 4 * m && k >= 64)
}

#[cfg(test)]
mod tests {
    use simd_gemm_testing::TestCases;

    use super::{default_layout_packs_a, GemmNNcb};
    use crate::config::{CacheSizes, GemmConfig};
    use crate::kernels::{GenericKernels, KernelTier, MicroKernelSet};
    use crate::tests::{expect_gemm_equal, random_matrix, reference_gemm};

    fn small_cache_config() -> GemmConfig {
        GemmConfig::default().with_cache_sizes(CacheSizes {
            l1: 512,
            l2: 2048,
            l3: 4096,
        })
    }

    #[test]
    fn test_need_pack_a() {
        assert!(default_layout_packs_a(256, 16, 256));
        assert!(!default_layout_packs_a(255, 16, 256));
        assert!(default_layout_packs_a(4, 16, 64));
        assert!(!default_layout_packs_a(4, 15, 64));
        assert!(!default_layout_packs_a(4, 16, 63));

        let kernels = GenericKernels::new().unwrap();
        let (nn, tier) = kernels.nncb_kernels(4, 15, 64, KernelTier::Any);
        let config = GemmConfig::default();
        assert!(!GemmNNcb::new(4, 15, 64, nn, tier, &config, false).need_pack_a());
        assert!(GemmNNcb::new(4, 15, 64, nn, tier, &config, true).need_pack_a());
    }

    #[test]
    fn test_buffer_size() {
        let kernels = GenericKernels::new().unwrap();
        let (nn, tier) = kernels.nncb_kernels(7, 17, 5, KernelTier::Any);
        let engine = GemmNNcb::new(7, 17, 5, nn, tier, &GemmConfig::default(), false);
        assert_eq!(engine.buffer_size(), 5 * 17usize.div_ceil(engine.micro_n()) * engine.micro_n());
        assert_ne!(engine.tier(), KernelTier::Any);
    }

    #[test]
    fn test_gemm_nncb_layouts() {
        #[derive(Debug)]
        struct Case {
            m: usize,
            n: usize,
            k: usize,
            compatible: bool,
        }

        let kernels = GenericKernels::new().unwrap();
        let config = small_cache_config();

        let mut cases = Vec::new();
        for compatible in [false, true] {
            for (m, n, k) in [(7, 17, 5), (4, 40, 70), (13, 30, 64), (1, 3, 1)] {
                cases.push(Case { m, n, k, compatible });
            }
        }

        cases.test_each(|case| {
            let Case { m, n, k, compatible } = *case;
            let mut rng = fastrand::Rng::with_seed(7);
            let a = random_matrix(&mut rng, m * k);
            let b = random_matrix(&mut rng, k * n);

            let (nn, tier) = kernels.nncb_kernels(m, n, k, KernelTier::Any);
            let engine = GemmNNcb::new(m, n, k, nn, tier, &config, compatible);
            let mut packed_b = vec![0.; engine.buffer_size()];
            let mut actual = vec![f32::NAN; m * n];
            unsafe {
                engine.reorder_b(b.as_ptr(), n, packed_b.as_mut_ptr());
                engine.run(a.as_ptr(), k, packed_b.as_ptr(), actual.as_mut_ptr(), n);
            }

            let mut expected = vec![0.; m * n];
            reference_gemm(m, n, k, 1.0, &a, k, &b, n, 0.0, &mut expected, n);
            expect_gemm_equal(&actual, &expected);
        })
    }

    #[test]
    fn test_compatible_layout_independent_of_cache() {
        let kernels = GenericKernels::new().unwrap();
        let (m, n, k) = (5, 20, 50);
        let mut rng = fastrand::Rng::with_seed(3);
        let b = random_matrix(&mut rng, k * n);

        let (nn, tier) = kernels.nncb_kernels(m, n, k, KernelTier::F1);
        let small = GemmNNcb::new(m, n, k, nn, tier, &small_cache_config(), true);
        let large = GemmNNcb::new(m, n, k, nn, tier, &GemmConfig::default(), true);

        let mut packed_small = vec![0.; small.buffer_size()];
        let mut packed_large = vec![1.; large.buffer_size()];
        unsafe {
            small.reorder_b(b.as_ptr(), n, packed_small.as_mut_ptr());
            large.reorder_b(b.as_ptr(), n, packed_large.as_mut_ptr());
        }
        assert_eq!(packed_small, packed_large);
    }

    #[test]
    fn test_run_rows() {
        let kernels = GenericKernels::new().unwrap();
        let (n, k) = (19, 33);
        let mut rng = fastrand::Rng::with_seed(11);
        let a = random_matrix(&mut rng, 20 * k);
        let b = random_matrix(&mut rng, k * n);

        let (nn, tier) = kernels.nncb_kernels(16, n, k, KernelTier::Any);
        let engine = GemmNNcb::new(16, n, k, nn, tier, &small_cache_config(), false);
        let mut packed_b = vec![0.; engine.buffer_size()];
        unsafe {
            engine.reorder_b(b.as_ptr(), n, packed_b.as_mut_ptr());
        }

        for m in [1, 5, 16, 20] {
            let mut actual = vec![0.; m * n];
            unsafe {
                engine.run_rows(m, a.as_ptr(), k, packed_b.as_ptr(), actual.as_mut_ptr(), n);
            }
            let mut expected = vec![0.; m * n];
            reference_gemm(m, n, k, 1.0, &a, k, &b, n, 0.0, &mut expected, n);
            expect_gemm_equal(&actual, &expected);
        }
    }

    #[test]
    fn test_zero_depth_clears_output() {
        let kernels = GenericKernels::new().unwrap();
        let (nn, tier) = kernels.nncb_kernels(2, 3, 0, KernelTier::Any);
        let engine = GemmNNcb::new(2, 3, 0, nn, tier, &GemmConfig::default(), false);
        assert_eq!(engine.buffer_size(), 0);

        let mut c = vec![f32::NAN; 6];
        unsafe {
            engine.run([].as_ptr(), 0, [].as_ptr(), c.as_mut_ptr(), 3);
        }
        assert_eq!(c, [0.; 6]);
    }
}
