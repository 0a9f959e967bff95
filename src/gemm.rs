use std::fmt;
use std::sync::OnceLock;

use crate::config::GemmConfig;
use crate::errors::{check_matrix, GemmError, GemmResult, Operand};
use crate::gemm_nn::GemmNN;
use crate::gemm_nncb::GemmNNcb;
use crate::gemm_nt::GemmNT;
use crate::kernels::{GenericKernels, KernelTier, MicroKernelSet};

/// Instruction set used by a [`Gemm32f`] executor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IsaType {
    /// Portable kernels using 4-lane arrays. Available everywhere.
    Generic,

    /// 128-bit SSE 4.1 kernels. Intel x64 only.
    #[cfg(target_arch = "x86_64")]
    Sse41,

    /// 256-bit AVX kernels without FMA. Intel x64 only.
    #[cfg(target_arch = "x86_64")]
    Avx,

    /// 256-bit AVX2 + FMA kernels. Intel x64 only.
    #[cfg(target_arch = "x86_64")]
    Avx2,

    /// 512-bit AVX-512 kernels. Intel x64 only.
    #[cfg(target_arch = "x86_64")]
    #[cfg(feature = "avx512")]
    Avx512,

    /// 128-bit Neon kernels. Arm 64 only.
    #[cfg(target_arch = "aarch64")]
    Neon,
}

impl IsaType {
    pub fn name(&self) -> &'static str {
        match self {
            IsaType::Generic => "generic",
            #[cfg(target_arch = "x86_64")]
            IsaType::Sse41 => "sse4.1",
            #[cfg(target_arch = "x86_64")]
            IsaType::Avx => "avx",
            #[cfg(target_arch = "x86_64")]
            IsaType::Avx2 => "avx2",
            #[cfg(target_arch = "x86_64")]
            #[cfg(feature = "avx512")]
            IsaType::Avx512 => "avx512",
            #[cfg(target_arch = "aarch64")]
            IsaType::Neon => "neon",
        }
    }
}

impl fmt::Display for IsaType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Executes single-precision matrix multiplications using the kernels for
/// one instruction set.
///
/// Each operation builds the engine for the problem shape and runs it. To
/// amortize setup across many calls with the same shape, create the engine
/// directly with [`Gemm32f::nn`], [`Gemm32f::nt`] or [`Gemm32f::nncb`].
///
/// For simple use cases the free functions such as [`gemm32f_nn`] use a
/// shared executor with the best instruction set for the current system.
pub struct Gemm32f {
    kernels: Box<dyn MicroKernelSet>,
    isa: IsaType,
    config: GemmConfig,
}

impl Default for Gemm32f {
    fn default() -> Self {
        Self::new()
    }
}

impl Gemm32f {
    /// Create an executor using the best instruction set supported by the
    /// current system.
    pub fn new() -> Self {
        Self::isa_types()
            .into_iter()
            .find_map(|isa| Self::with_isa(isa).ok())
            .unwrap_or_else(|| Self::from_kernels(GenericKernels::default(), IsaType::Generic))
    }

    /// Create an executor using a specific instruction set.
    pub fn with_isa(isa: IsaType) -> Result<Self, GemmError> {
        let executor = match isa {
            IsaType::Generic => Some(Self::from_kernels(GenericKernels::default(), isa)),
            #[cfg(target_arch = "x86_64")]
            IsaType::Sse41 => Self::try_kernels::<crate::kernels::Sse41Kernels>(isa),
            #[cfg(target_arch = "x86_64")]
            IsaType::Avx => Self::try_kernels::<crate::kernels::AvxKernels>(isa),
            #[cfg(target_arch = "x86_64")]
            IsaType::Avx2 => Self::try_kernels::<crate::kernels::Avx2Kernels>(isa),
            #[cfg(target_arch = "x86_64")]
            #[cfg(feature = "avx512")]
            IsaType::Avx512 => Self::try_kernels::<crate::kernels::Avx512Kernels>(isa),
            #[cfg(target_arch = "aarch64")]
            IsaType::Neon => Self::try_kernels::<crate::kernels::NeonKernels>(isa),
        };
        executor.ok_or(GemmError::IsaNotSupported)
    }

    /// Return the instruction sets compiled into this build, best first.
    ///
    /// Not all of these may be supported by the current CPU.
    pub fn isa_types() -> Vec<IsaType> {
        let mut types = Vec::new();

        #[cfg(target_arch = "x86_64")]
        {
            #[cfg(feature = "avx512")]
            types.push(IsaType::Avx512);
            types.push(IsaType::Avx2);
            types.push(IsaType::Avx);
            types.push(IsaType::Sse41);
        }

        #[cfg(target_arch = "aarch64")]
        types.push(IsaType::Neon);

        types.push(IsaType::Generic);
        types
    }

    /// Replace the cache sizes and thread limit used by this executor.
    pub fn with_config(mut self, config: GemmConfig) -> Self {
        self.config = config;
        self
    }

    fn try_kernels<K: MicroKernelSet + 'static>(isa: IsaType) -> Option<Self> {
        K::new().map(|kernels| Self::from_kernels(kernels, isa))
    }

    fn from_kernels<K: MicroKernelSet + 'static>(kernels: K, isa: IsaType) -> Self {
        tracing::debug!(isa = kernels.name(), vec_len = kernels.vec_len(), "created GEMM executor");
        Gemm32f {
            kernels: Box::new(kernels),
            isa,
            config: GemmConfig::default(),
        }
    }

    pub fn isa(&self) -> IsaType {
        self.isa
    }

    /// Return the name of the kernel set this executor is using.
    pub fn kernel_name(&self) -> &str {
        self.kernels.name()
    }

    pub fn config(&self) -> &GemmConfig {
        &self.config
    }

    /// Create an engine for `C = alpha * A * B + beta * C`.
    pub fn nn(&self, m: usize, n: usize, k: usize) -> GemmNN {
        GemmNN::new(m, n, k, self.kernels.nn_kernels(m, n, k), &self.config)
    }

    /// Create an engine for `C = alpha * A * B^T + beta * C`.
    pub fn nt(&self, m: usize, n: usize, k: usize) -> GemmNT {
        GemmNT::new(m, n, k, self.kernels.nt_kernels(), &self.config)
    }

    /// Create an engine for `C = A * B` with a pre-packed B.
    ///
    /// If `tier` is not [`KernelTier::Any`] the engine uses tiles of that
    /// width, falling back to narrower ones if `n` is too small. See
    /// [`GemmNNcb::tier`] for the tier that was chosen.
    pub fn nncb(
        &self,
        m: usize,
        n: usize,
        k: usize,
        tier: KernelTier,
        compatible: bool,
    ) -> GemmNNcb {
        let (kernels, tier) = self.kernels.nncb_kernels(m, n, k, tier);
        GemmNNcb::new(m, n, k, kernels, tier, &self.config, compatible)
    }

    /// Compute `C = alpha * A * B + beta * C`, where A is `m x k`, B is
    /// `k x n` and C is `m x n`.
    ///
    /// Each matrix is row-major with the given row stride. When `beta` is
    /// zero the initial contents of C are ignored.
    pub fn gemm_nn(
        &self,
        m: usize,
        n: usize,
        k: usize,
        alpha: f32,
        a: &[f32],
        lda: usize,
        b: &[f32],
        ldb: usize,
        beta: f32,
        c: &mut [f32],
        ldc: usize,
    ) -> GemmResult {
        check_matrix(Operand::A, a.len(), m, k, lda)?;
        check_matrix(Operand::B, b.len(), k, n, ldb)?;
        check_matrix(Operand::C, c.len(), m, n, ldc)?;

        // Safety: Buffer sizes and strides were checked above.
        unsafe {
            self.gemm_nn_unchecked(
                m,
                n,
                k,
                alpha,
                a.as_ptr(),
                lda,
                b.as_ptr(),
                ldb,
                beta,
                c.as_mut_ptr(),
                ldc,
            );
        }
        Ok(())
    }

    /// Variant of [`gemm_nn`](Gemm32f::gemm_nn) which takes raw pointers and
    /// does no validation.
    ///
    /// # Safety
    ///
    /// See [`GemmNN::run`].
    pub unsafe fn gemm_nn_unchecked(
        &self,
        m: usize,
        n: usize,
        k: usize,
        alpha: f32,
        a: *const f32,
        lda: usize,
        b: *const f32,
        ldb: usize,
        beta: f32,
        c: *mut f32,
        ldc: usize,
    ) {
        self.nn(m, n, k).run(alpha, a, lda, b, ldb, beta, c, ldc)
    }

    /// Compute `C = alpha * A * B^T + beta * C`, where A is `m x k`, B is
    /// `n x k` and C is `m x n`.
    pub fn gemm_nt(
        &self,
        m: usize,
        n: usize,
        k: usize,
        alpha: f32,
        a: &[f32],
        lda: usize,
        b: &[f32],
        ldb: usize,
        beta: f32,
        c: &mut [f32],
        ldc: usize,
    ) -> GemmResult {
        check_matrix(Operand::A, a.len(), m, k, lda)?;
        check_matrix(Operand::B, b.len(), n, k, ldb)?;
        check_matrix(Operand::C, c.len(), m, n, ldc)?;

        // Safety: Buffer sizes and strides were checked above.
        unsafe {
            self.gemm_nt_unchecked(
                m,
                n,
                k,
                alpha,
                a.as_ptr(),
                lda,
                b.as_ptr(),
                ldb,
                beta,
                c.as_mut_ptr(),
                ldc,
            );
        }
        Ok(())
    }

    /// Variant of [`gemm_nt`](Gemm32f::gemm_nt) which takes raw pointers and
    /// does no validation.
    ///
    /// # Safety
    ///
    /// See [`GemmNT::run`].
    pub unsafe fn gemm_nt_unchecked(
        &self,
        m: usize,
        n: usize,
        k: usize,
        alpha: f32,
        a: *const f32,
        lda: usize,
        b: *const f32,
        ldb: usize,
        beta: f32,
        c: *mut f32,
        ldc: usize,
    ) {
        self.nt(m, n, k).run(alpha, a, lda, b, ldb, beta, c, ldc)
    }

    /// Return the number of values needed to hold B packed for an `m x n x k`
    /// product.
    pub fn nncb_buffer_size(
        &self,
        m: usize,
        n: usize,
        k: usize,
        tier: KernelTier,
        compatible: bool,
    ) -> usize {
        self.nncb(m, n, k, tier, compatible).buffer_size()
    }

    /// Pack the `k x n` matrix `b` for use with [`nncb_run`](Gemm32f::nncb_run).
    ///
    /// `m`, `tier` and `compatible` must match the later calls to `nncb_run`,
    /// since they determine the tile width.
    pub fn nncb_reorder_b(
        &self,
        m: usize,
        n: usize,
        k: usize,
        b: &[f32],
        ldb: usize,
        packed_b: &mut [f32],
        tier: KernelTier,
        compatible: bool,
    ) -> GemmResult {
        let engine = self.nncb(m, n, k, tier, compatible);
        check_matrix(Operand::B, b.len(), k, n, ldb)?;
        check_packed_len(&engine, packed_b.len())?;

        // Safety: Buffer sizes and strides were checked above.
        unsafe {
            engine.reorder_b(b.as_ptr(), ldb, packed_b.as_mut_ptr());
        }
        Ok(())
    }

    /// Variant of [`nncb_reorder_b`](Gemm32f::nncb_reorder_b) which takes
    /// raw pointers and does no validation.
    ///
    /// # Safety
    ///
    /// See [`GemmNNcb::reorder_b`].
    pub unsafe fn nncb_reorder_b_unchecked(
        &self,
        m: usize,
        n: usize,
        k: usize,
        b: *const f32,
        ldb: usize,
        packed_b: *mut f32,
        tier: KernelTier,
        compatible: bool,
    ) {
        self.nncb(m, n, k, tier, compatible)
            .reorder_b(b, ldb, packed_b)
    }

    /// Compute `C = A * B` where A is a contiguous `m x k` matrix, C is a
    /// contiguous `m x n` matrix and B was packed by
    /// [`nncb_reorder_b`](Gemm32f::nncb_reorder_b).
    pub fn nncb_run(
        &self,
        m: usize,
        n: usize,
        k: usize,
        a: &[f32],
        packed_b: &[f32],
        c: &mut [f32],
        tier: KernelTier,
        compatible: bool,
    ) -> GemmResult {
        self.nncb_run_rows(m, n, k, m, a, packed_b, c, tier, compatible)
    }

    /// Variant of [`nncb_run`](Gemm32f::nncb_run) which multiplies only the
    /// first `rows` rows of A.
    ///
    /// The engine is set up for `m` rows, and `rows` must not exceed `m`.
    pub fn nncb_run_rows(
        &self,
        m: usize,
        n: usize,
        k: usize,
        rows: usize,
        a: &[f32],
        packed_b: &[f32],
        c: &mut [f32],
        tier: KernelTier,
        compatible: bool,
    ) -> GemmResult {
        if rows > m {
            return Err(GemmError::TooManyRows { rows, max: m });
        }
        let engine = self.nncb(m, n, k, tier, compatible);
        check_matrix(Operand::A, a.len(), rows, k, k)?;
        check_packed_len(&engine, packed_b.len())?;
        check_matrix(Operand::C, c.len(), rows, n, n)?;

        // Safety: Buffer sizes were checked above.
        unsafe {
            engine.run_rows(rows, a.as_ptr(), k, packed_b.as_ptr(), c.as_mut_ptr(), n);
        }
        Ok(())
    }

    /// Variant of [`nncb_run`](Gemm32f::nncb_run) which takes raw pointers
    /// and row strides, and does no validation.
    ///
    /// # Safety
    ///
    /// See [`GemmNNcb::run`].
    pub unsafe fn nncb_run_unchecked(
        &self,
        m: usize,
        n: usize,
        k: usize,
        a: *const f32,
        lda: usize,
        packed_b: *const f32,
        c: *mut f32,
        ldc: usize,
        tier: KernelTier,
        compatible: bool,
    ) {
        self.nncb(m, n, k, tier, compatible)
            .run(a, lda, packed_b, c, ldc)
    }
}

fn check_packed_len(engine: &GemmNNcb, actual: usize) -> GemmResult {
    let required = engine.buffer_size();
    if actual < required {
        return Err(GemmError::PackedBufferTooSmall { required, actual });
    }
    Ok(())
}

/// Return the shared executor used by the free functions.
pub fn default_executor() -> &'static Gemm32f {
    static EXECUTOR: OnceLock<Gemm32f> = OnceLock::new();
    EXECUTOR.get_or_init(Gemm32f::new)
}

/// Compute `C = alpha * A * B + beta * C` using the default executor.
///
/// See [`Gemm32f::gemm_nn`].
pub fn gemm32f_nn(
    m: usize,
    n: usize,
    k: usize,
    alpha: f32,
    a: &[f32],
    lda: usize,
    b: &[f32],
    ldb: usize,
    beta: f32,
    c: &mut [f32],
    ldc: usize,
) -> GemmResult {
    default_executor().gemm_nn(m, n, k, alpha, a, lda, b, ldb, beta, c, ldc)
}

/// Compute `C = alpha * A * B^T + beta * C` using the default executor.
///
/// See [`Gemm32f::gemm_nt`].
pub fn gemm32f_nt(
    m: usize,
    n: usize,
    k: usize,
    alpha: f32,
    a: &[f32],
    lda: usize,
    b: &[f32],
    ldb: usize,
    beta: f32,
    c: &mut [f32],
    ldc: usize,
) -> GemmResult {
    default_executor().gemm_nt(m, n, k, alpha, a, lda, b, ldb, beta, c, ldc)
}

/// See [`Gemm32f::nncb_buffer_size`].
pub fn gemm32f_nncb_buffer_size(
    m: usize,
    n: usize,
    k: usize,
    tier: KernelTier,
    compatible: bool,
) -> usize {
    default_executor().nncb_buffer_size(m, n, k, tier, compatible)
}

/// See [`Gemm32f::nncb_reorder_b`].
pub fn gemm32f_nncb_reorder_b(
    m: usize,
    n: usize,
    k: usize,
    b: &[f32],
    packed_b: &mut [f32],
    tier: KernelTier,
    compatible: bool,
) -> GemmResult {
    default_executor().nncb_reorder_b(m, n, k, b, n, packed_b, tier, compatible)
}

/// See [`Gemm32f::nncb_run`].
pub fn gemm32f_nncb_run(
    m: usize,
    n: usize,
    k: usize,
    a: &[f32],
    packed_b: &[f32],
    c: &mut [f32],
    tier: KernelTier,
    compatible: bool,
) -> GemmResult {
    default_executor().nncb_run(m, n, k, a, packed_b, c, tier, compatible)
}
