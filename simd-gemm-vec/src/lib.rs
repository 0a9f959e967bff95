//! Portable f32 SIMD vectors for the simd-gemm micro-kernels.
//!
//! The GEMM kernels are written once as generic functions over [`SimdFloat`]
//! and then instantiated for each instruction set. This crate provides the
//! trait and its implementations:
//!
//! - [`F32x4`]: a 4-lane array which the compiler can autovectorize. Available
//!   everywhere.
//! - `__m128` (SSE, x86_64)
//! - [`AvxF32x8`]: 256-bit AVX without FMA (x86_64)
//! - `__m256` (AVX2 + FMA, x86_64)
//! - `__m512` (AVX-512, x86_64, requires the `avx512` feature)
//! - `float32x4_t` (Arm Neon, aarch64)
//!
//! ## Inlining and target features
//!
//! Trait impls carry `#[inline]` and `#[target_feature]` attributes for the
//! intrinsics they wrap. Generic code using the trait must be
//! `#[inline(always)]` and then be wrapped in a function whose
//! `#[target_feature]` set covers everything used by the implementation.
//!
//! # Safety
//!
//! The caller must ensure that the instructions used by a type implementing
//! [`SimdFloat`] are available on the current system.

mod arch;
pub mod isa_detection;
mod vec;

pub use arch::F32x4;
#[cfg(target_arch = "x86_64")]
pub use arch::AvxF32x8;
pub use vec::{vec_count, SimdFloat};
