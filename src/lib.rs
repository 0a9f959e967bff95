//! simd-gemm is a library for single-precision matrix multiplication on CPUs.
//!
//! It computes `C = alpha * A * B + beta * C` and related products using
//! cache-blocked algorithms and micro-kernels specialized for each supported
//! instruction set. The best instruction set is chosen at runtime.
//!
//! # Operations
//!
//! - **NN**: `C = alpha * A * B + beta * C`, see [`GemmNN`] and
//!   [`gemm32f_nn`].
//! - **NT**: `C = alpha * A * B^T + beta * C`, see [`GemmNT`] and
//!   [`gemm32f_nt`].
//! - **NNcb**: `C = A * B` where B is a constant that is packed once and
//!   reused many times, such as a weight matrix. See [`GemmNNcb`].
//!
//! All matrices are row-major with an explicit row stride ("leading
//! dimension").
//!
//! # Usage
//!
//! The free functions such as [`gemm32f_nn`] validate their inputs and use a
//! shared [`Gemm32f`] executor. To pick a specific instruction set or tune
//! cache sizes and thread counts, create a [`Gemm32f`] with
//! [`Gemm32f::with_isa`] and [`Gemm32f::with_config`]. The engine types can
//! be created directly from an executor to reuse setup and packing buffers
//! across calls.
//!
//! ```
//! use simd_gemm::gemm32f_nn;
//!
//! let a = [1., 2., 3., 4.];
//! let b = [5., 6., 7., 8.];
//! let mut c = [0.; 4];
//! gemm32f_nn(2, 2, 2, 1., &a, 2, &b, 2, 0., &mut c, 2).unwrap();
//! assert_eq!(c, [19., 22., 43., 50.]);
//! ```
//!
//! # Threading
//!
//! [`GemmNN`] and [`GemmNT`] split large problems across threads in a Rayon
//! thread pool, see [`threading::thread_pool`]. [`GemmNNcb`] runs on the
//! calling thread.
//!
//! # Logging
//!
//! Engine setup is logged at debug level using [`tracing`]. No subscriber is
//! installed by this crate.

mod blocking;
pub mod capi;
mod config;
mod errors;
mod gemm;
mod gemm_nn;
mod gemm_nncb;
mod gemm_nt;
mod iter_util;
pub mod kernels;
pub mod threading;

pub use config::{CacheSizes, GemmConfig};
pub use errors::{GemmError, GemmResult, Operand};
pub use gemm::{
    default_executor, gemm32f_nn, gemm32f_nncb_buffer_size, gemm32f_nncb_reorder_b,
    gemm32f_nncb_run, gemm32f_nt, Gemm32f, IsaType,
};
pub use gemm_nn::GemmNN;
pub use gemm_nncb::GemmNNcb;
pub use gemm_nt::GemmNT;
pub use kernels::KernelTier;

#[cfg(test)]
mod tests;
