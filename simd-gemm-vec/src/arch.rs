//! Architecture-specific implementations of [`SimdFloat`](crate::SimdFloat).

/// Portable 4-lane fallback built on arrays.
mod generic;

#[cfg(target_arch = "x86_64")]
mod x86_64;

#[cfg(target_arch = "aarch64")]
mod aarch64;

pub use generic::F32x4;

#[cfg(target_arch = "x86_64")]
pub use x86_64::AvxF32x8;
