//! Tile shape policies for each instruction set.
//!
//! These are pure functions of the problem shape. Policies for every
//! architecture are compiled on all hosts so they can be tested anywhere.

use super::{KernelTier, TileShape};

/// Unwrap the outcome of a tier cascade. Every cascade must resolve, as the
/// `F1` rung accepts any width.
fn resolved(
    shape: Option<TileShape>,
    tier: KernelTier,
    narrowest: TileShape,
) -> (TileShape, KernelTier) {
    match shape {
        Some(shape) => (shape, tier),
        None => {
            debug_assert!(false, "kernel tier cascade did not resolve");
            (narrowest, KernelTier::F1)
        }
    }
}

/// Tier cascade for instruction sets with three tile widths: `F3`
/// (`4 x 3F`), `F2` (`6 x 2F`) and `F1` (`6 x F`).
///
/// Each rung re-tests the tier chosen by the previous one, so a forced tier
/// which is too wide for `n` drops to the next narrower one. `F4` is not
/// available and is treated as a request for `F3`.
pub fn three_tier_cascade(
    m: usize,
    n: usize,
    f: usize,
    tier: KernelTier,
) -> (TileShape, KernelTier) {
    let mut tier = match tier {
        KernelTier::F4 => KernelTier::F3,
        tier => tier,
    };
    let mut shape = None;

    if tier == KernelTier::F3 || (tier == KernelTier::Any && matches!(m, 4 | 8 | 16) && n > 2 * f)
    {
        shape = Some(TileShape::new(4, 3 * f));
        tier = KernelTier::F3;
    }
    if tier == KernelTier::F2
        || (tier == KernelTier::F3 && n <= 2 * f)
        || (tier == KernelTier::Any && n > f)
    {
        shape = Some(TileShape::new(6, 2 * f));
        tier = KernelTier::F2;
    }
    if tier == KernelTier::F1 || (tier == KernelTier::F2 && n <= f) || tier == KernelTier::Any {
        shape = Some(TileShape::new(6, f));
        tier = KernelTier::F1;
    }

    resolved(shape, tier, TileShape::new(6, f))
}

/// Tier cascade for AVX-512 (16 lanes): `F3` is `4 x 48`, `F2` is `6 x 32`
/// and `F1` is `6 x 16`.
#[cfg_attr(not(all(target_arch = "x86_64", feature = "avx512")), allow(dead_code))]
pub fn avx512_cascade(m: usize, n: usize, tier: KernelTier) -> (TileShape, KernelTier) {
    const F: usize = 16;

    let mut tier = match tier {
        KernelTier::F4 => KernelTier::F3,
        tier => tier,
    };
    let mut shape = None;

    if tier == KernelTier::F3
        || (tier == KernelTier::Any
            && (matches!(m, 4 | 8 | 16) || matches!(n, 48 | 96))
            && n > 2 * F)
    {
        shape = Some(TileShape::new(4, 3 * F));
        tier = KernelTier::F3;
    }
    if tier == KernelTier::F2
        || (tier == KernelTier::F3 && n <= 2 * F)
        || (tier == KernelTier::Any && n > F)
    {
        shape = Some(TileShape::new(6, 2 * F));
        tier = KernelTier::F2;
    }
    if tier == KernelTier::F1 || (tier == KernelTier::F2 && n <= F) || tier == KernelTier::Any {
        shape = Some(TileShape::new(6, F));
        tier = KernelTier::F1;
    }

    resolved(shape, tier, TileShape::new(6, F))
}

/// Tier cascade for Arm Neon (4 lanes), which has 32 vector registers and so
/// supports taller tiles than SSE.
///
/// `F4` is `6 x 16`, `F3` is `4 x 12` or `8 x 12`, `F2` is `6 x 8` or
/// `12 x 8` and `F1` is `12 x 4`. A forced `F4` is kept for any `n`.
#[cfg_attr(not(target_arch = "aarch64"), allow(dead_code))]
pub fn neon_cascade(m: usize, n: usize, tier: KernelTier) -> (TileShape, KernelTier) {
    const F: usize = 4;

    let mut tier = tier;
    let mut shape = None;

    if tier == KernelTier::F4 || (tier == KernelTier::Any && !matches!(m, 4 | 8 | 16) && n > 3 * F)
    {
        shape = Some(TileShape::new(6, 4 * F));
        tier = KernelTier::F4;
    }
    if tier == KernelTier::F3 || (tier == KernelTier::Any && matches!(m, 4 | 8 | 16) && n > 2 * F)
    {
        let micro_m = if m == 4 { 4 } else { 8 };
        shape = Some(TileShape::new(micro_m, 3 * F));
        tier = KernelTier::F3;
    }
    if tier == KernelTier::F2
        || (tier == KernelTier::F3 && n <= 2 * F)
        || (tier == KernelTier::Any && n > F)
    {
        let micro_m = if m == 6 { 6 } else { 12 };
        shape = Some(TileShape::new(micro_m, 2 * F));
        tier = KernelTier::F2;
    }
    if tier == KernelTier::F1 || (tier == KernelTier::F2 && n <= F) || tier == KernelTier::Any {
        shape = Some(TileShape::new(12, F));
        tier = KernelTier::F1;
    }

    resolved(shape, tier, TileShape::new(12, F))
}

/// One-shot GEMM tile for 4-lane x86 and generic kernels.
pub fn sse_nn_shape(n: usize, k: usize) -> TileShape {
    if n < k {
        TileShape::new(6, 8)
    } else {
        TileShape::new(4, 12)
    }
}

/// One-shot GEMM tile for AVX without FMA. Tall tiles only pay off for very
/// deep reductions.
#[cfg_attr(not(target_arch = "x86_64"), allow(dead_code))]
pub fn avx_nn_shape(k: usize) -> TileShape {
    if k > 4024 {
        TileShape::new(6, 16)
    } else {
        TileShape::new(4, 24)
    }
}

/// One-shot GEMM tile for AVX2 + FMA.
#[cfg_attr(not(target_arch = "x86_64"), allow(dead_code))]
pub fn avx2_nn_shape(n: usize, k: usize) -> TileShape {
    if n <= k {
        TileShape::new(6, 16)
    } else {
        TileShape::new(4, 24)
    }
}

/// One-shot GEMM tile for AVX-512. Problems with `n <= 8` are delegated to
/// AVX2 by the caller.
#[cfg_attr(not(all(target_arch = "x86_64", feature = "avx512")), allow(dead_code))]
pub fn avx512_nn_shape(m: usize, n: usize, k: usize) -> TileShape {
    if m == 4 {
        TileShape::new(4, 48)
    } else if n < k || m * 8 < n {
        TileShape::new(6, 32)
    } else {
        TileShape::new(4, 48)
    }
}

/// One-shot GEMM tile for Arm Neon.
#[cfg_attr(not(target_arch = "aarch64"), allow(dead_code))]
pub fn neon_nn_shape(m: usize, n: usize) -> TileShape {
    if n == 8 || m == 12 || m * 8 < n {
        TileShape::new(12, 8)
    } else if matches!(n, 12 | 24) || matches!(m, 8 | 16) {
        TileShape::new(8, 12)
    } else {
        TileShape::new(6, 16)
    }
}

#[cfg(test)]
mod tests {
    use simd_gemm_testing::TestCases;

    use super::{
        avx2_nn_shape, avx512_cascade, avx512_nn_shape, neon_cascade, neon_nn_shape,
        three_tier_cascade,
    };
    use crate::kernels::{KernelTier, TileShape};

    const ALL_TIERS: [KernelTier; 5] = [
        KernelTier::Any,
        KernelTier::F1,
        KernelTier::F2,
        KernelTier::F3,
        KernelTier::F4,
    ];

    #[derive(Debug)]
    struct Case {
        m: usize,
        n: usize,
        tier: KernelTier,
        expected: (TileShape, KernelTier),
    }

    #[test]
    fn test_three_tier_cascade() {
        let cases = [
            Case {
                m: 4,
                n: 100,
                tier: KernelTier::Any,
                expected: (TileShape::new(4, 24), KernelTier::F3),
            },
            Case {
                m: 5,
                n: 100,
                tier: KernelTier::Any,
                expected: (TileShape::new(6, 16), KernelTier::F2),
            },
            Case {
                m: 5,
                n: 8,
                tier: KernelTier::Any,
                expected: (TileShape::new(6, 8), KernelTier::F1),
            },
            Case {
                m: 5,
                n: 100,
                tier: KernelTier::F3,
                expected: (TileShape::new(4, 24), KernelTier::F3),
            },
            Case {
                m: 5,
                n: 100,
                tier: KernelTier::F1,
                expected: (TileShape::new(6, 8), KernelTier::F1),
            },
            Case {
                m: 5,
                n: 100,
                tier: KernelTier::F4,
                expected: (TileShape::new(4, 24), KernelTier::F3),
            },
            // Forced tiers which are too wide fall through.
            Case {
                m: 4,
                n: 12,
                tier: KernelTier::F3,
                expected: (TileShape::new(6, 16), KernelTier::F2),
            },
            Case {
                m: 4,
                n: 5,
                tier: KernelTier::F3,
                expected: (TileShape::new(6, 8), KernelTier::F1),
            },
        ];

        cases.test_each(|case| {
            assert_eq!(
                three_tier_cascade(case.m, case.n, 8, case.tier),
                case.expected
            );
        })
    }

    #[test]
    fn test_avx512_cascade() {
        let cases = [
            Case {
                m: 7,
                n: 96,
                tier: KernelTier::Any,
                expected: (TileShape::new(4, 48), KernelTier::F3),
            },
            Case {
                m: 7,
                n: 100,
                tier: KernelTier::Any,
                expected: (TileShape::new(6, 32), KernelTier::F2),
            },
            Case {
                m: 7,
                n: 16,
                tier: KernelTier::Any,
                expected: (TileShape::new(6, 16), KernelTier::F1),
            },
            Case {
                m: 8,
                n: 20,
                tier: KernelTier::F3,
                expected: (TileShape::new(6, 32), KernelTier::F2),
            },
        ];

        cases.test_each(|case| {
            assert_eq!(avx512_cascade(case.m, case.n, case.tier), case.expected);
        })
    }

    #[test]
    fn test_neon_cascade() {
        let cases = [
            Case {
                m: 7,
                n: 100,
                tier: KernelTier::Any,
                expected: (TileShape::new(6, 16), KernelTier::F4),
            },
            Case {
                m: 4,
                n: 100,
                tier: KernelTier::Any,
                expected: (TileShape::new(4, 12), KernelTier::F3),
            },
            Case {
                m: 16,
                n: 100,
                tier: KernelTier::Any,
                expected: (TileShape::new(8, 12), KernelTier::F3),
            },
            Case {
                m: 6,
                n: 8,
                tier: KernelTier::Any,
                expected: (TileShape::new(6, 8), KernelTier::F2),
            },
            Case {
                m: 7,
                n: 3,
                tier: KernelTier::Any,
                expected: (TileShape::new(12, 4), KernelTier::F1),
            },
            Case {
                m: 7,
                n: 3,
                tier: KernelTier::F4,
                expected: (TileShape::new(6, 16), KernelTier::F4),
            },
        ];

        cases.test_each(|case| {
            assert_eq!(neon_cascade(case.m, case.n, case.tier), case.expected);
        })
    }

    #[test]
    fn test_cascades_always_resolve() {
        for m in 1..20 {
            for n in 1..120 {
                for tier in ALL_TIERS {
                    for (shape, resolved) in [
                        three_tier_cascade(m, n, 4, tier),
                        three_tier_cascade(m, n, 8, tier),
                        avx512_cascade(m, n, tier),
                        neon_cascade(m, n, tier),
                    ] {
                        assert_ne!(resolved, KernelTier::Any);
                        assert!(shape.micro_m > 0 && shape.micro_n > 0);
                    }
                }
            }
        }
    }

    #[test]
    fn test_nn_shapes() {
        assert_eq!(avx2_nn_shape(16, 16), TileShape::new(6, 16));
        assert_eq!(avx2_nn_shape(17, 16), TileShape::new(4, 24));
        assert_eq!(avx512_nn_shape(4, 1000, 10), TileShape::new(4, 48));
        assert_eq!(avx512_nn_shape(5, 100, 10), TileShape::new(6, 32));
        assert_eq!(avx512_nn_shape(50, 100, 10), TileShape::new(4, 48));
        assert_eq!(neon_nn_shape(7, 8), TileShape::new(12, 8));
        assert_eq!(neon_nn_shape(8, 100), TileShape::new(12, 8));
        assert_eq!(neon_nn_shape(16, 40), TileShape::new(8, 12));
        assert_eq!(neon_nn_shape(20, 40), TileShape::new(6, 16));
    }
}
