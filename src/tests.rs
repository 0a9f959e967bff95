use std::fmt::Debug;

use simd_gemm_testing::{expect_equal_with_tolerance, run_bench};

use crate::config::{CacheSizes, GemmConfig};
use crate::gemm::Gemm32f;
use crate::kernels::KernelTier;

/// Return a matrix of `len` random values in `[-1, 1)`.
pub fn random_matrix(rng: &mut fastrand::Rng, len: usize) -> Vec<f32> {
    (0..len).map(|_| rng.f32() * 2. - 1.).collect()
}

/// Transpose a row-major `rows x cols` matrix.
pub fn transpose(x: &[f32], rows: usize, cols: usize) -> Vec<f32> {
    let mut out = vec![0.; rows * cols];
    for r in 0..rows {
        for c in 0..cols {
            out[c * rows + r] = x[r * cols + c];
        }
    }
    out
}

/// Naive implementation of `C = alpha * A * B + beta * C`.
///
/// When `beta` is zero the existing contents of C are not read.
pub fn reference_gemm(
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
) {
    for i in 0..m {
        for j in 0..n {
            let mut acc = 0.;
            for kk in 0..k {
                acc += a[i * lda + kk] * b[kk * ldb + j];
            }
            let out = &mut c[i * ldc + j];
            *out = if beta == 0. {
                alpha * acc
            } else {
                alpha * acc + beta * *out
            };
        }
    }
}

/// Compare GEMM outputs, allowing for differences in summation order and
/// fused multiply-add.
pub fn expect_gemm_equal(actual: &[f32], expected: &[f32]) {
    expect_equal_with_tolerance(actual, expected, 1e-4, 1e-4).unwrap();
}

/// Variant of [`expect_gemm_equal`] which reports the failing case.
fn expect_case_equal(actual: &[f32], expected: &[f32], case: impl Debug) {
    if let Err(err) = expect_equal_with_tolerance(actual, expected, 1e-4, 1e-4) {
        panic!("case {:?} failed: {}", case, err);
    }
}

/// Return an executor for each instruction set supported on this system.
fn all_executors() -> Vec<Gemm32f> {
    Gemm32f::isa_types()
        .into_iter()
        .filter_map(|isa| Gemm32f::with_isa(isa).ok())
        .collect()
}

const ALL_TIERS: [KernelTier; 5] = [
    KernelTier::Any,
    KernelTier::F1,
    KernelTier::F2,
    KernelTier::F3,
    KernelTier::F4,
];

#[derive(Clone, Copy, Debug)]
struct Shape {
    m: usize,
    n: usize,
    k: usize,
}

/// Shapes around the tile and vector widths of every kernel set.
fn test_shapes() -> Vec<Shape> {
    let mut shapes = Vec::new();
    for size in [1, 7, 8, 9, 15, 16, 17, 24, 25] {
        shapes.push(Shape {
            m: size,
            n: size,
            k: size,
        });
    }
    shapes.extend([
        Shape { m: 7, n: 17, k: 5 },
        Shape { m: 1, n: 100, k: 3 },
        Shape { m: 100, n: 1, k: 3 },
        Shape {
            m: 13,
            n: 49,
            k: 70,
        },
        Shape {
            m: 33,
            n: 97,
            k: 129,
        },
    ]);
    shapes
}

/// Cache sizes small enough that the test shapes are split into several
/// blocks along each dimension.
fn small_caches() -> GemmConfig {
    GemmConfig::default().with_cache_sizes(CacheSizes {
        l1: 4 * 1024,
        l2: 16 * 1024,
        l3: 32 * 1024,
    })
}

#[test]
fn test_gemm_nn() {
    let shapes = test_shapes();
    for executor in all_executors() {
        for config in [GemmConfig::default(), small_caches()] {
            let gemm = Gemm32f::with_isa(executor.isa()).unwrap().with_config(config);
            for &Shape { m, n, k } in &shapes {
                let mut rng = fastrand::Rng::with_seed(1234);
                let a = random_matrix(&mut rng, m * k);
                let b = random_matrix(&mut rng, k * n);
                let c_init = random_matrix(&mut rng, m * n);

                for (alpha, beta) in [(1., 0.), (1., 1.), (0.5, -2.)] {
                    let mut actual = c_init.clone();
                    gemm.gemm_nn(m, n, k, alpha, &a, k, &b, n, beta, &mut actual, n)
                        .unwrap();

                    let mut expected = c_init.clone();
                    reference_gemm(m, n, k, alpha, &a, k, &b, n, beta, &mut expected, n);
                    expect_case_equal(&actual, &expected, (gemm.isa(), m, n, k, alpha, beta));
                }
            }
        }
    }
}

#[test]
fn test_gemm_nn_strided() {
    // Sub-matrix views with padding at the end of each row.
    let (m, n, k) = (10, 19, 11);
    let (lda, ldb, ldc) = (k + 3, n + 5, n + 2);

    for gemm in all_executors() {
        let mut rng = fastrand::Rng::with_seed(99);
        let a = random_matrix(&mut rng, m * lda);
        let b = random_matrix(&mut rng, k * ldb);

        let mut actual = vec![7.; m * ldc];
        gemm.gemm_nn(m, n, k, 1., &a, lda, &b, ldb, 0., &mut actual, ldc)
            .unwrap();

        let mut expected = vec![7.; m * ldc];
        reference_gemm(m, n, k, 1., &a, lda, &b, ldb, 0., &mut expected, ldc);
        expect_gemm_equal(&actual, &expected);

        // Padding between rows of C is not modified.
        for row in 0..m {
            assert!(actual[row * ldc + n..(row + 1) * ldc].iter().all(|&x| x == 7.));
        }
    }
}

#[test]
fn test_gemm_beta_zero_ignores_output() {
    let (m, n, k) = (9, 25, 16);
    let mut rng = fastrand::Rng::with_seed(5);
    let a = random_matrix(&mut rng, m * k);
    let b = random_matrix(&mut rng, k * n);
    let b_t = transpose(&b, k, n);

    let mut expected = vec![0.; m * n];
    reference_gemm(m, n, k, 1., &a, k, &b, n, 0., &mut expected, n);

    for gemm in all_executors() {
        let mut c = vec![f32::NAN; m * n];
        gemm.gemm_nn(m, n, k, 1., &a, k, &b, n, 0., &mut c, n).unwrap();
        expect_gemm_equal(&c, &expected);

        let mut c = vec![f32::INFINITY; m * n];
        gemm.gemm_nt(m, n, k, 1., &a, k, &b_t, k, 0., &mut c, n).unwrap();
        expect_gemm_equal(&c, &expected);
    }
}

#[test]
fn test_gemm_nt_matches_nn() {
    let shapes = test_shapes();
    for gemm in all_executors() {
        for &Shape { m, n, k } in &shapes {
            let mut rng = fastrand::Rng::with_seed(4321);
            let a = random_matrix(&mut rng, m * k);
            let b_t = random_matrix(&mut rng, n * k);
            let b = transpose(&b_t, n, k);
            let c_init = random_matrix(&mut rng, m * n);

            let mut nn = c_init.clone();
            gemm.gemm_nn(m, n, k, 0.75, &a, k, &b, n, 0.5, &mut nn, n)
                .unwrap();

            let mut nt = c_init.clone();
            gemm.gemm_nt(m, n, k, 0.75, &a, k, &b_t, k, 0.5, &mut nt, n)
                .unwrap();

            expect_case_equal(&nt, &nn, (gemm.isa(), m, n, k));
        }
    }
}

#[test]
fn test_gemm_nncb_matches_nn() {
    let shapes = test_shapes();
    for executor in all_executors() {
        for config in [GemmConfig::default(), small_caches()] {
            let gemm = Gemm32f::with_isa(executor.isa()).unwrap().with_config(config);
            for &Shape { m, n, k } in &shapes {
                let mut rng = fastrand::Rng::with_seed(777);
                let a = random_matrix(&mut rng, m * k);
                let b = random_matrix(&mut rng, k * n);

                let mut expected = vec![0.; m * n];
                reference_gemm(m, n, k, 1., &a, k, &b, n, 0., &mut expected, n);

                for tier in ALL_TIERS {
                    for compatible in [false, true] {
                        let size = gemm.nncb_buffer_size(m, n, k, tier, compatible);
                        let mut packed_b = vec![0.; size];
                        gemm.nncb_reorder_b(m, n, k, &b, n, &mut packed_b, tier, compatible)
                            .unwrap();

                        let mut actual = vec![f32::NAN; m * n];
                        gemm.nncb_run(m, n, k, &a, &packed_b, &mut actual, tier, compatible)
                            .unwrap();
                        expect_case_equal(
                            &actual,
                            &expected,
                            (gemm.isa(), m, n, k, tier, compatible),
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn test_nncb_resolved_tier() {
    for gemm in all_executors() {
        for tier in ALL_TIERS {
            for n in [1, 4, 8, 16, 33, 100] {
                let engine = gemm.nncb(7, n, 10, tier, false);
                assert_ne!(engine.tier(), KernelTier::Any);
                assert!(engine.micro_n() > 0);
            }
        }
    }
}

#[test]
fn test_nncb_reorder_b_is_deterministic() {
    let (m, n, k) = (5, 21, 300);
    let mut rng = fastrand::Rng::with_seed(8);
    let b = random_matrix(&mut rng, k * n);

    for gemm in all_executors() {
        for compatible in [false, true] {
            let size = gemm.nncb_buffer_size(m, n, k, KernelTier::Any, compatible);

            // Different initial contents, to check that padding is written.
            let mut first = vec![0.; size];
            let mut second = vec![f32::NAN; size];
            gemm.nncb_reorder_b(m, n, k, &b, n, &mut first, KernelTier::Any, compatible)
                .unwrap();
            gemm.nncb_reorder_b(m, n, k, &b, n, &mut second, KernelTier::Any, compatible)
                .unwrap();
            assert_eq!(first, second);
        }
    }
}

#[test]
fn test_nncb_run_rows() {
    let (m, n, k) = (32, 40, 50);
    let mut rng = fastrand::Rng::with_seed(21);
    let a = random_matrix(&mut rng, m * k);
    let b = random_matrix(&mut rng, k * n);

    for gemm in all_executors() {
        for compatible in [false, true] {
            let size = gemm.nncb_buffer_size(m, n, k, KernelTier::Any, compatible);
            let mut packed_b = vec![0.; size];
            gemm.nncb_reorder_b(m, n, k, &b, n, &mut packed_b, KernelTier::Any, compatible)
                .unwrap();

            for rows in [1, 3, 7, 12, 31, 32] {
                let mut actual = vec![0.; rows * n];
                gemm.nncb_run_rows(
                    m,
                    n,
                    k,
                    rows,
                    &a[..rows * k],
                    &packed_b,
                    &mut actual,
                    KernelTier::Any,
                    compatible,
                )
                .unwrap();

                let mut expected = vec![0.; rows * n];
                reference_gemm(rows, n, k, 1., &a, k, &b, n, 0., &mut expected, n);
                expect_case_equal(&actual, &expected, (gemm.isa(), rows, compatible));
            }
        }
    }
}

#[test]
fn test_golden_small_product() {
    // A[i][kk] = i * 5 + kk, B[kk][j] = kk * 17 + j, so both are filled with
    // their flat indices and C[i][j] = sum_kk (i * 5 + kk) * (kk * 17 + j).
    // Every intermediate value is an integer which f32 represents exactly.
    let (m, n, k) = (7, 17, 5);
    let a: Vec<f32> = (0..m * k).map(|x| x as f32).collect();
    let b: Vec<f32> = (0..k * n).map(|x| x as f32).collect();
    let expected: Vec<f32> = (0..m * n)
        .map(|x| {
            let (i, j) = (x / n, x % n);
            (0..k).map(|kk| (i * 5 + kk) * (kk * 17 + j)).sum::<usize>() as f32
        })
        .collect();

    for gemm in all_executors() {
        let mut c = vec![0.; m * n];
        gemm.gemm_nn(m, n, k, 1., &a, k, &b, n, 0., &mut c, n).unwrap();
        assert_eq!(c, expected, "isa {}", gemm.isa());

        let b_t = transpose(&b, k, n);
        let mut c = vec![0.; m * n];
        gemm.gemm_nt(m, n, k, 1., &a, k, &b_t, k, 0., &mut c, n).unwrap();
        assert_eq!(c, expected, "isa {}", gemm.isa());

        for tier in ALL_TIERS {
            for compatible in [false, true] {
                let size = gemm.nncb_buffer_size(m, n, k, tier, compatible);
                let mut packed_b = vec![0.; size];
                gemm.nncb_reorder_b(m, n, k, &b, n, &mut packed_b, tier, compatible)
                    .unwrap();
                let mut c = vec![f32::NAN; m * n];
                gemm.nncb_run(m, n, k, &a, &packed_b, &mut c, tier, compatible)
                    .unwrap();
                assert_eq!(
                    c,
                    expected,
                    "isa {} tier {:?} compatible {}",
                    gemm.isa(),
                    tier,
                    compatible
                );
            }
        }
    }
}

#[test]
fn test_beta_zero_matches_zeroed_output() {
    let mut rng = fastrand::Rng::with_seed(17);

    for gemm in all_executors() {
        for &Shape { m, n, k } in &test_shapes() {
            let a = random_matrix(&mut rng, m * k);
            let b = random_matrix(&mut rng, k * n);
            let b_t = transpose(&b, k, n);

            let mut zeroed = vec![0.; m * n];
            let mut garbage = vec![f32::NAN; m * n];
            gemm.gemm_nn(m, n, k, 0.5, &a, k, &b, n, 0., &mut zeroed, n)
                .unwrap();
            gemm.gemm_nn(m, n, k, 0.5, &a, k, &b, n, 0., &mut garbage, n)
                .unwrap();
            assert_eq!(garbage, zeroed, "nn isa {} {}x{}x{}", gemm.isa(), m, n, k);

            let mut zeroed = vec![0.; m * n];
            let mut garbage = vec![f32::NAN; m * n];
            gemm.gemm_nt(m, n, k, 0.5, &a, k, &b_t, k, 0., &mut zeroed, n)
                .unwrap();
            gemm.gemm_nt(m, n, k, 0.5, &a, k, &b_t, k, 0., &mut garbage, n)
                .unwrap();
            assert_eq!(garbage, zeroed, "nt isa {} {}x{}x{}", gemm.isa(), m, n, k);
        }
    }
}

#[test]
fn test_beta_one_leaves_output_unchanged() {
    let mut rng = fastrand::Rng::with_seed(18);

    for gemm in all_executors() {
        for &Shape { m, n, k } in &test_shapes() {
            let a = random_matrix(&mut rng, m * k);
            let b = random_matrix(&mut rng, k * n);
            let b_t = transpose(&b, k, n);
            let c_init = random_matrix(&mut rng, m * n);

            let mut c = c_init.clone();
            gemm.gemm_nn(m, n, k, 0., &a, k, &b, n, 1., &mut c, n).unwrap();
            assert_eq!(c, c_init, "nn isa {} {}x{}x{}", gemm.isa(), m, n, k);

            let mut c = c_init.clone();
            gemm.gemm_nt(m, n, k, 0., &a, k, &b_t, k, 1., &mut c, n).unwrap();
            assert_eq!(c, c_init, "nt isa {} {}x{}x{}", gemm.isa(), m, n, k);
        }
    }
}

#[test]
fn test_zero_sized_inputs() {
    for gemm in all_executors() {
        // K = 0 scales C by beta.
        let mut c = vec![3.; 6];
        gemm.gemm_nn(2, 3, 0, 1., &[], 0, &[], 3, 2., &mut c, 3).unwrap();
        assert_eq!(c, [6.; 6]);

        let mut c = vec![3.; 6];
        gemm.gemm_nt(2, 3, 0, 1., &[], 0, &[], 0, 0., &mut c, 3).unwrap();
        assert_eq!(c, [0.; 6]);

        // M = 0 and N = 0 do nothing.
        let mut c = vec![3.; 2];
        gemm.gemm_nn(0, 2, 4, 1., &[], 4, &[0.; 8], 2, 0., &mut c, 2).unwrap();
        gemm.gemm_nn(2, 0, 4, 1., &[0.; 8], 4, &[], 0, 0., &mut c, 0).unwrap();
        assert_eq!(c, [3.; 2]);
    }
}

#[test]
fn test_thread_count_does_not_change_result() {
    let (m, n, k) = (260, 300, 520);
    let mut rng = fastrand::Rng::with_seed(2024);
    let a = random_matrix(&mut rng, m * k);
    let b = random_matrix(&mut rng, k * n);
    let b_t = transpose(&b, k, n);

    let isa = Gemm32f::new().isa();
    let serial = Gemm32f::with_isa(isa)
        .unwrap()
        .with_config(GemmConfig::default().with_num_threads(1));
    let parallel = Gemm32f::with_isa(isa)
        .unwrap()
        .with_config(GemmConfig::default().with_num_threads(4));
    assert_eq!(serial.nn(m, n, k).num_threads(), 1);
    assert!(parallel.nn(m, n, k).num_threads() > 1);

    let mut c_serial = vec![0.; m * n];
    let mut c_parallel = vec![0.; m * n];
    serial
        .gemm_nn(m, n, k, 1., &a, k, &b, n, 0., &mut c_serial, n)
        .unwrap();
    parallel
        .gemm_nn(m, n, k, 1., &a, k, &b, n, 0., &mut c_parallel, n)
        .unwrap();
    assert_eq!(c_serial, c_parallel);

    serial
        .gemm_nt(m, n, k, 1., &a, k, &b_t, k, 0., &mut c_serial, n)
        .unwrap();
    parallel
        .gemm_nt(m, n, k, 1., &a, k, &b_t, k, 0., &mut c_parallel, n)
        .unwrap();
    assert_eq!(c_serial, c_parallel);
}

#[test]
fn test_engine_reuse() {
    let (m, n, k) = (20, 30, 40);
    let mut rng = fastrand::Rng::with_seed(10);

    for gemm in all_executors() {
        let mut engine = gemm.nn(m, n, k);
        for _ in 0..3 {
            let a = random_matrix(&mut rng, m * k);
            let b = random_matrix(&mut rng, k * n);
            let mut actual = vec![0.; m * n];
            unsafe {
                engine.run(1., a.as_ptr(), k, b.as_ptr(), n, 0., actual.as_mut_ptr(), n);
            }
            let mut expected = vec![0.; m * n];
            reference_gemm(m, n, k, 1., &a, k, &b, n, 0., &mut expected, n);
            expect_gemm_equal(&actual, &expected);
        }
    }
}

#[test]
#[ignore]
fn bench_gemm() {
    let shapes = [(512, 512, 512), (128, 2048, 512), (32, 4096, 1024)];

    for gemm in all_executors() {
        for (m, n, k) in shapes {
            let mut rng = fastrand::Rng::with_seed(1);
            let a = random_matrix(&mut rng, m * k);
            let b = random_matrix(&mut rng, k * n);
            let mut c = vec![0.; m * n];
            let flops = 2. * (m * n * k) as f64;

            let stats = run_bench(10, format!("nn {} m {} n {} k {}", gemm.isa(), m, n, k), || {
                gemm.gemm_nn(m, n, k, 1., &a, k, &b, n, 0., &mut c, n).unwrap();
            });
            println!("  {:.1} GFLOPS", flops / (stats.median as f64 * 1e6));

            let mut packed_b = vec![0.; gemm.nncb_buffer_size(m, n, k, KernelTier::Any, false)];
            gemm.nncb_reorder_b(m, n, k, &b, n, &mut packed_b, KernelTier::Any, false)
                .unwrap();
            let stats = run_bench(10, format!("nncb {} m {} n {} k {}", gemm.isa(), m, n, k), || {
                gemm.nncb_run(m, n, k, &a, &packed_b, &mut c, KernelTier::Any, false)
                    .unwrap();
            });
            println!("  {:.1} GFLOPS", flops / (stats.median as f64 * 1e6));
        }
    }
}
