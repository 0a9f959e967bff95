//! Internal testing utilities for the simd-gemm crates.

use std::error::Error;
use std::fmt::{Debug, Display};
use std::panic::{RefUnwindSafe, UnwindSafe};
use std::time::Instant;

/// Utility for creating parametrized (aka. table-driven) tests.
///
/// Create a `Debug` struct, conventionally named `Case`, holding the data for
/// one test case, build a collection of cases and call `test_each` with the
/// test body:
///
/// ```
/// use simd_gemm_testing::TestCases;
///
/// #[derive(Debug)]
/// struct Case {
///   m: usize,
///   n: usize,
///   expected: usize,
/// }
///
/// let cases = [
///   Case { m: 3, n: 5, expected: 15 },
/// ];
///
/// cases.test_each(|&Case { m, n, expected }| {
///   assert_eq!(m * n, expected);
/// });
/// ```
///
/// All cases are run, catching panics. If any case fails, `test_each` panics
/// with the number of failures and their debug representations.
///
/// Test cases and values captured by the test closure must be
/// [unwind safe](https://doc.rust-lang.org/std/panic/fn.catch_unwind.html).
pub trait TestCases {
    /// The data for a single test case.
    type Case;

    /// Call `test` with a reference to each case, catching any panics.
    fn test_each(self, test: impl Fn(&Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe;

    /// Variant of [`test_each`](TestCases::test_each) which passes cases by
    /// value. Each case is formatted before the call so it can be reported
    /// on failure.
    fn test_each_value(self, test: impl Fn(Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + UnwindSafe;
}

impl<I: IntoIterator> TestCases for I {
    type Case = I::Item;

    fn test_each(self, test: impl Fn(&I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe,
    {
        let mut failures = Vec::new();
        for case in self {
            if std::panic::catch_unwind(|| test(&case)).is_err() {
                failures.push(case);
            }
        }
        assert_eq!(
            failures.len(),
            0,
            "{} test cases failed: {:?}",
            failures.len(),
            failures
        );
    }

    fn test_each_value(self, test: impl Fn(I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + UnwindSafe,
    {
        let mut failures = Vec::new();
        for case in self {
            let test = &test;
            let case_str = format!("{:?}", case);
            if std::panic::catch_unwind(move || test(case)).is_err() {
                failures.push(case_str);
            }
        }
        assert_eq!(
            failures.len(),
            0,
            "{} test cases failed: {:?}",
            failures.len(),
            failures
        );
    }
}

/// Trait that tests whether two values are approximately equal.
///
/// The comparison matches `allclose` in NumPy and PyTorch:
///
/// ```text
/// (self - other).abs() <= atol + rtol * other.abs()
/// ```
pub trait ApproxEq: Sized {
    fn default_abs_tolerance() -> Self;

    fn default_rel_tolerance() -> Self;

    fn approx_eq_with_atol_rtol(&self, other: &Self, atol: Self, rtol: Self) -> bool;

    /// Test if `other` is approximately equal to `self` with the default
    /// tolerances for this type.
    fn approx_eq(&self, other: &Self) -> bool {
        self.approx_eq_with_atol_rtol(
            other,
            Self::default_abs_tolerance(),
            Self::default_rel_tolerance(),
        )
    }
}

impl ApproxEq for f32 {
    #[inline]
    fn default_abs_tolerance() -> f32 {
        1e-8
    }

    #[inline]
    fn default_rel_tolerance() -> f32 {
        1e-5
    }

    #[inline]
    fn approx_eq_with_atol_rtol(&self, other: &f32, atol: f32, rtol: f32) -> bool {
        (self - other).abs() <= atol + rtol * other.abs()
    }
}

/// Error returned when two float slices differ.
#[derive(Debug)]
pub struct MismatchError {
    /// Total number of mismatched elements.
    pub count: usize,

    /// Up to the first ten mismatches, as `(index, actual, expected)`.
    pub examples: Vec<(usize, f32, f32)>,
}

impl Display for MismatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} values differ. Examples (index, actual, expected): {:?}",
            self.count, self.examples
        )
    }
}

impl Error for MismatchError {}

/// Check that `actual` and `expected` have the same length and approximately
/// equal values, using the given tolerances.
pub fn expect_equal_with_tolerance(
    actual: &[f32],
    expected: &[f32],
    atol: f32,
    rtol: f32,
) -> Result<(), Box<dyn Error>> {
    if actual.len() != expected.len() {
        return Err(format!(
            "Length mismatch. Actual {} expected {}",
            actual.len(),
            expected.len()
        )
        .into());
    }

    let mismatches: Vec<_> = actual
        .iter()
        .zip(expected)
        .enumerate()
        .filter(|(_, (x, y))| !x.approx_eq_with_atol_rtol(y, atol, rtol))
        .map(|(i, (x, y))| (i, *x, *y))
        .collect();

    if mismatches.is_empty() {
        Ok(())
    } else {
        Err(Box::new(MismatchError {
            count: mismatches.len(),
            examples: mismatches.into_iter().take(10).collect(),
        }))
    }
}

/// Check that `actual` and `expected` are approximately equal using the
/// default tolerances.
pub fn expect_equal(actual: &[f32], expected: &[f32]) -> Result<(), Box<dyn Error>> {
    expect_equal_with_tolerance(
        actual,
        expected,
        f32::default_abs_tolerance(),
        f32::default_rel_tolerance(),
    )
}

/// Statistics from a benchmark run. All fields are durations in milliseconds.
#[derive(Default)]
pub struct BenchStats {
    pub max: f32,
    pub mean: f32,
    pub median: f32,
    pub min: f32,
}

/// Run a benchmark function `f` for `trials` iterations and print statistics
/// about the run.
pub fn run_bench<F: FnMut(), D: Display>(trials: usize, description: D, mut f: F) -> BenchStats {
    if trials == 0 {
        return BenchStats::default();
    }

    let mut times = Vec::with_capacity(trials);
    for _ in 0..trials {
        let start = Instant::now();
        f();
        times.push((start.elapsed().as_secs_f64() * 1000.0) as f32);
    }

    times.sort_by(|a, b| a.total_cmp(b));
    let min = times[0];
    let max = times[times.len() - 1];
    let median = times[times.len() / 2];
    let mean = times.iter().sum::<f32>() / times.len() as f32;

    println!(
        "{}. mean {:.3}ms median {:.3} min {:.3} max {:.3}",
        description, mean, median, min, max
    );

    BenchStats {
        max,
        mean,
        median,
        min,
    }
}
