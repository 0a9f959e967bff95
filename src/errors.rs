use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// Matrix operand named in a [`GemmError`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Operand {
    A,
    B,
    C,
}

impl Display for Operand {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::A => write!(fmt, "a"),
            Self::B => write!(fmt, "b"),
            Self::C => write!(fmt, "c"),
        }
    }
}

/// Errors with matrix multiplication inputs, reported by the checked API.
#[derive(Clone, Debug, PartialEq)]
pub enum GemmError {
    /// The leading dimension of a matrix is less than its row length.
    InvalidStride(Operand),
    /// An input slice is too short for the matrix dimensions and stride.
    InputNotLargeEnough(Operand),
    /// The buffer provided for the output is too short.
    OutputNotLargeEnough,
    /// The packed B buffer is smaller than the size required by the layout.
    PackedBufferTooSmall { required: usize, actual: usize },
    /// More rows were requested than the packed-B engine was sized for.
    TooManyRows { rows: usize, max: usize },
    /// The requested instruction set is not supported on this CPU.
    IsaNotSupported,
}

impl Display for GemmError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidStride(operand) => {
                write!(fmt, "stride of matrix `{}` is less than its row length", operand)
            }
            Self::InputNotLargeEnough(operand) => {
                write!(fmt, "buffer for matrix `{}` is too small", operand)
            }
            Self::OutputNotLargeEnough => write!(fmt, "output buffer is too small"),
            Self::PackedBufferTooSmall { required, actual } => write!(
                fmt,
                "packed buffer has {} elements but {} are required",
                actual, required
            ),
            Self::TooManyRows { rows, max } => {
                write!(fmt, "row count {} exceeds the maximum of {}", rows, max)
            }
            Self::IsaNotSupported => write!(fmt, "instruction set is not supported"),
        }
    }
}

impl Error for GemmError {}

/// Result of a checked GEMM operation.
pub type GemmResult = Result<(), GemmError>;

/// Check that a buffer of `len` elements holds a `rows x cols` matrix with
/// row stride `ld`.
pub(crate) fn check_matrix(
    operand: Operand,
    len: usize,
    rows: usize,
    cols: usize,
    ld: usize,
) -> GemmResult {
    if rows > 1 && ld < cols {
        return Err(GemmError::InvalidStride(operand));
    }
    if rows == 0 || cols == 0 {
        return Ok(());
    }
    let required = (rows - 1) * ld + cols;
    if len < required {
        return Err(match operand {
            Operand::C => GemmError::OutputNotLargeEnough,
            _ => GemmError::InputNotLargeEnough(operand),
        });
    }
    Ok(())
}
