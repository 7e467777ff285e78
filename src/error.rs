//! Errors for solver configuration

use crate::Float;

/// Errors for validation of input settings
#[derive(Debug, Clone)]
pub enum Error {
    ImplicitNotSupported,
    InvalidOrder(usize),
    ToleranceMustBePositive(Float),
    InvalidStepSize(Float),
    IntervalThresholdOutOfRange(Float),
    PartitionThresholdOutOfRange(Float),
    EpsilonMustBePositive(Float),
    MaxIterMustBePositive(usize),
    EndTimeMustBePositive(Float),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::ImplicitNotSupported => write!(
                f,
                "the multi-adaptive solver cannot solve implicit ODEs; use cG(q) or dG(q) instead"
            ),
            Error::InvalidOrder(q) => write!(
                f,
                "invalid method order {} (cG requires q >= 1, dG requires q >= 0)",
                q
            ),
            Error::ToleranceMustBePositive(v) => {
                write!(f, "tolerance must be positive (got {})", v)
            }
            Error::InvalidStepSize(v) => write!(f, "time step must be positive (got {})", v),
            Error::IntervalThresholdOutOfRange(v) => {
                write!(f, "interval threshold must be in (0, 1) (got {})", v)
            }
            Error::PartitionThresholdOutOfRange(v) => {
                write!(f, "partitioning threshold must be in (0, 1) (got {})", v)
            }
            Error::EpsilonMustBePositive(v) => {
                write!(f, "interval epsilon must be positive (got {})", v)
            }
            Error::MaxIterMustBePositive(v) => {
                write!(f, "iteration limit must be positive (got {})", v)
            }
            Error::EndTimeMustBePositive(v) => {
                write!(f, "ODE end time must be positive (got {})", v)
            }
        }
    }
}

impl std::error::Error for Error {}
