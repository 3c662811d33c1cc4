//! The closed public error enum.
//!
//! Internal helpers use `anyhow::Result` for their `ensure!`/`bail!` checks; the public entry
//! points in `lib.rs` convert those into this enum at the boundary, so type and dimension
//! mismatches are detected before any allocation happens.

use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    OutOfMemory,
    DomainMismatch,
    DimensionMismatch,
    InvalidObject,
    NullPointer,
    InvalidValue,
    UninitializedObject,
    /// The `Context` was cancelled before the call finished; `C` (and any output scalar) is left
    /// untouched.
    Cancelled,
    /// Internal only: the switch factory declining a combination. A conforming
    /// public entry point never returns this; it is consumed by `sparsegb_algebra::dispatch`.
    NoValue,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::OutOfMemory => "out of memory",
            Error::DomainMismatch => "operator/matrix domain mismatch",
            Error::DimensionMismatch => "matrix dimensions are incompatible",
            Error::InvalidObject => "object is in an invalid state",
            Error::NullPointer => "required argument was null/absent",
            Error::InvalidValue => "invalid value",
            Error::UninitializedObject => "object was never initialized",
            Error::Cancelled => "operation was cancelled",
            Error::NoValue => "no specialized kernel available (internal)",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Internal helpers (the switch factory, typecasts) report failure via `anyhow::Error`; any
/// mismatch reaching the public boundary this way is a domain mismatch, since dimension and
/// cancellation errors are always raised directly as `Error` by the orchestrator itself.
impl From<anyhow::Error> for Error {
    fn from(_: anyhow::Error) -> Self {
        Error::DomainMismatch
    }
}
