//! Error signal for host runtime failures
//!
//! The host runtime keeps a single pending-error slot; native code learns
//! that something went wrong from a null/negative return plus that slot.
//! Inside this crate the condition is propagated as [`Raised`], a
//! content-free signal: the diagnostic itself stays in the host error slot
//! until a top-level boundary consumes it with
//! [`HostRuntime::take_error`](crate::HostRuntime::take_error).

use crate::runtime::HostRuntime;

/// Result type for operations that call into the host runtime.
pub type HostResult<T> = Result<T, Raised>;

/// Signal that an error has been recorded on the host runtime.
///
/// Deliberately carries no payload: whoever catches it at the adaptation
/// boundary consults the host error slot for the diagnostic. Dropping
/// handles while this propagates is safe; every owning handle discharges
/// its reference in `Drop` regardless of why the stack unwinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("an error is pending on the host runtime")]
pub struct Raised;

/// Category of a diagnostic stored in the host error slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operand or operation type mismatch
    Type,
    /// Missing or unassignable attribute
    Attribute,
    /// Malformed value (bad build template, out-of-range conversion input)
    Value,
    /// Position outside a sequence
    Index,
    /// Conversion result does not fit the native type
    Overflow,
    /// Any other host-side failure
    Runtime,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Type => "TypeError",
            ErrorKind::Attribute => "AttributeError",
            ErrorKind::Value => "ValueError",
            ErrorKind::Index => "IndexError",
            ErrorKind::Overflow => "OverflowError",
            ErrorKind::Runtime => "RuntimeError",
        };
        f.write_str(name)
    }
}

/// Diagnostic held by the host error slot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct HostError {
    /// Error category
    pub kind: ErrorKind,
    /// Human-readable message set by whoever recorded the error
    pub message: String,
}

impl HostError {
    /// Create a diagnostic.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Raise [`Raised`] if the host runtime has a pending error.
///
/// Probe to call after host operations whose return value alone cannot
/// distinguish success from failure.
#[inline]
pub fn check_pending(rt: &dyn HostRuntime) -> HostResult<()> {
    if rt.error_pending() {
        Err(Raised)
    } else {
        Ok(())
    }
}
