//! Kernel error taxonomy
//!
//! Every primitive is a total function over its inputs: an error is
//! returned synchronously and shared state is left untouched. The one
//! exception is scheduler corruption (a dispatch picking a process that
//! is neither READY nor NEW), which is a bug and panics instead.
//!
//! Author: Moroya Sakamoto

use thiserror::Error;

/// Failure codes returned by the kernel primitives.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Block handle is out of range, already free, or sealed inside an
    /// in-flight message the caller does not own.
    #[error("invalid memory block")]
    InvalidBlock,

    /// Unknown pid, or a pid outside the set the operation applies to
    /// (e.g. changing the priority of a system process).
    #[error("invalid process id")]
    InvalidProcess,

    /// Priority outside the user-settable band, or one of the two
    /// reserved levels (privileged / null).
    #[error("invalid priority")]
    InvalidPriority,

    /// Pool is empty right now. Only surfaced by the non-blocking
    /// acquire used from interrupt context; the process-facing acquire
    /// blocks instead.
    #[error("no memory block available")]
    ResourceExhausted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(KernelError::InvalidBlock.to_string(), "invalid memory block");
        assert_eq!(
            KernelError::ResourceExhausted.to_string(),
            "no memory block available"
        );
    }

    #[test]
    fn test_error_is_copy_eq() {
        let e = KernelError::InvalidPriority;
        let f = e;
        assert_eq!(e, f);
    }
}
