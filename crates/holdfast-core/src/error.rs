//! Error types for the holdfast memory primitives.
//!
//! Two families: capacity errors raised by the pool allocator, and access
//! errors raised by the owning pointer types. Both are plain values; nothing
//! in the workspace retries on the caller's behalf.

use thiserror::Error;

/// Errors from pool allocation and pool construction.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum AllocError {
    /// The request can never fit in a single chunk.
    ///
    /// The allocator's chain is left exactly as it was before the call.
    #[error("allocation too large: requested {requested} bytes, chunk capacity {capacity} bytes")]
    AllocationTooLarge {
        /// Number of bytes requested (`usize::MAX` if the size overflowed).
        requested: usize,
        /// Fixed capacity of one chunk in bytes.
        capacity: usize,
    },
    /// The pool configuration cannot back the requested element type.
    #[error("invalid pool configuration: {reason}")]
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
    /// This thread's pool chain table has already been destroyed.
    ///
    /// Only reachable from thread-local destructors that run after it.
    #[error("pool chain table already torn down at thread exit")]
    ThreadExiting,
}

impl AllocError {
    /// Whether this error came from an oversized request.
    pub fn is_too_large(&self) -> bool {
        matches!(self, Self::AllocationTooLarge { .. })
    }
}

/// Errors from accessing the object behind an owner or observer.
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessError {
    /// The owner holds no object.
    #[error("null access: the owner holds no object")]
    NullAccess,
    /// The tracked object has already been destroyed, so a weak observer
    /// cannot be promoted.
    #[error("expired: the tracked object has already been destroyed")]
    Expired,
}

/// Any error produced by the holdfast crates.
///
/// Lets client code mix pool and pointer calls behind a single `?`.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// A pool allocation or configuration error.
    #[error(transparent)]
    Alloc(#[from] AllocError),
    /// An owner or observer access error.
    #[error(transparent)]
    Access(#[from] AccessError),
}
