//! Error types for the vector database kernel.
//!
//! A single `thiserror`-derived enum covers every observable failure mode
//! described by the error-handling design: validation, lookup, lifecycle,
//! concurrency, IO, corruption, cancellation and internal invariant
//! violations. Each variant carries a stable `VDB-NNN` code for log
//! correlation.

use thiserror::Error;

/// Result type alias for kernel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in kernel operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input: dimension mismatch, non-finite values, empty query,
    /// `k <= 0`, unknown metric, unknown config key (VDB-001).
    #[error("[VDB-001] invalid input: {0}")]
    Invalid(String),

    /// No record for the given id (VDB-002).
    #[error("[VDB-002] not found: {0}")]
    NotFound(String),

    /// Operation invoked before `init` or after `close` (VDB-003).
    #[error("[VDB-003] not initialized")]
    NotInitialized,

    /// Concurrent-writer violation detected by a non-blocking locking path
    /// (VDB-004).
    #[error("[VDB-004] conflict: {0}")]
    Conflict(String),

    /// Underlying persistence read/write failure (VDB-005).
    #[error("[VDB-005] io error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot checksum/magic mismatch, truncated file, or unknown version
    /// (VDB-006).
    #[error("[VDB-006] corrupted snapshot: {0}")]
    Corruption(String),

    /// Batch operation stopped early by a caller-supplied cancellation
    /// signal (VDB-007).
    #[error("[VDB-007] cancelled after {completed} of {total} items")]
    Cancelled {
        /// Items processed before cancellation was observed.
        completed: usize,
        /// Total items in the batch.
        total: usize,
    },

    /// Invariant violation; indicates a bug (VDB-008).
    #[error("[VDB-008] internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns the stable error code (e.g. `"VDB-001"`).
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Invalid(_) => "VDB-001",
            Self::NotFound(_) => "VDB-002",
            Self::NotInitialized => "VDB-003",
            Self::Conflict(_) => "VDB-004",
            Self::Io(_) => "VDB-005",
            Self::Corruption(_) => "VDB-006",
            Self::Cancelled { .. } => "VDB-007",
            Self::Internal(_) => "VDB-008",
        }
    }

    /// Returns true if a caller can reasonably retry or work around this
    /// error without restarting the database. Corruption and internal
    /// errors are not recoverable.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Corruption(_) | Self::Internal(_))
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
