//! Split engine error types.

use thiserror::Error;

/// Errors that can occur while splitting a plan's payments.
#[derive(Debug, Error)]
pub enum SplitError {
    /// The plan has no eligible payments to split.
    #[error("No payments to split")]
    NoPaymentsToSplit,

    /// A by-record-count split needs an explicit chunk count.
    #[error("Chunk count is required for splitting by records")]
    ChunkCountRequired,

    /// The requested chunk count is outside the accepted range.
    #[error("Chunk count {requested} must be between {min} and {max}")]
    ChunkCountOutOfRange {
        /// The rejected chunk count.
        requested: usize,
        /// Smallest accepted count.
        min: usize,
        /// Largest accepted count (the eligible payment total).
        max: usize,
    },

    /// The split would produce more chunks than the configured maximum.
    #[error("Split would produce {produced} chunks, more than the maximum of {max}")]
    TooManyChunks {
        /// Chunks the split would produce.
        produced: usize,
        /// Configured maximum.
        max: usize,
    },
}

impl SplitError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NoPaymentsToSplit
            | Self::ChunkCountRequired
            | Self::ChunkCountOutOfRange { .. }
            | Self::TooManyChunks { .. } => 400,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NoPaymentsToSplit => "NO_PAYMENTS_TO_SPLIT",
            Self::ChunkCountRequired => "CHUNK_COUNT_REQUIRED",
            Self::ChunkCountOutOfRange { .. } => "CHUNK_COUNT_OUT_OF_RANGE",
            Self::TooManyChunks { .. } => "TOO_MANY_CHUNKS",
        }
    }
}
