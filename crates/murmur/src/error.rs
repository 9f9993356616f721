//! Error and Result types for murmur operations.

use std::io;
use thiserror::Error;

/// A convenience `Result` type for murmur operations.
pub type Result<T> = std::result::Result<T, MurmurError>;

/// The error type for murmur operations.
#[derive(Debug, Error)]
pub enum MurmurError {
    /// An archive spec token could not be parsed.
    #[error("invalid archive spec: {0:?}")]
    InvalidSpec(String),

    /// Two archives were requested with the same precision.
    #[error("a database may not have two archives with the same precision ({0} == {1})")]
    DuplicatePrecision(u32, u32),

    /// A coarser archive's precision is not a multiple of the finer one's.
    #[error("lower precision archives must evenly divide higher precision archives ({coarser} % {finer} != 0)")]
    UndividablePrecision {
        /// Precision of the finer archive, in seconds per point.
        finer: u32,
        /// Precision of the coarser archive, in seconds per point.
        coarser: u32,
    },

    /// A finer archive retains more time than the coarser one below it.
    #[error("lower precision archives must cover larger time intervals than higher precision ones ({finer} > {coarser})")]
    RetentionOrder {
        /// Retention of the finer archive, in seconds.
        finer: u64,
        /// Retention of the coarser archive, in seconds.
        coarser: u64,
    },

    /// An archive is too small to fill one consolidation window of the next.
    #[error("each archive must have at least enough points to consolidate to the next archive (needs {needed}, has {points})")]
    NotEnoughPoints {
        /// Points required for one consolidation window.
        needed: u32,
        /// Points the archive actually has.
        points: u32,
    },

    /// A database cannot be created without any archives.
    #[error("cannot create a database without archives")]
    NoArchives,

    /// The x-files factor is a percentage and must be at most 100.
    #[error("x-files factor must be between 0 and 100, got {0}")]
    InvalidXFilesFactor(u8),

    /// The requested archives do not fit in the 32-bit offset field.
    #[error("archive layout exceeds the maximum file size")]
    LayoutTooLarge,

    /// An aggregation method name or wire code was not recognized.
    #[error("unknown aggregation method: {0:?}")]
    InvalidAggregation(String),

    /// The file's header or archive directory is short or inconsistent.
    #[error("file is corrupted: {0}")]
    Corrupted(&'static str),

    /// The timestamp is in the future or beyond the file's retention.
    #[error("no suitable archive for timestamp {0}")]
    NoSuitableArchive(u64),

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An I/O failure after the primary write left coarser archives stale.
    #[error("propagation failed, archive is probably inconsistent: {0}")]
    Propagation(#[source] Box<MurmurError>),
}
