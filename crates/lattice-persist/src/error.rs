//! Persistence errors.

use std::path::PathBuf;

/// Errors reading or writing chunk save files.
///
/// Every variant is recoverable: the chunk keeps its freshly generated
/// state and the world keeps running.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Filesystem failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The file was written by an incompatible format version.
    #[error("unsupported format version {found} (expected {expected})")]
    VersionMismatch {
        /// Version in the file.
        found: i16,
        /// Version this build writes.
        expected: i16,
    },
    /// The data ended early.
    #[error("data truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum byte count needed.
        expected: usize,
        /// Actual byte count.
        actual: usize,
    },
    /// The voxel count does not match the chunk, or a payload disagrees with
    /// its header.
    #[error("{what} mismatch: expected {expected}, found {found}")]
    CountMismatch {
        /// Which count.
        what: &'static str,
        /// Value required.
        expected: i64,
        /// Value found.
        found: i64,
    },
    /// The mode byte is neither full nor differential.
    #[error("unknown save mode {0}")]
    UnknownMode(u8),
    /// A differential entry points outside the chunk.
    #[error("entry position {0} out of range")]
    PositionOutOfRange(i32),
    /// LZ4 decompression failed.
    #[error("decompression failed: {0}")]
    Decompress(String),
}
