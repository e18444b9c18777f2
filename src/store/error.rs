//! Error taxonomy for the key-value store.

use std::io;
use thiserror::Error;

/// Errors that can occur during `Database` operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// `Put` was called with an empty key.
    #[error("key must not be empty")]
    BadArgument,

    /// `Get` found no value for the given key.
    #[error("key not found")]
    NotFound,

    /// A syscall failed.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// A record failed to decode mid-file: a length field read past the
    /// slice, `total_len` disagreed with the sum of the inner fields, or a
    /// key/value was not valid UTF-8.
    #[error("corrupt record at {path}: {reason}")]
    CorruptRecord { path: String, reason: String },

    /// A truncated trailing record was found. Tolerated only on the newest
    /// pre-existing segment at recovery time.
    #[error("truncated trailing record in {path} at offset {offset}")]
    CorruptTail { path: String, offset: u64 },

    /// Unrecoverable structural damage in a segment that is not allowed to
    /// tolerate it (any non-newest segment, or a structurally complete but
    /// internally inconsistent record on any segment).
    #[error("fatal corruption in {path}: {reason}")]
    FatalCorruption { path: String, reason: String },

    /// The database has already been closed.
    #[error("database is closed")]
    Closed,
}

/// Result type alias for `Database` operations.
pub type Result<T> = std::result::Result<T, StoreError>;
