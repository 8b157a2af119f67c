//! Domain error types
//!
//! Most registry operations tolerate bad input by design (unknown session
//! ids, duplicate message ids) and never raise. The errors here cover the
//! genuinely fallible paths: decoding persisted state and opening the
//! backing store.

use thiserror::Error;

/// Errors from the persistence mirror
#[derive(Debug, Error)]
pub enum PersistError {
    /// Persisted record could not be decoded; callers discard and continue
    #[error("malformed persisted state: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Backing store could not be read or written
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
}
