//! The closed set of outcomes every fallible packdude operation can produce.

use thiserror::Error;

/// Every fallible operation in this crate returns `Result<T, PackdudeError>`.
///
/// This mirrors the original implementation's `result_t` taxonomy, with the
/// success-with-boolean (`Yes`/`No`) and the idempotent-install
/// (`AlreadyInstalled`) variants translated away rather than carried as
/// error cases: callers that need them get a plain `bool` or `Option<T>`
/// instead of matching on an error arm for a non-error outcome.
#[derive(Debug, Error)]
pub enum PackdudeError {
    /// A filesystem read/write/stat failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A fetch (HTTP/FTP) transport failure.
    #[error("failed to fetch {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: curl::Error,
    },

    /// A header mismatch, checksum mismatch, malformed tar entry, URL
    /// overflow, or a catalog row missing a required field.
    #[error("corrupt data: {0}")]
    CorruptData(String),

    /// A format-version or architecture mismatch.
    #[error("incompatible package: {0}")]
    Incompatible(String),

    /// A SQLite failure other than an aborted row scan.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// No catalog or registry row exists for the requested name.
    #[error("{0} not found")]
    NotFound(String),

    /// A row-scanning callback short-circuited iteration. Internal to the
    /// store module; callers that use it as a control-flow signal (like
    /// `can_remove`) intercept it before it escapes their public API.
    #[error("aborted")]
    Aborted,
}

pub type Result<T> = std::result::Result<T, PackdudeError>;
