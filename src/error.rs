//! Error types for capture and replay.

use thiserror::Error;

/// Result type alias for recio operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing or replaying a device log.
#[derive(Debug, Error)]
pub enum Error {
    /// The log text is malformed: a broken section, a duplicate device id,
    /// an unknown key, or an event line that does not parse. Always fatal to
    /// the session that hit it.
    #[error("malformed log: {0}")]
    Format(String),

    /// An OS device resource could not be acquired or driven: opening a
    /// device node, grabbing it exclusively, or creating a virtual device.
    #[error("device error: {0}")]
    Resource(String),

    /// The operation requires elevated permissions.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// I/O error on the log stream itself.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a [`Error::Format`] tagged with the log line it was found on.
    pub(crate) fn format_at(line: u64, msg: impl Into<String>) -> Self {
        Error::Format(format!("line {}: {}", line, msg.into()))
    }
}
