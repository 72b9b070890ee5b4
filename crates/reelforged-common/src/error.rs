//! Unified error type for reelforged.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for a transport layer to derive a status code via [`Error::http_status`].
//!
//! Chunk-level invalidity is never an error: it is recorded on the chunk and
//! reported as a flag. Probe timeouts are folded into "invalid" as well.

use std::fmt;
use std::path::PathBuf;

/// Unified error type covering all failure modes in reelforged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "session").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// A merge was requested with no usable chunk files.
    #[error("No chunks to merge: {0}")]
    NoChunks(String),

    /// A durable snapshot could not be written or read.
    #[error("Storage error at {}: {message}", path.display())]
    Storage {
        /// The file or directory involved.
        path: PathBuf,
        /// Human-readable error description.
        message: String,
    },

    /// Every merge strategy failed, or the produced file failed verification.
    #[error("Merge failed: {0}")]
    MergeFailed(String),

    /// The session has already been completed and accepts no more chunks.
    #[error("Session already completed: {0}")]
    SessionCompleted(String),

    /// An external tool (ffmpeg, ffprobe) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Request data failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A snapshot could not be (de)serialized.
    #[error("JSON error: {source}")]
    Json {
        /// The underlying serde error.
        #[from]
        source: serde_json::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::NoChunks(_) => 422,
            Error::Storage { .. } => 500,
            Error::MergeFailed(_) => 500,
            Error::SessionCompleted(_) => 409,
            Error::Tool { .. } => 502,
            Error::InvalidInput(_) => 400,
            Error::Io { .. } => 500,
            Error::Json { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for a missing session.
    pub fn session_not_found(id: impl fmt::Display) -> Self {
        Self::not_found("session", id)
    }

    /// Convenience constructor for [`Error::Storage`].
    pub fn storage(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        Error::Storage {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Whether this error means the session id is unknown.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
