//! Transfer engine
//!
//! Ships a finished artifact off the machine: either one local save, or a
//! sequence of ordered multipart chunk uploads to a collection endpoint.

pub mod save;
pub mod upload;

pub use save::save_artifact;
pub use upload::{chunk_count, ChunkedUploader, UploadOptions, UploadProgress};

use thiserror::Error;

/// Errors that can occur while transferring an artifact
#[derive(Error, Debug)]
pub enum TransferError {
    /// No finalized recording exists to transfer
    #[error("no recording available")]
    NoArtifact,

    /// A chunk was rejected; the whole upload job is abandoned
    #[error("chunk {index} upload failed with status {status}")]
    ChunkUploadFailed {
        /// Zero-based index of the rejected chunk
        index: usize,
        /// HTTP status returned by the endpoint
        status: u16,
    },

    /// The request itself failed (connection, TLS, malformed endpoint)
    #[error("upload request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Writing the artifact to disk failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for transfer operations
pub type TransferResult<T> = Result<T, TransferError>;
