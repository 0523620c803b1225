//! Error types and handling
//!
//! Crate-level error type aggregating the per-module errors.

use crate::capture::traits::CaptureError;
use crate::recorder::recorder::RecorderError;
use crate::transfer::TransferError;
use thiserror::Error;

/// Any error the pipeline can surface to its caller
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("recorder error: {0}")]
    Recorder(#[from] RecorderError),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),
}

/// Result type alias using MediaError
pub type MediaResult<T> = Result<T, MediaError>;
