//! Recorded artifacts
//!
//! The immutable output of one recording session, shared between the
//! recorder that produced it and the transfer engine that consumes it.

use std::sync::Arc;

/// An immutable recorded media blob
///
/// Produced by [`crate::recorder::Recorder::stop`]; neither producer nor
/// consumers mutate it after creation, so it is shared as an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedArtifact {
    data: Vec<u8>,
    media_type: String,
}

impl RecordedArtifact {
    /// Create an artifact from finished bytes and their media type.
    pub fn new(data: Vec<u8>, media_type: String) -> Self {
        Self { data, media_type }
    }

    /// The artifact bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The declared media type (e.g. `video/webm`)
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the artifact holds no bytes at all
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Wrap the artifact for sharing between producer and consumers.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}
