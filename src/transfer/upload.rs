//! Chunked upload
//!
//! Splits the artifact into ordered chunks and uploads them one at a time as
//! multipart form posts. Every chunk carries the job id, its own index, and
//! the total count, so the receiving endpoint can detect missing or
//! reordered chunks; reassembly itself is the receiver's job.

use crate::artifact::RecordedArtifact;
use crate::transfer::{TransferError, TransferResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default multipart field name for the chunk bytes
pub const DEFAULT_FIELD_NAME: &str = "vidfile";

/// Default destination filename
pub const DEFAULT_FILENAME: &str = "recording.webm";

/// Default chunk size (5 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// Options for a chunked upload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadOptions {
    /// Multipart field name the endpoint expects the chunk bytes under
    pub field_name: String,

    /// Final desired file name on the receiving side
    pub filename: String,

    /// Chunk size in bytes
    pub chunk_size: usize,

    /// Extra key/value fields sent with every chunk
    pub additional_data: Vec<(String, String)>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            field_name: DEFAULT_FIELD_NAME.to_string(),
            filename: DEFAULT_FILENAME.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            additional_data: Vec::new(),
        }
    }
}

/// Progress metadata passed to the upload progress callback
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    /// Bytes confirmed uploaded so far
    pub uploaded_bytes: usize,

    /// Total bytes of the artifact
    pub total_bytes: usize,

    /// Index of the chunk that just completed
    pub chunk_index: usize,

    /// Total number of chunks in this job
    pub total_chunks: usize,

    /// The job id shared by every chunk of this upload
    pub upload_id: String,
}

/// Number of chunks needed for `total_bytes` at `chunk_size` bytes each.
pub fn chunk_count(total_bytes: usize, chunk_size: usize) -> usize {
    total_bytes.div_ceil(chunk_size)
}

/// One upload id per job, unique enough for realistic concurrent upload
/// rates: a millisecond timestamp prefix plus a random suffix.
fn new_upload_id() -> String {
    format!(
        "{:x}-{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    )
}

/// Uploads artifacts to a collection endpoint in sequential chunks
pub struct ChunkedUploader {
    client: reqwest::Client,
}

impl ChunkedUploader {
    /// Create an uploader with a default HTTP client.
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Create an uploader with a caller-configured client (custom headers,
    /// timeouts, proxies).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Upload the artifact without progress reporting.
    pub async fn upload(
        &self,
        endpoint: &str,
        artifact: &RecordedArtifact,
        options: &UploadOptions,
    ) -> TransferResult<reqwest::Response> {
        self.upload_with_progress(endpoint, artifact, options, |_, _| {})
            .await
    }

    /// Upload the artifact in strictly increasing chunk order, awaiting each
    /// round-trip before the next.
    ///
    /// `on_progress` is invoked exactly once after every successful chunk
    /// with the fraction `uploaded_bytes / total_bytes`. The first non-2xx
    /// response aborts the whole job with
    /// [`TransferError::ChunkUploadFailed`]; no chunk is retried and no later
    /// chunk is sent. On success the final chunk's response is returned.
    pub async fn upload_with_progress<F>(
        &self,
        endpoint: &str,
        artifact: &RecordedArtifact,
        options: &UploadOptions,
        mut on_progress: F,
    ) -> TransferResult<reqwest::Response>
    where
        F: FnMut(f64, &UploadProgress),
    {
        if artifact.is_empty() {
            return Err(TransferError::NoArtifact);
        }

        let data = artifact.data();
        let total_bytes = data.len();
        let chunk_size = options.chunk_size.max(1);
        let total_chunks = chunk_count(total_bytes, chunk_size);
        let upload_id = new_upload_id();

        tracing::info!(
            "Uploading {} bytes as {} chunk(s), job {}",
            total_bytes,
            total_chunks,
            upload_id
        );

        let mut last_response = None;
        for chunk_index in 0..total_chunks {
            let start = chunk_index * chunk_size;
            let end = usize::min(start + chunk_size, total_bytes);
            let chunk = data[start..end].to_vec();

            let part = reqwest::multipart::Part::bytes(chunk)
                .file_name(options.filename.clone())
                .mime_str(artifact.media_type())?;
            let mut form = reqwest::multipart::Form::new()
                .part(options.field_name.clone(), part)
                .text("uploadId", upload_id.clone())
                .text("chunkIndex", chunk_index.to_string())
                .text("totalChunks", total_chunks.to_string())
                .text("originalFilename", options.filename.clone());
            for (key, value) in &options.additional_data {
                form = form.text(key.clone(), value.clone());
            }

            let response = self.client.post(endpoint).multipart(form).send().await?;
            if !response.status().is_success() {
                let status = response.status().as_u16();
                tracing::warn!(
                    "Chunk {} of job {} rejected with status {}",
                    chunk_index,
                    upload_id,
                    status
                );
                return Err(TransferError::ChunkUploadFailed {
                    index: chunk_index,
                    status,
                });
            }

            let progress = UploadProgress {
                uploaded_bytes: end,
                total_bytes,
                chunk_index,
                total_chunks,
                upload_id: upload_id.clone(),
            };
            on_progress(end as f64 / total_bytes as f64, &progress);
            last_response = Some(response);
        }

        tracing::info!("Upload job {} complete", upload_id);
        last_response.ok_or(TransferError::NoArtifact)
    }
}

impl Default for ChunkedUploader {
    fn default() -> Self {
        Self::new()
    }
}
