//! Capture pipeline facade
//!
//! Bundles the device session manager, the recorder, and the uploader behind
//! the call points a study trial controller uses: acquire, start, stop, then
//! upload or save. The controller decides *when* to call these; the pipeline
//! only guards *what* is legal.

use crate::artifact::RecordedArtifact;
use crate::capture::constraints::CaptureConstraints;
use crate::capture::session::{DeviceSession, DeviceSessionManager};
use crate::recorder::recorder::{Recorder, RecorderError};
use crate::recorder::state::EncodingProfile;
use crate::transfer::upload::{ChunkedUploader, UploadOptions, UploadProgress};
use crate::transfer::{save_artifact, TransferError};
use crate::utils::error::MediaResult;
use std::path::Path;
use std::sync::Arc;

/// The full capture/record/transfer pipeline
///
/// One instance per process: the device session it manages is a singleton
/// hardware resource.
pub struct CapturePipeline {
    devices: DeviceSessionManager,
    recorder: Recorder,
    uploader: ChunkedUploader,
}

impl CapturePipeline {
    /// Create a pipeline with platform devices and default encoding.
    pub fn new() -> Self {
        Self::with_parts(
            DeviceSessionManager::new(),
            Recorder::new(EncodingProfile::default()),
            ChunkedUploader::new(),
        )
    }

    /// Create a pipeline from explicit parts.
    pub fn with_parts(
        devices: DeviceSessionManager,
        recorder: Recorder,
        uploader: ChunkedUploader,
    ) -> Self {
        Self {
            devices,
            recorder,
            uploader,
        }
    }

    /// The device session manager
    pub fn devices(&self) -> &DeviceSessionManager {
        &self.devices
    }

    /// The device session manager, mutably
    pub fn devices_mut(&mut self) -> &mut DeviceSessionManager {
        &mut self.devices
    }

    /// The recorder
    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// The recorder, mutably
    pub fn recorder_mut(&mut self) -> &mut Recorder {
        &mut self.recorder
    }

    /// Acquire a device session, releasing any previous one first.
    pub async fn acquire(
        &mut self,
        constraints: CaptureConstraints,
    ) -> MediaResult<Arc<DeviceSession>> {
        Ok(self.devices.acquire(constraints).await?)
    }

    /// Release the active device session; safe when nothing is active.
    pub fn release(&mut self) {
        self.devices.release();
    }

    /// Start recording the active device session.
    pub async fn start_recording(&mut self) -> MediaResult<()> {
        let session = self
            .devices
            .active()
            .ok_or(RecorderError::NoActiveDevice)?;
        self.recorder.start(&session).await?;
        Ok(())
    }

    /// Stop recording; `None` when nothing was recording.
    pub async fn stop_recording(&mut self) -> Option<Arc<RecordedArtifact>> {
        self.recorder.stop().await
    }

    /// The most recent finalized artifact, if any.
    pub fn current_artifact(&self) -> Option<Arc<RecordedArtifact>> {
        self.recorder.current_artifact()
    }

    /// Upload the most recent artifact in chunks.
    pub async fn upload_last_recording<F>(
        &self,
        endpoint: &str,
        options: &UploadOptions,
        on_progress: F,
    ) -> MediaResult<reqwest::Response>
    where
        F: FnMut(f64, &UploadProgress),
    {
        let artifact = self
            .recorder
            .current_artifact()
            .ok_or(TransferError::NoArtifact)?;
        Ok(self
            .uploader
            .upload_with_progress(endpoint, &artifact, options, on_progress)
            .await?)
    }

    /// Save the most recent artifact to a local file.
    pub async fn save_last_recording(&self, path: impl AsRef<Path>) -> MediaResult<()> {
        let artifact = self
            .recorder
            .current_artifact()
            .ok_or(TransferError::NoArtifact)?;
        Ok(save_artifact(&artifact, path).await?)
    }
}

impl Default for CapturePipeline {
    fn default() -> Self {
        Self::new()
    }
}
