//! studycam - in-memory webcam capture and chunked upload for timed studies.
//!
//! This crate covers the media pipeline of an online study: acquiring the
//! camera (and, when possible, the microphone), recording one segment into an
//! immutable in-memory artifact, and shipping that artifact to a collection
//! endpoint in ordered chunks or saving it locally. Trial sequencing, UI, and
//! choice persistence are the embedding application's concern; it drives this
//! pipeline through [`CapturePipeline`] or the individual components.
//!
//! Capture and upload are best-effort by design: device and encoder faults
//! are logged and surfaced as inspectable values rather than panics, so a
//! timed study is never blocked by a media subsystem failure.

pub mod artifact;
pub mod capture;
pub mod pipeline;
pub mod recorder;
pub mod transfer;
pub mod utils;

pub use artifact::RecordedArtifact;
pub use capture::{
    CaptureConstraints, CaptureError, DeviceSession, DeviceSessionManager, Facing,
    VideoConstraints,
};
pub use pipeline::CapturePipeline;
pub use recorder::{
    EncodingProfile, FfmpegEncoder, Recorder, RecorderError, RecorderEvent, RecordingState,
};
pub use transfer::{ChunkedUploader, TransferError, UploadOptions, UploadProgress};
pub use utils::error::{MediaError, MediaResult};
pub use utils::filename::artifact_basename;
