//! Device acquisition and capture tracks
//!
//! This module owns the hardware side of the pipeline: constraint profiles,
//! the device session (camera + optional microphone), and the worker-thread
//! tracks that pump raw frames and samples to whoever is recording.

pub mod constraints;
pub mod native;
pub mod session;
pub mod tracks;
pub mod traits;

pub use constraints::{CaptureConstraints, Facing, VideoConstraints};
pub use native::{list_cameras, list_microphones, NativeBackend};
pub use session::{DeviceSession, DeviceSessionManager};
pub use tracks::{AudioTrack, VideoTrack};
pub use traits::{
    AudioFormat, CameraInfo, CaptureError, CaptureResult, DeviceBackend, FrameSource, MediaTrack,
    MicrophoneInfo, PixelFormat, SampleSource, TrackKind, VideoFormat, VideoFrame,
};
