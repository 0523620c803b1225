//! Capture trait definitions
//!
//! Platform-agnostic traits for device acquisition and capture tracks.

use crate::capture::constraints::VideoConstraints;
use crate::capture::tracks::{AudioTrack, VideoTrack};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while acquiring a device session
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Permission denied, no matching device, or the device could not be
    /// opened. Fatal to the acquisition attempt.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Audio capture is structurally impossible on this device class (no
    /// input device at all, or no usable input format). Triggers the
    /// video-only fallback instead of failing the acquisition.
    #[error("audio capture unsupported: {0}")]
    AudioUnsupported(String),
}

/// Result type for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Kind of a capture track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Video => write!(f, "video"),
            TrackKind::Audio => write!(f, "audio"),
        }
    }
}

/// Pixel layout of raw camera frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Yuyv422,
    Nv12,
    Rgb24,
    Mjpeg,
}

impl PixelFormat {
    /// The matching ffmpeg `-pixel_format` name.
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            PixelFormat::Yuyv422 => "yuyv422",
            PixelFormat::Nv12 => "nv12",
            PixelFormat::Rgb24 => "rgb24",
            PixelFormat::Mjpeg => "mjpeg",
        }
    }
}

/// Negotiated video format of an open camera
///
/// This is what the device actually granted, which may differ from the
/// requested constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFormat {
    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,

    /// Frames per second
    pub frame_rate: u32,

    /// Raw frame pixel layout
    pub pixel_format: PixelFormat,
}

/// Negotiated audio format of an open microphone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Samples per second
    pub sample_rate: u32,

    /// Interleaved channel count
    pub channels: u16,
}

/// One raw frame delivered by a video source
#[derive(Debug)]
pub struct VideoFrame {
    /// Raw pixel data in the track's pixel format
    pub data: Vec<u8>,

    /// Capture timestamp in milliseconds since the source opened
    pub timestamp_ms: f64,
}

/// Blocking producer of raw video frames
///
/// Implementations own the device handle and are created inside the track's
/// worker thread, so they never cross thread boundaries. `next_frame` must
/// return within a bounded time (a frame interval or a short timeout) so the
/// track can observe a stop request.
pub trait FrameSource: 'static {
    /// The negotiated format, fixed for the lifetime of the source
    fn format(&self) -> VideoFormat;

    /// Block until the next frame is available
    fn next_frame(&mut self) -> CaptureResult<VideoFrame>;
}

/// Blocking producer of interleaved f32 audio samples
///
/// Same threading contract as [`FrameSource`]. An empty chunk is a valid
/// "nothing captured yet" answer and lets the track re-check its stop flag.
pub trait SampleSource: 'static {
    /// The negotiated format, fixed for the lifetime of the source
    fn format(&self) -> AudioFormat;

    /// Block until the next batch of samples is available
    fn next_chunk(&mut self) -> CaptureResult<Vec<f32>>;
}

/// A live capture track
///
/// Tracks are fixed once granted: they can be stopped, but never
/// reconfigured.
pub trait MediaTrack: Send + Sync {
    /// Track kind
    fn kind(&self) -> TrackKind;

    /// Human-readable label (e.g. "camera", "microphone")
    fn label(&self) -> &str;

    /// Whether the track is still capturing
    fn is_live(&self) -> bool;

    /// Stop the track and release its hardware; idempotent
    fn stop(&self);
}

/// Opens hardware tracks for a constraint profile
///
/// The production implementation is [`crate::capture::NativeBackend`]; tests
/// substitute fakes through the same seam.
#[async_trait]
pub trait DeviceBackend: Send + Sync {
    /// Open the camera for the given constraints
    async fn open_video(&self, constraints: &VideoConstraints) -> CaptureResult<VideoTrack>;

    /// Open the default microphone
    ///
    /// Returns [`CaptureError::AudioUnsupported`] when audio capture is
    /// structurally impossible, which the session manager treats as "fall
    /// back to video only" rather than a failed acquisition.
    async fn open_audio(&self) -> CaptureResult<AudioTrack>;
}

/// Information about a camera/webcam
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,
}

/// Information about a microphone
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MicrophoneInfo {
    /// Device name
    pub name: String,

    /// Whether this is the default input device
    pub is_default: bool,
}
