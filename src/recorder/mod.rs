//! Recording system module
//!
//! This module implements the capture-to-memory half of the pipeline:
//! - MediaEncoder trait and the ffmpeg-backed implementation
//! - Recorder state machine assembling fragments into one artifact

pub mod encoder;
pub mod recorder;
pub mod state;

pub use encoder::{FfmpegEncoder, FragmentEvent, MediaEncoder};
pub use recorder::{Recorder, RecorderError, RecorderEvent, RecorderResult};
pub use state::{EncodingProfile, RecordingState};
