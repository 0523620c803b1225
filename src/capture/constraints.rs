//! Capture constraint profiles
//!
//! A constraint profile describes what to ask the platform for when acquiring
//! a device session: bounded resolution and frame rate (to keep upload
//! bandwidth predictable) and whether to capture audio at all.

use serde::{Deserialize, Serialize};

/// Which way the camera should face, where the platform distinguishes.
///
/// Desktop webcams ignore this; it is recorded in the profile so mobile
/// backends can honor it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// Front-facing camera (toward the participant)
    User,
    /// Rear-facing camera
    Environment,
}

/// Video acquisition constraints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConstraints {
    /// Preferred capture width in pixels
    pub ideal_width: u32,

    /// Upper bound on capture width
    pub max_width: u32,

    /// Preferred capture height in pixels
    pub ideal_height: u32,

    /// Upper bound on capture height
    pub max_height: u32,

    /// Preferred frame rate
    pub ideal_frame_rate: u32,

    /// Upper bound on frame rate
    pub max_frame_rate: u32,

    /// Camera facing hint
    pub facing: Facing,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        // Low resolution and frame rate on purpose: study recordings are
        // uploaded over whatever connection the participant happens to have.
        Self {
            ideal_width: 640,
            max_width: 640,
            ideal_height: 480,
            max_height: 480,
            ideal_frame_rate: 10,
            max_frame_rate: 15,
            facing: Facing::User,
        }
    }
}

/// Full constraint profile for acquiring a device session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConstraints {
    /// Video constraints (always required)
    pub video: VideoConstraints,

    /// Whether to also capture microphone audio
    pub audio: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            video: VideoConstraints::default(),
            audio: true,
        }
    }
}

impl CaptureConstraints {
    /// The narrower fallback profile: same video constraints, no audio.
    pub fn video_only() -> Self {
        Self {
            video: VideoConstraints::default(),
            audio: false,
        }
    }

    /// This profile with audio capture disabled.
    pub fn without_audio(mut self) -> Self {
        self.audio = false;
        self
    }
}
