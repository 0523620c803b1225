//! Recording state management
//!
//! Defines the recording state machine and the encoding profile.

use serde::{Deserialize, Serialize};

/// Current state of the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// No recording in progress
    Idle,
    /// Currently recording
    Recording,
    /// Stop requested, waiting for the encoder's final fragments
    Stopping,
    /// Recording finalized into an artifact
    Stopped,
}

impl Default for RecordingState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Declared encoding profile for a recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodingProfile {
    /// Media type of the finished artifact
    pub media_type: String,

    /// Target video bitrate in bits per second
    pub video_bitrate: u32,

    /// Target audio bitrate in bits per second
    pub audio_bitrate: u32,
}

impl Default for EncodingProfile {
    fn default() -> Self {
        // 150 kbps is deliberately low quality: study uploads happen on the
        // participant's connection, not ours.
        Self {
            media_type: "video/webm".to_string(),
            video_bitrate: 150_000,
            audio_bitrate: 64_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile_targets_webm() {
        let profile = EncodingProfile::default();
        assert_eq!(profile.media_type, "video/webm");
        assert_eq!(profile.video_bitrate, 150_000);
    }

    #[test]
    fn test_state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&RecordingState::Stopping).unwrap(),
            "\"stopping\""
        );
        assert_eq!(RecordingState::default(), RecordingState::Idle);
    }
}
