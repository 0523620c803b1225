//! Device session management
//!
//! A device session is exclusive ownership of the granted hardware tracks.
//! The manager keeps at most one session active: acquiring a new one first
//! stops every track of the previous one, so two camera locks are never held
//! at the same time.

use crate::capture::constraints::CaptureConstraints;
use crate::capture::native::NativeBackend;
use crate::capture::tracks::{AudioTrack, VideoTrack};
use crate::capture::traits::{CaptureError, CaptureResult, DeviceBackend, MediaTrack};
use std::sync::Arc;
use uuid::Uuid;

/// Exclusive handle to the granted camera/microphone tracks
///
/// The track set is fixed once granted; the session is destroyed by stopping
/// its tracks, either explicitly or by the next acquisition.
pub struct DeviceSession {
    id: Uuid,
    constraints: CaptureConstraints,
    video: VideoTrack,
    audio: Option<AudioTrack>,
}

impl DeviceSession {
    pub(crate) fn new(
        constraints: CaptureConstraints,
        video: VideoTrack,
        audio: Option<AudioTrack>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            constraints,
            video,
            audio,
        }
    }

    /// Session identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The constraint profile this session was acquired with
    pub fn constraints(&self) -> &CaptureConstraints {
        &self.constraints
    }

    /// The video track
    pub fn video(&self) -> &VideoTrack {
        &self.video
    }

    /// The audio track, absent when audio was disabled or fell back
    pub fn audio(&self) -> Option<&AudioTrack> {
        self.audio.as_ref()
    }

    /// All tracks of this session
    pub fn tracks(&self) -> Vec<&dyn MediaTrack> {
        let mut tracks: Vec<&dyn MediaTrack> = vec![&self.video];
        if let Some(audio) = &self.audio {
            tracks.push(audio);
        }
        tracks
    }

    /// Number of tracks still capturing
    pub fn live_track_count(&self) -> usize {
        self.tracks().iter().filter(|t| t.is_live()).count()
    }

    /// Whether any track is still capturing
    pub fn is_live(&self) -> bool {
        self.live_track_count() > 0
    }

    /// Stop every track and release the hardware; idempotent
    pub fn stop(&self) {
        for track in self.tracks() {
            track.stop();
        }
    }
}

/// Owns the lifetime of the active device session
///
/// One manager per process; the active session is a singleton resource and
/// the manager enforces release-before-acquire.
pub struct DeviceSessionManager {
    backend: Box<dyn DeviceBackend>,
    active: Option<Arc<DeviceSession>>,
}

impl DeviceSessionManager {
    /// Create a manager using the platform camera and microphone
    pub fn new() -> Self {
        Self::with_backend(Box::new(NativeBackend))
    }

    /// Create a manager with a custom device backend
    pub fn with_backend(backend: Box<dyn DeviceBackend>) -> Self {
        Self {
            backend,
            active: None,
        }
    }

    /// Acquire a device session for the given constraints.
    ///
    /// Any existing session is released first. When the profile asks for
    /// audio but the platform reports audio capture as structurally
    /// impossible, the acquisition falls back to video only; every other
    /// acquisition error propagates unchanged.
    pub async fn acquire(
        &mut self,
        constraints: CaptureConstraints,
    ) -> CaptureResult<Arc<DeviceSession>> {
        self.release();

        let video = self.backend.open_video(&constraints.video).await?;

        let audio = if constraints.audio {
            match self.backend.open_audio().await {
                Ok(track) => Some(track),
                Err(CaptureError::AudioUnsupported(reason)) => {
                    tracing::warn!("Audio capture unavailable, retrying video-only: {}", reason);
                    None
                }
                Err(e) => {
                    video.stop();
                    return Err(e);
                }
            }
        } else {
            None
        };

        let session = Arc::new(DeviceSession::new(constraints, video, audio));
        tracing::info!(
            "Device session {} acquired ({} tracks)",
            session.id(),
            session.live_track_count()
        );
        self.active = Some(session.clone());
        Ok(session)
    }

    /// Release the active session, stopping all its tracks; safe to call
    /// when nothing is active.
    pub fn release(&mut self) {
        if let Some(session) = self.active.take() {
            session.stop();
            tracing::info!("Device session {} released", session.id());
        }
    }

    /// The active session, if any
    pub fn active(&self) -> Option<Arc<DeviceSession>> {
        self.active.clone()
    }
}

impl Default for DeviceSessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::traits::{
        AudioFormat, FrameSource, PixelFormat, SampleSource, VideoFormat, VideoFrame,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct TestFrames;

    impl FrameSource for TestFrames {
        fn format(&self) -> VideoFormat {
            VideoFormat {
                width: 4,
                height: 4,
                frame_rate: 5,
                pixel_format: PixelFormat::Yuyv422,
            }
        }

        fn next_frame(&mut self) -> crate::capture::traits::CaptureResult<VideoFrame> {
            std::thread::sleep(Duration::from_millis(2));
            Ok(VideoFrame {
                data: vec![0u8; 8],
                timestamp_ms: 0.0,
            })
        }
    }

    struct TestSamples;

    impl SampleSource for TestSamples {
        fn format(&self) -> AudioFormat {
            AudioFormat {
                sample_rate: 48_000,
                channels: 1,
            }
        }

        fn next_chunk(&mut self) -> crate::capture::traits::CaptureResult<Vec<f32>> {
            std::thread::sleep(Duration::from_millis(2));
            Ok(vec![0.0; 32])
        }
    }

    /// What the fake backend should do when audio is requested
    enum AudioMode {
        Available,
        Unsupported,
        Broken,
    }

    struct FakeBackend {
        audio_mode: AudioMode,
        audio_opens: Arc<AtomicUsize>,
    }

    impl FakeBackend {
        fn new(audio_mode: AudioMode) -> Self {
            Self {
                audio_mode,
                audio_opens: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl DeviceBackend for FakeBackend {
        async fn open_video(
            &self,
            _constraints: &crate::capture::constraints::VideoConstraints,
        ) -> CaptureResult<VideoTrack> {
            VideoTrack::open("camera", || Ok(TestFrames))
        }

        async fn open_audio(&self) -> CaptureResult<AudioTrack> {
            self.audio_opens.fetch_add(1, Ordering::SeqCst);
            match self.audio_mode {
                AudioMode::Available => AudioTrack::open("microphone", || Ok(TestSamples)),
                AudioMode::Unsupported => Err(CaptureError::AudioUnsupported(
                    "no audio input device".into(),
                )),
                AudioMode::Broken => {
                    Err(CaptureError::DeviceUnavailable("microphone is on fire".into()))
                }
            }
        }
    }

    fn manager(audio_mode: AudioMode) -> DeviceSessionManager {
        DeviceSessionManager::with_backend(Box::new(FakeBackend::new(audio_mode)))
    }

    #[tokio::test]
    async fn test_acquire_grants_video_and_audio_tracks() {
        let mut manager = manager(AudioMode::Available);
        let session = manager.acquire(CaptureConstraints::default()).await.unwrap();
        assert_eq!(session.live_track_count(), 2);
        assert!(session.audio().is_some());
        manager.release();
        assert!(!session.is_live());
    }

    #[tokio::test]
    async fn test_acquire_twice_stops_first_session() {
        let mut manager = manager(AudioMode::Available);
        let first = manager.acquire(CaptureConstraints::default()).await.unwrap();
        let second = manager.acquire(CaptureConstraints::default()).await.unwrap();

        assert!(!first.is_live());
        assert!(second.is_live());
        assert_ne!(first.id(), second.id());
        let active = manager.active().unwrap();
        assert_eq!(active.id(), second.id());
    }

    #[tokio::test]
    async fn test_audio_unsupported_falls_back_to_video_only() {
        let mut manager = manager(AudioMode::Unsupported);
        let session = manager.acquire(CaptureConstraints::default()).await.unwrap();
        assert!(session.audio().is_none());
        assert_eq!(session.live_track_count(), 1);
        assert!(session.constraints().audio);
    }

    #[tokio::test]
    async fn test_other_audio_errors_propagate() {
        let mut manager = manager(AudioMode::Broken);
        let result = manager.acquire(CaptureConstraints::default()).await;
        assert!(matches!(result, Err(CaptureError::DeviceUnavailable(_))));
        assert!(manager.active().is_none());
    }

    #[tokio::test]
    async fn test_audio_not_requested_not_opened() {
        let backend = FakeBackend::new(AudioMode::Available);
        let opens = backend.audio_opens.clone();
        let mut manager = DeviceSessionManager::with_backend(Box::new(backend));
        let session = manager.acquire(CaptureConstraints::video_only()).await.unwrap();
        assert!(session.audio().is_none());
        assert_eq!(opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let mut manager = manager(AudioMode::Available);
        manager.release();
        let session = manager.acquire(CaptureConstraints::default()).await.unwrap();
        manager.release();
        manager.release();
        assert!(!session.is_live());
        assert!(manager.active().is_none());
    }
}
