//! The recorder
//!
//! Drives one capture-to-memory operation at a time on top of an acquired
//! device session, accumulating encoded fragments in arrival order and
//! assembling them into a single immutable artifact on stop.

use crate::artifact::RecordedArtifact;
use crate::capture::session::DeviceSession;
use crate::recorder::encoder::{FfmpegEncoder, FragmentEvent, MediaEncoder};
use crate::recorder::state::{EncodingProfile, RecordingState};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::sync::mpsc::UnboundedReceiver;

/// Errors that can occur when starting a recording
#[derive(Error, Debug)]
pub enum RecorderError {
    /// No device session was provided, or it holds no live tracks
    #[error("no active device session")]
    NoActiveDevice,

    /// A recording session is already in progress
    #[error("recording already in progress")]
    AlreadyRecording,
}

/// Result type for recorder operations
pub type RecorderResult<T> = Result<T, RecorderError>;

/// Events emitted while recording
#[derive(Debug, Clone)]
pub enum RecorderEvent {
    /// Recording started
    Started,
    /// Recording stopped and the artifact was assembled
    Stopped,
    /// The encoder reported a non-fatal fault
    EncoderFault(String),
}

struct ActiveRecording {
    encoder: Box<dyn MediaEncoder>,
    events: UnboundedReceiver<FragmentEvent>,
    fragments: Vec<Vec<u8>>,
}

/// Records one session at a time into an in-memory artifact
pub struct Recorder {
    profile: EncodingProfile,
    state: RecordingState,
    active: Option<ActiveRecording>,
    current: Option<Arc<RecordedArtifact>>,
    faults: Vec<String>,
    event_tx: broadcast::Sender<RecorderEvent>,
}

impl Recorder {
    /// Create a recorder with the given encoding profile.
    pub fn new(profile: EncodingProfile) -> Self {
        let (event_tx, _) = broadcast::channel(16);
        Self {
            profile,
            state: RecordingState::Idle,
            active: None,
            current: None,
            faults: Vec::new(),
            event_tx,
        }
    }

    /// The current recorder state
    pub fn state(&self) -> RecordingState {
        self.state
    }

    /// The encoding profile recordings are made with
    pub fn profile(&self) -> &EncodingProfile {
        &self.profile
    }

    /// Subscribe to recorder events
    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.event_tx.subscribe()
    }

    /// The most recent finalized artifact, if any
    pub fn current_artifact(&self) -> Option<Arc<RecordedArtifact>> {
        self.current.clone()
    }

    /// Encoder faults reported during the current or last recording
    ///
    /// Faults are best-effort signals: they are logged and collected here but
    /// never abort a recording.
    pub fn faults(&self) -> &[String] {
        &self.faults
    }

    /// Start recording the given session with the ffmpeg encoder.
    pub async fn start(&mut self, session: &Arc<DeviceSession>) -> RecorderResult<()> {
        self.start_with(session, Box::new(FfmpegEncoder::new())).await
    }

    /// Start recording the given session with a specific encoder.
    ///
    /// Resets the fragment buffer, the fault log, and the previous artifact
    /// reference before accepting new fragments.
    pub async fn start_with(
        &mut self,
        session: &Arc<DeviceSession>,
        mut encoder: Box<dyn MediaEncoder>,
    ) -> RecorderResult<()> {
        if self.state != RecordingState::Idle {
            return Err(RecorderError::AlreadyRecording);
        }
        if session.live_track_count() == 0 {
            return Err(RecorderError::NoActiveDevice);
        }

        self.current = None;
        self.faults.clear();

        let events = encoder.begin(session.clone(), &self.profile).await;
        self.active = Some(ActiveRecording {
            encoder,
            events,
            fragments: Vec::new(),
        });
        self.state = RecordingState::Recording;
        let _ = self.event_tx.send(RecorderEvent::Started);
        tracing::info!("Recording started ({} live tracks)", session.live_track_count());
        Ok(())
    }

    /// Stop the recording and assemble the artifact.
    ///
    /// Returns `None` (with a logged warning) when nothing is recording;
    /// stopping idle is not an error, but it also produces nothing and leaves
    /// the current artifact untouched. Otherwise waits for the encoder's
    /// final fragment, concatenates everything in arrival order, and replaces
    /// the current artifact.
    pub async fn stop(&mut self) -> Option<Arc<RecordedArtifact>> {
        if self.state != RecordingState::Recording {
            tracing::warn!("Stop requested but no recording is active");
            return None;
        }
        let Some(mut active) = self.active.take() else {
            tracing::warn!("Recorder in recording state with no active session");
            self.state = RecordingState::Idle;
            return None;
        };

        self.state = RecordingState::Stopping;
        active.encoder.finalize().await;

        let mut media_type = None;
        while let Some(event) = active.events.recv().await {
            match event {
                FragmentEvent::Data(bytes) => {
                    if !bytes.is_empty() {
                        active.fragments.push(bytes);
                    }
                }
                FragmentEvent::Fault(reason) => {
                    tracing::warn!("Encoder fault: {}", reason);
                    let _ = self.event_tx.send(RecorderEvent::EncoderFault(reason.clone()));
                    self.faults.push(reason);
                }
                FragmentEvent::Finalized { media_type: reported } => {
                    media_type = Some(reported);
                    break;
                }
            }
        }
        // A closed channel without a sentinel still finalizes, with the
        // profile's declared media type.
        let media_type = media_type.unwrap_or_else(|| self.profile.media_type.clone());

        let total: usize = active.fragments.iter().map(Vec::len).sum();
        let mut data = Vec::with_capacity(total);
        for fragment in &active.fragments {
            data.extend_from_slice(fragment);
        }
        let artifact = Arc::new(RecordedArtifact::new(data, media_type));

        self.state = RecordingState::Stopped;
        let _ = self.event_tx.send(RecorderEvent::Stopped);
        tracing::info!(
            "Recording stopped: {} bytes, {}",
            artifact.len(),
            artifact.media_type()
        );

        self.current = Some(artifact.clone());
        self.state = RecordingState::Idle;
        Some(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::constraints::CaptureConstraints;
    use crate::capture::tracks::VideoTrack;
    use crate::capture::traits::{CaptureResult, FrameSource, PixelFormat, VideoFormat, VideoFrame};
    use async_trait::async_trait;
    use tokio::sync::mpsc::UnboundedSender;

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

        fn next_frame(&mut self) -> CaptureResult<VideoFrame> {
            std::thread::sleep(std::time::Duration::from_millis(2));
            Ok(VideoFrame {
                data: vec![1u8; 8],
                timestamp_ms: 0.0,
            })
        }
    }

    fn test_session() -> Arc<DeviceSession> {
        let video = VideoTrack::open("camera", || Ok(TestFrames)).unwrap();
        Arc::new(DeviceSession::new(CaptureConstraints::default(), video, None))
    }

    /// Encoder that replays a scripted event sequence
    struct ScriptedEncoder {
        on_begin: Vec<FragmentEvent>,
        on_finalize: Vec<FragmentEvent>,
        sentinel: Option<String>,
        tx: Option<UnboundedSender<FragmentEvent>>,
    }

    impl ScriptedEncoder {
        fn new(
            on_begin: Vec<FragmentEvent>,
            on_finalize: Vec<FragmentEvent>,
            sentinel: Option<&str>,
        ) -> Box<Self> {
            Box::new(Self {
                on_begin,
                on_finalize,
                sentinel: sentinel.map(str::to_string),
                tx: None,
            })
        }
    }

    #[async_trait]
    impl MediaEncoder for ScriptedEncoder {
        async fn begin(
            &mut self,
            _session: Arc<DeviceSession>,
            _profile: &EncodingProfile,
        ) -> UnboundedReceiver<FragmentEvent> {
            let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
            for event in self.on_begin.drain(..) {
                let _ = tx.send(event);
            }
            self.tx = Some(tx);
            rx
        }

        async fn finalize(&mut self) {
            let Some(tx) = self.tx.take() else { return };
            for event in self.on_finalize.drain(..) {
                let _ = tx.send(event);
            }
            if let Some(media_type) = self.sentinel.take() {
                let _ = tx.send(FragmentEvent::Finalized { media_type });
            }
        }
    }

    fn data(bytes: &[u8]) -> FragmentEvent {
        FragmentEvent::Data(bytes.to_vec())
    }

    #[tokio::test]
    async fn test_artifact_concatenates_fragments_in_arrival_order() {
        let session = test_session();
        let mut recorder = Recorder::new(EncodingProfile::default());
        let encoder = ScriptedEncoder::new(
            vec![data(b"aa"), data(b"bb")],
            vec![data(b"cc")],
            Some("video/webm"),
        );

        recorder.start_with(&session, encoder).await.unwrap();
        assert_eq!(recorder.state(), RecordingState::Recording);

        let artifact = recorder.stop().await.expect("artifact");
        assert_eq!(artifact.data(), b"aabbcc");
        assert_eq!(artifact.media_type(), "video/webm");
        assert_eq!(artifact.len(), 6);
        assert_eq!(recorder.state(), RecordingState::Idle);

        let current = recorder.current_artifact().expect("current");
        assert!(Arc::ptr_eq(&artifact, &current));
        session.stop();
    }

    #[tokio::test]
    async fn test_stop_when_idle_returns_none_and_keeps_artifact() {
        let session = test_session();
        let mut recorder = Recorder::new(EncodingProfile::default());
        assert!(recorder.stop().await.is_none());
        assert!(recorder.current_artifact().is_none());

        let encoder = ScriptedEncoder::new(vec![data(b"xy")], vec![], Some("video/webm"));
        recorder.start_with(&session, encoder).await.unwrap();
        let artifact = recorder.stop().await.expect("artifact");

        // A second stop is a warned no-op that leaves the artifact in place.
        assert!(recorder.stop().await.is_none());
        let current = recorder.current_artifact().expect("current");
        assert!(Arc::ptr_eq(&artifact, &current));
        session.stop();
    }

    #[tokio::test]
    async fn test_empty_fragments_are_skipped() {
        let session = test_session();
        let mut recorder = Recorder::new(EncodingProfile::default());
        let encoder = ScriptedEncoder::new(
            vec![data(b"a"), data(b""), data(b"b")],
            vec![],
            Some("video/webm"),
        );
        recorder.start_with(&session, encoder).await.unwrap();
        let artifact = recorder.stop().await.expect("artifact");
        assert_eq!(artifact.data(), b"ab");
        session.stop();
    }

    #[tokio::test]
    async fn test_encoder_faults_are_collected_not_fatal() {
        let session = test_session();
        let mut recorder = Recorder::new(EncodingProfile::default());
        let mut events = recorder.subscribe();
        let encoder = ScriptedEncoder::new(
            vec![
                FragmentEvent::Fault("lost a frame".to_string()),
                data(b"zz"),
            ],
            vec![FragmentEvent::Fault("flush hiccup".to_string())],
            Some("video/webm"),
        );

        recorder.start_with(&session, encoder).await.unwrap();
        let artifact = recorder.stop().await.expect("artifact");
        assert_eq!(artifact.data(), b"zz");
        assert_eq!(recorder.faults().len(), 2);

        let mut saw_fault = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, RecorderEvent::EncoderFault(_)) {
                saw_fault = true;
            }
        }
        assert!(saw_fault);
        session.stop();
    }

    #[tokio::test]
    async fn test_missing_sentinel_falls_back_to_profile_media_type() {
        let session = test_session();
        let mut recorder = Recorder::new(EncodingProfile::default());
        // Encoder dies without ever sending the sentinel; the channel just
        // closes.
        let encoder = ScriptedEncoder::new(vec![data(b"q")], vec![], None);
        recorder.start_with(&session, encoder).await.unwrap();
        let artifact = recorder.stop().await.expect("artifact");
        assert_eq!(artifact.media_type(), "video/webm");
        assert_eq!(artifact.data(), b"q");
        session.stop();
    }

    #[tokio::test]
    async fn test_start_requires_live_tracks() {
        let session = test_session();
        session.stop();
        let mut recorder = Recorder::new(EncodingProfile::default());
        let encoder = ScriptedEncoder::new(vec![], vec![], Some("video/webm"));
        let result = recorder.start_with(&session, encoder).await;
        assert!(matches!(result, Err(RecorderError::NoActiveDevice)));
        assert_eq!(recorder.state(), RecordingState::Idle);
    }

    #[tokio::test]
    async fn test_start_while_recording_is_an_error() {
        let session = test_session();
        let mut recorder = Recorder::new(EncodingProfile::default());
        let encoder = ScriptedEncoder::new(vec![], vec![], Some("video/webm"));
        recorder.start_with(&session, encoder).await.unwrap();

        let second = ScriptedEncoder::new(vec![], vec![], Some("video/webm"));
        let result = recorder.start_with(&session, second).await;
        assert!(matches!(result, Err(RecorderError::AlreadyRecording)));

        recorder.stop().await;
        session.stop();
    }

    #[tokio::test]
    async fn test_new_recording_replaces_current_artifact() {
        let session = test_session();
        let mut recorder = Recorder::new(EncodingProfile::default());

        let first = ScriptedEncoder::new(vec![data(b"one")], vec![], Some("video/webm"));
        recorder.start_with(&session, first).await.unwrap();
        let a = recorder.stop().await.expect("first artifact");

        let second = ScriptedEncoder::new(vec![data(b"two")], vec![], Some("video/webm"));
        recorder.start_with(&session, second).await.unwrap();
        // Starting resets the reference before any fragment arrives.
        assert!(recorder.current_artifact().is_none());
        let b = recorder.stop().await.expect("second artifact");

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(b.data(), b"two");
        let current = recorder.current_artifact().expect("current");
        assert!(Arc::ptr_eq(&b, &current));
        session.stop();
    }
}
