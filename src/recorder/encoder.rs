//! Media encoders
//!
//! An encoder turns a device session's raw tracks into encoded media
//! fragments, delivered over a channel as they become available. The channel
//! always terminates with a [`FragmentEvent::Finalized`] sentinel, so the
//! recorder's stop can wait on it without a timeout. Encoder failures travel
//! in-band as [`FragmentEvent::Fault`] and never crash the pipeline.

use crate::capture::session::DeviceSession;
use crate::capture::traits::VideoFrame;
use crate::recorder::state::EncodingProfile;
use async_trait::async_trait;
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Events delivered by an encoder to the recorder
#[derive(Debug, Clone)]
pub enum FragmentEvent {
    /// One encoded media fragment, in arrival order
    Data(Vec<u8>),

    /// A non-fatal encoder failure; capture continues best-effort
    Fault(String),

    /// The last fragment has been delivered; no events follow
    Finalized {
        /// Media type of the assembled fragments
        media_type: String,
    },
}

/// Drives one encode operation for a recording session
///
/// Implementations must deliver events on the returned channel and terminate
/// it with exactly one `Finalized` sentinel after `finalize`, including when
/// starting the encode failed, so a recorder waiting on the sentinel can
/// never hang.
#[async_trait]
pub trait MediaEncoder: Send {
    /// Start encoding the session's tracks; returns the fragment channel.
    async fn begin(
        &mut self,
        session: Arc<DeviceSession>,
        profile: &EncodingProfile,
    ) -> UnboundedReceiver<FragmentEvent>;

    /// Request finalization; remaining fragments and the sentinel are
    /// delivered on the channel returned by `begin`.
    async fn finalize(&mut self);
}

/// Frames buffered between the capture track and the encoder stdin writer
const FRAME_QUEUE: usize = 8;

/// Sample batches buffered between the microphone track and the WAV writer
const SAMPLE_QUEUE: usize = 32;

/// Read size for streaming the finished container; one read = one fragment
const FRAGMENT_SIZE: usize = 64 * 1024;

const VIDEO_FILE: &str = "video.webm";
const AUDIO_FILE: &str = "audio.wav";

/// FFmpeg-backed encoder
///
/// While recording, raw camera frames are piped into an ffmpeg child process
/// encoding VP8/WebM to a scratch file, and microphone samples (when present)
/// are written to a WAV sidecar. Finalizing runs a second ffmpeg pass that
/// muxes both and streams the finished container to stdout; each stdout read
/// becomes one fragment.
pub struct FfmpegEncoder {
    media_type: String,
    event_tx: Option<UnboundedSender<FragmentEvent>>,
    stage: Option<EncodeStage>,
}

impl FfmpegEncoder {
    /// Create an idle encoder.
    pub fn new() -> Self {
        Self {
            media_type: EncodingProfile::default().media_type,
            event_tx: None,
            stage: None,
        }
    }

    /// Check whether ffmpeg can be spawned at all.
    pub fn is_available() -> bool {
        Command::new("ffmpeg").arg("-version").output().is_ok()
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaEncoder for FfmpegEncoder {
    async fn begin(
        &mut self,
        session: Arc<DeviceSession>,
        profile: &EncodingProfile,
    ) -> UnboundedReceiver<FragmentEvent> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        self.media_type = profile.media_type.clone();

        match EncodeStage::start(session, profile, &tx) {
            Ok(stage) => self.stage = Some(stage),
            Err(e) => {
                tracing::warn!("Failed to start encoder: {}", e);
                let _ = tx.send(FragmentEvent::Fault(format!("encoder start failed: {}", e)));
            }
        }

        self.event_tx = Some(tx);
        rx
    }

    async fn finalize(&mut self) {
        let Some(tx) = self.event_tx.take() else {
            return;
        };
        let media_type = self.media_type.clone();
        let stage = self.stage.take();

        let done = tokio::task::spawn_blocking(move || match stage {
            Some(stage) => stage.finish(&tx, &media_type),
            None => {
                let _ = tx.send(FragmentEvent::Finalized { media_type });
            }
        })
        .await;

        if let Err(e) = done {
            tracing::warn!("Encoder finalize task failed: {}", e);
        }
    }
}

/// The running half of an [`FfmpegEncoder`]
struct EncodeStage {
    temp: tempfile::TempDir,
    session: Arc<DeviceSession>,
    encode_child: Option<Child>,
    video_writer: Option<JoinHandle<()>>,
    audio_writer: Option<JoinHandle<()>>,
    has_audio: bool,
    audio_bitrate: u32,
}

impl EncodeStage {
    fn start(
        session: Arc<DeviceSession>,
        profile: &EncodingProfile,
        tx: &UnboundedSender<FragmentEvent>,
    ) -> std::io::Result<Self> {
        let temp = tempfile::tempdir()?;
        let video_path = temp.path().join(VIDEO_FILE);

        let format = session.video().format().clone();
        let size = format!("{}x{}", format.width, format.height);
        let rate = format.frame_rate.to_string();
        let bitrate = profile.video_bitrate.to_string();

        // Raw frames in on stdin, VP8/WebM out to the scratch file.
        let mut child = Command::new("ffmpeg")
            .args([
                "-nostats",
                "-loglevel",
                "error",
                "-y",
                "-f",
                "rawvideo",
                "-pixel_format",
                format.pixel_format.ffmpeg_name(),
                "-video_size",
                &size,
                "-framerate",
                &rate,
                "-i",
                "-",
                "-c:v",
                "libvpx",
                "-b:v",
                &bitrate,
                "-deadline",
                "realtime",
                "-cpu-used",
                "8",
                "-pix_fmt",
                "yuv420p",
            ])
            .arg(&video_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdin = child.stdin.take().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "ffmpeg stdin unavailable")
        })?;

        let (frame_tx, frame_rx) = std::sync::mpsc::sync_channel::<VideoFrame>(FRAME_QUEUE);
        session.video().attach_sink(frame_tx);
        let video_writer = std::thread::spawn(move || {
            let mut stdin = stdin;
            while let Ok(frame) = frame_rx.recv() {
                if let Err(e) = stdin.write_all(&frame.data) {
                    tracing::debug!("Encoder stdin closed early: {}", e);
                    break;
                }
            }
            // Dropping stdin is the EOF that lets ffmpeg finish the file.
        });

        tracing::info!(
            "Encoder started: {} @ {}fps, {}bps video",
            size,
            rate,
            bitrate
        );

        let mut has_audio = false;
        let mut audio_writer = None;
        if let Some(audio) = session.audio() {
            match start_audio_sidecar(audio, &temp.path().join(AUDIO_FILE)) {
                Ok(handle) => {
                    has_audio = true;
                    audio_writer = Some(handle);
                }
                Err(e) => {
                    tracing::warn!("Audio sidecar unavailable, recording video only: {}", e);
                    let _ = tx.send(FragmentEvent::Fault(format!("audio sidecar failed: {}", e)));
                }
            }
        }

        Ok(Self {
            temp,
            session,
            encode_child: Some(child),
            video_writer: Some(video_writer),
            audio_writer,
            has_audio,
            audio_bitrate: profile.audio_bitrate,
        })
    }

    /// Flush the encode, mux the outputs, and stream the finished container
    /// as fragments, always ending with the `Finalized` sentinel.
    fn finish(mut self, tx: &UnboundedSender<FragmentEvent>, media_type: &str) {
        // Detaching the sinks drops the senders; both writer threads then see
        // end-of-input and run down on their own.
        self.session.video().detach_sink();
        if let Some(audio) = self.session.audio() {
            audio.detach_sink();
        }
        if let Some(handle) = self.video_writer.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.audio_writer.take() {
            let _ = handle.join();
        }

        if let Some(child) = self.encode_child.take() {
            match child.wait_with_output() {
                Ok(output) if !output.status.success() => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    tracing::warn!(
                        "ffmpeg encode exited with {}: {}",
                        output.status,
                        stderr.trim()
                    );
                    let _ = tx.send(FragmentEvent::Fault(format!(
                        "encode failed with {}",
                        output.status
                    )));
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Failed to wait for ffmpeg encode: {}", e);
                    let _ = tx.send(FragmentEvent::Fault(format!("encode wait failed: {}", e)));
                }
            }
        }

        if let Err(e) = self.stream_mux(tx) {
            tracing::warn!("ffmpeg mux failed: {}", e);
            let _ = tx.send(FragmentEvent::Fault(format!("mux failed: {}", e)));
        }

        let _ = tx.send(FragmentEvent::Finalized {
            media_type: media_type.to_string(),
        });
    }

    fn stream_mux(&self, tx: &UnboundedSender<FragmentEvent>) -> std::io::Result<()> {
        let video_path = self.temp.path().join(VIDEO_FILE);
        let audio_bitrate = self.audio_bitrate.to_string();

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-nostats", "-loglevel", "error", "-y"]);
        cmd.arg("-i").arg(&video_path);
        if self.has_audio {
            cmd.arg("-i").arg(self.temp.path().join(AUDIO_FILE));
        }
        cmd.args(["-c:v", "copy"]);
        if self.has_audio {
            cmd.args(["-c:a", "libopus", "-b:a", &audio_bitrate]);
        }
        cmd.args(["-f", "webm", "pipe:1"]);

        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let mut stdout = child.stdout.take().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "ffmpeg stdout unavailable")
        })?;

        // Drain stderr on the side so a chatty ffmpeg cannot stall stdout.
        let stderr = child.stderr.take();
        let stderr_reader = std::thread::spawn(move || {
            let mut text = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut text);
            }
            text
        });

        let mut buffer = [0u8; FRAGMENT_SIZE];
        let mut streamed = 0usize;
        loop {
            let n = stdout.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            streamed += n;
            let _ = tx.send(FragmentEvent::Data(buffer[..n].to_vec()));
        }

        let status = child.wait()?;
        let stderr_text = stderr_reader.join().unwrap_or_default();
        if !status.success() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("ffmpeg mux exited with {}: {}", status, stderr_text.trim()),
            ));
        }

        tracing::info!("Encoder finalized: {} bytes streamed", streamed);
        Ok(())
    }
}

/// Start the WAV sidecar writer for the microphone track.
fn start_audio_sidecar(
    audio: &crate::capture::tracks::AudioTrack,
    path: &Path,
) -> std::io::Result<JoinHandle<()>> {
    let format = audio.format();
    let spec = hound::WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let writer = hound::WavWriter::create(path, spec)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    let (sample_tx, sample_rx) = std::sync::mpsc::sync_channel::<Vec<f32>>(SAMPLE_QUEUE);
    audio.attach_sink(sample_tx);

    Ok(std::thread::spawn(move || {
        let mut writer = writer;
        while let Ok(samples) = sample_rx.recv() {
            for sample in samples {
                let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
                if writer.write_sample(value).is_err() {
                    return;
                }
            }
        }
        if let Err(e) = writer.finalize() {
            tracing::warn!("Failed to finalize WAV sidecar: {}", e);
        }
    }))
}
