//! Native device backend
//!
//! Opens the camera through nokhwa and the microphone through cpal. Device
//! handles are created inside the track worker threads, so handles that are
//! not `Send` (the cpal stream in particular) never cross threads.

use crate::capture::constraints::VideoConstraints;
use crate::capture::tracks::{AudioTrack, VideoTrack};
use crate::capture::traits::{
    AudioFormat, CameraInfo, CaptureError, CaptureResult, DeviceBackend, FrameSource,
    MicrophoneInfo, PixelFormat, SampleSource, VideoFormat, VideoFrame,
};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

/// Get list of available cameras
pub fn list_cameras() -> Vec<CameraInfo> {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras
            .into_iter()
            .map(|info| {
                let id = match info.index() {
                    CameraIndex::Index(i) => i.to_string(),
                    CameraIndex::String(s) => s.to_string(),
                };
                CameraInfo {
                    id,
                    name: info.human_name().to_string(),
                }
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate cameras: {:?}", e);
            Vec::new()
        }
    }
}

/// Get list of available microphones
pub fn list_microphones() -> Vec<MicrophoneInfo> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());
    match host.input_devices() {
        Ok(devices) => devices
            .filter_map(|device| device.name().ok())
            .map(|name| MicrophoneInfo {
                is_default: Some(&name) == default_name.as_ref(),
                name,
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate microphones: {:?}", e);
            Vec::new()
        }
    }
}

/// Frame source backed by a nokhwa camera
struct NokhwaFrameSource {
    camera: Camera,
    format: VideoFormat,
    opened: Instant,
}

impl NokhwaFrameSource {
    fn open(constraints: &VideoConstraints) -> CaptureResult<Self> {
        let requested = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                Resolution::new(constraints.max_width, constraints.max_height),
                FrameFormat::YUYV,
                constraints.max_frame_rate,
            ),
        ));

        let mut camera = Camera::new(CameraIndex::Index(0), requested)
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;
        camera
            .open_stream()
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;

        let granted = camera.camera_format();
        let pixel_format = match granted.format() {
            FrameFormat::YUYV => PixelFormat::Yuyv422,
            FrameFormat::NV12 => PixelFormat::Nv12,
            FrameFormat::RAWRGB => PixelFormat::Rgb24,
            FrameFormat::MJPEG => PixelFormat::Mjpeg,
            other => {
                tracing::warn!("Unexpected camera format {:?}, treating as YUYV", other);
                PixelFormat::Yuyv422
            }
        };
        let format = VideoFormat {
            width: granted.resolution().width(),
            height: granted.resolution().height(),
            frame_rate: granted.frame_rate(),
            pixel_format,
        };

        tracing::info!(
            "Camera opened: {}x{} @ {}fps, pixel format {} (requested {}x{} @ {}fps)",
            format.width,
            format.height,
            format.frame_rate,
            format.pixel_format.ffmpeg_name(),
            constraints.max_width,
            constraints.max_height,
            constraints.max_frame_rate,
        );

        Ok(Self {
            camera,
            format,
            opened: Instant::now(),
        })
    }
}

impl FrameSource for NokhwaFrameSource {
    fn format(&self) -> VideoFormat {
        self.format.clone()
    }

    fn next_frame(&mut self) -> CaptureResult<VideoFrame> {
        // Blocks until the camera delivers the next frame; the camera
        // controls the timing.
        let frame = self
            .camera
            .frame()
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;
        Ok(VideoFrame {
            data: frame.buffer().to_vec(),
            timestamp_ms: self.opened.elapsed().as_secs_f64() * 1000.0,
        })
    }
}

impl Drop for NokhwaFrameSource {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            tracing::warn!("Error stopping camera stream: {:?}", e);
        }
    }
}

/// How long to wait for the microphone callback before yielding an empty
/// chunk so the track can re-check its stop flag.
const SAMPLE_POLL: Duration = Duration::from_millis(100);

/// Sample source backed by a cpal input stream
///
/// The cpal callback pushes batches into an internal channel;
/// [`SampleSource::next_chunk`] pulls from it.
struct CpalSampleSource {
    format: AudioFormat,
    batches: Receiver<Vec<f32>>,
    // Keeps the capture alive; dropping the stream ends it.
    _stream: cpal::Stream,
}

impl CpalSampleSource {
    fn open() -> CaptureResult<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| CaptureError::AudioUnsupported("no audio input device".into()))?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        let config = device
            .default_input_config()
            .map_err(|e| CaptureError::AudioUnsupported(e.to_string()))?;
        let sample_format = config.sample_format();
        let stream_config: cpal::StreamConfig = config.into();

        let (tx, batches) = std::sync::mpsc::channel::<Vec<f32>>();
        let err_fn = |err| tracing::warn!("Microphone stream error: {}", err);

        let stream = match sample_format {
            cpal::SampleFormat::F32 => device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let _ = tx.send(data.to_vec());
                },
                err_fn,
                None,
            ),
            cpal::SampleFormat::I16 => device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let samples = data
                        .iter()
                        .map(|&s| f32::from(s) / f32::from(i16::MAX))
                        .collect();
                    let _ = tx.send(samples);
                },
                err_fn,
                None,
            ),
            cpal::SampleFormat::U16 => device.build_input_stream(
                &stream_config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    let samples = data
                        .iter()
                        .map(|&s| (f32::from(s) - 32_768.0) / 32_768.0)
                        .collect();
                    let _ = tx.send(samples);
                },
                err_fn,
                None,
            ),
            _ => {
                return Err(CaptureError::AudioUnsupported(format!(
                    "unsupported sample format: {:?}",
                    sample_format
                )))
            }
        }
        .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;

        stream
            .play()
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;

        let format = AudioFormat {
            sample_rate: stream_config.sample_rate.0,
            channels: stream_config.channels,
        };
        tracing::info!(
            "Microphone opened: {} ({}Hz, {}ch)",
            device_name,
            format.sample_rate,
            format.channels
        );

        Ok(Self {
            format,
            batches,
            _stream: stream,
        })
    }
}

impl SampleSource for CpalSampleSource {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn next_chunk(&mut self) -> CaptureResult<Vec<f32>> {
        match self.batches.recv_timeout(SAMPLE_POLL) {
            Ok(samples) => Ok(samples),
            Err(RecvTimeoutError::Timeout) => Ok(Vec::new()),
            Err(RecvTimeoutError::Disconnected) => Err(CaptureError::DeviceUnavailable(
                "microphone stream closed".into(),
            )),
        }
    }
}

/// Device backend using the platform's real camera and microphone
pub struct NativeBackend;

#[async_trait]
impl DeviceBackend for NativeBackend {
    async fn open_video(&self, constraints: &VideoConstraints) -> CaptureResult<VideoTrack> {
        let constraints = constraints.clone();
        tokio::task::spawn_blocking(move || {
            VideoTrack::open("camera", move || NokhwaFrameSource::open(&constraints))
        })
        .await
        .map_err(|e| CaptureError::DeviceUnavailable(format!("camera open task failed: {e}")))?
    }

    async fn open_audio(&self) -> CaptureResult<AudioTrack> {
        tokio::task::spawn_blocking(|| AudioTrack::open("microphone", CpalSampleSource::open))
            .await
            .map_err(|e| {
                CaptureError::AudioUnsupported(format!("microphone open task failed: {e}"))
            })?
    }
}
