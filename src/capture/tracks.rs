//! Capture tracks
//!
//! A track owns its device handle on a dedicated worker thread and forwards
//! captured data to an attachable sink. Stopping the track is what releases
//! the hardware.

use crate::capture::traits::{
    AudioFormat, CaptureError, CaptureResult, FrameSource, MediaTrack, SampleSource, TrackKind,
    VideoFormat, VideoFrame,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Bounded sink for raw frames; the pump drops frames when the consumer is
/// behind rather than stalling capture.
pub(crate) type FrameSink = SyncSender<VideoFrame>;

/// Bounded sink for sample batches; same drop-when-full policy.
pub(crate) type SampleSink = SyncSender<Vec<f32>>;

/// Backoff after a source error so a dead device cannot spin the worker.
const SOURCE_ERROR_BACKOFF: Duration = Duration::from_millis(50);

struct TrackShared<T> {
    sink: Mutex<Option<SyncSender<T>>>,
    stopped: AtomicBool,
}

impl<T> TrackShared<T> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sink: Mutex::new(None),
            stopped: AtomicBool::new(false),
        })
    }

    fn forward(&self, item: T) {
        if let Some(tx) = self.sink.lock().as_ref() {
            let _ = tx.try_send(item);
        }
    }
}

/// A live camera track
///
/// Created by a [`crate::capture::DeviceBackend`]; the device is opened
/// inside the worker thread so handles that are not `Send` never have to
/// cross threads.
pub struct VideoTrack {
    label: String,
    format: VideoFormat,
    shared: Arc<TrackShared<VideoFrame>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl VideoTrack {
    /// Open a video track, running `open` on the new worker thread.
    ///
    /// Blocks until the source reports its negotiated format or fails.
    pub(crate) fn open<S, F>(label: impl Into<String>, open: F) -> CaptureResult<Self>
    where
        S: FrameSource,
        F: FnOnce() -> CaptureResult<S> + Send + 'static,
    {
        let label = label.into();
        let shared = TrackShared::new();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        let worker_shared = shared.clone();
        let worker_label = label.clone();
        let handle = std::thread::spawn(move || {
            let mut source = match open() {
                Ok(source) => source,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(source.format()));

            while !worker_shared.stopped.load(Ordering::SeqCst) {
                match source.next_frame() {
                    Ok(frame) => {
                        if frame.data.is_empty() {
                            continue;
                        }
                        worker_shared.forward(frame);
                    }
                    Err(e) => {
                        tracing::debug!("{} frame error: {}", worker_label, e);
                        std::thread::sleep(SOURCE_ERROR_BACKOFF);
                    }
                }
            }
            tracing::debug!("{} track worker stopped", worker_label);
        });

        let format = ready_rx.recv().map_err(|_| {
            CaptureError::DeviceUnavailable("capture worker exited before reporting a format".into())
        })??;

        Ok(Self {
            label,
            format,
            shared,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// The format the device actually granted
    pub fn format(&self) -> &VideoFormat {
        &self.format
    }

    /// Route captured frames into `sink` (one consumer at a time).
    pub(crate) fn attach_sink(&self, sink: FrameSink) {
        *self.shared.sink.lock() = Some(sink);
    }

    /// Detach the current sink; the held sender is dropped, which is how a
    /// consumer observes end-of-input.
    pub(crate) fn detach_sink(&self) {
        *self.shared.sink.lock() = None;
    }
}

impl MediaTrack for VideoTrack {
    fn kind(&self) -> TrackKind {
        TrackKind::Video
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn is_live(&self) -> bool {
        !self.shared.stopped.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        if self.shared.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.detach_sink();
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
        tracing::debug!("{} track stopped", self.label);
    }
}

impl Drop for VideoTrack {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A live microphone track
pub struct AudioTrack {
    label: String,
    format: AudioFormat,
    shared: Arc<TrackShared<Vec<f32>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AudioTrack {
    /// Open an audio track, running `open` on the new worker thread.
    pub(crate) fn open<S, F>(label: impl Into<String>, open: F) -> CaptureResult<Self>
    where
        S: SampleSource,
        F: FnOnce() -> CaptureResult<S> + Send + 'static,
    {
        let label = label.into();
        let shared = TrackShared::new();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        let worker_shared = shared.clone();
        let worker_label = label.clone();
        let handle = std::thread::spawn(move || {
            let mut source = match open() {
                Ok(source) => source,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(source.format()));

            while !worker_shared.stopped.load(Ordering::SeqCst) {
                match source.next_chunk() {
                    Ok(samples) => {
                        if samples.is_empty() {
                            continue;
                        }
                        worker_shared.forward(samples);
                    }
                    Err(e) => {
                        tracing::debug!("{} sample error: {}", worker_label, e);
                        std::thread::sleep(SOURCE_ERROR_BACKOFF);
                    }
                }
            }
            tracing::debug!("{} track worker stopped", worker_label);
        });

        let format = ready_rx.recv().map_err(|_| {
            CaptureError::AudioUnsupported("capture worker exited before reporting a format".into())
        })??;

        Ok(Self {
            label,
            format,
            shared,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// The format the device actually granted
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Route captured sample batches into `sink` (one consumer at a time).
    pub(crate) fn attach_sink(&self, sink: SampleSink) {
        *self.shared.sink.lock() = Some(sink);
    }

    /// Detach the current sink, dropping the held sender.
    pub(crate) fn detach_sink(&self) {
        *self.shared.sink.lock() = None;
    }
}

impl MediaTrack for AudioTrack {
    fn kind(&self) -> TrackKind {
        TrackKind::Audio
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn is_live(&self) -> bool {
        !self.shared.stopped.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        if self.shared.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.detach_sink();
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
        tracing::debug!("{} track stopped", self.label);
    }
}

impl Drop for AudioTrack {
    fn drop(&mut self) {
        self.stop();
    }
}
