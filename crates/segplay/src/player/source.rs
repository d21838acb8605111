use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;

use super::engine::MediaInput;
use super::options::MediaSourceIntent;
use crate::capture::{CaptureDevice, OwnedStream, StreamHandle};
use crate::error::CaptureError;

/// The backing source currently bound to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ActiveSource {
    None,
    File(String),
    /// Stream acquired through `usecamera`, labelled by device.
    Camera(String),
    /// Stream injected programmatically.
    Manual(String),
}

impl ActiveSource {
    pub fn is_none(&self) -> bool {
        matches!(self, ActiveSource::None)
    }
}

/// Result of one `reconcile` call.
#[derive(Debug)]
pub enum SourceChange {
    Unchanged,
    /// A new input must be bound to the engine.
    Bound(MediaInput),
    /// The camera stream was released and nothing replaces it.
    Released,
    /// Camera acquisition started; completion arrives through `poll`.
    Acquiring,
    /// Acquisition could not even start.
    Failed(CaptureError),
}

/// Completion of a background camera acquisition.
#[derive(Debug)]
pub enum AcquisitionOutcome {
    Bound(MediaInput),
    Failed(CaptureError),
}

enum Bound {
    None,
    File(String),
    Stream { stream: OwnedStream, manual: bool },
}

struct Acquired {
    generation: u64,
    result: Result<OwnedStream, CaptureError>,
}

/// Reconciles source intent into exactly one bound input and owns every
/// capture stream it acquires.
///
/// Acquisitions run on a background thread and are tagged with a generation;
/// a stream that arrives after its request was superseded is stopped on
/// receipt. Streams are wrapped in [`OwnedStream`] before they leave the
/// acquisition thread, so a handle dropped anywhere still stops its tracks.
pub struct MediaSourceManager {
    device: Option<Arc<dyn CaptureDevice>>,
    bound: Bound,
    pending: Option<u64>,
    next_generation: u64,
    acquired_tx: Sender<Acquired>,
    acquired_rx: Receiver<Acquired>,
    acquisitions_started: u64,
}

impl MediaSourceManager {
    pub fn new(device: Option<Arc<dyn CaptureDevice>>) -> Self {
        let (acquired_tx, acquired_rx) = crossbeam_channel::unbounded();
        Self {
            device,
            bound: Bound::None,
            pending: None,
            next_generation: 0,
            acquired_tx,
            acquired_rx,
            acquisitions_started: 0,
        }
    }

    pub fn active(&self) -> ActiveSource {
        match &self.bound {
            Bound::None => ActiveSource::None,
            Bound::File(url) => ActiveSource::File(url.clone()),
            Bound::Stream { stream, manual: false } => ActiveSource::Camera(stream.label().to_string()),
            Bound::Stream { stream, manual: true } => ActiveSource::Manual(stream.label().to_string()),
        }
    }

    pub fn is_acquiring(&self) -> bool {
        self.pending.is_some()
    }

    pub fn acquisitions_started(&self) -> u64 {
        self.acquisitions_started
    }

    /// Apply the source policy for `intent`. Calling it again with the same
    /// intent is a no-op.
    pub fn reconcile(&mut self, intent: &MediaSourceIntent) -> SourceChange {
        if let Some(src) = &intent.src {
            if matches!(&self.bound, Bound::File(url) if url == src) && self.pending.is_none() {
                return SourceChange::Unchanged;
            }
            self.cancel_pending();
            self.release_stream();
            log::info!("Binding file source {src}");
            self.bound = Bound::File(src.clone());
            return SourceChange::Bound(MediaInput::File(src.clone()));
        }

        if intent.use_camera {
            let camera_bound = matches!(self.bound, Bound::Stream { manual: false, .. });
            if self.pending.is_some() || camera_bound {
                return SourceChange::Unchanged;
            }
            return match self.start_acquisition() {
                Ok(()) => SourceChange::Acquiring,
                Err(e) => SourceChange::Failed(e),
            };
        }

        self.cancel_pending();
        if matches!(self.bound, Bound::Stream { manual: false, .. }) {
            self.release_stream();
            return SourceChange::Released;
        }
        SourceChange::Unchanged
    }

    /// Bind a programmatically supplied stream, releasing whatever was bound.
    pub fn set_manual_stream(&mut self, handle: Box<dyn StreamHandle>) -> MediaInput {
        self.cancel_pending();
        self.release_stream();
        let stream = OwnedStream::new(handle);
        let input = stream_input(&stream);
        log::info!("Binding manual stream '{}'", stream.label());
        self.bound = Bound::Stream {
            stream,
            manual: true,
        };
        input
    }

    /// Collect a finished acquisition, if any. Superseded streams are stopped.
    pub fn poll(&mut self) -> Option<AcquisitionOutcome> {
        while let Ok(acquired) = self.acquired_rx.try_recv() {
            if self.pending != Some(acquired.generation) {
                log::debug!("Discarding superseded camera acquisition #{}", acquired.generation);
                // Dropping the OwnedStream stops its tracks
                continue;
            }
            self.pending = None;
            return Some(match acquired.result {
                Ok(stream) => {
                    self.release_stream();
                    let input = stream_input(&stream);
                    log::info!("Camera stream '{}' acquired", stream.label());
                    self.bound = Bound::Stream {
                        stream,
                        manual: false,
                    };
                    AcquisitionOutcome::Bound(input)
                }
                Err(e) => {
                    log::warn!("Camera acquisition failed: {e}");
                    AcquisitionOutcome::Failed(e)
                }
            });
        }
        None
    }

    /// Stop everything: pending acquisitions, queued late streams, the bound
    /// stream.
    pub fn teardown(&mut self) {
        self.cancel_pending();
        self.release_stream();
        self.bound = Bound::None;
        for late in self.acquired_rx.try_iter() {
            drop(late);
        }
    }

    fn start_acquisition(&mut self) -> Result<(), CaptureError> {
        let device = self.device.clone().ok_or(CaptureError::NoDevice)?;
        self.next_generation += 1;
        let generation = self.next_generation;
        let tx = self.acquired_tx.clone();

        log::info!("Acquiring camera stream from '{}'", device.name());
        std::thread::Builder::new()
            .name("segplay-camera-acquire".into())
            .spawn(move || {
                let result = device.acquire_video_stream().map(OwnedStream::new);
                // A failed send drops the stream, which stops it
                let _ = tx.send(Acquired { generation, result });
            })
            .map_err(|e| CaptureError::Other(format!("failed to spawn acquisition thread: {e}")))?;

        self.pending = Some(generation);
        self.acquisitions_started += 1;
        Ok(())
    }

    fn cancel_pending(&mut self) {
        if let Some(generation) = self.pending.take() {
            log::debug!("Cancelled camera acquisition #{generation}");
        }
    }

    fn release_stream(&mut self) {
        if let Bound::Stream { mut stream, .. } = std::mem::replace(&mut self.bound, Bound::None) {
            stream.stop();
        }
    }
}

impl Drop for MediaSourceManager {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn stream_input(stream: &OwnedStream) -> MediaInput {
    MediaInput::Stream {
        label: stream.label().to_string(),
        frames: stream.frames(),
    }
}
