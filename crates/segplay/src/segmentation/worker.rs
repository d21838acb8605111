use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded, unbounded};
use image::RgbaImage;

use super::backend::{SegmentationBackend, SegmenterConfig};
use super::result::Person;
use crate::error::SegmentationError;

enum WorkerRequest {
    Load(SegmenterConfig),
    Segment {
        ticket: u64,
        generation: u64,
        frame: RgbaImage,
    },
}

/// Answer from the inference thread.
#[derive(Debug)]
pub enum WorkerResponse {
    Loaded(Result<(), SegmentationError>),
    Segmented {
        ticket: u64,
        generation: u64,
        frame_size: (u32, u32),
        result: Result<Vec<Person>, SegmentationError>,
    },
}

/// Owns the segmentation backend on a background thread.
pub struct InferenceWorker {
    request_tx: Option<Sender<WorkerRequest>>,
    response_rx: Receiver<WorkerResponse>,
    backend_name: &'static str,
    thread: Option<JoinHandle<()>>,
}

impl InferenceWorker {
    pub fn spawn(backend: Box<dyn SegmentationBackend>) -> Result<Self, SegmentationError> {
        // Room for a load next to one frame
        let (request_tx, request_rx) = bounded::<WorkerRequest>(2);
        let (response_tx, response_rx) = unbounded::<WorkerResponse>();
        let backend_name = backend.name();

        let handle = thread::Builder::new()
            .name("segplay-inference".into())
            .spawn(move || Self::run(backend, request_rx, response_tx))
            .map_err(|e| SegmentationError::Worker(format!("failed to spawn inference thread: {e}")))?;

        Ok(Self {
            request_tx: Some(request_tx),
            response_rx,
            backend_name,
            thread: Some(handle),
        })
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    pub fn request_load(&self, config: SegmenterConfig) -> Result<(), SegmentationError> {
        self.send(WorkerRequest::Load(config))
    }

    pub fn submit(&self, ticket: u64, generation: u64, frame: RgbaImage) -> Result<(), SegmentationError> {
        self.send(WorkerRequest::Segment {
            ticket,
            generation,
            frame,
        })
    }

    /// Non-blocking read of the next response.
    pub fn try_recv(&self) -> Option<WorkerResponse> {
        match self.response_rx.try_recv() {
            Ok(response) => Some(response),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                log::error!("Inference thread disconnected");
                None
            }
        }
    }

    fn send(&self, request: WorkerRequest) -> Result<(), SegmentationError> {
        let Some(tx) = &self.request_tx else {
            return Err(SegmentationError::Worker("worker shut down".into()));
        };
        tx.try_send(request).map_err(|e| match e {
            TrySendError::Full(_) => SegmentationError::QueueFull,
            TrySendError::Disconnected(_) => SegmentationError::Worker("inference thread gone".into()),
        })
    }

    fn run(
        mut backend: Box<dyn SegmentationBackend>,
        request_rx: Receiver<WorkerRequest>,
        response_tx: Sender<WorkerResponse>,
    ) {
        for request in request_rx.iter() {
            let response = match request {
                WorkerRequest::Load(config) => {
                    log::info!(
                        "Loading {} segmenter ({:?}) from {}",
                        backend.name(),
                        config.model_type,
                        config.solution_path
                    );
                    WorkerResponse::Loaded(backend.load(&config))
                }
                WorkerRequest::Segment {
                    ticket,
                    generation,
                    frame,
                } => WorkerResponse::Segmented {
                    ticket,
                    generation,
                    frame_size: frame.dimensions(),
                    result: backend.segment_people(&frame),
                },
            };
            if response_tx.send(response).is_err() {
                break;
            }
        }
        log::debug!("Inference thread exiting (channel closed)");
    }
}

impl Drop for InferenceWorker {
    fn drop(&mut self) {
        // Closing the request channel ends the loop after the current call
        self.request_tx = None;
        if let Some(handle) = self.thread.take() {
            // A slow backend call must not block teardown
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }
}
