pub mod backend;
pub mod mask;
#[cfg(feature = "onnx")]
pub mod ort;
pub mod result;
pub mod scheduler;
pub mod worker;

use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Receiver;
use image::RgbaImage;
use image::imageops::{self, FilterType};

use crate::capture::{CaptureDevice, StreamHandle};
use crate::error::{OptionError, SegmentationError};
use crate::player::{
    ContainerSize, MediaController, MediaEngine, OptionChange, OptionName, PlayerEvent,
};
use crate::settings::PlayerSettings;

pub use backend::{ModelType, NoopSegmenter, SegmentationBackend, SegmenterConfig, SegmenterRuntime};
pub use mask::{BinaryMaskRenderer, MaskOptions, MaskRenderer};
pub use result::{Color, Person, SegmentationMask, SegmentationResult};
pub use scheduler::{Completion, FrameScheduler, TickOutcome};
pub use worker::{InferenceWorker, WorkerResponse};

/// Load state of the segmentation backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendState {
    Unloaded,
    Loading,
    Ready,
    Failed(String),
}

/// A [`MediaController`] plus the per-display-frame segmentation loop.
///
/// The backend is loaded when metadata first arrives; the loop starts once it
/// is ready. Each display frame the loop checks eligibility (playing, frame
/// available, backend ready, and `active` unless the settings disable that
/// gate), captures the frame at natural resolution and hands it to the
/// inference worker. Results come back through [`update`](Self::update) and
/// are published as [`PlayerEvent::SegmentationResult`].
pub struct SegmentationVideo {
    controller: MediaController,
    scheduler: FrameScheduler,
    worker: Option<InferenceWorker>,
    renderer: Arc<dyn MaskRenderer>,
    backend: BackendState,
    config: SegmenterConfig,
    require_active: bool,
    seen_source_epoch: u64,
    seen_metadata_epoch: u64,
}

impl SegmentationVideo {
    /// Build with the backend selected by `settings.segmenter.runtime`.
    pub fn new(
        engine: Box<dyn MediaEngine>,
        camera: Option<Arc<dyn CaptureDevice>>,
        settings: &PlayerSettings,
    ) -> Self {
        let backend = settings.segmenter.runtime.create_backend();
        Self::with_backend(engine, camera, settings, backend)
    }

    pub fn with_backend(
        engine: Box<dyn MediaEngine>,
        camera: Option<Arc<dyn CaptureDevice>>,
        settings: &PlayerSettings,
        backend: Box<dyn SegmentationBackend>,
    ) -> Self {
        let (worker, state) = match InferenceWorker::spawn(backend) {
            Ok(worker) => {
                log::info!("Segmentation backend: {}", worker.backend_name());
                (Some(worker), BackendState::Unloaded)
            }
            Err(e) => {
                log::error!("Segmentation disabled: {e}");
                (None, BackendState::Failed(e.to_string()))
            }
        };
        Self {
            controller: MediaController::new(engine, camera, settings),
            scheduler: FrameScheduler::new(settings.inference_timeout()),
            worker,
            renderer: Arc::new(BinaryMaskRenderer),
            backend: state,
            config: settings.segmenter.clone(),
            require_active: settings.require_active,
            seen_source_epoch: 0,
            seen_metadata_epoch: 0,
        }
    }

    pub fn controller(&self) -> &MediaController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut MediaController {
        &mut self.controller
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn backend_state(&self) -> &BackendState {
        &self.backend
    }

    pub fn subscribe(&mut self) -> Receiver<PlayerEvent> {
        self.controller.subscribe()
    }

    pub fn set_option(&mut self, name: &str, value: Option<&str>) -> Result<(), OptionError> {
        let name: OptionName = name.parse()?;
        match self.controller.apply_option(name, value)? {
            OptionChange::Active if !self.controller.options().active => {
                // Anything still in flight was submitted while active
                self.scheduler.invalidate();
            }
            OptionChange::Segmenter => {
                log::debug!("Solution path changed; applies to the next backend load");
            }
            _ => {}
        }
        Ok(())
    }

    pub fn get_option(&self, name: &str) -> Result<Option<String>, OptionError> {
        self.controller.get_option(name)
    }

    /// Attach to a container. After a previous unmount the loop is revived;
    /// it restarts right away if the backend is still loaded.
    pub fn mount(&mut self, container: ContainerSize, now: Instant) {
        self.scheduler.reset();
        if self.backend == BackendState::Ready {
            self.scheduler.start();
        }
        self.controller.mount(container, now);
    }

    pub fn resize(&mut self, container: ContainerSize) {
        self.controller.resize(container);
    }

    pub fn set_stream(&mut self, handle: Box<dyn StreamHandle>) {
        self.controller.set_stream(handle);
    }

    /// Tear everything down; the loop stops re-arming.
    pub fn unmount(&mut self) {
        self.scheduler.teardown();
        self.controller.unmount();
    }

    pub fn play(&mut self) {
        self.controller.play();
    }

    pub fn pause(&mut self) {
        self.controller.pause();
    }

    /// Control-thread pump: playback first, then inference bookkeeping.
    pub fn update(&mut self, now: Instant) {
        self.controller.update(now);

        let source_epoch = self.controller.source_epoch();
        if source_epoch != self.seen_source_epoch {
            self.seen_source_epoch = source_epoch;
            self.scheduler.invalidate();
        }

        let metadata_epoch = self.controller.metadata_epoch();
        if metadata_epoch != self.seen_metadata_epoch {
            self.seen_metadata_epoch = metadata_epoch;
            self.request_load();
        }

        self.drain_worker();

        if let Some(ticket) = self.scheduler.check_timeout(now) {
            log::warn!("Inference call #{ticket} timed out");
        }
    }

    /// Per-display-refresh callback.
    pub fn on_display_frame(&mut self, now: Instant) -> TickOutcome {
        let eligible = self.is_eligible();
        let Self {
            controller,
            scheduler,
            worker,
            ..
        } = self;

        let outcome = scheduler.tick(eligible, now, |ticket, generation| {
            let Some(worker) = worker.as_ref() else {
                return false;
            };
            let Some(frame) = capture_natural(controller) else {
                log::debug!("No frame available for inference");
                return false;
            };
            match worker.submit(ticket, generation, frame) {
                Ok(()) => true,
                Err(SegmentationError::QueueFull) => {
                    log::trace!("Inference queue full, frame dropped");
                    false
                }
                Err(e) => {
                    log::warn!("Inference submission failed: {e}");
                    false
                }
            }
        });
        if outcome == TickOutcome::Busy {
            log::trace!("Inference busy, frame dropped");
        }
        outcome
    }

    pub fn is_eligible(&self) -> bool {
        let gate_open = !self.require_active || self.controller.options().active;
        self.controller.state().is_playing
            && self.controller.is_ready_for_capture()
            && self.backend == BackendState::Ready
            && gate_open
    }

    fn request_load(&mut self) {
        if matches!(self.backend, BackendState::Loading | BackendState::Ready) {
            return;
        }
        let Some(worker) = &self.worker else {
            return;
        };
        let config = self
            .config
            .with_solution_path(self.controller.options().solution_path.as_deref());
        match worker.request_load(config) {
            Ok(()) => self.backend = BackendState::Loading,
            Err(e) => {
                log::error!("Could not request segmenter load: {e}");
                self.backend = BackendState::Failed(e.to_string());
            }
        }
    }

    fn drain_worker(&mut self) {
        let Some(worker) = &self.worker else {
            return;
        };
        while let Some(response) = worker.try_recv() {
            match response {
                WorkerResponse::Loaded(Ok(())) => {
                    log::info!("Segmentation backend ready");
                    self.backend = BackendState::Ready;
                    self.scheduler.start();
                }
                WorkerResponse::Loaded(Err(e)) => {
                    log::error!("Segmentation backend failed to load: {e}");
                    self.backend = BackendState::Failed(e.to_string());
                }
                WorkerResponse::Segmented {
                    ticket,
                    generation,
                    frame_size,
                    result,
                } => match self.scheduler.complete(ticket, generation) {
                    Completion::Stale => {
                        log::debug!("Discarded stale segmentation result #{ticket}");
                    }
                    Completion::Current => match result {
                        Ok(people) => {
                            let result =
                                SegmentationResult::new(people, self.renderer.clone(), frame_size);
                            self.controller.emit(PlayerEvent::SegmentationResult(result));
                        }
                        Err(e) => log::warn!("Segmentation failed: {e}"),
                    },
                },
            }
        }
    }
}

/// Capture the current frame, scaled to the natural media size if the
/// engine handed back something else.
fn capture_natural(controller: &MediaController) -> Option<RgbaImage> {
    let frame = controller.capture_frame()?;
    let (nw, nh) = controller.natural_size();
    if nw == 0 || nh == 0 || frame.dimensions() == (nw, nh) {
        return Some(frame);
    }
    Some(imageops::resize(&frame, nw, nh, FilterType::Triangle))
}
