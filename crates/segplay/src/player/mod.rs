pub mod engine;
pub mod events;
pub mod geometry;
pub mod options;
pub mod source;
pub mod state;
pub mod timer;

use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbaImage;

use crate::capture::{CaptureDevice, StreamHandle};
use crate::error::{CaptureError, OptionError};
use crate::settings::PlayerSettings;

pub use engine::{EngineSignal, MediaEngine, MediaInput, ReadyState};
pub use events::{EventBus, PlayerEvent};
pub use geometry::{ContainerSize, VisibleMediaRect, compute_letterbox};
pub use options::{MediaSourceIntent, OptionChange, OptionName, PlayerOptions};
pub use source::{AcquisitionOutcome, ActiveSource, MediaSourceManager, SourceChange};
pub use state::{PlaybackPhase, PlayerState};
use timer::IntervalTimer;

/// Playback state machine over a [`MediaEngine`].
///
/// Everything runs on the thread that calls [`update`](Self::update); the
/// only background work is camera acquisition, whose result is collected
/// there. Times passed in are the caller's clock so the controller never
/// reads the wall clock itself.
pub struct MediaController {
    engine: Box<dyn MediaEngine>,
    sources: MediaSourceManager,
    options: PlayerOptions,
    state: PlayerState,
    phase: PlaybackPhase,
    rect: VisibleMediaRect,
    container: ContainerSize,
    timer: IntervalTimer,
    events: EventBus,
    settle_delay: Duration,
    step_fps: f64,
    mounted: bool,
    reconcile_due: Option<Instant>,
    metadata_loaded: bool,
    /// Bumped on every source bind or release.
    source_epoch: u64,
    /// Bumped on every metadata-loaded.
    metadata_epoch: u64,
}

impl MediaController {
    pub fn new(
        engine: Box<dyn MediaEngine>,
        camera: Option<Arc<dyn CaptureDevice>>,
        settings: &PlayerSettings,
    ) -> Self {
        Self {
            engine,
            sources: MediaSourceManager::new(camera),
            options: PlayerOptions::default(),
            state: PlayerState::default(),
            phase: PlaybackPhase::Idle,
            rect: VisibleMediaRect::default(),
            container: ContainerSize::default(),
            timer: IntervalTimer::new(settings.time_update_interval()),
            events: EventBus::new(),
            settle_delay: settings.settle_delay(),
            step_fps: settings.step_fps.max(1) as f64,
            mounted: false,
            reconcile_due: None,
            metadata_loaded: false,
            source_epoch: 0,
            metadata_epoch: 0,
        }
    }

    pub fn subscribe(&mut self) -> crossbeam_channel::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    // --- Options ---

    /// Set (`Some`) or remove (`None`) a declarative option by name.
    pub fn set_option(&mut self, name: &str, value: Option<&str>) -> Result<(), OptionError> {
        let name: OptionName = name.parse()?;
        self.apply_option(name, value).map(|_| ())
    }

    pub fn get_option(&self, name: &str) -> Result<Option<String>, OptionError> {
        let name: OptionName = name.parse()?;
        Ok(self.options.get(name))
    }

    pub(crate) fn apply_option(
        &mut self,
        name: OptionName,
        value: Option<&str>,
    ) -> Result<OptionChange, OptionError> {
        let change = self.options.apply(name, value)?;
        match change {
            OptionChange::Source => {
                let explicit = match name {
                    OptionName::Src => self.options.src.is_some(),
                    _ => self.options.use_camera,
                };
                if explicit {
                    self.options.manual_stream = false;
                }
                // Before the settle delay elapses the pending reconcile picks this up
                if self.mounted && self.reconcile_due.is_none() {
                    self.reconcile();
                }
            }
            OptionChange::Looping => {
                self.state.is_looping = self.options.is_looping;
                self.engine.set_looping(self.options.is_looping);
            }
            OptionChange::PlaybackRate => {
                self.state.playback_rate = self.options.playback_rate;
                self.engine.set_playback_rate(self.options.playback_rate);
            }
            OptionChange::Hidden => self.engine.set_hidden(self.options.hide_video),
            OptionChange::None
            | OptionChange::Active
            | OptionChange::Muted
            | OptionChange::Segmenter
            | OptionChange::Flag => {}
        }
        Ok(change)
    }

    pub fn options(&self) -> &PlayerOptions {
        &self.options
    }

    // --- Lifecycle ---

    /// Attach to a container. The first reconcile runs after the settle delay.
    pub fn mount(&mut self, container: ContainerSize, now: Instant) {
        self.mounted = true;
        self.container = container;
        self.reconcile_due = Some(now + self.settle_delay);
        self.layout();
        self.events.emit(PlayerEvent::Ready);
    }

    /// Stop the tick, cancel acquisitions and stop every capture track.
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        self.reconcile_due = None;
        self.timer.cancel();
        if self.state.is_playing {
            self.engine.pause();
            self.state.is_playing = false;
        }
        self.sources.teardown();
        log::info!("Media controller unmounted");
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// New container bounds. A zero-area container keeps the previous rect.
    pub fn resize(&mut self, container: ContainerSize) {
        self.container = container;
        self.layout();
    }

    /// Pump the control thread: settle reconcile, finished acquisitions,
    /// engine signals, then the time-update tick.
    pub fn update(&mut self, now: Instant) {
        if self.reconcile_due.is_some_and(|due| now >= due) {
            self.reconcile_due = None;
            self.reconcile();
        }

        if let Some(outcome) = self.sources.poll() {
            match outcome {
                AcquisitionOutcome::Bound(input) => self.bind(input),
                AcquisitionOutcome::Failed(e) => self.acquisition_failed(e),
            }
        }

        for signal in self.engine.poll_signals() {
            self.on_signal(signal, now);
        }

        if self.timer.poll(now) {
            self.state.current_time = self.engine.current_time() * 1000.0;
            self.events.emit(PlayerEvent::TimeUpdated {
                current_time: self.state.current_time,
            });
        }
    }

    /// Inject a capture stream directly, bypassing `usecamera`.
    pub fn set_stream(&mut self, handle: Box<dyn StreamHandle>) {
        self.options.manual_stream = true;
        let input = self.sources.set_manual_stream(handle);
        self.bind(input);
    }

    // --- Playback ---

    pub fn play(&mut self) {
        if !self.phase.has_source() {
            log::debug!("play() ignored: no source bound");
            return;
        }
        if let Err(e) = self.engine.play() {
            log::warn!("Playback rejected: {e}");
        }
    }

    pub fn pause(&mut self) {
        if self.phase.has_source() {
            self.engine.pause();
        }
    }

    pub fn toggle_playback(&mut self) {
        if self.state.is_playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Pause, then move by `frames` at the fixed step rate.
    pub fn step(&mut self, frames: i32) {
        if !self.phase.has_source() {
            return;
        }
        self.pause();
        let target = self.engine.current_time() + frames as f64 / self.step_fps;
        self.seek_secs(target);
    }

    /// Seek to an absolute position in milliseconds.
    pub fn seek_to(&mut self, ms: f64) {
        if !self.phase.has_source() || !ms.is_finite() {
            return;
        }
        self.seek_secs(ms / 1000.0);
    }

    pub fn change_playback_rate(&mut self, rate: f64) {
        if !(rate.is_finite() && rate > 0.0) {
            log::warn!("Ignoring invalid playback rate {rate}");
            return;
        }
        self.options.playback_rate = rate;
        self.state.playback_rate = rate;
        self.engine.set_playback_rate(rate);
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.options.is_looping = looping;
        self.state.is_looping = looping;
        self.engine.set_looping(looping);
    }

    fn seek_secs(&mut self, secs: f64) {
        self.engine.set_current_time(secs.max(0.0));
        self.state.current_time = self.engine.current_time() * 1000.0;
    }

    // --- Observable state ---

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub fn video_bounds(&self) -> VisibleMediaRect {
        self.rect
    }

    pub fn natural_size(&self) -> (u32, u32) {
        self.engine.natural_size()
    }

    /// Natural width / height, once known.
    pub fn aspect_ratio(&self) -> Option<f64> {
        let (w, h) = self.engine.natural_size();
        (w > 0 && h > 0).then(|| w as f64 / h as f64)
    }

    pub fn active_source(&self) -> ActiveSource {
        self.sources.active()
    }

    pub fn is_acquiring(&self) -> bool {
        self.sources.is_acquiring()
    }

    pub fn metadata_loaded(&self) -> bool {
        self.metadata_loaded
    }

    pub fn source_epoch(&self) -> u64 {
        self.source_epoch
    }

    pub fn metadata_epoch(&self) -> u64 {
        self.metadata_epoch
    }

    pub fn is_ready_for_capture(&self) -> bool {
        self.metadata_loaded && self.engine.ready_state().can_capture()
    }

    /// The current frame at natural resolution.
    pub fn capture_frame(&self) -> Option<RgbaImage> {
        self.engine.capture_frame()
    }

    pub fn time_update_active(&self) -> bool {
        self.timer.is_active()
    }

    pub fn time_update_arm_count(&self) -> u64 {
        self.timer.arm_count()
    }

    pub(crate) fn emit(&mut self, event: PlayerEvent) {
        self.events.emit(event);
    }

    // --- Internals ---

    fn reconcile(&mut self) {
        let intent = self.options.intent();
        match self.sources.reconcile(&intent) {
            SourceChange::Unchanged => {}
            SourceChange::Bound(input) => self.bind(input),
            SourceChange::Released => self.unbind(),
            SourceChange::Acquiring => log::debug!("Waiting for camera stream"),
            SourceChange::Failed(e) => self.acquisition_failed(e),
        }
    }

    fn bind(&mut self, input: MediaInput) {
        self.stop_for_switch();
        log::info!("Media source bound: {}", input.label());
        self.engine.set_source(input);
        self.engine.set_looping(self.options.is_looping);
        self.engine.set_playback_rate(self.options.playback_rate);
        self.engine.set_muted(self.options.mute);
        self.engine.set_hidden(self.options.hide_video);
        self.state.reset_timing();
        self.metadata_loaded = false;
        self.phase = PlaybackPhase::Loading;
        self.source_epoch += 1;
        self.events.emit(PlayerEvent::SourceChanged {
            source: self.sources.active(),
            error: None,
        });
    }

    fn unbind(&mut self) {
        self.stop_for_switch();
        self.engine.clear_source();
        self.state.reset_timing();
        self.metadata_loaded = false;
        self.phase = PlaybackPhase::Idle;
        self.source_epoch += 1;
        self.events.emit(PlayerEvent::SourceChanged {
            source: ActiveSource::None,
            error: None,
        });
    }

    /// Pause ahead of a source switch so observers see the transition.
    fn stop_for_switch(&mut self) {
        self.timer.cancel();
        if self.state.is_playing {
            self.engine.pause();
            self.state.is_playing = false;
            self.events.emit(PlayerEvent::PlayingPaused);
        }
    }

    fn acquisition_failed(&mut self, error: CaptureError) {
        log::warn!("Camera unavailable: {error}");
        let source = self.sources.active();
        if source.is_none() {
            self.phase = PlaybackPhase::Idle;
        }
        self.events.emit(PlayerEvent::SourceChanged {
            source,
            error: Some(error.to_string()),
        });
    }

    fn on_signal(&mut self, signal: EngineSignal, now: Instant) {
        match signal {
            EngineSignal::MetadataLoaded => {
                self.state.duration = self.engine.duration() * 1000.0;
                self.metadata_loaded = true;
                self.metadata_epoch += 1;
                self.layout();
                if self.phase == PlaybackPhase::Loading {
                    self.phase = PlaybackPhase::Paused;
                }
                self.events.emit(PlayerEvent::MetadataLoaded);
            }
            EngineSignal::DataLoaded => {
                if self.options.starts_automatically() {
                    self.engine.set_muted(self.options.mute);
                    self.play();
                }
            }
            EngineSignal::Playing => {
                if self.state.is_playing {
                    self.events.emit(PlayerEvent::PlaybackLooped);
                } else {
                    self.state.is_playing = true;
                    self.engine.set_playback_rate(self.state.playback_rate);
                    self.timer.arm(now);
                    self.phase = PlaybackPhase::Playing;
                    self.events.emit(PlayerEvent::PlayingStarted);
                }
            }
            EngineSignal::Paused => {
                if self.state.is_playing {
                    self.state.is_playing = false;
                    self.timer.cancel();
                    self.phase = PlaybackPhase::Paused;
                    self.events.emit(PlayerEvent::PlayingPaused);
                }
            }
            EngineSignal::Ended => {
                self.timer.cancel();
                self.state.is_playing = false;
                self.state.current_time = self.engine.current_time() * 1000.0;
                self.phase = PlaybackPhase::Ended;
                self.events.emit(PlayerEvent::PlaybackEnded);
            }
            EngineSignal::Error(message) => {
                log::warn!("Media engine error: {message}");
                // A source that never produced metadata is unusable
                if self.phase == PlaybackPhase::Loading {
                    self.phase = PlaybackPhase::Idle;
                }
                self.events.emit(PlayerEvent::SourceChanged {
                    source: self.sources.active(),
                    error: Some(message),
                });
            }
        }
    }

    fn layout(&mut self) {
        let Some(aspect) = self.aspect_ratio() else {
            return;
        };
        let Some(rect) = compute_letterbox(self.container.width, self.container.height, aspect)
        else {
            return;
        };
        if rect != self.rect {
            self.rect = rect;
            self.engine.apply_layout(rect);
            self.events.emit(PlayerEvent::LayoutChanged(rect));
        }
    }
}

impl Drop for MediaController {
    fn drop(&mut self) {
        self.unmount();
    }
}
