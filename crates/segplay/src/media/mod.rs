pub mod decoder;
pub mod types;
#[cfg(feature = "video")]
pub mod video;
#[cfg(feature = "webcam")]
pub mod webcam;

use std::path::Path;
use std::time::Instant;

use crossbeam_channel::Receiver;
use image::RgbaImage;

use crate::error::EngineError;
use crate::player::{EngineSignal, MediaEngine, MediaInput, ReadyState};
use decoder::MediaSource;
use types::{DecodedFrame, TransportState};

enum Bound {
    File(MediaSource),
    Live {
        frames: Option<Receiver<DecodedFrame>>,
        latest: Option<DecodedFrame>,
    },
}

/// Headless [`MediaEngine`] over pre-decoded files and live frame channels.
///
/// Files are decoded synchronously on bind. Playback time advances from the
/// wall clock whenever signals are polled, or explicitly through
/// [`advance`](Self::advance).
pub struct FrameEngine {
    bound: Option<Bound>,
    label: String,
    transport: TransportState,
    current_frame: usize,
    muted: bool,
    hidden: bool,
    ready: ReadyState,
    signals: Vec<EngineSignal>,
    last_advance: Option<Instant>,
}

impl Default for FrameEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameEngine {
    pub fn new() -> Self {
        Self {
            bound: None,
            label: String::new(),
            transport: TransportState::default(),
            current_frame: 0,
            muted: false,
            hidden: false,
            ready: ReadyState::HaveNothing,
            signals: Vec::new(),
            last_advance: None,
        }
    }

    /// Bind already-decoded media, raising metadata and data signals.
    pub fn bind_source(&mut self, label: &str, source: MediaSource) {
        self.reset(label);
        let (w, h) = source.dimensions();
        self.transport.duration = source.duration_ms();
        log::info!(
            "Media bound: {label} {w}x{h}, {} frame{}",
            source.frame_count(),
            if source.frame_count() == 1 { "" } else { "s" }
        );
        self.bound = Some(Bound::File(source));
        self.ready = ReadyState::HaveEnoughData;
        self.signals.push(EngineSignal::MetadataLoaded);
        self.signals.push(EngineSignal::DataLoaded);
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn transport(&self) -> &TransportState {
        &self.transport
    }

    /// Advance playback by `dt_secs` of wall time.
    pub fn advance(&mut self, dt_secs: f64) {
        if !self.transport.playing {
            return;
        }
        let Some(Bound::File(source)) = &self.bound else {
            return;
        };
        if !source.is_animated() {
            return;
        }
        let duration = self.transport.duration;
        if duration <= 0.0 {
            return;
        }

        self.transport.position += dt_secs * 1000.0 * self.transport.speed;
        if self.transport.position >= duration {
            if self.transport.looping {
                self.transport.position %= duration;
                self.signals.push(EngineSignal::Playing);
            } else {
                self.transport.position = duration;
                self.transport.playing = false;
                self.signals.push(EngineSignal::Paused);
                self.signals.push(EngineSignal::Ended);
            }
        }
        self.current_frame = source.frame_at(self.transport.position);
    }

    fn reset(&mut self, label: &str) {
        self.label = label.to_string();
        self.bound = None;
        let looping = self.transport.looping;
        let speed = self.transport.speed;
        self.transport = TransportState {
            looping,
            speed,
            ..TransportState::default()
        };
        self.current_frame = 0;
        self.ready = ReadyState::HaveNothing;
        self.signals.clear();
        self.last_advance = None;
    }

    fn natural(&self) -> (u32, u32) {
        match &self.bound {
            Some(Bound::File(source)) => source.dimensions(),
            Some(Bound::Live {
                latest: Some(frame), ..
            }) => (frame.width, frame.height),
            _ => (0, 0),
        }
    }

    fn drain_live(&mut self) {
        let Some(Bound::Live { frames, latest }) = &mut self.bound else {
            return;
        };
        let Some(rx) = frames else {
            return;
        };
        let Some(frame) = rx.try_iter().last() else {
            return;
        };
        let first = latest.is_none();
        let resized = latest
            .as_ref()
            .is_some_and(|prev| (prev.width, prev.height) != (frame.width, frame.height));
        *latest = Some(frame);
        if first {
            self.ready = ReadyState::HaveEnoughData;
            self.signals.push(EngineSignal::MetadataLoaded);
            self.signals.push(EngineSignal::DataLoaded);
        } else if resized {
            self.signals.push(EngineSignal::MetadataLoaded);
        }
    }
}

impl MediaEngine for FrameEngine {
    fn set_source(&mut self, input: MediaInput) {
        match input {
            MediaInput::File(url) => {
                self.reset(&url);
                match decoder::load_media(Path::new(&url)) {
                    Ok(source) => self.bind_source(&url, source),
                    Err(e) => {
                        log::error!("Failed to load {url}: {e}");
                        self.signals.push(EngineSignal::Error(e.to_string()));
                    }
                }
            }
            MediaInput::Stream { label, frames } => {
                self.reset(&label);
                log::info!("Live stream bound: {label}");
                self.bound = Some(Bound::Live {
                    frames,
                    latest: None,
                });
            }
        }
    }

    fn clear_source(&mut self) {
        self.reset("");
    }

    fn play(&mut self) -> Result<(), EngineError> {
        if self.bound.is_none() {
            return Err(EngineError::NoSource);
        }
        if self.transport.playing {
            return Ok(());
        }
        // Replay from the top once the end was reached
        if self.transport.duration > 0.0 && self.transport.position >= self.transport.duration {
            self.transport.position = 0.0;
            self.current_frame = 0;
        }
        self.transport.playing = true;
        self.last_advance = None;
        self.signals.push(EngineSignal::Playing);
        Ok(())
    }

    fn pause(&mut self) {
        if self.transport.playing {
            self.transport.playing = false;
            self.signals.push(EngineSignal::Paused);
        }
    }

    fn current_time(&self) -> f64 {
        self.transport.position / 1000.0
    }

    fn set_current_time(&mut self, secs: f64) {
        let ms = (secs * 1000.0).clamp(0.0, self.transport.duration);
        self.transport.position = ms;
        if let Some(Bound::File(source)) = &self.bound {
            self.current_frame = source.frame_at(ms);
        }
    }

    fn duration(&self) -> f64 {
        self.transport.duration / 1000.0
    }

    fn set_playback_rate(&mut self, rate: f64) {
        if rate.is_finite() && rate > 0.0 {
            self.transport.speed = rate;
        }
    }

    fn set_looping(&mut self, looping: bool) {
        self.transport.looping = looping;
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    fn natural_size(&self) -> (u32, u32) {
        self.natural()
    }

    fn ready_state(&self) -> ReadyState {
        self.ready
    }

    fn capture_frame(&self) -> Option<RgbaImage> {
        if !self.ready.can_capture() {
            return None;
        }
        match self.bound.as_ref()? {
            Bound::File(source) => source.frame(self.current_frame)?.to_image(),
            Bound::Live { latest, .. } => latest.as_ref()?.to_image(),
        }
    }

    fn poll_signals(&mut self) -> Vec<EngineSignal> {
        self.drain_live();
        if self.transport.playing {
            let now = Instant::now();
            if let Some(last) = self.last_advance {
                self.advance(now.duration_since(last).as_secs_f64());
            }
            self.last_advance = Some(now);
        }
        std::mem::take(&mut self.signals)
    }
}
