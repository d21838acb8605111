use crossbeam_channel::Receiver;
use image::RgbaImage;

use super::geometry::VisibleMediaRect;
use crate::error::EngineError;
use crate::media::types::DecodedFrame;

/// How much of the bound media the engine can currently present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReadyState {
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

impl ReadyState {
    /// A frame can be drawn off-screen once current data is available.
    pub fn can_capture(self) -> bool {
        self >= ReadyState::HaveCurrentData
    }
}

/// Lifecycle notifications raised by the engine and drained by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineSignal {
    MetadataLoaded,
    DataLoaded,
    /// Playback began, or restarted from the start while looping.
    Playing,
    Paused,
    Ended,
    Error(String),
}

/// Input bound to the engine.
#[derive(Debug, Clone)]
pub enum MediaInput {
    File(String),
    Stream {
        label: String,
        frames: Option<Receiver<DecodedFrame>>,
    },
}

impl MediaInput {
    pub fn label(&self) -> &str {
        match self {
            MediaInput::File(url) => url,
            MediaInput::Stream { label, .. } => label,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, MediaInput::Stream { .. })
    }
}

/// The decode/render collaborator the controller drives.
///
/// Times are in seconds. `set_source` resets the transport to a paused,
/// not-yet-loaded state without raising `Paused`; readiness is reported
/// later through `MetadataLoaded` / `DataLoaded`.
pub trait MediaEngine {
    fn set_source(&mut self, input: MediaInput);

    fn clear_source(&mut self);

    fn play(&mut self) -> Result<(), EngineError>;

    fn pause(&mut self);

    fn current_time(&self) -> f64;

    fn set_current_time(&mut self, secs: f64);

    fn duration(&self) -> f64;

    fn set_playback_rate(&mut self, rate: f64);

    fn set_looping(&mut self, looping: bool);

    fn set_muted(&mut self, muted: bool);

    fn set_hidden(&mut self, _hidden: bool) {}

    /// Natural media resolution, `(0, 0)` before metadata.
    fn natural_size(&self) -> (u32, u32);

    fn ready_state(&self) -> ReadyState;

    /// Draw the current frame at natural resolution.
    fn capture_frame(&self) -> Option<RgbaImage>;

    /// Place the display surface at the letterboxed rect.
    fn apply_layout(&mut self, _rect: VisibleMediaRect) {}

    /// Drain lifecycle signals raised since the last call.
    fn poll_signals(&mut self) -> Vec<EngineSignal>;
}
