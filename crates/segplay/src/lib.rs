//! Reactive media playback core: source reconciliation, playback state,
//! letterboxed geometry and a display-synchronised body segmentation loop.

pub mod capture;
pub mod error;
pub mod media;
pub mod player;
pub mod segmentation;
pub mod settings;

#[cfg(test)]
pub(crate) mod testing;

pub use capture::{CaptureDevice, StreamHandle};
pub use error::{CaptureError, EngineError, OptionError, SegmentationError};
pub use player::{
    ActiveSource, ContainerSize, EngineSignal, MediaController, MediaEngine, MediaInput,
    PlaybackPhase, PlayerEvent, PlayerState, ReadyState, VisibleMediaRect, compute_letterbox,
};
pub use segmentation::{
    Color, MaskOptions, Person, SegmentationBackend, SegmentationResult, SegmentationVideo,
    SegmenterConfig, SegmenterRuntime,
};
pub use settings::PlayerSettings;
