use thiserror::Error;

/// Rejected `set_option` call. The previous value stays in place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionError {
    #[error("unknown option '{0}'")]
    Unknown(String),
    #[error("invalid playback rate '{0}': expected a finite number greater than zero")]
    InvalidPlaybackRate(String),
}

/// Failure to acquire or run a live capture stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("no capture device available")]
    NoDevice,
    #[error("{0}")]
    Busy(String),
    #[error("capture failed: {0}")]
    Other(String),
}

/// Failure reported by the media engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("no media source is bound")]
    NoSource,
    #[error("failed to decode media: {0}")]
    Decode(String),
    #[error("unsupported media: {0}")]
    Unsupported(String),
}

/// Failure reported by a segmentation backend or the inference worker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentationError {
    #[error("segmentation backend is not loaded")]
    NotLoaded,
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("failed to load segmentation model: {0}")]
    Load(String),
    #[error("segmentation backend error: {0}")]
    Backend(String),
    /// The worker still holds a queued frame; this one is dropped.
    #[error("inference queue full")]
    QueueFull,
    #[error("inference worker unavailable: {0}")]
    Worker(String),
}

impl SegmentationError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    pub fn load(message: impl Into<String>) -> Self {
        Self::Load(message.into())
    }
}
