use serde::Serialize;

/// Coarse playback lifecycle of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PlaybackPhase {
    /// No source bound.
    Idle,
    /// A source is bound, metadata not yet available.
    Loading,
    Paused,
    Playing,
    Ended,
}

impl PlaybackPhase {
    pub fn has_source(self) -> bool {
        !matches!(self, PlaybackPhase::Idle)
    }
}

/// Playback flags and timing. Times are in milliseconds.
///
/// `current_time` is only advanced by the periodic time-update tick while
/// playing; it is authoritative between metadata-loaded and the next
/// pause/end.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerState {
    pub is_playing: bool,
    pub current_time: f64,
    pub duration: f64,
    pub playback_rate: f64,
    pub is_looping: bool,
    /// Reserved for a recording capability.
    pub is_recording: bool,
    /// Reserved for a recording capability.
    pub is_audio_recording: bool,
    /// -1 when unset.
    pub recording_duration: f64,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            is_playing: false,
            current_time: 0.0,
            duration: 0.0,
            playback_rate: 1.0,
            is_looping: false,
            is_recording: false,
            is_audio_recording: false,
            recording_duration: -1.0,
        }
    }
}

impl PlayerState {
    /// The core controller never records.
    pub fn can_record(&self) -> bool {
        false
    }

    /// Clear timing when a new source is bound.
    pub(crate) fn reset_timing(&mut self) {
        self.current_time = 0.0;
        self.duration = 0.0;
    }
}
