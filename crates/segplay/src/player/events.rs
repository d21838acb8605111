use crossbeam_channel::{Receiver, Sender};

use super::geometry::VisibleMediaRect;
use super::source::ActiveSource;
use crate::segmentation::SegmentationResult;

/// Normalized lifecycle events re-emitted by the controller.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    Ready,
    MetadataLoaded,
    PlayingStarted,
    PlayingPaused,
    /// Playback restarted from the beginning because looping is enabled.
    PlaybackLooped,
    PlaybackEnded,
    /// Periodic tick while playing; carries the refreshed `current_time` (ms).
    TimeUpdated { current_time: f64 },
    /// The active backing source changed, or an acquisition attempt failed.
    SourceChanged {
        source: ActiveSource,
        error: Option<String>,
    },
    /// Letterbox placement recomputed; overlays should follow it.
    LayoutChanged(VisibleMediaRect),
    SegmentationResult(SegmentationResult),
}

impl PlayerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::Ready => "ready",
            PlayerEvent::MetadataLoaded => "metadata-loaded",
            PlayerEvent::PlayingStarted => "playing-started",
            PlayerEvent::PlayingPaused => "playing-paused",
            PlayerEvent::PlaybackLooped => "playback-looped",
            PlayerEvent::PlaybackEnded => "playback-ended",
            PlayerEvent::TimeUpdated { .. } => "time-updated",
            PlayerEvent::SourceChanged { .. } => "source-changed",
            PlayerEvent::LayoutChanged(_) => "layout-changed",
            PlayerEvent::SegmentationResult(_) => "segmentation-result",
        }
    }
}

/// Fan-out of events to any number of subscribers. Subscribers whose
/// receiver was dropped are pruned on the next emit.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Sender<PlayerEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<PlayerEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn emit(&mut self, event: PlayerEvent) {
        log::trace!("event: {}", event.name());
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
