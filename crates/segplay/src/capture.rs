//! Live capture contract consumed by the source manager.

use crossbeam_channel::Receiver;

use crate::error::CaptureError;
use crate::media::types::DecodedFrame;

/// An acquired capture stream. Only the source manager starts or stops it.
pub trait StreamHandle: Send {
    /// Human-readable device or stream name.
    fn label(&self) -> &str;

    /// Live frames for the media engine; `None` for streams rendered elsewhere.
    fn frames(&self) -> Option<Receiver<DecodedFrame>>;

    /// Stop every track of the stream, releasing the device.
    fn stop_all_tracks(&mut self);

    fn is_running(&self) -> bool;
}

/// Something that can open a video-only capture stream.
///
/// `acquire_video_stream` may block (device probing, permission prompts);
/// the source manager calls it from a background thread.
pub trait CaptureDevice: Send + Sync {
    fn name(&self) -> &str;

    fn acquire_video_stream(&self) -> Result<Box<dyn StreamHandle>, CaptureError>;
}

/// Owns a stream handle and guarantees its tracks are stopped exactly once,
/// either explicitly or when the guard is dropped.
pub struct OwnedStream {
    handle: Box<dyn StreamHandle>,
    stopped: bool,
}

impl OwnedStream {
    pub fn new(handle: Box<dyn StreamHandle>) -> Self {
        Self {
            handle,
            stopped: false,
        }
    }

    pub fn label(&self) -> &str {
        self.handle.label()
    }

    pub fn frames(&self) -> Option<Receiver<DecodedFrame>> {
        self.handle.frames()
    }

    pub fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.handle.stop_all_tracks();
            log::info!("Stopped capture stream '{}'", self.handle.label());
        }
    }
}

impl Drop for OwnedStream {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Journal, MockStream};

    #[test]
    fn owned_stream_stops_once() {
        let journal = Journal::default();
        let stream = MockStream::new("cam", &journal);
        let stops = stream.stop_counter();

        let mut owned = OwnedStream::new(Box::new(stream));
        owned.stop();
        owned.stop();
        drop(owned);
        assert_eq!(stops.get(), 1);
    }

    #[test]
    fn dropping_unstopped_stream_stops_it() {
        let journal = Journal::default();
        let stream = MockStream::new("cam", &journal);
        let stops = stream.stop_counter();
        drop(OwnedStream::new(Box::new(stream)));
        assert_eq!(stops.get(), 1);
        assert_eq!(journal.entries(), vec!["stop:cam".to_string()]);
    }
}
