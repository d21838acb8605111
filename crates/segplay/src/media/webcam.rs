//! Webcam capture over nokhwa (feature-gated behind `webcam`).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use nokhwa::Camera;
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, CameraInfo, RequestedFormat, RequestedFormatType};

use super::types::DecodedFrame;
use crate::capture::{CaptureDevice, StreamHandle};
use crate::error::CaptureError;

/// The default camera (or a chosen index), opened video-only.
pub struct WebcamDevice {
    index: u32,
    name: String,
}

impl WebcamDevice {
    pub fn new(index: u32) -> Self {
        let name = list_devices()
            .unwrap_or_default()
            .into_iter()
            .find(|(idx, _)| *idx == index)
            .map(|(_, name)| name)
            .unwrap_or_else(|| format!("Camera {index}"));
        Self { index, name }
    }
}

impl CaptureDevice for WebcamDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn acquire_video_stream(&self) -> Result<Box<dyn StreamHandle>, CaptureError> {
        let capture = WebcamCapture::start(self.index, self.name.clone())?;
        Ok(Box::new(capture))
    }
}

/// A running capture thread feeding RGBA frames.
pub struct WebcamCapture {
    frame_rx: Receiver<DecodedFrame>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    label: String,
}

fn requested_format() -> RequestedFormat<'static> {
    RequestedFormat::new::<RgbAFormat>(RequestedFormatType::AbsoluteHighestFrameRate)
}

impl WebcamCapture {
    /// Validate the camera opens on this thread, then hand it to a capture
    /// thread (`Camera` is `!Send`, so the thread reopens it).
    pub fn start(device_index: u32, label: String) -> Result<Self, CaptureError> {
        let (frame_tx, frame_rx) = crossbeam_channel::bounded(2);
        let shutdown = Arc::new(AtomicBool::new(false));

        {
            let mut camera = Camera::new(CameraIndex::Index(device_index), requested_format())
                .map_err(|e| classify_camera_error(&e.to_string()))?;
            camera
                .open_stream()
                .map_err(|e| classify_camera_error(&e.to_string()))?;
            let r = camera.resolution();
            log::info!(
                "Webcam validated: {}x{} on device {device_index}",
                r.width(),
                r.height()
            );
            let _ = camera.stop_stream();
        }

        let thread_shutdown = shutdown.clone();
        let handle = std::thread::Builder::new()
            .name("segplay-webcam".into())
            .spawn(move || capture_thread(device_index, frame_tx, thread_shutdown))
            .map_err(|e| CaptureError::Other(format!("failed to spawn webcam thread: {e}")))?;

        Ok(Self {
            frame_rx,
            shutdown,
            thread: Some(handle),
            label,
        })
    }
}

impl StreamHandle for WebcamCapture {
    fn label(&self) -> &str {
        &self.label
    }

    fn frames(&self) -> Option<Receiver<DecodedFrame>> {
        Some(self.frame_rx.clone())
    }

    fn stop_all_tracks(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }

    fn is_running(&self) -> bool {
        if self.shutdown.load(Ordering::Relaxed) {
            return false;
        }
        self.thread.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for WebcamCapture {
    fn drop(&mut self) {
        self.stop_all_tracks();
    }
}

/// List available cameras as `(index, human_name)`.
pub fn list_devices() -> Result<Vec<(u32, String)>, CaptureError> {
    let cameras = nokhwa::query(ApiBackend::Auto)
        .map_err(|e| CaptureError::Other(format!("failed to query cameras: {e}")))?;
    Ok(cameras
        .into_iter()
        .map(|info: CameraInfo| {
            let idx = match info.index() {
                CameraIndex::Index(i) => *i,
                CameraIndex::String(_) => 0,
            };
            (idx, info.human_name().to_string())
        })
        .collect())
}

fn classify_camera_error(err: &str) -> CaptureError {
    let lowered = err.to_lowercase();
    if lowered.contains("busy") {
        CaptureError::Busy(err.to_string())
    } else if lowered.contains("permission") || lowered.contains("not authorized") {
        CaptureError::PermissionDenied
    } else if lowered.contains("no such device") || lowered.contains("not found") {
        CaptureError::NoDevice
    } else {
        CaptureError::Other(err.to_string())
    }
}

fn capture_thread(device_index: u32, frame_tx: Sender<DecodedFrame>, shutdown: Arc<AtomicBool>) {
    let mut camera = match Camera::new(CameraIndex::Index(device_index), requested_format()) {
        Ok(c) => c,
        Err(e) => {
            log::error!("Failed to reopen camera {device_index}: {e}");
            return;
        }
    };
    if let Err(e) = camera.open_stream() {
        log::error!("Failed to open camera {device_index} stream: {e}");
        return;
    }

    const MAX_CONSECUTIVE_PANICS: u32 = 10;
    let mut consecutive_panics: u32 = 0;

    while !shutdown.load(Ordering::Relaxed) {
        match camera.frame() {
            Ok(buffer) => {
                let res = buffer.resolution();
                // Corrupt MJPEG can panic inside the decoder
                let decoded = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    buffer.decode_image::<RgbAFormat>()
                }));
                match decoded {
                    Ok(Ok(img)) => {
                        consecutive_panics = 0;
                        let frame = DecodedFrame {
                            data: img.into_raw(),
                            width: res.width(),
                            height: res.height(),
                        };
                        // Drop the frame if the consumer is behind
                        let _ = frame_tx.try_send(frame);
                    }
                    Ok(Err(e)) => log::warn!("Failed to decode webcam frame: {e}"),
                    Err(_) => {
                        consecutive_panics += 1;
                        log::warn!(
                            "Skipped corrupted webcam frame ({consecutive_panics}/{MAX_CONSECUTIVE_PANICS})"
                        );
                        if consecutive_panics >= MAX_CONSECUTIVE_PANICS {
                            log::error!("Webcam producing only corrupted frames, stopping capture");
                            break;
                        }
                        std::thread::sleep(std::time::Duration::from_millis(50));
                    }
                }
            }
            Err(e) => {
                if !shutdown.load(Ordering::Relaxed) {
                    log::warn!("Webcam frame error: {e}");
                    std::thread::sleep(std::time::Duration::from_millis(10));
                }
            }
        }
    }

    let _ = camera.stop_stream();
    log::info!("Webcam capture stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_errors_are_classified() {
        assert!(matches!(
            classify_camera_error("Device or resource busy"),
            CaptureError::Busy(_)
        ));
        assert_eq!(
            classify_camera_error("Permission denied (os error 13)"),
            CaptureError::PermissionDenied
        );
        assert_eq!(classify_camera_error("No such device"), CaptureError::NoDevice);
        assert!(matches!(classify_camera_error("weird"), CaptureError::Other(_)));
    }
}
