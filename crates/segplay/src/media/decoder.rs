use std::fs::File;
use std::path::Path;

use super::types::DecodedFrame;
use crate::error::EngineError;

/// Decoded file media: a still image or pre-decoded timed frames
/// (animated GIF, or video when the `video` feature is on).
#[derive(Debug)]
pub enum MediaSource {
    Static(DecodedFrame),
    Animated {
        frames: Vec<DecodedFrame>,
        delays_ms: Vec<u32>,
    },
}

impl MediaSource {
    pub fn frame_count(&self) -> usize {
        match self {
            MediaSource::Static(_) => 1,
            MediaSource::Animated { frames, .. } => frames.len(),
        }
    }

    pub fn is_animated(&self) -> bool {
        matches!(self, MediaSource::Animated { .. })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            MediaSource::Static(f) => (f.width, f.height),
            MediaSource::Animated { frames, .. } => {
                frames.first().map_or((1, 1), |f| (f.width, f.height))
            }
        }
    }

    /// Total playback length in milliseconds. Zero for stills.
    pub fn duration_ms(&self) -> f64 {
        match self {
            MediaSource::Static(_) => 0.0,
            MediaSource::Animated { delays_ms, .. } => {
                delays_ms.iter().map(|&d| d as f64).sum()
            }
        }
    }

    /// Index of the frame shown at `position_ms`. Past the end clamps to the
    /// last frame.
    pub fn frame_at(&self, position_ms: f64) -> usize {
        let MediaSource::Animated { delays_ms, .. } = self else {
            return 0;
        };
        let mut accum = 0.0;
        for (i, &d) in delays_ms.iter().enumerate() {
            accum += d as f64;
            if accum > position_ms {
                return i;
            }
        }
        delays_ms.len().saturating_sub(1)
    }

    pub fn frame(&self, index: usize) -> Option<&DecodedFrame> {
        match self {
            MediaSource::Static(f) => Some(f),
            MediaSource::Animated { frames, .. } => frames.get(index.min(frames.len().saturating_sub(1))),
        }
    }
}

/// Load an image, animated GIF, or (with `video`) a video file.
pub fn load_media(path: &Path) -> Result<MediaSource, EngineError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "gif" => load_gif(path),
        "mp4" | "mov" | "webm" | "mkv" | "avi" | "m4v" => load_video(path),
        _ => load_static_image(path),
    }
}

fn load_static_image(path: &Path) -> Result<MediaSource, EngineError> {
    let img = image::open(path)
        .map_err(|e| EngineError::Decode(format!("failed to open image: {e}")))?;
    Ok(MediaSource::Static(img.to_rgba8().into()))
}

#[cfg(feature = "video")]
fn load_video(path: &Path) -> Result<MediaSource, EngineError> {
    use super::video;

    if !video::ffmpeg_available() {
        return Err(EngineError::Unsupported(
            "video playback needs ffmpeg and ffprobe on PATH".into(),
        ));
    }
    let meta = video::probe_video(path)?;
    if meta.duration_secs > video::MAX_PREDECODE_SECS {
        return Err(EngineError::Unsupported(format!(
            "video is {:.0}s long, limit is {:.0}s",
            meta.duration_secs,
            video::MAX_PREDECODE_SECS
        )));
    }
    let (frames, delays_ms) = video::decode_all_frames(path, &meta)?;
    Ok(MediaSource::Animated { frames, delays_ms })
}

#[cfg(not(feature = "video"))]
fn load_video(path: &Path) -> Result<MediaSource, EngineError> {
    Err(EngineError::Unsupported(format!(
        "{}: built without the `video` feature",
        path.display()
    )))
}

/// Pre-decode every GIF frame, compositing partial frames onto a canvas.
fn load_gif(path: &Path) -> Result<MediaSource, EngineError> {
    let file =
        File::open(path).map_err(|e| EngineError::Decode(format!("failed to open GIF: {e}")))?;
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::RGBA);
    let mut reader = options
        .read_info(file)
        .map_err(|e| EngineError::Decode(format!("failed to decode GIF: {e}")))?;

    let width = reader.width() as u32;
    let height = reader.height() as u32;

    let mut frames = Vec::new();
    let mut delays_ms = Vec::new();
    let mut canvas = vec![0u8; (width * height * 4) as usize];

    while let Some(frame) = reader
        .read_next_frame()
        .map_err(|e| EngineError::Decode(format!("GIF frame error: {e}")))?
    {
        // Centiseconds, with a 20ms floor for zero-delay frames
        let delay = frame.delay as u32 * 10;
        delays_ms.push(delay.max(20));

        let fx = frame.left as u32;
        let fy = frame.top as u32;
        let fw = frame.width as u32;
        let fh = frame.height as u32;

        for y in 0..fh {
            for x in 0..fw {
                let src_idx = ((y * fw + x) * 4) as usize;
                let dst_x = fx + x;
                let dst_y = fy + y;
                if dst_x < width && dst_y < height {
                    let dst_idx = ((dst_y * width + dst_x) * 4) as usize;
                    let src = &frame.buffer[src_idx..src_idx + 4];
                    if src[3] > 0 {
                        canvas[dst_idx..dst_idx + 4].copy_from_slice(src);
                    }
                }
            }
        }

        frames.push(DecodedFrame {
            data: canvas.clone(),
            width,
            height,
        });
    }

    if frames.is_empty() {
        return Err(EngineError::Decode("GIF has no frames".into()));
    }

    log::info!("Loaded GIF: {}x{}, {} frames", width, height, frames.len());

    Ok(MediaSource::Animated { frames, delays_ms })
}
