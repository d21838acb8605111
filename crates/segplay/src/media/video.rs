//! Video pre-decode via ffmpeg subprocess (feature-gated behind `video`).
//!
//! `ffprobe` reads dimensions, frame rate and duration; a single
//! `ffmpeg -f rawvideo -pix_fmt rgba` run then decodes every frame into
//! memory so seeking is instant.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use serde::Deserialize;

use super::types::DecodedFrame;
use crate::error::EngineError;

/// Longest clip (seconds) that will be pre-decoded.
pub const MAX_PREDECODE_SECS: f64 = 60.0;

/// Check if ffmpeg/ffprobe are available on the system. Cached per process.
pub fn ffmpeg_available() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(|| {
        Command::new("ffprobe")
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoMeta {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub duration_secs: f64,
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

pub fn probe_video(path: &Path) -> Result<VideoMeta, EngineError> {
    let output = Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_streams", "-show_format"])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| EngineError::Decode(format!("ffprobe failed to execute: {e}")))?;

    if !output.status.success() {
        return Err(EngineError::Decode("ffprobe returned non-zero exit code".into()));
    }

    parse_probe(&output.stdout)
}

fn parse_probe(json: &[u8]) -> Result<VideoMeta, EngineError> {
    let probe: ProbeOutput = serde_json::from_slice(json)
        .map_err(|e| EngineError::Decode(format!("failed to parse ffprobe JSON: {e}")))?;

    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| EngineError::Decode("no video stream found".into()))?;

    let (Some(width), Some(height)) = (stream.width, stream.height) else {
        return Err(EngineError::Decode("video stream has no dimensions".into()));
    };

    let fps = parse_frame_rate(stream.r_frame_rate.as_deref().unwrap_or("30/1"));
    let duration_secs = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(stream.duration.as_deref())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(VideoMeta {
        width,
        height,
        fps,
        duration_secs,
    })
}

fn parse_frame_rate(rate: &str) -> f64 {
    if let Some((num, den)) = rate.split_once('/') {
        let n: f64 = num.parse().unwrap_or(30.0);
        let d: f64 = den.parse().unwrap_or(1.0);
        if d > 0.0 && n > 0.0 { n / d } else { 30.0 }
    } else {
        rate.parse().ok().filter(|r: &f64| *r > 0.0).unwrap_or(30.0)
    }
}

/// Pre-decode all frames. Returns `(frames, delays_ms)`.
pub fn decode_all_frames(
    path: &Path,
    meta: &VideoMeta,
) -> Result<(Vec<DecodedFrame>, Vec<u32>), EngineError> {
    let frame_size = (meta.width as usize) * (meta.height as usize) * 4;
    let delay_ms = ((1000.0 / meta.fps).round() as u32).max(1);

    let est_frames = (meta.duration_secs * meta.fps).ceil() as usize;
    log::info!(
        "Pre-decoding video: ~{} frames, ~{}MB RAM",
        est_frames,
        (est_frames * frame_size) / (1024 * 1024),
    );

    let mut child = Command::new("ffmpeg")
        .arg("-i")
        .arg(path)
        .args([
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", meta.width, meta.height),
            "-v",
            "quiet",
            "pipe:1",
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| EngineError::Decode(format!("failed to spawn ffmpeg: {e}")))?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| EngineError::Decode("ffmpeg: no stdout pipe".into()))?;

    let mut frames = Vec::with_capacity(est_frames);
    let mut buf = vec![0u8; frame_size];
    // read_exact fails at EOF
    while stdout.read_exact(&mut buf).is_ok() {
        frames.push(DecodedFrame {
            data: buf.clone(),
            width: meta.width,
            height: meta.height,
        });
    }
    let _ = child.wait();

    if frames.is_empty() {
        return Err(EngineError::Decode("ffmpeg decoded zero frames".into()));
    }

    log::info!("Decoded {} video frames", frames.len());
    let delays_ms = vec![delay_ms; frames.len()];
    Ok((frames, delays_ms))
}
