use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use clap::Parser;

use segplay::media::FrameEngine;
use segplay::{
    CaptureDevice, ContainerSize, MaskOptions, PlayerEvent, PlayerSettings, SegmentationVideo,
    SegmenterRuntime,
};

#[derive(Debug, Parser)]
#[command(
    name = "segplay",
    about = "Play a media source headlessly and run person segmentation on it",
    disable_help_subcommand = true
)]
struct Args {
    /// Media file to play (image, GIF or video).
    src: Option<String>,

    /// Capture from the camera with this index instead of a file.
    #[arg(long = "camera")]
    camera: Option<u32>,

    #[arg(long = "loop")]
    looping: bool,

    /// Run segmentation on displayed frames.
    #[arg(long = "active")]
    active: bool,

    #[arg(long = "mute")]
    mute: bool,

    /// Playback rate multiplier.
    #[arg(long = "rate")]
    rate: Option<String>,

    /// How long to run before exiting.
    #[arg(long = "seconds", default_value_t = 10.0, value_parser = parse_seconds)]
    seconds: f64,

    /// Segmentation runtime (auto, noop, ort).
    #[arg(long = "runtime")]
    runtime: Option<SegmenterRuntime>,

    /// Directory holding the segmentation model.
    #[arg(long = "solution-path")]
    solution_path: Option<String>,

    /// Container size as WIDTHxHEIGHT.
    #[arg(long = "size", default_value = "1280x720", value_parser = parse_size)]
    size: (f64, f64),
}

fn parse_size(value: &str) -> Result<(f64, f64), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("bad size '{value}', expected WIDTHxHEIGHT"))?;
    let dim = |raw: &str| -> Result<f64, String> {
        let parsed: f64 = raw
            .trim()
            .parse()
            .map_err(|_| format!("bad dimension '{raw}' in '{value}'"))?;
        if parsed.is_finite() && parsed > 0.0 {
            Ok(parsed)
        } else {
            Err(format!("dimensions must be positive, got '{raw}'"))
        }
    };
    Ok((dim(w)?, dim(h)?))
}

fn parse_seconds(value: &str) -> Result<f64, String> {
    let parsed: f64 = value
        .parse()
        .map_err(|_| format!("bad duration '{value}'"))?;
    if parsed.is_finite() && parsed >= 0.0 {
        Ok(parsed)
    } else {
        Err("duration must be zero or more seconds".to_string())
    }
}

#[cfg(feature = "webcam")]
fn open_camera(index: Option<u32>) -> Option<Arc<dyn CaptureDevice>> {
    let device = segplay::media::webcam::WebcamDevice::new(index.unwrap_or(0));
    log::info!("Camera: {}", device.name());
    Some(Arc::new(device))
}

#[cfg(not(feature = "webcam"))]
fn open_camera(index: Option<u32>) -> Option<Arc<dyn CaptureDevice>> {
    if index.is_some() {
        log::warn!("Built without the `webcam` feature; --camera is ignored");
    }
    None
}

fn log_event(event: &PlayerEvent, mask_options: &MaskOptions) {
    match event {
        PlayerEvent::TimeUpdated { current_time } => {
            log::debug!("time-updated {current_time:.0}ms");
        }
        PlayerEvent::SourceChanged {
            source,
            error: Some(error),
        } => log::warn!("source-changed {source:?}: {error}"),
        PlayerEvent::SourceChanged { source, error: None } => {
            log::info!("source-changed {source:?}");
        }
        PlayerEvent::LayoutChanged(rect) => log::info!(
            "layout-changed {:.0}x{:.0} at ({:.0}, {:.0})",
            rect.width,
            rect.height,
            rect.x,
            rect.y
        ),
        PlayerEvent::SegmentationResult(result) => {
            let (w, h) = result.frame_size();
            match result.to_binary_mask(mask_options) {
                Ok(Some(_)) => log::info!("{} people in {w}x{h} frame", result.people().len()),
                Ok(None) => log::debug!("nobody in {w}x{h} frame"),
                Err(e) => log::warn!("mask render failed: {e}"),
            }
        }
        other => log::info!("{}", other.name()),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    if args.src.is_none() && args.camera.is_none() {
        bail!("nothing to play: pass a SRC or --camera");
    }
    let mut settings = PlayerSettings::load();
    if let Some(runtime) = args.runtime {
        settings.segmenter.runtime = runtime;
    }
    log::info!(
        "Segmentation runtimes compiled in: {:?}",
        SegmenterRuntime::available()
    );

    let camera = open_camera(args.camera);
    let mut video = SegmentationVideo::new(Box::new(FrameEngine::new()), camera, &settings);
    let events = video.subscribe();

    if let Some(src) = args.src.as_deref() {
        video.set_option("src", Some(src))?;
    }
    if args.camera.is_some() {
        video.set_option("usecamera", Some(""))?;
    }
    if args.looping {
        video.set_option("islooping", Some(""))?;
    }
    if args.active {
        video.set_option("active", Some(""))?;
    }
    if args.mute {
        video.set_option("mute", Some(""))?;
    }
    if let Some(rate) = args.rate.as_deref() {
        video.set_option("playbackrate", Some(rate))?;
    }
    if let Some(path) = args.solution_path.as_deref() {
        video.set_option("solutionpath", Some(path))?;
    }
    video.set_option("autoplay", Some(""))?;

    let start = Instant::now();
    video.mount(ContainerSize::new(args.size.0, args.size.1), start);

    let frame_interval = settings.display_interval();
    let deadline = start + Duration::from_secs_f64(args.seconds);
    let mask_options = MaskOptions::default();
    while Instant::now() < deadline {
        let now = Instant::now();
        video.update(now);
        video.on_display_frame(now);
        for event in events.try_iter() {
            log_event(&event, &mask_options);
        }
        thread::sleep(frame_interval.saturating_sub(now.elapsed()));
    }

    let ticks = video.scheduler().ticks();
    let submissions = video.scheduler().submissions();
    video.unmount();
    log::info!("Done: {ticks} display frames, {submissions} inference calls");
    Ok(())
}
