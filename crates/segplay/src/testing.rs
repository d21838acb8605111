//! Test doubles shared across module tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use image::RgbaImage;

use crate::capture::{CaptureDevice, StreamHandle};
use crate::error::{CaptureError, EngineError, SegmentationError};
use crate::media::types::DecodedFrame;
use crate::player::{EngineSignal, MediaEngine, MediaInput, ReadyState, VisibleMediaRect};
use crate::segmentation::{Person, SegmentationBackend, SegmentationMask, SegmenterConfig};

/// Poll `f` until it yields a value or two seconds pass.
pub fn wait_for<T>(mut f: impl FnMut() -> Option<T>) -> Option<T> {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if let Some(value) = f() {
            return Some(value);
        }
        if Instant::now() >= deadline {
            return None;
        }
        thread::sleep(Duration::from_millis(2));
    }
}

/// Ordered record of side effects across doubles.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

// --- Capture ---

pub struct MockStream {
    label: String,
    journal: Journal,
    stops: Counter,
    running: bool,
}

impl MockStream {
    pub fn new(label: &str, journal: &Journal) -> Self {
        Self::with_counter(label, journal, Counter::default())
    }

    fn with_counter(label: &str, journal: &Journal, stops: Counter) -> Self {
        Self {
            label: label.to_string(),
            journal: journal.clone(),
            stops,
            running: true,
        }
    }

    pub fn stop_counter(&self) -> Counter {
        self.stops.clone()
    }
}

impl StreamHandle for MockStream {
    fn label(&self) -> &str {
        &self.label
    }

    fn frames(&self) -> Option<Receiver<DecodedFrame>> {
        None
    }

    fn stop_all_tracks(&mut self) {
        self.running = false;
        self.stops.bump();
        self.journal.record(format!("stop:{}", self.label));
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

pub struct MockCamera {
    label: String,
    journal: Journal,
    failure: Option<CaptureError>,
    acquires: Counter,
    stops: Counter,
}

impl MockCamera {
    pub fn new(label: &str, journal: &Journal) -> Self {
        Self {
            label: label.to_string(),
            journal: journal.clone(),
            failure: None,
            acquires: Counter::default(),
            stops: Counter::default(),
        }
    }

    pub fn failing(error: CaptureError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new("broken", &Journal::default())
        }
    }

    pub fn acquire_calls(&self) -> usize {
        self.acquires.get()
    }

    /// Stops across every stream this camera handed out.
    pub fn stops(&self) -> usize {
        self.stops.get()
    }
}

impl CaptureDevice for MockCamera {
    fn name(&self) -> &str {
        &self.label
    }

    fn acquire_video_stream(&self) -> Result<Box<dyn StreamHandle>, CaptureError> {
        self.acquires.bump();
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        Ok(Box::new(MockStream::with_counter(
            &self.label,
            &self.journal,
            self.stops.clone(),
        )))
    }
}

// --- Engine ---

#[derive(Debug)]
struct EngineInner {
    bound: Option<String>,
    playing: bool,
    time: f64,
    duration: f64,
    rate: f64,
    looping: bool,
    muted: bool,
    hidden: bool,
    natural: (u32, u32),
    ready: ReadyState,
    layout: Option<VisibleMediaRect>,
    capture_size: Option<(u32, u32)>,
    play_calls: usize,
    signals: Vec<EngineSignal>,
}

impl Default for EngineInner {
    fn default() -> Self {
        Self {
            bound: None,
            playing: false,
            time: 0.0,
            duration: 0.0,
            rate: 1.0,
            looping: false,
            muted: false,
            hidden: false,
            natural: (0, 0),
            ready: ReadyState::HaveNothing,
            layout: None,
            capture_size: None,
            play_calls: 0,
            signals: Vec::new(),
        }
    }
}

/// Scriptable engine; clones share state so tests keep a handle after
/// boxing one into the controller.
#[derive(Clone)]
pub struct MockEngine {
    inner: Arc<Mutex<EngineInner>>,
    journal: Journal,
}

impl MockEngine {
    pub fn new(journal: &Journal) -> Self {
        Self {
            inner: Arc::default(),
            journal: journal.clone(),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut EngineInner) -> R) -> R {
        f(&mut self.inner.lock().unwrap())
    }

    /// Metadata and first data arrive for the bound input.
    pub fn load(&self, duration_secs: f64, width: u32, height: u32) {
        self.with(|e| {
            e.natural = (width, height);
            e.duration = duration_secs;
            e.ready = ReadyState::HaveEnoughData;
            e.signals.push(EngineSignal::MetadataLoaded);
            e.signals.push(EngineSignal::DataLoaded);
        });
    }

    pub fn reach_end(&self) {
        self.with(|e| {
            if e.looping {
                e.time = 0.0;
                e.signals.push(EngineSignal::Playing);
            } else {
                e.playing = false;
                e.time = e.duration;
                e.signals.push(EngineSignal::Paused);
                e.signals.push(EngineSignal::Ended);
            }
        });
    }

    /// The engine reports a media error for the bound input.
    pub fn fail(&self, message: &str) {
        self.with(|e| e.signals.push(EngineSignal::Error(message.to_string())));
    }

    pub fn set_time(&self, secs: f64) {
        self.with(|e| e.time = secs);
    }

    /// Make captures come back at a size other than the natural one.
    pub fn set_capture_size(&self, size: Option<(u32, u32)>) {
        self.with(|e| e.capture_size = size);
    }

    pub fn bound(&self) -> Option<String> {
        self.with(|e| e.bound.clone())
    }

    pub fn layout(&self) -> Option<VisibleMediaRect> {
        self.with(|e| e.layout)
    }

    pub fn time(&self) -> f64 {
        self.with(|e| e.time)
    }

    pub fn rate(&self) -> f64 {
        self.with(|e| e.rate)
    }

    pub fn muted(&self) -> bool {
        self.with(|e| e.muted)
    }

    pub fn looping(&self) -> bool {
        self.with(|e| e.looping)
    }

    pub fn hidden(&self) -> bool {
        self.with(|e| e.hidden)
    }

    pub fn play_calls(&self) -> usize {
        self.with(|e| e.play_calls)
    }
}

impl MediaEngine for MockEngine {
    fn set_source(&mut self, input: MediaInput) {
        self.journal.record(format!("bind:{}", input.label()));
        self.with(|e| {
            e.bound = Some(input.label().to_string());
            e.playing = false;
            e.time = 0.0;
            e.duration = 0.0;
            e.natural = (0, 0);
            e.ready = ReadyState::HaveNothing;
            e.signals.clear();
        });
    }

    fn clear_source(&mut self) {
        self.with(|e| {
            e.bound = None;
            e.playing = false;
            e.ready = ReadyState::HaveNothing;
            e.signals.clear();
        });
    }

    fn play(&mut self) -> Result<(), EngineError> {
        self.with(|e| {
            e.play_calls += 1;
            if e.bound.is_none() {
                return Err(EngineError::NoSource);
            }
            if !e.playing {
                e.playing = true;
                e.signals.push(EngineSignal::Playing);
            }
            Ok(())
        })
    }

    fn pause(&mut self) {
        self.with(|e| {
            if e.playing {
                e.playing = false;
                e.signals.push(EngineSignal::Paused);
            }
        });
    }

    fn current_time(&self) -> f64 {
        self.time()
    }

    fn set_current_time(&mut self, secs: f64) {
        self.set_time(secs);
    }

    fn duration(&self) -> f64 {
        self.with(|e| e.duration)
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.with(|e| e.rate = rate);
    }

    fn set_looping(&mut self, looping: bool) {
        self.with(|e| e.looping = looping);
    }

    fn set_muted(&mut self, muted: bool) {
        self.with(|e| e.muted = muted);
    }

    fn set_hidden(&mut self, hidden: bool) {
        self.with(|e| e.hidden = hidden);
    }

    fn natural_size(&self) -> (u32, u32) {
        self.with(|e| e.natural)
    }

    fn ready_state(&self) -> ReadyState {
        self.with(|e| e.ready)
    }

    fn capture_frame(&self) -> Option<RgbaImage> {
        self.with(|e| {
            if !e.ready.can_capture() {
                return None;
            }
            let (w, h) = e.capture_size.unwrap_or(e.natural);
            Some(RgbaImage::from_pixel(w, h, image::Rgba([40, 80, 120, 255])))
        })
    }

    fn apply_layout(&mut self, rect: VisibleMediaRect) {
        self.with(|e| e.layout = Some(rect));
    }

    fn poll_signals(&mut self) -> Vec<EngineSignal> {
        self.with(|e| std::mem::take(&mut e.signals))
    }
}

// --- Segmentation ---

#[derive(Debug, Default)]
struct ControlInner {
    hold: AtomicBool,
    fail_segments: AtomicBool,
    segment_calls: AtomicUsize,
    loads: AtomicUsize,
    fail_next_load: Mutex<Option<SegmentationError>>,
    last_solution_path: Mutex<Option<String>>,
    last_frame_size: Mutex<Option<(u32, u32)>>,
}

/// Test-side handle onto a [`MockBackend`] running on the worker thread.
#[derive(Debug, Clone, Default)]
pub struct BackendControl(Arc<ControlInner>);

impl BackendControl {
    /// While held, `segment_people` blocks.
    pub fn hold(&self, hold: bool) {
        self.0.hold.store(hold, Ordering::SeqCst);
    }

    pub fn fail_segments(&self, fail: bool) {
        self.0.fail_segments.store(fail, Ordering::SeqCst);
    }

    pub fn fail_next_load(&self, error: SegmentationError) {
        *self.0.fail_next_load.lock().unwrap() = Some(error);
    }

    pub fn segment_calls(&self) -> usize {
        self.0.segment_calls.load(Ordering::SeqCst)
    }

    pub fn loads(&self) -> usize {
        self.0.loads.load(Ordering::SeqCst)
    }

    pub fn last_solution_path(&self) -> Option<String> {
        self.0.last_solution_path.lock().unwrap().clone()
    }

    pub fn last_frame_size(&self) -> Option<(u32, u32)> {
        *self.0.last_frame_size.lock().unwrap()
    }
}

/// Finds one person covering the whole frame.
#[derive(Debug, Default)]
pub struct MockBackend {
    control: BackendControl,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn control(&self) -> BackendControl {
        self.control.clone()
    }
}

impl SegmentationBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn load(&mut self, config: &SegmenterConfig) -> Result<(), SegmentationError> {
        let p = &self.control.0;
        p.loads.fetch_add(1, Ordering::SeqCst);
        *p.last_solution_path.lock().unwrap() = Some(config.solution_path.clone());
        match p.fail_next_load.lock().unwrap().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn segment_people(&mut self, image: &RgbaImage) -> Result<Vec<Person>, SegmentationError> {
        let p = &self.control.0;
        p.segment_calls.fetch_add(1, Ordering::SeqCst);
        while p.hold.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }
        let (w, h) = image.dimensions();
        *p.last_frame_size.lock().unwrap() = Some((w, h));
        if p.fail_segments.load(Ordering::SeqCst) {
            return Err(SegmentationError::backend("mock failure"));
        }
        let mask =
            SegmentationMask::from_probabilities(w, h, vec![1.0; w as usize * h as usize], 1)?;
        Ok(vec![Person {
            label: "person".into(),
            mask,
        }])
    }
}
