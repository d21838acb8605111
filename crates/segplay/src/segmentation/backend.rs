use std::fmt;
use std::str::FromStr;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use super::result::Person;
use crate::error::SegmentationError;

#[cfg(feature = "onnx")]
use super::ort::OrtSegmenter;

pub const DEFAULT_SOLUTION_PATH: &str = "https://cdn.jsdelivr.net/npm/@mediapipe/selfie_segmentation";

/// External person-segmentation engine. Runs on the inference worker thread.
pub trait SegmentationBackend: Send {
    fn name(&self) -> &'static str;

    fn load(&mut self, config: &SegmenterConfig) -> Result<(), SegmentationError>;

    /// Fails with `NotLoaded` before a successful `load`, and with
    /// `InvalidImage` for an empty frame.
    fn segment_people(&mut self, image: &RgbaImage) -> Result<Vec<Person>, SegmentationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmenterRuntime {
    Auto,
    Noop,
    #[cfg(feature = "onnx")]
    Ort,
}

/// Selfie segmentation model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    #[default]
    General,
    Landscape,
}

impl ModelType {
    /// Model input as `(width, height)`.
    pub fn input_size(self) -> (u32, u32) {
        match self {
            ModelType::General => (256, 256),
            ModelType::Landscape => (256, 144),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmenterConfig {
    #[serde(default = "default_runtime")]
    pub runtime: SegmenterRuntime,
    #[serde(default = "default_solution_path")]
    pub solution_path: String,
    #[serde(default)]
    pub model_type: ModelType,
}

fn default_runtime() -> SegmenterRuntime { SegmenterRuntime::Auto }
fn default_solution_path() -> String { DEFAULT_SOLUTION_PATH.to_string() }

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            runtime: default_runtime(),
            solution_path: default_solution_path(),
            model_type: ModelType::General,
        }
    }
}

impl SegmenterConfig {
    /// Config with the `solutionpath` override applied.
    pub fn with_solution_path(&self, path: Option<&str>) -> Self {
        let mut config = self.clone();
        if let Some(path) = path {
            config.solution_path = path.to_string();
        }
        config
    }
}

impl SegmenterRuntime {
    pub fn as_str(self) -> &'static str {
        match self {
            SegmenterRuntime::Auto => "auto",
            SegmenterRuntime::Noop => "noop",
            #[cfg(feature = "onnx")]
            SegmenterRuntime::Ort => "ort",
        }
    }

    /// Concrete runtimes compiled in, preferred first.
    pub fn available() -> Vec<SegmenterRuntime> {
        vec![
            #[cfg(feature = "onnx")]
            SegmenterRuntime::Ort,
            SegmenterRuntime::Noop,
        ]
    }

    pub fn create_backend(self) -> Box<dyn SegmentationBackend> {
        match self {
            SegmenterRuntime::Auto => {
                let preferred = Self::available()
                    .into_iter()
                    .next()
                    .unwrap_or(SegmenterRuntime::Noop);
                preferred.create_backend()
            }
            SegmenterRuntime::Noop => Box::new(NoopSegmenter::default()),
            #[cfg(feature = "onnx")]
            SegmenterRuntime::Ort => Box::new(OrtSegmenter::default()),
        }
    }
}

impl fmt::Display for SegmenterRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SegmenterRuntime {
    type Err = SegmentationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(SegmenterRuntime::Auto),
            "noop" => Ok(SegmenterRuntime::Noop),
            #[cfg(feature = "onnx")]
            "ort" => Ok(SegmenterRuntime::Ort),
            other => Err(SegmentationError::backend(format!(
                "unknown segmentation runtime '{other}'"
            ))),
        }
    }
}

/// Loads instantly and never finds anyone.
#[derive(Debug, Default)]
pub struct NoopSegmenter {
    loaded: bool,
}

impl SegmentationBackend for NoopSegmenter {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn load(&mut self, _config: &SegmenterConfig) -> Result<(), SegmentationError> {
        self.loaded = true;
        Ok(())
    }

    fn segment_people(&mut self, image: &RgbaImage) -> Result<Vec<Person>, SegmentationError> {
        if !self.loaded {
            return Err(SegmentationError::NotLoaded);
        }
        check_image(image)?;
        Ok(Vec::new())
    }
}

pub(crate) fn check_image(image: &RgbaImage) -> Result<(), SegmentationError> {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return Err(SegmentationError::InvalidImage(format!("empty frame {w}x{h}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_parsing() {
        assert_eq!("AUTO".parse::<SegmenterRuntime>().unwrap(), SegmenterRuntime::Auto);
        assert_eq!(" noop ".parse::<SegmenterRuntime>().unwrap(), SegmenterRuntime::Noop);
        assert!(matches!(
            "tfjs".parse::<SegmenterRuntime>(),
            Err(SegmentationError::Backend(_))
        ));
        for runtime in SegmenterRuntime::available() {
            assert_eq!(runtime.as_str().parse::<SegmenterRuntime>().unwrap(), runtime);
        }
    }

    #[test]
    fn auto_picks_a_compiled_backend() {
        let backend = SegmenterRuntime::Auto.create_backend();
        assert_eq!(backend.name(), SegmenterRuntime::available()[0].as_str());
    }

    #[test]
    fn noop_requires_load() {
        let mut backend = NoopSegmenter::default();
        let frame = RgbaImage::new(4, 4);
        assert_eq!(backend.segment_people(&frame), Err(SegmentationError::NotLoaded));
        backend.load(&SegmenterConfig::default()).unwrap();
        assert_eq!(backend.segment_people(&frame).unwrap(), Vec::new());
        assert!(matches!(
            backend.segment_people(&RgbaImage::new(0, 4)),
            Err(SegmentationError::InvalidImage(_))
        ));
    }

    #[test]
    fn solution_path_override() {
        let base = SegmenterConfig::default();
        assert_eq!(base.solution_path, DEFAULT_SOLUTION_PATH);
        assert_eq!(base.with_solution_path(None), base);
        let custom = base.with_solution_path(Some("/models/selfie.onnx"));
        assert_eq!(custom.solution_path, "/models/selfie.onnx");
        assert_eq!(custom.model_type, ModelType::General);
    }

    #[test]
    fn model_input_sizes() {
        assert_eq!(ModelType::General.input_size(), (256, 256));
        assert_eq!(ModelType::Landscape.input_size(), (256, 144));
    }
}
