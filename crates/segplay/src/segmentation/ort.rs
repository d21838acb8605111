//! ONNX Runtime selfie segmentation (feature-gated behind `onnx`).

use std::path::{Path, PathBuf};

use image::RgbaImage;
use image::imageops::{self, FilterType};
use ndarray::Array4;
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::backend::{ModelType, SegmentationBackend, SegmenterConfig, check_image};
use super::result::{Person, SegmentationMask};
use crate::error::SegmentationError;

const PERSON_VALUE: u8 = 1;

#[derive(Debug, Default)]
pub struct OrtSegmenter {
    session: Option<Session>,
    model_type: ModelType,
}

fn model_file(model_type: ModelType) -> &'static str {
    match model_type {
        ModelType::General => "selfie_segmentation.onnx",
        ModelType::Landscape => "selfie_segmentation_landscape.onnx",
    }
}

/// A directory resolves to the model file for the variant; a file is used as is.
fn resolve_model_path(solution_path: &str, model_type: ModelType) -> Result<PathBuf, SegmentationError> {
    if solution_path.starts_with("http://") || solution_path.starts_with("https://") {
        return Err(SegmentationError::load(format!(
            "the ort runtime needs a local model, got {solution_path}"
        )));
    }
    let path = Path::new(solution_path);
    if path.is_dir() {
        Ok(path.join(model_file(model_type)))
    } else {
        Ok(path.to_path_buf())
    }
}

impl SegmentationBackend for OrtSegmenter {
    fn name(&self) -> &'static str {
        "ort"
    }

    fn load(&mut self, config: &SegmenterConfig) -> Result<(), SegmentationError> {
        let model_path = resolve_model_path(&config.solution_path, config.model_type)?;
        let session = Session::builder()
            .map_err(|err| SegmentationError::load(format!("failed to build ORT session: {err}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|err| {
                SegmentationError::load(format!("failed to configure ORT optimization: {err}"))
            })?
            .with_intra_threads(2)
            .map_err(|err| SegmentationError::load(format!("failed to set ORT threads: {err}")))?
            .commit_from_file(&model_path)
            .map_err(|err| {
                SegmentationError::load(format!(
                    "failed to load ORT model at {}: {err}",
                    model_path.display()
                ))
            })?;

        log::info!("Loaded selfie segmentation model {}", model_path.display());
        self.session = Some(session);
        self.model_type = config.model_type;
        Ok(())
    }

    fn segment_people(&mut self, image: &RgbaImage) -> Result<Vec<Person>, SegmentationError> {
        let session = self.session.as_mut().ok_or(SegmentationError::NotLoaded)?;
        check_image(image)?;

        let (in_w, in_h) = self.model_type.input_size();
        let input = prepare_input_tensor(image, in_w, in_h)?;
        let tensor = Tensor::from_array(input)
            .map_err(|err| SegmentationError::backend(format!("failed to build ORT tensor: {err}")))?;

        let low_res = {
            let outputs = session
                .run(ort::inputs![tensor])
                .map_err(|err| SegmentationError::backend(format!("ORT inference failed: {err}")))?;
            if outputs.len() == 0 {
                return Err(SegmentationError::backend("ORT returned no outputs"));
            }
            let array = outputs[0].try_extract_array::<f32>().map_err(|err| {
                SegmentationError::backend(format!("failed to read ORT output: {err}"))
            })?;
            array.iter().copied().collect::<Vec<f32>>()
        };

        if low_res.len() != (in_w * in_h) as usize {
            return Err(SegmentationError::backend(format!(
                "unexpected output size {} for {in_w}x{in_h} model",
                low_res.len()
            )));
        }

        let (width, height) = image.dimensions();
        let probabilities = upsample(&low_res, in_w as usize, in_h as usize, width as usize, height as usize);
        let mask = SegmentationMask::from_probabilities(width, height, probabilities, PERSON_VALUE)?;
        Ok(vec![Person {
            label: "person".into(),
            mask,
        }])
    }
}

/// NHWC float input scaled to `0.0..=1.0`.
fn prepare_input_tensor(image: &RgbaImage, width: u32, height: u32) -> Result<Array4<f32>, SegmentationError> {
    let resized = imageops::resize(image, width, height, FilterType::Triangle);
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for pixel in resized.pixels() {
        data.extend(pixel.0[..3].iter().map(|&c| c as f32 / 255.0));
    }
    Array4::from_shape_vec((1, height as usize, width as usize, 3), data).map_err(|err| {
        SegmentationError::backend(format!("failed to build input tensor shape: {err}"))
    })
}

/// Bilinear resize of a single-channel probability map.
fn upsample(src: &[f32], src_w: usize, src_h: usize, dst_w: usize, dst_h: usize) -> Vec<f32> {
    if src_w == dst_w && src_h == dst_h {
        return src.to_vec();
    }
    let mut dst = vec![0.0f32; dst_w * dst_h];
    let scale_x = src_w as f32 / dst_w as f32;
    let scale_y = src_h as f32 / dst_h as f32;

    for y in 0..dst_h {
        let sy = (y as f32 + 0.5) * scale_y - 0.5;
        let y0 = sy.floor().clamp(0.0, (src_h - 1) as f32) as usize;
        let y1 = (y0 + 1).min(src_h - 1);
        let wy = (sy - y0 as f32).clamp(0.0, 1.0);

        for x in 0..dst_w {
            let sx = (x as f32 + 0.5) * scale_x - 0.5;
            let x0 = sx.floor().clamp(0.0, (src_w - 1) as f32) as usize;
            let x1 = (x0 + 1).min(src_w - 1);
            let wx = (sx - x0 as f32).clamp(0.0, 1.0);

            let v00 = src[y0 * src_w + x0];
            let v01 = src[y0 * src_w + x1];
            let v10 = src[y1 * src_w + x0];
            let v11 = src[y1 * src_w + x1];
            let v0 = v00 + (v01 - v00) * wx;
            let v1 = v10 + (v11 - v10) * wx;
            dst[y * dst_w + x] = v0 + (v1 - v0) * wy;
        }
    }
    dst
}
