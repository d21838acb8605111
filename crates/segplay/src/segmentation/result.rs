use std::fmt;
use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use super::mask::{MaskOptions, MaskRenderer};
use crate::error::SegmentationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::new(0, 0, 0, 0);
    pub const BLACK: Color = Color::new(0, 0, 0, 255);
    pub const WHITE: Color = Color::new(255, 255, 255, 255);
    pub const RED: Color = Color::new(255, 0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Per-pixel segmentation output at frame resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationMask {
    width: u32,
    height: u32,
    /// Class value per pixel (1 = person for the selfie model).
    values: Vec<u8>,
    /// Foreground probability per pixel, in `0.0..=1.0`.
    probabilities: Vec<f32>,
}

impl SegmentationMask {
    pub fn new(
        width: u32,
        height: u32,
        values: Vec<u8>,
        probabilities: Vec<f32>,
    ) -> Result<Self, SegmentationError> {
        let expected = width as usize * height as usize;
        if values.len() != expected || probabilities.len() != expected {
            return Err(SegmentationError::InvalidImage(format!(
                "mask data does not match {width}x{height}: {} values, {} probabilities",
                values.len(),
                probabilities.len()
            )));
        }
        Ok(Self {
            width,
            height,
            values,
            probabilities,
        })
    }

    /// Build a mask from probabilities, assigning `value` where `p >= 0.5`.
    pub fn from_probabilities(
        width: u32,
        height: u32,
        probabilities: Vec<f32>,
        value: u8,
    ) -> Result<Self, SegmentationError> {
        let values = probabilities
            .iter()
            .map(|&p| if p >= 0.5 { value } else { 0 })
            .collect();
        Self::new(width, height, values, probabilities)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn value(&self, index: usize) -> u8 {
        self.values[index]
    }

    pub fn probability(&self, index: usize) -> f32 {
        self.probabilities[index]
    }
}

/// One detected person.
#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub label: String,
    pub mask: SegmentationMask,
}

/// Payload of a segmentation-result event. Mask rendering only happens when
/// [`to_binary_mask`](Self::to_binary_mask) is called.
#[derive(Clone)]
pub struct SegmentationResult {
    people: Arc<Vec<Person>>,
    renderer: Arc<dyn MaskRenderer>,
    frame_size: (u32, u32),
}

impl SegmentationResult {
    pub fn new(people: Vec<Person>, renderer: Arc<dyn MaskRenderer>, frame_size: (u32, u32)) -> Self {
        Self {
            people: Arc::new(people),
            renderer,
            frame_size,
        }
    }

    pub fn people(&self) -> &[Person] {
        &self.people
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    /// Natural size of the frame that was segmented.
    pub fn frame_size(&self) -> (u32, u32) {
        self.frame_size
    }

    /// Render the people as a binary RGBA mask. `None` when nobody was found.
    pub fn to_binary_mask(&self, options: &MaskOptions) -> Result<Option<RgbaImage>, SegmentationError> {
        self.renderer.to_binary_mask(&self.people, options)
    }
}

impl fmt::Debug for SegmentationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentationResult")
            .field("people", &self.people.len())
            .field("frame_size", &self.frame_size)
            .finish()
    }
}
