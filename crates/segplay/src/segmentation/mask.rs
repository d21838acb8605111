use image::{Rgba, RgbaImage};

use super::result::{Color, Person};
use crate::error::SegmentationError;

/// Parameters of a binary mask rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskOptions {
    pub foreground: Color,
    pub background: Color,
    pub draw_contour: bool,
    /// Minimum foreground probability.
    pub threshold: f32,
    /// Mask values that count as foreground.
    pub mask_values: Vec<u8>,
}

impl Default for MaskOptions {
    fn default() -> Self {
        Self {
            foreground: Color::TRANSPARENT,
            background: Color::BLACK,
            draw_contour: false,
            threshold: 0.5,
            mask_values: (0..=255).collect(),
        }
    }
}

/// Turns segmentation output into an image.
pub trait MaskRenderer: Send + Sync {
    fn to_binary_mask(
        &self,
        people: &[Person],
        options: &MaskOptions,
    ) -> Result<Option<RgbaImage>, SegmentationError>;
}

/// Paints foreground where any person passes the value and threshold test,
/// background elsewhere, with an optional red outline on the foreground edge.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryMaskRenderer;

const CONTOUR: Color = Color::RED;

impl MaskRenderer for BinaryMaskRenderer {
    fn to_binary_mask(
        &self,
        people: &[Person],
        options: &MaskOptions,
    ) -> Result<Option<RgbaImage>, SegmentationError> {
        let Some(first) = people.first() else {
            return Ok(None);
        };
        let (width, height) = first.mask.dimensions();
        if let Some(other) = people.iter().find(|p| p.mask.dimensions() != (width, height)) {
            let (w, h) = other.mask.dimensions();
            return Err(SegmentationError::InvalidImage(format!(
                "mask sizes differ: {width}x{height} vs {w}x{h}"
            )));
        }

        let mut accepted = [false; 256];
        for &value in &options.mask_values {
            accepted[value as usize] = true;
        }

        let len = width as usize * height as usize;
        let foreground: Vec<bool> = (0..len)
            .map(|i| {
                people.iter().any(|p| {
                    accepted[p.mask.value(i) as usize] && p.mask.probability(i) >= options.threshold
                })
            })
            .collect();

        let fg = Rgba(options.foreground.to_rgba());
        let bg = Rgba(options.background.to_rgba());
        let edge = Rgba(CONTOUR.to_rgba());
        let is_fg = |x: i64, y: i64| {
            x >= 0
                && y >= 0
                && x < width as i64
                && y < height as i64
                && foreground[(y as usize) * width as usize + x as usize]
        };

        let img = RgbaImage::from_fn(width, height, |x, y| {
            let (xi, yi) = (x as i64, y as i64);
            if !is_fg(xi, yi) {
                return bg;
            }
            if options.draw_contour {
                let inside = |nx: i64, ny: i64| {
                    // Frame edges do not count as a boundary
                    let off_frame = nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64;
                    off_frame || is_fg(nx, ny)
                };
                let on_edge = !(inside(xi - 1, yi)
                    && inside(xi + 1, yi)
                    && inside(xi, yi - 1)
                    && inside(xi, yi + 1));
                if on_edge {
                    return edge;
                }
            }
            fg
        });

        Ok(Some(img))
    }
}
