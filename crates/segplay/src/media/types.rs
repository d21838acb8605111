use image::RgbaImage;

/// A decoded RGBA8 frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub data: Vec<u8>, // RGBA8
    pub width: u32,
    pub height: u32,
}

impl DecodedFrame {
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            data,
            width,
            height,
        }
    }

    /// Copy into an `image` buffer. `None` if the byte count does not match
    /// the dimensions.
    pub fn to_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
    }
}

impl From<RgbaImage> for DecodedFrame {
    fn from(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            data: img.into_raw(),
            width,
            height,
        }
    }
}

/// Transport state of the frame engine.
#[derive(Debug, Clone)]
pub struct TransportState {
    pub playing: bool,
    pub looping: bool,
    pub speed: f64,
    /// Current position in milliseconds.
    pub position: f64,
    /// Total duration in milliseconds. Zero for stills and live input.
    pub duration: f64,
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            playing: false,
            looping: false,
            speed: 1.0,
            position: 0.0,
            duration: 0.0,
        }
    }
}
