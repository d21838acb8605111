use serde::{Deserialize, Serialize};

/// Bounds of the component box, in container-local units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ContainerSize {
    pub width: f64,
    pub height: f64,
}

impl ContainerSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// Letterboxed placement of the media inside the container.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VisibleMediaRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl VisibleMediaRect {
    pub fn aspect_ratio(&self) -> f64 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            0.0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Fit media of `media_aspect` (width / height) into the container, centered
/// on whichever axis has slack.
///
/// Returns `None` for a zero-area container or a non-positive aspect ratio;
/// the caller keeps its previous rect in that case.
pub fn compute_letterbox(
    container_w: f64,
    container_h: f64,
    media_aspect: f64,
) -> Option<VisibleMediaRect> {
    if !(container_w > 0.0 && container_h > 0.0) {
        return None;
    }
    if !(media_aspect.is_finite() && media_aspect > 0.0) {
        return None;
    }

    let container_aspect = container_w / container_h;

    let rect = if container_aspect < media_aspect {
        // Media is wider: fit width, bars top/bottom
        let height = (container_w / media_aspect).round().min(container_h);
        VisibleMediaRect {
            x: 0.0,
            y: ((container_h - height) / 2.0).round(),
            width: container_w,
            height,
        }
    } else if container_aspect > media_aspect {
        // Media is taller: fit height, bars left/right
        let width = (container_h * media_aspect).round().min(container_w);
        VisibleMediaRect {
            x: ((container_w - width) / 2.0).round(),
            y: 0.0,
            width,
            height: container_h,
        }
    } else {
        VisibleMediaRect {
            x: 0.0,
            y: 0.0,
            width: container_w,
            height: container_h,
        }
    };

    Some(rect)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pillarbox_for_4_3_media_in_16_9_box() {
        let rect = compute_letterbox(320.0, 180.0, 640.0 / 480.0).unwrap();
        assert_eq!(rect.width, 240.0);
        assert_eq!(rect.height, 180.0);
        assert_eq!(rect.x, 40.0);
        assert_eq!(rect.y, 0.0);
    }

    #[test]
    fn letterbox_for_wide_media_in_square_box() {
        let rect = compute_letterbox(400.0, 400.0, 16.0 / 9.0).unwrap();
        assert_eq!(rect.width, 400.0);
        assert_eq!(rect.height, 225.0);
        assert_eq!(rect.x, 0.0);
        // (400 - 225) / 2 = 87.5 rounds up
        assert_eq!(rect.y, 88.0);
    }

    #[test]
    fn matching_aspect_fills_container() {
        let rect = compute_letterbox(1280.0, 720.0, 16.0 / 9.0).unwrap();
        assert_eq!(
            rect,
            VisibleMediaRect {
                x: 0.0,
                y: 0.0,
                width: 1280.0,
                height: 720.0
            }
        );
    }

    #[test]
    fn zero_area_container_is_ignored() {
        assert!(compute_letterbox(0.0, 180.0, 1.5).is_none());
        assert!(compute_letterbox(320.0, 0.0, 1.5).is_none());
        assert!(compute_letterbox(0.0, 0.0, 1.5).is_none());
    }

    #[test]
    fn invalid_aspect_is_ignored() {
        assert!(compute_letterbox(320.0, 180.0, 0.0).is_none());
        assert!(compute_letterbox(320.0, 180.0, f64::NAN).is_none());
        assert!(compute_letterbox(320.0, 180.0, f64::INFINITY).is_none());
    }

    #[test]
    fn rect_stays_inside_container_and_keeps_aspect() {
        let aspects = [0.25, 0.5625, 0.75, 1.0, 4.0 / 3.0, 16.0 / 9.0, 2.39, 5.0];
        for w in (1..=64).map(|i| i as f64 * 23.0) {
            for h in (1..=64).map(|i| i as f64 * 17.0) {
                for &aspect in &aspects {
                    let rect = compute_letterbox(w, h, aspect).unwrap();
                    assert!(rect.x >= 0.0 && rect.y >= 0.0, "{w}x{h} @ {aspect}: {rect:?}");
                    assert!(rect.x + rect.width <= w, "{w}x{h} @ {aspect}: {rect:?}");
                    assert!(rect.y + rect.height <= h, "{w}x{h} @ {aspect}: {rect:?}");
                    // Rounding moves the constrained side by at most one unit
                    if rect.width >= rect.height {
                        assert!((rect.width / aspect - rect.height).abs() <= 1.0);
                    } else {
                        assert!((rect.height * aspect - rect.width).abs() <= 1.0);
                    }
                }
            }
        }
    }

    #[test]
    fn rect_helpers() {
        let rect = VisibleMediaRect {
            x: 0.0,
            y: 0.0,
            width: 200.0,
            height: 100.0,
        };
        assert!((rect.aspect_ratio() - 2.0).abs() < 1e-12);
        assert!(!rect.is_empty());
        assert!(VisibleMediaRect::default().is_empty());
        assert_eq!(VisibleMediaRect::default().aspect_ratio(), 0.0);
    }
}
