//! Per-pixel watermark opacity estimation.
//!
//! Two strategies produce an [`AlphaMap`] for a watermark rectangle:
//!
//! - **Reference capture**: the logo rendered over a dark background, where the
//!   brightest channel approximates the overlay opacity. Computed once per
//!   capture and cached by the engine.
//! - **Direct estimate**: brightness of the watermarked region itself, heavily
//!   damped so ordinary bright content is not mistaken for the logo. Computed
//!   fresh for every image.

use image::RgbaImage;

/// Gain applied to reference captures to offset their slight undersaturation.
const REFERENCE_GAIN: f32 = 1.05;

/// Damping applied to direct brightness estimates.
const DIRECT_DAMPING: f32 = 0.3;

/// How the engine estimates watermark opacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphaStrategy {
    /// Brightness of the target region, damped by a conservative factor.
    #[default]
    Direct,
    /// Cached map derived from a clean reference capture of the logo.
    ReferenceCapture,
}

/// Dense opacity values in `[0, 1]`, one per pixel of a watermark rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaMap {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl AlphaMap {
    /// Build a map from row-major values, clamping each into `[0, 1]`.
    ///
    /// Non-finite values become `0.0`. Returns `None` if
    /// `values.len() != width * height`.
    #[must_use]
    pub fn from_values(width: u32, height: u32, values: Vec<f32>) -> Option<Self> {
        if values.len() != (width as usize) * (height as usize) {
            return None;
        }
        let values = values
            .into_iter()
            .map(|v| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 })
            .collect();
        Some(Self {
            width,
            height,
            values,
        })
    }

    /// Map width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Map height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Opacity at `(x, y)` relative to the rectangle origin, or `None` outside the map.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.values
            .get((y as usize) * (self.width as usize) + x as usize)
            .copied()
    }

    /// Row-major opacity values.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

/// Derive an alpha map from a reference capture of the logo.
///
/// `alpha = min(1, max(R, G, B) / 255 * 1.05)`.
#[must_use]
pub fn from_reference_capture(capture: &RgbaImage) -> AlphaMap {
    let values = capture
        .pixels()
        .map(|px| {
            let max_val = px[0].max(px[1]).max(px[2]);
            (f32::from(max_val) / 255.0 * REFERENCE_GAIN).min(1.0)
        })
        .collect();

    AlphaMap {
        width: capture.width(),
        height: capture.height(),
        values,
    }
}

/// Estimate opacity directly from the watermarked region of the target image.
///
/// `alpha = min(1, (R + G + B) / 3 / 255 * 0.3)`.
#[must_use]
pub fn estimate_direct(region: &RgbaImage) -> AlphaMap {
    let values = region
        .pixels()
        .map(|px| {
            let sum = u16::from(px[0]) + u16::from(px[1]) + u16::from(px[2]);
            let brightness = f32::from(sum) / 3.0;
            (brightness / 255.0 * DIRECT_DAMPING).min(1.0)
        })
        .collect();

    AlphaMap {
        width: region.width(),
        height: region.height(),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn reference_uses_brightest_channel_with_gain() {
        let mut capture = RgbaImage::new(2, 1);
        capture.put_pixel(0, 0, Rgba([0, 100, 20, 255]));
        capture.put_pixel(1, 0, Rgba([250, 0, 0, 255]));

        let map = from_reference_capture(&capture);
        assert_eq!((map.width(), map.height()), (2, 1));

        let expected = 100.0 / 255.0 * 1.05;
        assert!((map.get(0, 0).unwrap() - expected).abs() < 1e-6);
        // 250/255 * 1.05 > 1 saturates
        assert!((map.get(1, 0).unwrap() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn reference_of_black_capture_is_transparent() {
        let capture = RgbaImage::from_pixel(48, 48, Rgba([0, 0, 0, 255]));
        let map = from_reference_capture(&capture);
        assert_eq!(map.values().len(), 48 * 48);
        assert!(map.values().iter().all(|&a| a == 0.0));
    }

    #[test]
    fn direct_estimate_is_damped_brightness() {
        let mut region = RgbaImage::new(3, 1);
        region.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        region.put_pixel(1, 0, Rgba([30, 60, 90, 255]));
        region.put_pixel(2, 0, Rgba([0, 0, 0, 0]));

        let map = estimate_direct(&region);
        assert!((map.get(0, 0).unwrap() - 0.3).abs() < 1e-6);
        let expected = 60.0 / 255.0 * 0.3;
        assert!((map.get(1, 0).unwrap() - expected).abs() < 1e-6);
        assert!(map.get(2, 0).unwrap().abs() < f32::EPSILON);
    }

    #[test]
    fn direct_estimate_never_exceeds_damping() {
        let region = RgbaImage::from_fn(16, 16, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            let v = ((x * 16 + y) % 256) as u8;
            Rgba([v, 255 - v, v / 2, 255])
        });
        let map = estimate_direct(&region);
        for &a in map.values() {
            assert!((0.0..=0.3 + 1e-6).contains(&a));
        }
    }

    #[test]
    fn from_values_validates_length_and_clamps() {
        assert!(AlphaMap::from_values(2, 2, vec![0.5; 3]).is_none());

        let map = AlphaMap::from_values(2, 1, vec![-0.5, 1.5]).unwrap();
        assert!(map.get(0, 0).unwrap().abs() < f32::EPSILON);
        assert!((map.get(1, 0).unwrap() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn from_values_zeroes_non_finite() {
        let map =
            AlphaMap::from_values(3, 1, vec![f32::NAN, f32::INFINITY, f32::NEG_INFINITY]).unwrap();
        assert!(map.values().iter().all(|&a| a == 0.0));
    }

    #[test]
    fn get_outside_map_is_none() {
        let map = AlphaMap::from_values(2, 2, vec![0.5; 4]).unwrap();
        assert_eq!(map.get(1, 1), Some(0.5));
        assert_eq!(map.get(2, 0), None);
        assert_eq!(map.get(0, 2), None);
    }
}
