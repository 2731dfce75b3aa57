//! Border-aware reconstruction of the watermark region.
//!
//! The pixels under the logo cannot be recovered exactly, so each watermarked
//! pixel is blended toward the average color of the strip bordering the
//! rectangle on its left and top sides:
//!
//! `out = current * (1 - b) + border_avg * b`, with `b = min(alpha, 0.95)`
//!
//! The watermark sits over a low-detail corner in practice, so the result is
//! visually plausible even though it is not content-faithful.

use image::{Rgba, RgbaImage};
use tracing::warn;

use crate::alpha::AlphaMap;
use crate::error::{Error, Result};
use crate::geometry::WatermarkRect;

/// Alpha threshold: ignore pixels with negligible watermark effect (noise).
pub const ALPHA_THRESHOLD: f32 = 0.01;

/// Maximum blend factor, so strong alpha never flattens a pixel to the border color.
pub const MAX_BLEND: f32 = 0.95;

/// Mean RGB of the column left of `rect` and the row above it.
///
/// Returns `None` when the rectangle does not fit inside `image` or touches both
/// the top and left image edges.
#[must_use]
pub fn border_average(image: &RgbaImage, rect: WatermarkRect) -> Option<[f32; 3]> {
    if !rect.fits_within(image.width(), image.height()) {
        return None;
    }

    let mut sum = [0u64; 3];
    let mut count = 0u64;

    let mut add = |px: &Rgba<u8>| {
        for ch in 0..3 {
            sum[ch] += u64::from(px[ch]);
        }
        count += 1;
    };

    if rect.x > 0 {
        for row in 0..rect.height {
            add(image.get_pixel(rect.x - 1, rect.y + row));
        }
    }
    if rect.y > 0 {
        for col in 0..rect.width {
            add(image.get_pixel(rect.x + col, rect.y - 1));
        }
    }

    if count == 0 {
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    let avg = sum.map(|s| (s as f64 / count as f64) as f32);
    Some(avg)
}

/// Remove the watermark from `rect` in-place by blending toward the border color.
///
/// Pixels with alpha below [`ALPHA_THRESHOLD`] are left unchanged, and the alpha
/// channel is never modified. When no border pixels exist the average is black.
///
/// # Errors
///
/// Returns [`Error::RegionOutOfBounds`] if `rect` does not fit inside `image`, or
/// [`Error::AlphaMapMismatch`] if `alpha_map` is not the same size as `rect`.
pub fn reconstruct(image: &mut RgbaImage, rect: WatermarkRect, alpha_map: &AlphaMap) -> Result<()> {
    if !rect.fits_within(image.width(), image.height()) {
        return Err(Error::RegionOutOfBounds {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            image_width: image.width(),
            image_height: image.height(),
        });
    }
    if alpha_map.width() != rect.width || alpha_map.height() != rect.height {
        return Err(Error::AlphaMapMismatch {
            width: rect.width,
            height: rect.height,
            actual_width: alpha_map.width(),
            actual_height: alpha_map.height(),
        });
    }

    let avg = border_average(image, rect).unwrap_or_else(|| {
        warn!(
            x = rect.x,
            y = rect.y,
            "watermark region touches top-left corner, no border samples; filling toward black"
        );
        [0.0; 3]
    });

    for dy in 0..rect.height {
        for dx in 0..rect.width {
            let Some(alpha) = alpha_map.get(dx, dy).filter(|&a| a >= ALPHA_THRESHOLD) else {
                continue;
            };

            let blend = alpha.min(MAX_BLEND);
            let px = image.get_pixel_mut(rect.x + dx, rect.y + dy);
            for ch in 0..3 {
                let current = f32::from(px[ch]);
                let reconstructed = current * (1.0 - blend) + avg[ch] * blend;
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                {
                    px[ch] = reconstructed.round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }

    Ok(())
}

/// Draw a rectangle outline of the given thickness along the inside of `rect`.
///
/// Purely diagnostic. The outline is clipped to the image.
pub fn draw_outline(image: &mut RgbaImage, rect: WatermarkRect, color: Rgba<u8>, thickness: u32) {
    let x_end = rect.x.saturating_add(rect.width).min(image.width());
    let y_end = rect.y.saturating_add(rect.height).min(image.height());
    let t = thickness.min(rect.width).min(rect.height);

    for y in rect.y..y_end {
        for x in rect.x..x_end {
            let on_edge = x < rect.x + t
                || y < rect.y + t
                || x >= (rect.x + rect.width).saturating_sub(t)
                || y >= (rect.y + rect.height).saturating_sub(t);
            if on_edge {
                image.put_pixel(x, y, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: u32, y: u32, size: u32) -> WatermarkRect {
        WatermarkRect {
            x,
            y,
            width: size,
            height: size,
        }
    }

    #[test]
    fn border_average_samples_left_column_and_top_row() {
        let mut img = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        for y in 4..8 {
            img.put_pixel(3, y, Rgba([100, 0, 0, 255]));
        }
        for x in 4..8 {
            img.put_pixel(x, 3, Rgba([0, 200, 0, 255]));
        }

        let avg = border_average(&img, rect(4, 4, 4)).unwrap();
        assert!((avg[0] - 50.0).abs() < 1e-4);
        assert!((avg[1] - 100.0).abs() < 1e-4);
        assert!(avg[2].abs() < 1e-4);
    }

    #[test]
    fn border_average_is_none_at_origin() {
        let img = RgbaImage::new(10, 10);
        assert!(border_average(&img, rect(0, 0, 4)).is_none());
        assert!(border_average(&img, rect(1, 0, 4)).is_some());
    }

    #[test]
    fn border_average_is_none_for_rect_outside_image() {
        let img = RgbaImage::new(10, 10);
        assert!(border_average(&img, rect(8, 8, 4)).is_none());
        assert!(border_average(&img, rect(20, 1, 2)).is_none());
    }

    #[test]
    fn non_finite_alpha_leaves_pixels_untouched() {
        let mut img = RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 255]));
        img.put_pixel(10, 10, Rgba([200, 200, 200, 255]));
        let mut values = vec![0.0; 16];
        values[0] = f32::NAN;
        let map = AlphaMap::from_values(4, 4, values).unwrap();

        reconstruct(&mut img, rect(10, 10, 4), &map).unwrap();
        assert_eq!(img.get_pixel(10, 10), &Rgba([200, 200, 200, 255]));
    }

    #[test]
    fn low_alpha_pixels_are_untouched() {
        let mut img = RgbaImage::from_pixel(20, 20, Rgba([10, 20, 30, 255]));
        img.put_pixel(12, 12, Rgba([200, 210, 220, 255]));
        let before = img.clone();

        let map = AlphaMap::from_values(4, 4, vec![0.009; 16]).unwrap();
        reconstruct(&mut img, rect(10, 10, 4), &map).unwrap();

        assert_eq!(img, before);
    }

    #[test]
    fn blends_toward_border_and_keeps_alpha_channel() {
        let mut img = RgbaImage::from_pixel(20, 20, Rgba([100, 100, 100, 255]));
        for y in 10..14 {
            for x in 10..14 {
                img.put_pixel(x, y, Rgba([200, 200, 200, 77]));
            }
        }

        let map = AlphaMap::from_values(4, 4, vec![0.5; 16]).unwrap();
        reconstruct(&mut img, rect(10, 10, 4), &map).unwrap();

        for y in 10..14 {
            for x in 10..14 {
                assert_eq!(img.get_pixel(x, y), &Rgba([150, 150, 150, 77]));
            }
        }
        // Border untouched
        assert_eq!(img.get_pixel(9, 10), &Rgba([100, 100, 100, 255]));
    }

    #[test]
    fn full_alpha_is_capped_below_border_color() {
        let mut img = RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 255]));
        for y in 10..14 {
            for x in 10..14 {
                img.put_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }

        let map = AlphaMap::from_values(4, 4, vec![1.0; 16]).unwrap();
        reconstruct(&mut img, rect(10, 10, 4), &map).unwrap();

        // 255 * 0.05 = 12.75 -> 13
        assert_eq!(img.get_pixel(11, 11), &Rgba([13, 13, 13, 255]));
    }

    #[test]
    fn output_lies_between_pixel_and_border_color() {
        let mut img = RgbaImage::from_fn(32, 32, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            let v = ((x * 31 + y * 17) % 256) as u8;
            Rgba([v, 255 - v, v ^ 0x5a, 255])
        });
        let before = img.clone();
        #[allow(clippy::cast_precision_loss)]
        let values: Vec<f32> = (0..16 * 16).map(|i| (i % 11) as f32 / 10.0).collect();
        let map = AlphaMap::from_values(16, 16, values).unwrap();
        let region = rect(16, 16, 16);
        let avg = border_average(&img, region).unwrap();

        reconstruct(&mut img, region, &map).unwrap();

        for dy in 0..16 {
            for dx in 0..16 {
                let old = before.get_pixel(16 + dx, 16 + dy);
                let new = img.get_pixel(16 + dx, 16 + dy);
                for ch in 0..3 {
                    let lo = f32::from(old[ch]).min(avg[ch]).floor() - 1.0;
                    let hi = f32::from(old[ch]).max(avg[ch]).ceil() + 1.0;
                    let v = f32::from(new[ch]);
                    assert!(v >= lo && v <= hi, "({dx},{dy}) ch {ch}: {v} not in [{lo}, {hi}]");
                }
            }
        }
    }

    #[test]
    fn origin_rect_fills_toward_black() {
        let mut img = RgbaImage::from_pixel(8, 8, Rgba([200, 100, 50, 255]));
        let map = AlphaMap::from_values(4, 4, vec![0.5; 16]).unwrap();
        reconstruct(&mut img, rect(0, 0, 4), &map).unwrap();
        assert_eq!(img.get_pixel(0, 0), &Rgba([100, 50, 25, 255]));
    }

    #[test]
    fn rejects_out_of_bounds_and_mismatched_maps() {
        let mut img = RgbaImage::new(20, 20);
        let map = AlphaMap::from_values(4, 4, vec![0.5; 16]).unwrap();

        let err = reconstruct(&mut img, rect(18, 18, 4), &map).unwrap_err();
        assert!(matches!(err, Error::RegionOutOfBounds { .. }));

        let err = reconstruct(&mut img, rect(2, 2, 8), &map).unwrap_err();
        assert!(matches!(err, Error::AlphaMapMismatch { .. }));
    }

    #[test]
    fn outline_marks_only_the_border_band() {
        let mut img = RgbaImage::new(20, 20);
        let red = Rgba([255, 0, 0, 255]);
        draw_outline(&mut img, rect(5, 5, 10), red, 3);

        assert_eq!(img.get_pixel(5, 5), &red);
        assert_eq!(img.get_pixel(7, 10), &red);
        assert_eq!(img.get_pixel(14, 14), &red);
        assert_eq!(img.get_pixel(12, 10), &red);
        assert_eq!(img.get_pixel(10, 10), &Rgba([0, 0, 0, 0]));
        assert_eq!(img.get_pixel(4, 4), &Rgba([0, 0, 0, 0]));
        assert_eq!(img.get_pixel(15, 15), &Rgba([0, 0, 0, 0]));
    }
}
