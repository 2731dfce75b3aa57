//! Core watermark removal engine.

use std::path::Path;
use std::sync::OnceLock;

use image::{imageops, Rgba, RgbaImage};
use tracing::debug;

use crate::alpha::{self, AlphaMap, AlphaStrategy};
use crate::blending;
use crate::capture::{CaptureSet, ReferenceCaptures};
use crate::error::Result;
use crate::geometry::{self, WatermarkInfo, WatermarkProvider, WatermarkRect, WatermarkSize};

/// Color of the diagnostic outline.
const DEBUG_OUTLINE_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
/// Thickness of the diagnostic outline in pixels.
const DEBUG_OUTLINE_WIDTH: u32 = 3;

/// Options controlling watermark removal.
#[derive(Debug, Clone, Default)]
pub struct RemovalOptions {
    /// Opacity estimation strategy.
    pub strategy: AlphaStrategy,
    /// Provider used to pick the reference capture set.
    pub provider: WatermarkProvider,
    /// Draw a red outline around the detected region after removal.
    pub debug_outline: bool,
}

/// Anything that can remove the watermark from a single image.
///
/// The processing queue is generic over this so the engine can be swapped in tests.
pub trait WatermarkRemover {
    /// Return a copy of `image` with the watermark removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the watermark geometry does not fit the image or
    /// reconstruction fails.
    fn remove_watermark(&self, image: &RgbaImage) -> Result<RgbaImage>;

    /// Geometry that would be used for an image of the given size.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ImageTooSmall`] if the watermark does not fit.
    fn watermark_info(&self, width: u32, height: u32) -> Result<WatermarkInfo> {
        geometry::watermark_info(width, height, WatermarkProvider::Unknown)
    }
}

/// Write-once reference alpha maps, one slot per capture set and size.
#[derive(Debug, Default)]
struct AlphaCache {
    gemini: [OnceLock<AlphaMap>; 2],
    nano_banana: [OnceLock<AlphaMap>; 2],
}

impl AlphaCache {
    fn slot(&self, set: CaptureSet, size: WatermarkSize) -> &OnceLock<AlphaMap> {
        let slots = match set {
            CaptureSet::Gemini => &self.gemini,
            CaptureSet::NanoBanana => &self.nano_banana,
        };
        match size {
            WatermarkSize::Small => &slots[0],
            WatermarkSize::Large => &slots[1],
        }
    }
}

/// The watermark engine holding reference captures and their cached alpha maps.
///
/// Create once with [`WatermarkEngine::new()`] and reuse for multiple images.
/// Reference alpha maps are derived lazily on first use and kept for the
/// lifetime of the engine.
#[derive(Debug)]
pub struct WatermarkEngine {
    captures: ReferenceCaptures,
    alpha_cache: AlphaCache,
    options: RemovalOptions,
}

impl WatermarkEngine {
    /// Create a new engine from loaded reference captures with default options.
    #[must_use]
    pub fn new(captures: ReferenceCaptures) -> Self {
        Self {
            captures,
            alpha_cache: AlphaCache::default(),
            options: RemovalOptions::default(),
        }
    }

    /// Load reference captures from `dir` and create an engine.
    ///
    /// # Errors
    ///
    /// Fails if a required capture is missing or malformed; no engine is produced.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        Ok(Self::new(ReferenceCaptures::load_dir(dir)?))
    }

    /// Replace the removal options.
    #[must_use]
    pub fn with_options(mut self, options: RemovalOptions) -> Self {
        self.options = options;
        self
    }

    /// Reference alpha map for a provider and size, computed on first request.
    #[must_use]
    pub fn reference_alpha_map(&self, provider: WatermarkProvider, size: WatermarkSize) -> &AlphaMap {
        let (set, capture) = self.captures.select(provider, size);
        self.alpha_cache.slot(set, size).get_or_init(|| {
            debug!(?set, ?size, "deriving reference alpha map");
            alpha::from_reference_capture(capture)
        })
    }

    /// Remove the watermark from an image in-place.
    ///
    /// Returns the rectangle that was reconstructed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ImageTooSmall`] if the image cannot hold the
    /// watermark at its expected position.
    pub fn remove(&self, image: &mut RgbaImage) -> Result<WatermarkRect> {
        let (width, height) = image.dimensions();
        let config = geometry::resolve(width, height, self.options.provider);
        let rect = geometry::compute_rect(width, height, &config)?;

        debug!(
            width,
            height,
            logo = config.logo_size(),
            x = rect.x,
            y = rect.y,
            margin = config.margin_right,
            provider = ?config.provider,
            strategy = ?self.options.strategy,
            "watermark geometry resolved"
        );

        match self.options.strategy {
            AlphaStrategy::Direct => {
                let region =
                    imageops::crop_imm(&*image, rect.x, rect.y, rect.width, rect.height).to_image();
                let alpha_map = alpha::estimate_direct(&region);
                blending::reconstruct(image, rect, &alpha_map)?;
            }
            AlphaStrategy::ReferenceCapture => {
                let alpha_map = self.reference_alpha_map(config.provider, config.size);
                blending::reconstruct(image, rect, alpha_map)?;
            }
        }

        if self.options.debug_outline {
            blending::draw_outline(image, rect, DEBUG_OUTLINE_COLOR, DEBUG_OUTLINE_WIDTH);
        }

        Ok(rect)
    }
}

impl WatermarkRemover for WatermarkEngine {
    fn remove_watermark(&self, image: &RgbaImage) -> Result<RgbaImage> {
        let mut working = image.clone();
        self.remove(&mut working)?;
        Ok(working)
    }

    fn watermark_info(&self, width: u32, height: u32) -> Result<WatermarkInfo> {
        geometry::watermark_info(width, height, self.options.provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captures() -> ReferenceCaptures {
        let small = RgbaImage::from_fn(48, 48, |x, _| {
            if x < 24 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        let large = RgbaImage::from_pixel(96, 96, Rgba([128, 128, 128, 255]));
        ReferenceCaptures::new(small, large).unwrap()
    }

    #[test]
    fn reference_alpha_map_is_cached_per_size() {
        let engine = WatermarkEngine::new(captures());
        let first: *const AlphaMap =
            engine.reference_alpha_map(WatermarkProvider::Unknown, WatermarkSize::Small);
        let second: *const AlphaMap =
            engine.reference_alpha_map(WatermarkProvider::Gemini, WatermarkSize::Small);
        assert!(std::ptr::eq(first, second));

        let large = engine.reference_alpha_map(WatermarkProvider::Unknown, WatermarkSize::Large);
        assert_eq!(large.width(), 96);
        assert!((large.get(0, 0).unwrap() - 128.0 / 255.0 * 1.05).abs() < 1e-6);
    }

    #[test]
    fn separate_engines_do_not_share_cache() {
        let a = WatermarkEngine::new(captures());
        let b = WatermarkEngine::new(captures());
        let ma: *const AlphaMap = a.reference_alpha_map(WatermarkProvider::Unknown, WatermarkSize::Small);
        let mb: *const AlphaMap = b.reference_alpha_map(WatermarkProvider::Unknown, WatermarkSize::Small);
        assert!(!std::ptr::eq(ma, mb));
    }

    #[test]
    fn reference_strategy_only_touches_capture_bright_pixels() {
        let engine = WatermarkEngine::new(captures()).with_options(RemovalOptions {
            strategy: AlphaStrategy::ReferenceCapture,
            ..RemovalOptions::default()
        });
        let mut img = RgbaImage::from_pixel(800, 600, Rgba([10, 10, 10, 255]));
        let rect = WatermarkRect {
            x: 728,
            y: 528,
            width: 48,
            height: 48,
        };
        for y in rect.y..rect.y + 48 {
            for x in rect.x..rect.x + 48 {
                img.put_pixel(x, y, Rgba([240, 240, 240, 255]));
            }
        }

        assert_eq!(engine.remove(&mut img).unwrap(), rect);

        // Left half of the capture is black: alpha 0, pixel untouched.
        assert_eq!(img.get_pixel(730, 540), &Rgba([240, 240, 240, 255]));
        // Right half is white: alpha 1 capped to 0.95.
        // 240 * 0.05 + 10 * 0.95 = 21.5 -> 22
        assert_eq!(img.get_pixel(770, 540), &Rgba([22, 22, 22, 255]));
    }

    #[test]
    fn debug_outline_is_off_by_default() {
        let engine = WatermarkEngine::new(captures());
        let img = RgbaImage::from_pixel(800, 600, Rgba([0, 0, 0, 255]));
        let out = engine.remove_watermark(&img).unwrap();
        assert_eq!(out.get_pixel(728, 528), &Rgba([0, 0, 0, 255]));

        let engine = engine.with_options(RemovalOptions {
            debug_outline: true,
            ..RemovalOptions::default()
        });
        let out = engine.remove_watermark(&img).unwrap();
        assert_eq!(out.get_pixel(728, 528), &DEBUG_OUTLINE_COLOR);
        assert_eq!(out.get_pixel(750, 550), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn remove_watermark_leaves_source_untouched() {
        let engine = WatermarkEngine::new(captures());
        let img = RgbaImage::from_pixel(300, 300, Rgba([200, 200, 200, 255]));
        let mut marked = img.clone();
        marked.put_pixel(240, 240, Rgba([255, 255, 255, 255]));

        let out = engine.remove_watermark(&marked).unwrap();
        assert_eq!(marked.get_pixel(240, 240), &Rgba([255, 255, 255, 255]));
        assert_ne!(out.get_pixel(240, 240), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn too_small_image_fails() {
        let engine = WatermarkEngine::new(captures());
        let img = RgbaImage::new(50, 50);
        assert!(engine.remove_watermark(&img).is_err());
        assert!(WatermarkRemover::watermark_info(&engine, 50, 50).is_err());
    }
}
