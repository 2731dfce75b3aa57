//! Reference captures of the watermark logo.
//!
//! A capture is the logo rendered over a dark background at one of the two logo
//! sizes. The Gemini pair is required; the Nano Banana pair is optional and each
//! missing size silently falls back to the Gemini capture.

use std::path::Path;

use image::{imageops, RgbaImage};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::geometry::{self, WatermarkConfig, WatermarkProvider, WatermarkSize};

/// File name of the required 48x48 Gemini capture.
pub const GEMINI_SMALL_FILE: &str = "bg_48.png";
/// File name of the required 96x96 Gemini capture.
pub const GEMINI_LARGE_FILE: &str = "bg_96.png";
/// File name of the optional 48x48 Nano Banana capture.
pub const NANO_BANANA_SMALL_FILE: &str = "nano_banana_48.png";
/// File name of the optional 96x96 Nano Banana capture.
pub const NANO_BANANA_LARGE_FILE: &str = "nano_banana_96.png";

/// Which capture set an alpha map was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureSet {
    /// Required Gemini captures.
    Gemini,
    /// Optional Nano Banana captures.
    NanoBanana,
}

/// Loaded reference captures for both logo sizes.
#[derive(Debug, Clone)]
pub struct ReferenceCaptures {
    gemini_small: RgbaImage,
    gemini_large: RgbaImage,
    nano_small: Option<RgbaImage>,
    nano_large: Option<RgbaImage>,
}

impl ReferenceCaptures {
    /// Build from already decoded Gemini captures.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCapture`] if either capture is not logo-size square.
    pub fn new(small: RgbaImage, large: RgbaImage) -> Result<Self> {
        check_size(GEMINI_SMALL_FILE, &small, WatermarkSize::Small)?;
        check_size(GEMINI_LARGE_FILE, &large, WatermarkSize::Large)?;
        Ok(Self {
            gemini_small: small,
            gemini_large: large,
            nano_small: None,
            nano_large: None,
        })
    }

    /// Attach optional Nano Banana captures.
    ///
    /// A capture with the wrong dimensions is dropped with a warning.
    #[must_use]
    pub fn with_nano_banana(mut self, small: Option<RgbaImage>, large: Option<RgbaImage>) -> Self {
        self.nano_small = small.and_then(|img| optional(NANO_BANANA_SMALL_FILE, img, WatermarkSize::Small));
        self.nano_large = large.and_then(|img| optional(NANO_BANANA_LARGE_FILE, img, WatermarkSize::Large));
        self
    }

    /// Load captures from a directory.
    ///
    /// Expects `bg_48.png` and `bg_96.png`; `nano_banana_48.png` and
    /// `nano_banana_96.png` are picked up when present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CaptureLoad`] if a required capture cannot be read, or
    /// [`Error::InvalidCapture`] if it has the wrong dimensions.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let small = load_required(&dir.join(GEMINI_SMALL_FILE))?;
        let large = load_required(&dir.join(GEMINI_LARGE_FILE))?;
        let captures = Self::new(small, large)?;

        let nano_small = load_optional(&dir.join(NANO_BANANA_SMALL_FILE));
        let nano_large = load_optional(&dir.join(NANO_BANANA_LARGE_FILE));
        Ok(captures.with_nano_banana(nano_small, nano_large))
    }

    /// Whether a Nano Banana capture is available for `size`.
    #[must_use]
    pub fn has_nano_banana(&self, size: WatermarkSize) -> bool {
        match size {
            WatermarkSize::Small => self.nano_small.is_some(),
            WatermarkSize::Large => self.nano_large.is_some(),
        }
    }

    /// Pick the capture for a provider and size, falling back to Gemini.
    #[must_use]
    pub fn select(&self, provider: WatermarkProvider, size: WatermarkSize) -> (CaptureSet, &RgbaImage) {
        if provider == WatermarkProvider::NanoBanana {
            let nano = match size {
                WatermarkSize::Small => self.nano_small.as_ref(),
                WatermarkSize::Large => self.nano_large.as_ref(),
            };
            if let Some(capture) = nano {
                return (CaptureSet::NanoBanana, capture);
            }
            debug!(?size, "no Nano Banana capture, using Gemini capture");
        }

        let capture = match size {
            WatermarkSize::Small => &self.gemini_small,
            WatermarkSize::Large => &self.gemini_large,
        };
        (CaptureSet::Gemini, capture)
    }
}

fn check_size(name: &str, img: &RgbaImage, size: WatermarkSize) -> Result<()> {
    let expected = size.pixels();
    if img.width() != expected || img.height() != expected {
        return Err(Error::InvalidCapture {
            name: name.to_string(),
            expected,
            width: img.width(),
            height: img.height(),
        });
    }
    Ok(())
}

fn optional(name: &str, img: RgbaImage, size: WatermarkSize) -> Option<RgbaImage> {
    match check_size(name, &img, size) {
        Ok(()) => Some(img),
        Err(e) => {
            warn!("{e}; using Gemini capture only");
            None
        }
    }
}

fn load_required(path: &Path) -> Result<RgbaImage> {
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|source| Error::CaptureLoad {
            path: path.to_path_buf(),
            source,
        })
}

fn load_optional(path: &Path) -> Option<RgbaImage> {
    if !path.exists() {
        debug!(path = %path.display(), "no Nano Banana capture; using Gemini capture only");
        return None;
    }
    match image::open(path) {
        Ok(img) => {
            debug!(path = %path.display(), "loaded Nano Banana capture");
            Some(img.to_rgba8())
        }
        Err(e) => {
            warn!(path = %path.display(), "Nano Banana capture unavailable ({e}); using Gemini capture only");
            None
        }
    }
}

/// Crop the watermark rectangle out of a watermarked sample to use as a new capture.
///
/// # Errors
///
/// Returns [`Error::ImageTooSmall`] if the resolved rectangle does not fit.
pub fn extract_capture(image: &RgbaImage, config: &WatermarkConfig) -> Result<RgbaImage> {
    let rect = geometry::compute_rect(image.width(), image.height(), config)?;
    Ok(imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image())
}
