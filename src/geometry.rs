//! Watermark geometry: logo size, corner margins and the absolute rectangle.
//!
//! The generator always stamps its logo at the bottom-right corner. Size and
//! margins depend only on the image dimensions:
//!
//! | Condition                          | Logo    | Margin |
//! |------------------------------------|---------|--------|
//! | width > 1024 **and** height > 1024 | 96x96   | 64 px  |
//! | width == 1024                      | 48x48   | 8 px   |
//! | width >= 1024 **or** height >= 1024| 48x48   | 32 px  |
//! | otherwise                          | 48x48   | 24 px  |
//!
//! Rules are evaluated top to bottom and the first match wins.

use crate::error::{Error, Result};

/// Dimension above which (on both axes) the large logo is used.
const LARGE_THRESHOLD: u32 = 1024;

/// Watermark size classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatermarkSize {
    /// 48x48 logo.
    Small,
    /// 96x96 logo (images where both dimensions > 1024).
    Large,
}

impl WatermarkSize {
    /// Edge length of the square logo in pixels.
    #[must_use]
    pub const fn pixels(self) -> u32 {
        match self {
            Self::Small => 48,
            Self::Large => 96,
        }
    }
}

/// Generator whose logo is being removed.
///
/// Only selects which reference capture set the engine uses; geometry is the
/// same for every provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WatermarkProvider {
    /// Gemini text/sparkle logo.
    Gemini,
    /// Nano Banana sparkle logo.
    NanoBanana,
    /// Provider not known; the primary (Gemini) captures are used.
    #[default]
    Unknown,
}

/// Watermark size and margins resolved for one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkConfig {
    /// Logo size class.
    pub size: WatermarkSize,
    /// Distance from the right image edge to the logo, in pixels.
    pub margin_right: u32,
    /// Distance from the bottom image edge to the logo, in pixels.
    pub margin_bottom: u32,
    /// Provider the config was resolved for.
    pub provider: WatermarkProvider,
}

impl WatermarkConfig {
    /// Edge length of the logo in pixels.
    #[must_use]
    pub const fn logo_size(&self) -> u32 {
        self.size.pixels()
    }
}

/// Absolute watermark rectangle in source-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl WatermarkRect {
    /// Whether the rectangle lies entirely inside an image of the given size.
    #[must_use]
    pub fn fits_within(&self, image_width: u32, image_height: u32) -> bool {
        self.x
            .checked_add(self.width)
            .is_some_and(|right| right <= image_width)
            && self
                .y
                .checked_add(self.height)
                .is_some_and(|bottom| bottom <= image_height)
    }
}

/// Geometry summary attached to queue entries for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkInfo {
    /// Resolved configuration.
    pub config: WatermarkConfig,
    /// Absolute rectangle derived from the configuration.
    pub rect: WatermarkRect,
}

impl WatermarkInfo {
    /// Logo size class.
    #[must_use]
    pub const fn size(&self) -> WatermarkSize {
        self.config.size
    }

    /// Provider the geometry was resolved for.
    #[must_use]
    pub const fn provider(&self) -> WatermarkProvider {
        self.config.provider
    }
}

/// Resolve watermark size and margins from the image dimensions.
///
/// Every `(width, height)` pair maps to exactly one configuration.
#[must_use]
pub fn resolve(width: u32, height: u32, provider: WatermarkProvider) -> WatermarkConfig {
    let (size, margin) = if width > LARGE_THRESHOLD && height > LARGE_THRESHOLD {
        (WatermarkSize::Large, 64)
    } else if width == LARGE_THRESHOLD {
        // Common generator output width, stamped with a tight margin.
        (WatermarkSize::Small, 8)
    } else if width >= LARGE_THRESHOLD || height >= LARGE_THRESHOLD {
        (WatermarkSize::Small, 32)
    } else {
        (WatermarkSize::Small, 24)
    };

    WatermarkConfig {
        size,
        margin_right: margin,
        margin_bottom: margin,
        provider,
    }
}

/// Compute the absolute watermark rectangle anchored to the bottom-right corner.
///
/// # Errors
///
/// Returns [`Error::ImageTooSmall`] if the logo plus its margin does not fit
/// on either axis.
pub fn compute_rect(width: u32, height: u32, config: &WatermarkConfig) -> Result<WatermarkRect> {
    let logo = config.logo_size();
    let too_small = || Error::ImageTooSmall {
        width,
        height,
        wm_size: logo,
    };

    let x = width
        .checked_sub(config.margin_right)
        .and_then(|v| v.checked_sub(logo))
        .ok_or_else(too_small)?;
    let y = height
        .checked_sub(config.margin_bottom)
        .and_then(|v| v.checked_sub(logo))
        .ok_or_else(too_small)?;

    Ok(WatermarkRect {
        x,
        y,
        width: logo,
        height: logo,
    })
}

/// Resolve the configuration and rectangle in one step.
///
/// # Errors
///
/// Returns [`Error::ImageTooSmall`] if the watermark does not fit.
pub fn watermark_info(width: u32, height: u32, provider: WatermarkProvider) -> Result<WatermarkInfo> {
    let config = resolve(width, height, provider);
    let rect = compute_rect(width, height, &config)?;
    Ok(WatermarkInfo { config, rect })
}
