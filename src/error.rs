//! Error types for the gemini-watermark-remover crate.

use std::path::PathBuf;

/// Errors that can occur while loading captures, removing watermarks or writing results.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required reference capture could not be read or decoded.
    #[error("failed to load reference capture {}: {source}", path.display())]
    CaptureLoad {
        /// Path of the capture file.
        path: PathBuf,
        /// Underlying decode or read error.
        source: image::ImageError,
    },

    /// A reference capture does not have the square logo-size dimensions.
    #[error("reference capture {name} is {width}x{height}, expected {expected}x{expected}")]
    InvalidCapture {
        /// Capture name (file name or role).
        name: String,
        /// Expected edge length in pixels.
        expected: u32,
        /// Actual width in pixels.
        width: u32,
        /// Actual height in pixels.
        height: u32,
    },

    /// The image is too small to contain a watermark at the expected position.
    #[error("image too small ({width}x{height}) for {wm_size}x{wm_size} watermark")]
    ImageTooSmall {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Expected watermark size in pixels.
        wm_size: u32,
    },

    /// A watermark rectangle does not fit inside the image it is applied to.
    #[error("region {width}x{height} at ({x}, {y}) exceeds {image_width}x{image_height} image")]
    RegionOutOfBounds {
        /// Left edge of the region.
        x: u32,
        /// Top edge of the region.
        y: u32,
        /// Region width.
        width: u32,
        /// Region height.
        height: u32,
        /// Image width.
        image_width: u32,
        /// Image height.
        image_height: u32,
    },

    /// The alpha map dimensions differ from the rectangle it is applied to.
    #[error("alpha map is {actual_width}x{actual_height}, region is {width}x{height}")]
    AlphaMapMismatch {
        /// Region width.
        width: u32,
        /// Region height.
        height: u32,
        /// Alpha map width.
        actual_width: u32,
        /// Alpha map height.
        actual_height: u32,
    },

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred during image processing (load, save, encode).
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
