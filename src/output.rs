//! Output naming and encoding for processed images.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::error::{Error, Result};

/// Suffix appended to the base name of processed files.
const OUTPUT_SUFFIX: &str = "_no_watermark";

/// Canonical file extension for an image MIME type, defaulting to `png`.
#[must_use]
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        _ => "png",
    }
}

/// Guess a MIME type from a file extension.
#[must_use]
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    ImageFormat::from_path(path).ok().map(|f| f.to_mime_type())
}

/// Output file name for a processed image: `<base>_no_watermark.<ext>`.
///
/// The base name is `original_name` without its last extension; the extension
/// comes from [`extension_for_mime`].
#[must_use]
pub fn output_file_name(original_name: &str, mime: &str) -> String {
    let base = match original_name.rfind('.') {
        Some(dot) if dot > 0 => &original_name[..dot],
        _ => original_name,
    };
    format!("{base}{OUTPUT_SUFFIX}.{}", extension_for_mime(mime))
}

/// Generate a default output path next to the input file.
///
/// Example: `"photo.jpg"` becomes `"photo_no_watermark.jpg"`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let name = input.file_name().unwrap_or_default().to_string_lossy();
    let mime = mime_for_path(input).unwrap_or("image/png");
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(output_file_name(&name, mime))
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp" | "gif"
        ),
        None => false,
    }
}

/// JPEG has no alpha channel, so it is written from an RGB conversion.
fn encodable(img: &RgbaImage, format: ImageFormat) -> DynamicImage {
    let dyn_img = DynamicImage::ImageRgba8(img.clone());
    if format == ImageFormat::Jpeg {
        DynamicImage::ImageRgb8(dyn_img.to_rgb8())
    } else {
        dyn_img
    }
}

/// Encode an image into an in-memory file of the given format.
///
/// # Errors
///
/// Returns an error if the format cannot be encoded.
pub fn encode_image(img: &RgbaImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    encodable(img, format).write_to(&mut bytes, format)?;
    Ok(bytes.into_inner())
}

/// Save an RGBA image with format-specific quality settings.
///
/// # Errors
///
/// Returns an error if the format is unsupported or writing fails.
pub fn save_image(img: &RgbaImage, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    match format {
        ImageFormat::Jpeg => {
            let file = std::fs::File::create(path)?;
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(file, 100);
            encoder.encode_image(&encodable(img, format))?;
        }
        ImageFormat::Png | ImageFormat::WebP | ImageFormat::Bmp | ImageFormat::Gif => {
            encodable(img, format).save(path)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    Ok(())
}
