//! Conversion adapter
//!
//! Turns an image record and its settings into a payload of the requested
//! format. The adapter only assembles [`CompressionOptions`]; the pixel work
//! belongs to the [`ImageCompressor`].

use crate::compress::{CompressionOptions, ImageCompressor};
use crate::models::{Blob, Dimensions, ImageFile};
use crate::settings::{ConversionMode, ConversionSettings};
use crate::Result;

/// Map settings onto compressor options.
///
/// The bound is the larger of the target width and height. `format-only`
/// mode and `keep_original_size` leave the dimensions untouched. The size
/// cap only applies in `compress` mode.
pub fn build_options(settings: &ConversionSettings) -> CompressionOptions {
    let resizes = settings.mode != ConversionMode::FormatOnly && !settings.keep_original_size;
    let max_width_or_height = resizes.then(|| settings.width.max(settings.height));
    let exact_size = match max_width_or_height {
        Some(_) if !settings.maintain_aspect_ratio => {
            Some(Dimensions::new(settings.width, settings.height))
        }
        _ => None,
    };

    CompressionOptions {
        max_width_or_height,
        use_worker: true,
        maintain_aspect_ratio: settings.maintain_aspect_ratio,
        exact_size,
        output_format: settings.output_format(),
        initial_quality: settings.quality,
        max_size_mb: match settings.mode {
            ConversionMode::Compress => settings.max_size_mb,
            _ => None,
        },
        lossless: settings.lossless,
    }
}

/// Convert `image` according to `settings`.
///
/// Calls the compressor exactly once and labels the result
/// `image/<format>` with the format string taken verbatim. The record is
/// not modified; compressor errors are returned as-is.
pub async fn convert_image(
    compressor: &dyn ImageCompressor,
    image: &ImageFile,
    settings: &ConversionSettings,
) -> Result<Blob> {
    let options = build_options(settings);
    let compressed = compressor.compress(&image.file, &options).await?;
    Ok(Blob::new(compressed, settings.media_type()))
}
