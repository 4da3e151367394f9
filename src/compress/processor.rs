use super::{CompressionOptions, ImageCompressor};
use crate::models::SourceFile;
use crate::{Error, Result};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;
use tracing::{debug, warn};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const DEFAULT_MAX_ITERATIONS: usize = 10;
const QUALITY_STEP: u8 = 10;
const MIN_QUALITY: u8 = 10;
const SHRINK_FACTOR: f64 = 0.9;

/// Compresses images with the `image` crate.
///
/// Resizing only ever shrinks an image to fit the bound unless an exact
/// size is requested. With a size cap the encoder is re-run, lowering
/// quality (JPEG) or dimensions (everything else), until the payload fits
/// or the iteration budget is spent.
pub struct ImageCompressionProcessor {
    max_iterations: usize,
}

impl ImageCompressionProcessor {
    pub fn new() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    fn compress_sync(
        bytes: &[u8],
        options: &CompressionOptions,
        max_iterations: usize,
    ) -> Result<Vec<u8>> {
        if options.max_width_or_height == Some(0) {
            return Err(Error::Compression(
                "maximum width or height must be positive".to_string(),
            ));
        }
        if let Some(size) = options.exact_size {
            if size.width == 0 || size.height == 0 {
                return Err(Error::Compression(format!(
                    "cannot resize to {}x{}",
                    size.width, size.height
                )));
            }
        }

        let source_format = image::guess_format(bytes)?;
        let image = image::load_from_memory_with_format(bytes, source_format)?;
        let target = options.output_format.unwrap_or(source_format);

        let mut current = Self::resize(image, options);
        let mut quality = if options.lossless {
            100
        } else {
            options.initial_quality.min(100)
        };
        let mut best = Self::encode(&current, target, quality)?;
        debug!(
            "Encoded {}x{} as {:?} ({} bytes)",
            current.width(),
            current.height(),
            target,
            best.len()
        );

        let Some(max_size_mb) = options.max_size_mb else {
            return Ok(best);
        };
        let max_bytes = (max_size_mb * BYTES_PER_MB) as usize;

        for attempt in 1..=max_iterations {
            if best.len() <= max_bytes {
                break;
            }
            if target == ImageFormat::Jpeg && !options.lossless && quality > MIN_QUALITY {
                quality = quality.saturating_sub(QUALITY_STEP).max(MIN_QUALITY);
            } else {
                let (width, height) = current.dimensions();
                if width <= 1 && height <= 1 {
                    break;
                }
                let width = ((width as f64 * SHRINK_FACTOR) as u32).max(1);
                let height = ((height as f64 * SHRINK_FACTOR) as u32).max(1);
                current = current.resize_exact(width, height, FilterType::Triangle);
            }

            let candidate = Self::encode(&current, target, quality)?;
            debug!(
                "Size cap attempt {}: {} bytes (limit {})",
                attempt,
                candidate.len(),
                max_bytes
            );
            if candidate.len() < best.len() {
                best = candidate;
            }
        }

        if best.len() > max_bytes {
            warn!(
                "Could not bring output under {} MB, returning {} bytes",
                max_size_mb,
                best.len()
            );
        }
        Ok(best)
    }

    fn resize(image: DynamicImage, options: &CompressionOptions) -> DynamicImage {
        let (width, height) = image.dimensions();

        if let Some(size) = options.exact_size {
            if (width, height) == (size.width, size.height) {
                return image;
            }
            let filter = select_filter(width, height, size.width, size.height);
            return image.resize_exact(size.width, size.height, filter);
        }

        match options.max_width_or_height {
            Some(bound) if width.max(height) > bound => {
                let scale = bound as f64 / width.max(height) as f64;
                let target_width = ((width as f64 * scale).round() as u32).max(1);
                let target_height = ((height as f64 * scale).round() as u32).max(1);
                let filter = select_filter(width, height, target_width, target_height);
                image.resize(bound, bound, filter)
            }
            _ => image,
        }
    }

    fn encode(image: &DynamicImage, format: ImageFormat, quality: u8) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        match format {
            ImageFormat::Jpeg => {
                // JPEG has no alpha channel.
                let rgb = image.to_rgb8();
                let encoder = JpegEncoder::new_with_quality(&mut bytes, quality.max(1));
                rgb.write_with_encoder(encoder)?;
            }
            _ => image.write_to(&mut Cursor::new(&mut bytes), format)?,
        }
        Ok(bytes)
    }
}

impl Default for ImageCompressionProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Cheaper filters for large reductions, Lanczos for small ones.
fn select_filter(
    orig_width: u32,
    orig_height: u32,
    new_width: u32,
    new_height: u32,
) -> FilterType {
    let width_ratio = orig_width as f32 / new_width as f32;
    let height_ratio = orig_height as f32 / new_height as f32;
    let max_ratio = width_ratio.max(height_ratio);

    if max_ratio > 2.0 {
        FilterType::Triangle
    } else if max_ratio > 1.5 {
        FilterType::CatmullRom
    } else {
        FilterType::Lanczos3
    }
}

#[async_trait]
impl ImageCompressor for ImageCompressionProcessor {
    async fn compress(&self, file: &SourceFile, options: &CompressionOptions) -> Result<Vec<u8>> {
        debug!("Compressing {} ({} bytes)", file.name, file.size());

        if !options.use_worker {
            return Self::compress_sync(&file.bytes, options, self.max_iterations);
        }

        tokio::task::spawn_blocking({
            let bytes = file.bytes.clone();
            let options = options.clone();
            let max_iterations = self.max_iterations;
            move || Self::compress_sync(&bytes, &options, max_iterations)
        })
        .await
        .map_err(|e| Error::Invariant(format!("Compression task join error: {}", e)))?
    }
}
