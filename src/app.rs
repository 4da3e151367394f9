//! File-level orchestration: load an image from disk, convert it and write
//! the payload next to the other outputs.

use crate::compress::{ImageCompressionProcessor, ImageCompressor};
use crate::convert::convert_image;
use crate::models::{Blob, ImageFile};
use crate::settings::{ConversionSettings, DEFAULT_QUALITY};
use crate::{Error, Result};
use image::ImageFormat;
use little_exif::metadata::Metadata;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Config {
    pub output_dir: PathBuf,
    pub default_format: String,
    pub default_quality: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            default_format: "webp".to_string(),
            default_quality: DEFAULT_QUALITY,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let default_quality = match std::env::var("IMAGE_CONVERT_DEFAULT_QUALITY") {
            Ok(raw) => parse_quality(&raw)?,
            Err(_) => defaults.default_quality,
        };

        Ok(Self {
            output_dir: std::env::var("IMAGE_CONVERT_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            default_format: std::env::var("IMAGE_CONVERT_DEFAULT_FORMAT")
                .unwrap_or(defaults.default_format),
            default_quality,
        })
    }
}

fn parse_quality(raw: &str) -> Result<u8> {
    raw.trim()
        .parse::<u8>()
        .ok()
        .filter(|q| *q <= 100)
        .ok_or_else(|| {
            Error::InvalidSettings(format!(
                "IMAGE_CONVERT_DEFAULT_QUALITY must be 0-100, got '{}'",
                raw
            ))
        })
}

/// Result of converting one file.
#[derive(Debug)]
pub struct ConversionOutcome {
    pub output_path: PathBuf,
    pub media_type: String,
    pub original_size: usize,
    pub converted_size: usize,
    pub image: ImageFile,
}

pub struct App {
    compressor: Box<dyn ImageCompressor>,
    output_dir: PathBuf,
}

impl App {
    /// Build an app around any compressor. Tests inject the mock here.
    pub fn with_compressor(compressor: Box<dyn ImageCompressor>, output_dir: PathBuf) -> Self {
        Self {
            compressor,
            output_dir,
        }
    }

    pub fn new(config: &Config) -> Result<Self> {
        fs::create_dir_all(&config.output_dir)?;
        info!("Using output directory: {}", config.output_dir.display());

        Ok(Self::with_compressor(
            Box::new(ImageCompressionProcessor::new()),
            config.output_dir.clone(),
        ))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Read `path`, convert it with `settings` and write the payload into
    /// the output directory as `<stem>_<uuid>.<format>`.
    pub async fn convert_file(
        &self,
        path: &Path,
        settings: &ConversionSettings,
    ) -> Result<ConversionOutcome> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string());
        let mut image = ImageFile::from_bytes(name, bytes);

        let mut settings = settings.clone();
        if settings.original().is_none() {
            if let Some(original) = image.original {
                settings = settings.with_original(original);
            }
        }
        settings.apply_scale();
        settings.validate()?;

        info!(
            "Converting {} to {} ({}x{}, mode {})",
            image.file.name, settings.format, settings.width, settings.height, settings.mode
        );

        image.begin_conversion()?;
        let (blob, output_path) = match self.convert_and_write(path, &image, &settings).await {
            Ok(written) => written,
            Err(e) => {
                image.abort_conversion();
                return Err(e);
            }
        };

        let media_type = blob.media_type().to_string();
        let converted_size = blob.len();
        image.finish_conversion(blob)?;

        let outcome = ConversionOutcome {
            output_path,
            media_type,
            original_size: image.file.size(),
            converted_size,
            image,
        };

        info!(
            "Wrote {} ({} -> {} bytes)",
            outcome.output_path.display(),
            outcome.original_size,
            outcome.converted_size
        );
        Ok(outcome)
    }

    async fn convert_and_write(
        &self,
        path: &Path,
        image: &ImageFile,
        settings: &ConversionSettings,
    ) -> Result<(Blob, PathBuf)> {
        let blob = convert_image(self.compressor.as_ref(), image, settings).await?;

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string());
        let file_name = format!("{}_{}.{}", stem, Uuid::new_v4(), extension_for(settings));
        let output_path = self.output_dir.join(file_name);
        tokio::fs::write(&output_path, blob.bytes()).await?;

        if strips_metadata(settings) {
            if let Err(e) = Metadata::file_clear_metadata(&output_path) {
                warn!("Failed to strip metadata from {}: {}", output_path.display(), e);
            }
        }

        Ok((blob, output_path))
    }
}

/// Containers whose metadata can be cleared after writing.
fn strips_metadata(settings: &ConversionSettings) -> bool {
    matches!(
        settings.output_format(),
        Some(ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP)
    )
}

/// File extension for the output; format strings that are not usable as an
/// extension fall back to `bin`.
fn extension_for(settings: &ConversionSettings) -> String {
    let format = settings.format.trim().to_ascii_lowercase();
    if !format.is_empty() && format.chars().all(|c| c.is_ascii_alphanumeric()) {
        format
    } else {
        "bin".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::MockImageCompressor;
    use crate::models::ConversionState;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[tokio::test]
    async fn test_convert_file_writes_output_and_attaches_result() {
        let dir = tempdir().unwrap();
        let input = write_png(dir.path(), "cat.png", 40, 20);
        let output_dir = dir.path().join("out");
        fs::create_dir_all(&output_dir).unwrap();

        let app = App::with_compressor(Box::new(ImageCompressionProcessor::new()), output_dir);
        let settings = ConversionSettings::new("png", 20, 10);

        let outcome = app.convert_file(&input, &settings).await.unwrap();

        assert!(outcome.output_path.exists());
        assert!(outcome.output_path.starts_with(app.output_dir()));
        let file_name = outcome.output_path.file_name().unwrap().to_string_lossy();
        assert!(file_name.starts_with("cat_"));
        assert!(file_name.ends_with(".png"));
        assert_eq!(outcome.media_type, "image/png");

        let written = image::open(&outcome.output_path).unwrap();
        assert_eq!((written.width(), written.height()), (20, 10));
        assert!(matches!(
            outcome.image.state(),
            ConversionState::Converted(_)
        ));
    }

    #[tokio::test]
    async fn test_convert_file_applies_scale_from_probed_dimensions() {
        let dir = tempdir().unwrap();
        let input = write_png(dir.path(), "dog.png", 64, 32);
        let compressor = MockImageCompressor::new();
        let probe = compressor.clone();

        let app = App::with_compressor(Box::new(compressor), dir.path().to_path_buf());
        let mut settings = ConversionSettings::new("png", 1, 1);
        settings.scale_percentage = Some(50.0);

        app.convert_file(&input, &settings).await.unwrap();

        let calls = probe.get_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].max_width_or_height, Some(32));
    }

    #[tokio::test]
    async fn test_convert_file_rejects_invalid_settings() {
        let dir = tempdir().unwrap();
        let input = write_png(dir.path(), "bad.png", 4, 4);
        let compressor = MockImageCompressor::new();
        let probe = compressor.clone();

        let app = App::with_compressor(Box::new(compressor), dir.path().to_path_buf());
        let settings = ConversionSettings::new("png", 0, 10);

        let result = app.convert_file(&input, &settings).await;

        assert!(matches!(result, Err(Error::InvalidSettings(_))));
        assert_eq!(probe.get_call_count(), 0);
    }

    #[tokio::test]
    async fn test_convert_file_propagates_compression_failure() {
        let dir = tempdir().unwrap();
        let input = write_png(dir.path(), "broken.png", 4, 4);

        let app = App::with_compressor(
            Box::new(MockImageCompressor::new().with_failure(true)),
            dir.path().join("out"),
        );

        let result = app
            .convert_file(&input, &ConversionSettings::new("png", 4, 4))
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_convert_file_fails_when_output_dir_is_missing() {
        let dir = tempdir().unwrap();
        let input = write_png(dir.path(), "lost.png", 4, 4);
        let compressor = MockImageCompressor::new();
        let probe = compressor.clone();

        let app = App::with_compressor(Box::new(compressor), dir.path().join("missing"));

        let result = app
            .convert_file(&input, &ConversionSettings::new("png", 4, 4))
            .await;

        assert!(matches!(result, Err(Error::Io(_))));
        assert_eq!(probe.get_call_count(), 1);
    }

    #[test]
    fn test_extension_for_odd_formats() {
        assert_eq!(
            extension_for(&ConversionSettings::new("WebP", 1, 1)),
            "webp"
        );
        assert_eq!(
            extension_for(&ConversionSettings::new("svg+xml", 1, 1)),
            "bin"
        );
    }

    #[test]
    fn test_parse_quality() {
        assert_eq!(parse_quality("75").unwrap(), 75);
        assert!(parse_quality("101").is_err());
        assert!(parse_quality("high").is_err());
    }
}
