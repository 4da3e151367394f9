//! Image compression capability
//!
//! The conversion adapter hands the pixel work to an [`ImageCompressor`].
//! [`ImageCompressionProcessor`] does it with the `image` crate;
//! [`MockImageCompressor`] records what it was asked to do.

pub mod mime;
pub mod mock;
pub mod processor;

pub use mock::MockImageCompressor;
pub use processor::ImageCompressionProcessor;

use crate::models::{Dimensions, SourceFile};
use crate::Result;
use async_trait::async_trait;
use image::ImageFormat;

/// Options assembled from user settings for one compression request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionOptions {
    /// Bound on the longest side. `None` keeps the source dimensions.
    pub max_width_or_height: Option<u32>,
    /// Run the CPU-bound work off the async executor.
    pub use_worker: bool,
    pub maintain_aspect_ratio: bool,
    /// Stretch to exactly these dimensions instead of fitting the bound.
    pub exact_size: Option<Dimensions>,
    /// Target encoder; `None` re-encodes in the source format.
    pub output_format: Option<ImageFormat>,
    pub initial_quality: u8,
    pub max_size_mb: Option<f64>,
    pub lossless: bool,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            max_width_or_height: None,
            use_worker: true,
            maintain_aspect_ratio: true,
            exact_size: None,
            output_format: None,
            initial_quality: crate::settings::DEFAULT_QUALITY,
            max_size_mb: None,
            lossless: false,
        }
    }
}

#[async_trait]
pub trait ImageCompressor: Send + Sync {
    async fn compress(&self, file: &SourceFile, options: &CompressionOptions) -> Result<Vec<u8>>;
}
