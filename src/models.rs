//! Data models for image records
//!
//! An [`ImageFile`] pairs the bytes a user selected with a displayable
//! preview and the state of its conversion.

use crate::compress::mime::detect_image_mime;
use crate::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width divided by height, `None` for a zero height.
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.height == 0 {
            return None;
        }
        Some(self.width as f64 / self.height as f64)
    }

    pub fn longest_side(&self) -> u32 {
        self.width.max(self.height)
    }
}

/// Binary payload tagged with a declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    bytes: Vec<u8>,
    media_type: String,
}

impl Blob {
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            bytes,
            media_type: media_type.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// The original file as selected by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
    /// Media type sniffed from the leading bytes, if recognised.
    pub media_type: Option<&'static str>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let media_type = detect_image_mime(&bytes);
        Self {
            name: name.into(),
            bytes,
            media_type,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConversionState {
    #[default]
    Unconverted,
    Converting,
    Converted(Blob),
}

/// A user-selected image together with its conversion status.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file: SourceFile,
    pub preview: String,
    pub original: Option<Dimensions>,
    state: ConversionState,
}

impl ImageFile {
    pub fn new(file: SourceFile, preview: String, original: Option<Dimensions>) -> Self {
        Self {
            file,
            preview,
            original,
            state: ConversionState::Unconverted,
        }
    }

    /// Build a record from raw bytes: sniffs the media type, probes the
    /// header for dimensions and encodes a `data:` URI preview.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let original = probe_dimensions(&bytes);
        let file = SourceFile::new(name, bytes);
        let preview = data_uri(&file);
        Self::new(file, preview, original)
    }

    pub fn state(&self) -> &ConversionState {
        &self.state
    }

    pub fn is_converting(&self) -> bool {
        matches!(self.state, ConversionState::Converting)
    }

    pub fn converted(&self) -> Option<&Blob> {
        match &self.state {
            ConversionState::Converted(blob) => Some(blob),
            _ => None,
        }
    }

    pub fn original_aspect_ratio(&self) -> Option<f64> {
        self.original.and_then(|d| d.aspect_ratio())
    }

    /// Mark the record as in progress. A previous result is discarded, so a
    /// converted record can be converted again with different settings.
    pub fn begin_conversion(&mut self) -> Result<()> {
        if self.is_converting() {
            return Err(Error::InvalidState(format!(
                "{} is already being converted",
                self.file.name
            )));
        }
        self.state = ConversionState::Converting;
        Ok(())
    }

    pub fn finish_conversion(&mut self, blob: Blob) -> Result<()> {
        if !self.is_converting() {
            return Err(Error::InvalidState(format!(
                "{} has no conversion in progress",
                self.file.name
            )));
        }
        self.state = ConversionState::Converted(blob);
        Ok(())
    }

    /// Return to `Unconverted` after a failed conversion.
    pub fn abort_conversion(&mut self) {
        if self.is_converting() {
            self.state = ConversionState::Unconverted;
        }
    }
}

fn probe_dimensions(bytes: &[u8]) -> Option<Dimensions> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    let (width, height) = reader.into_dimensions().ok()?;
    Some(Dimensions::new(width, height))
}

fn data_uri(file: &SourceFile) -> String {
    format!(
        "data:{};base64,{}",
        file.media_type.unwrap_or(FALLBACK_MEDIA_TYPE),
        STANDARD.encode(&file.bytes)
    )
}
