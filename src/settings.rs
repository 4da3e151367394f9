//! Conversion settings
//!
//! [`ConversionSettings`] is the canonical, mode-aware schema. Older and
//! narrower shapes are accepted through [`VersionedSettings`] and migrated
//! with fixed defaults.

use crate::models::Dimensions;
use crate::{Error, Result};
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_QUALITY: u8 = 80;
const MAX_SCALE_PERCENTAGE: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversionMode {
    /// Re-encode without resizing.
    FormatOnly,
    #[default]
    Resize,
    /// Reduce size under quality and size constraints.
    Compress,
}

impl fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConversionMode::FormatOnly => "format-only",
            ConversionMode::Resize => "resize",
            ConversionMode::Compress => "compress",
        };
        f.write_str(name)
    }
}

impl FromStr for ConversionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "format-only" => Ok(ConversionMode::FormatOnly),
            "resize" => Ok(ConversionMode::Resize),
            "compress" => Ok(ConversionMode::Compress),
            other => Err(Error::InvalidSettings(format!(
                "Unknown conversion mode '{}'. Expected format-only, resize or compress",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionSettings {
    /// Target format identifier, e.g. `webp`. Used verbatim in the output
    /// media type.
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub maintain_aspect_ratio: bool,
    pub mode: ConversionMode,
    #[serde(default)]
    pub keep_original_size: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_height: Option<u32>,
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Size cap for the output in megabytes; `None` leaves it unbounded.
    #[serde(
        rename = "maxSizeMB",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub max_size_mb: Option<f64>,
    #[serde(default)]
    pub lossless: bool,
}

fn default_quality() -> u8 {
    DEFAULT_QUALITY
}

impl ConversionSettings {
    pub fn new(format: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            format: format.into(),
            width,
            height,
            maintain_aspect_ratio: true,
            mode: ConversionMode::default(),
            keep_original_size: false,
            scale_percentage: None,
            original_width: None,
            original_height: None,
            quality: DEFAULT_QUALITY,
            max_size_mb: None,
            lossless: false,
        }
    }

    pub fn with_mode(mut self, mode: ConversionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_aspect_ratio(mut self, maintain: bool) -> Self {
        self.maintain_aspect_ratio = maintain;
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_max_size_mb(mut self, max_size_mb: f64) -> Self {
        self.max_size_mb = Some(max_size_mb);
        self
    }

    pub fn with_lossless(mut self, lossless: bool) -> Self {
        self.lossless = lossless;
        self
    }

    pub fn with_original(mut self, original: Dimensions) -> Self {
        self.original_width = Some(original.width);
        self.original_height = Some(original.height);
        self
    }

    pub fn original(&self) -> Option<Dimensions> {
        match (self.original_width, self.original_height) {
            (Some(width), Some(height)) => Some(Dimensions::new(width, height)),
            _ => None,
        }
    }

    /// `image/<format>` with the format taken verbatim.
    pub fn media_type(&self) -> String {
        format!("image/{}", self.format)
    }

    /// The encoder for the format string, if it names one the `image`
    /// crate knows.
    pub fn output_format(&self) -> Option<ImageFormat> {
        ImageFormat::from_extension(&self.format)
    }

    /// Derive width and height from the scale percentage and the original
    /// dimensions. Leaves the settings untouched when either is missing.
    pub fn apply_scale(&mut self) {
        let (Some(pct), Some(original)) = (self.scale_percentage, self.original()) else {
            return;
        };
        let scale = |side: u32| ((side as f64 * pct / 100.0).round() as u32).max(1);
        self.width = scale(original.width);
        self.height = scale(original.height);
    }

    pub fn validate(&self) -> Result<()> {
        if self.format.trim().is_empty() {
            return Err(Error::InvalidSettings("format must not be empty".to_string()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidSettings(format!(
                "width and height must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.quality > 100 {
            return Err(Error::InvalidSettings(format!(
                "quality must be within 0-100, got {}",
                self.quality
            )));
        }
        if let Some(max) = self.max_size_mb {
            if !max.is_finite() || max <= 0.0 {
                return Err(Error::InvalidSettings(format!(
                    "maxSizeMB must be positive, got {}",
                    max
                )));
            }
        }
        if let Some(pct) = self.scale_percentage {
            if !pct.is_finite() || pct <= 0.0 || pct > MAX_SCALE_PERCENTAGE {
                return Err(Error::InvalidSettings(format!(
                    "scalePercentage must be within (0, {}], got {}",
                    MAX_SCALE_PERCENTAGE, pct
                )));
            }
        }
        Ok(())
    }
}

/// The first settings shape: target format and box only.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SettingsV1 {
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub maintain_aspect_ratio: bool,
}

/// The expert-mode shape, before conversion modes existed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SettingsV2 {
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub maintain_aspect_ratio: bool,
    #[serde(default)]
    pub scale_percentage: Option<f64>,
    #[serde(default)]
    pub original_width: Option<u32>,
    #[serde(default)]
    pub original_height: Option<u32>,
    pub quality: u8,
    #[serde(rename = "maxSizeMB", default)]
    pub max_size_mb: Option<f64>,
    #[serde(default)]
    pub lossless: bool,
}

/// Any accepted settings shape, newest first.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum VersionedSettings {
    V3(ConversionSettings),
    V2(SettingsV2),
    V1(SettingsV1),
}

impl VersionedSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn into_canonical(self) -> ConversionSettings {
        match self {
            VersionedSettings::V3(settings) => settings,
            VersionedSettings::V2(v2) => v2.into(),
            VersionedSettings::V1(v1) => v1.into(),
        }
    }
}

impl From<SettingsV1> for ConversionSettings {
    fn from(v1: SettingsV1) -> Self {
        ConversionSettings::new(v1.format, v1.width, v1.height)
            .with_aspect_ratio(v1.maintain_aspect_ratio)
    }
}

impl From<SettingsV2> for ConversionSettings {
    fn from(v2: SettingsV2) -> Self {
        Self {
            scale_percentage: v2.scale_percentage,
            original_width: v2.original_width,
            original_height: v2.original_height,
            quality: v2.quality,
            max_size_mb: v2.max_size_mb,
            lossless: v2.lossless,
            ..ConversionSettings::new(v2.format, v2.width, v2.height)
                .with_aspect_ratio(v2.maintain_aspect_ratio)
        }
    }
}
