//! Image conversion for user-selected files
//!
//! Describes an image record and its conversion settings, and converts the
//! record into a payload of the requested format by delegating the pixel
//! work to an [`compress::ImageCompressor`].

pub mod app;
pub mod compress;
pub mod convert;
pub mod error;
pub mod models;
pub mod settings;

pub use convert::convert_image;
pub use error::{Error, Result};
