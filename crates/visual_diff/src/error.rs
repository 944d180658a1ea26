//! Errors raised while loading, rendering, or comparing rasters.

use core::result;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = result::Result<T, VisualDiffError>;

#[derive(Debug, Error)]
pub enum VisualDiffError {
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// PNG decoding or encoding failed.
    #[error("image error for {what}: {source}")]
    Image {
        what: String,
        #[source]
        source: image::ImageError,
    },

    /// Pixel data that cannot form a raster of the stated size.
    #[error("invalid raster: {reason}")]
    InvalidRaster { reason: String },

    #[error("raster dimensions differ: expected {expected_width}x{expected_height}, got {actual_width}x{actual_height}")]
    DimensionMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    /// The browser could not be launched, navigated, or captured. The message
    /// is the underlying error text, unmodified.
    #[error("render failure: {message}")]
    RenderFailure { message: String },
}

impl VisualDiffError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn render(err: impl ToString) -> Self {
        Self::RenderFailure {
            message: err.to_string(),
        }
    }
}
