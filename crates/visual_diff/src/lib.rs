//! Visual regression checks for generated layouts.
//!
//! Markup is rendered in headless Chromium at the viewport implied by a
//! reference capture, resampled to the reference size if needed, and diffed
//! pixel by pixel in YIQ space.

pub mod comparator;
pub mod config;
pub mod error;
pub mod pixelmatch;
pub mod raster;
pub mod render;
pub mod viewport;

pub use comparator::{DiffResult, DiffSummary, LayoutComparator, LayoutComparison, compare_rasters};
pub use config::VisualDiffConfig;
pub use error::{Result, VisualDiffError};
pub use pixelmatch::{MatchOptions, PixelMatch};
pub use raster::Raster;
pub use render::{ChromeRenderer, MarkupRenderer};
pub use viewport::Viewport;
