//! RGBA8 rasters: PNG load/store and nearest-neighbor resampling.

use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder as _, RgbaImage, load_from_memory};
use std::fs::{create_dir_all, read, write};
use std::path::Path;

use crate::error::{Result, VisualDiffError};

/// Raw RGBA pixels, row-major, four bytes per pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl From<RgbaImage> for Raster {
    fn from(img: RgbaImage) -> Self {
        Self {
            width: img.width(),
            height: img.height(),
            pixels: img.into_raw(),
        }
    }
}

impl Raster {
    /// Wrap existing pixels.
    ///
    /// # Errors
    ///
    /// Returns [`VisualDiffError::InvalidRaster`] if `pixels` is not exactly
    /// `width * height * 4` bytes.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = byte_len(width, height);
        if pixels.len() != expected {
            return Err(VisualDiffError::InvalidRaster {
                reason: format!(
                    "{width}x{height} needs {expected} bytes, got {}",
                    pixels.len()
                ),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// A raster with every pixel set to `rgba`.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let count = byte_len(width, height) / 4;
        Self {
            width,
            height,
            pixels: rgba.repeat(count),
        }
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// RGBA of the pixel at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = offset(self.width, x, y);
        self.pixels
            .get(start..start + 4)
            .and_then(|px| px.try_into().ok())
    }

    /// Decode PNG (or any format the `image` build supports) bytes.
    ///
    /// # Errors
    ///
    /// Returns [`VisualDiffError::Image`] if decoding fails.
    pub fn decode(bytes: &[u8], what: &str) -> Result<Self> {
        let img = load_from_memory(bytes).map_err(|source| VisualDiffError::Image {
            what: what.to_owned(),
            source,
        })?;
        Ok(img.to_rgba8().into())
    }

    /// Load a PNG file.
    ///
    /// # Errors
    ///
    /// Returns [`VisualDiffError::NotFound`], [`VisualDiffError::Io`], or
    /// [`VisualDiffError::Image`].
    pub fn load_png(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(VisualDiffError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let bytes = read(path).map_err(|err| VisualDiffError::io(path, err))?;
        Self::decode(&bytes, &path.display().to_string())
    }

    /// Encode as PNG.
    ///
    /// # Errors
    ///
    /// Returns [`VisualDiffError::Image`] if encoding fails.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        PngEncoder::new(&mut buf)
            .write_image(&self.pixels, self.width, self.height, ColorType::Rgba8.into())
            .map_err(|source| VisualDiffError::Image {
                what: format!("{}x{} raster", self.width, self.height),
                source,
            })?;
        Ok(buf)
    }

    /// Write as PNG unless the file already holds identical bytes. Returns
    /// whether a write happened.
    ///
    /// # Errors
    ///
    /// Returns [`VisualDiffError::Image`] or [`VisualDiffError::Io`].
    pub fn write_png_if_changed(&self, path: &Path) -> Result<bool> {
        let bytes = self.encode_png()?;
        if let Ok(existing) = read(path)
            && existing == bytes
        {
            return Ok(false);
        }
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent).map_err(|err| VisualDiffError::io(parent, err))?;
        }
        write(path, bytes).map_err(|err| VisualDiffError::io(path, err))?;
        Ok(true)
    }

    /// Nearest-neighbor resample to `width` x `height`.
    ///
    /// Destination `(x, y)` samples source
    /// `(floor(x * src_w / width), floor(y * src_h / height))`, copying all
    /// four channels. An empty source yields a transparent raster, and
    /// samples past the end of a short pixel buffer are transparent.
    pub fn resize_nearest(&self, width: u32, height: u32) -> Self {
        if self.is_empty() {
            return Self::filled(width, height, [0; 4]);
        }
        let mut pixels = Vec::with_capacity(byte_len(width, height));
        for y in 0..height {
            let src_y = scale(y, self.height, height);
            for x in 0..width {
                let src_x = scale(x, self.width, width);
                let start = offset(self.width, src_x, src_y);
                pixels.extend_from_slice(self.pixels.get(start..start + 4).unwrap_or(&[0; 4]));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }
}

fn scale(dst: u32, src_len: u32, dst_len: u32) -> u32 {
    (u64::from(dst) * u64::from(src_len) / u64::from(dst_len)) as u32
}

fn offset(width: u32, x: u32, y: u32) -> usize {
    (y as usize * width as usize + x as usize) * 4
}

fn byte_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}
