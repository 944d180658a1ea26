use serde::Serialize;

/// CSS-pixel viewport plus the scale factor used to rasterize it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
}

impl Viewport {
    /// The viewport whose capture at `device_scale_factor` lines up with a
    /// reference raster of `reference_width` x `reference_height` pixels.
    ///
    /// Each side is `round(reference / dsf)`, never below one pixel. A
    /// non-positive or non-finite scale factor is treated as 1.
    pub fn for_reference(reference_width: u32, reference_height: u32, device_scale_factor: f64) -> Self {
        let dsf = if device_scale_factor.is_finite() && device_scale_factor > 0.0 {
            device_scale_factor
        } else {
            1.0
        };
        let side = |len: u32| (f64::from(len) / dsf).round().max(1.0) as u32;
        Self {
            width: side(reference_width),
            height: side(reference_height),
            device_scale_factor: dsf,
        }
    }

    /// Expected capture size in device pixels.
    pub fn device_size(&self) -> (u32, u32) {
        let scaled = |len: u32| (f64::from(len) * self.device_scale_factor).round() as u32;
        (scaled(self.width), scaled(self.height))
    }
}
