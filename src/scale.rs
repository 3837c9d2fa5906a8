//! Physical-to-pixel scale for a target printer.
//!
//! Only the width axis is used: LCD masks on supported printers have square
//! pixels, so the vertical scale is assumed to be identical.

use crate::device::DeviceProfile;

/// Pixels per millimetre for a device.
///
/// Profiles are validated on construction, so `mm.width` is strictly positive.
pub fn scale(profile: &DeviceProfile) -> f64 {
    f64::from(profile.px.width) / profile.mm.width
}

/// Convert a pixel length to millimetres, rounded to two decimals.
pub fn px_to_mm(px: f64, scale: f64) -> f64 {
    (px / scale * 100.0).round() / 100.0
}

/// Convert millimetres to (fractional) pixels.
pub fn mm_to_px(mm: f64, scale: f64) -> f64 {
    mm * scale
}
