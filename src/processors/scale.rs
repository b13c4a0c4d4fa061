//! Physical-to-pixel scale calibration.

use log::warn;
use thiserror::Error;

use crate::config::ScaleConfig;
use crate::core::bounds::{BoundingBox, PhysicalBounds};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScaleError {
    #[error("unit conversion produced a non-finite or non-positive value: {value}")]
    NonFinite { value: f64 },
}

/// Unit conversion between millimeters and image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleCalibration {
    pub mm_per_pixel: f64,
    /// Configured beam radius converted to pixels
    pub beam_radius_px: f64,
    /// Set when the extents were degenerate and the configured fallback was used
    pub used_fallback: bool,
}

impl ScaleCalibration {
    #[inline]
    pub fn mm_to_pixels(&self, mm: f64) -> f64 {
        mm / self.mm_per_pixel
    }

    #[inline]
    pub fn pixels_to_mm(&self, px: f64) -> f64 {
        px * self.mm_per_pixel
    }
}

/// Derive millimeters per pixel from the ratio of physical to pixel XY extents.
///
/// `mm_per_pixel = sqrt((phys_x^2 + phys_y^2) / (pix_w^2 + pix_h^2))`, times 1000
/// when beam units are meters. Zero physical or pixel extents (a single point, a
/// scan along one image row of identical beams) use `fallback_mm_per_pixel`.
///
/// # Errors
///
/// `NonFinite` when the ratio, the fallback or the beam radius in pixels is not a
/// positive finite number.
pub fn calibrate(
    physical: &PhysicalBounds,
    pixels: &BoundingBox,
    in_meters: bool,
    beam_radius_mm: f64,
    config: &ScaleConfig,
) -> Result<ScaleCalibration, ScaleError> {
    let phys_sq = physical.range(0).powi(2) + physical.range(1).powi(2);
    let pix_sq = pixels.width().powi(2) + pixels.height().powi(2);

    let (mm_per_pixel, used_fallback) = if phys_sq > 0.0 && pix_sq > 0.0 {
        let ratio = (phys_sq / pix_sq).sqrt();
        (if in_meters { ratio * 1000.0 } else { ratio }, false)
    } else {
        warn!(
            "degenerate extents (physical {:.4}, pixel {:.4}), using {} mm/px",
            phys_sq.sqrt(),
            pix_sq.sqrt(),
            config.fallback_mm_per_pixel
        );
        (config.fallback_mm_per_pixel, true)
    };

    if !mm_per_pixel.is_finite() || mm_per_pixel <= 0.0 {
        return Err(ScaleError::NonFinite {
            value: mm_per_pixel,
        });
    }

    let beam_radius_px = beam_radius_mm / mm_per_pixel;
    if !beam_radius_px.is_finite() {
        return Err(ScaleError::NonFinite {
            value: beam_radius_px,
        });
    }

    Ok(ScaleCalibration {
        mm_per_pixel,
        beam_radius_px,
        used_fallback,
    })
}
