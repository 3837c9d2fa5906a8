//! Exposure-time calibration ladder.
//!
//! Resin under the mask cures for as long as any layer leaves its pixels
//! white. Stacking `samples - i` copies of the board on layer `i` means copy
//! `k` stays lit for layers `0..=samples - 1 - k`, so each copy ends up with
//! a different total exposure.

use serde::Serialize;

use crate::device::Size;
use crate::error::{PcbError, Result};

use super::frame::{Ink, RasterFrame};

/// Parameters of a calibration ladder, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExposureTestParams {
    /// Exposure of the first (bottom) layer.
    pub start: f32,
    /// Exposure added by every following layer.
    pub interval: f32,
    /// Number of copies, and layers.
    pub samples: u32,
}

impl Default for ExposureTestParams {
    fn default() -> Self {
        Self {
            start: 360.0,
            interval: 60.0,
            samples: 4,
        }
    }
}

impl ExposureTestParams {
    pub fn validate(&self) -> Result<()> {
        if self.samples == 0 {
            return Err(PcbError::Config {
                message: "Exposure test needs at least one step".to_string(),
                help: Some("Pass --steps 1 or more".to_string()),
            });
        }
        if !(self.start > 0.0) {
            return Err(PcbError::Config {
                message: format!("Exposure test start time must be positive, got {}", self.start),
                help: Some("Pass --start in seconds, e.g. --start 360".to_string()),
            });
        }
        if !(self.interval > 0.0) {
            return Err(PcbError::Config {
                message: format!("Exposure test interval must be positive, got {}", self.interval),
                help: Some("Pass --interval in seconds, e.g. --interval 60".to_string()),
            });
        }
        Ok(())
    }

    /// Total time the first copy is exposed, as reported to the user.
    pub fn total_exposure_time(&self) -> f32 {
        self.start + self.samples as f32 * self.interval
    }
}

/// One layer of the ladder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExposureStep {
    /// Copies of the board visible on this layer.
    pub repeats: u32,
    /// Exposure of this layer alone.
    pub exposure_s: f32,
    /// Exposure accumulated up to and including this layer.
    pub cumulative_s: f32,
}

/// A planned ladder. Step frames are composed one at a time with
/// [`ExposureSequencer::render_step`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExposureSeries {
    pub steps: Vec<ExposureStep>,
    /// Height of the stacked copies, before any clipping.
    pub total_height_px: u32,
    pub total_exposure_time: f32,
    /// Whether some copies do not fit on the bed.
    pub clipped: bool,
}

/// Builds ladders for a bed of a given resolution.
#[derive(Debug, Clone, Copy)]
pub struct ExposureSequencer {
    bed: Size<u32>,
}

impl ExposureSequencer {
    pub fn new(bed: Size<u32>) -> Self {
        Self { bed }
    }

    pub fn build(&self, frame: &RasterFrame, params: &ExposureTestParams) -> Result<ExposureSeries> {
        params.validate()?;

        let steps = (0..params.samples)
            .map(|i| ExposureStep {
                repeats: params.samples - i,
                exposure_s: if i == 0 { params.start } else { params.interval },
                cumulative_s: params.start + i as f32 * params.interval,
            })
            .collect();

        // Step 0 holds every copy, so it clips whenever any step does.
        let total_height_px = frame.height().saturating_mul(params.samples);
        let clipped = frame.width() > self.bed.width || total_height_px > self.bed.height;
        if clipped {
            log::warn!(
                "exposure test ladder is {}x{}px but the bed is {}x{}px; copies are clipped",
                frame.width(),
                total_height_px,
                self.bed.width,
                self.bed.height
            );
        }

        Ok(ExposureSeries {
            steps,
            total_height_px,
            total_exposure_time: params.total_exposure_time(),
            clipped,
        })
    }

    /// Full-bed frame of one step: `step.repeats` copies of `frame` stacked
    /// from the top of a black bed.
    pub fn render_step(&self, frame: &RasterFrame, step: &ExposureStep) -> RasterFrame {
        let mut bed = RasterFrame::new(self.bed.width, self.bed.height, Ink::Black);
        for k in 0..step.repeats {
            bed.blit(frame, 0, k.saturating_mul(frame.height()));
        }
        bed
    }
}
