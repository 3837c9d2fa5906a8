//! Render sessions: artwork in, slicer file out.
//!
//! A [`RenderSession`] is bound to one printer. Each operation loads artwork,
//! composites it, lays the result on a full-bed frame and hands the frames to
//! a [`SlicerCodec`]. Intermediate PNGs live in a temporary directory that is
//! removed when the operation returns, successfully or not.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::TempDir;

use crate::artwork::{companion_drill_path, load_layer, BuiltinPattern, Layer};
use crate::device::DeviceProfile;
use crate::error::{PcbError, Result};
use crate::render::{ExposureSequencer, ExposureTestParams, Ink, LayerCompositor, RasterFrame};
use crate::scale::{px_to_mm, scale};
use crate::slicer::{PhotonCodec, SliceJob, SliceLayer, SlicerCodec};

/// Settings a session starts from.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDefaults {
    pub output: PathBuf,
    pub exposure_time_s: f32,
    pub exp_test: ExposureTestParams,
    pub pattern: BuiltinPattern,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            output: PathBuf::from("pcb.cbddlp"),
            exposure_time_s: 480.0,
            exp_test: ExposureTestParams::default(),
            pattern: BuiltinPattern::get(),
        }
    }
}

/// Outcome of a render operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderReport {
    pub output: PathBuf,
    pub pcb_width_px: u32,
    pub pcb_height_px: u32,
    pub pcb_width_mm: f64,
    pub pcb_height_mm: f64,
    /// Exposure time as shown to the user. For a calibration ladder this is
    /// `start + samples * interval`.
    pub exposure_time_s: f32,
    pub layers: u32,
    /// The artwork did not fit on the bed and was cut off.
    pub clipped: bool,
}

/// The `_blank` sibling of an output path: `pcb.cbddlp` becomes
/// `pcb_blank.cbddlp`.
pub fn blank_output_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match output.extension() {
        Some(ext) => format!("{}_blank.{}", stem, ext.to_string_lossy()),
        None => format!("{}_blank", stem),
    };
    output.with_file_name(name)
}

/// Renders artwork for one printer.
#[derive(Debug)]
pub struct RenderSession<C = PhotonCodec> {
    device: DeviceProfile,
    scale: f64,
    defaults: SessionDefaults,
    codec: C,
    output: PathBuf,
    exposure_time: f32,
    exp_test: ExposureTestParams,
    pcb_width_px: Option<u32>,
    pcb_height_px: Option<u32>,
}

impl RenderSession<PhotonCodec> {
    pub fn new(device: DeviceProfile) -> Self {
        Self::with_codec(device, SessionDefaults::default(), PhotonCodec)
    }
}

impl<C: SlicerCodec> RenderSession<C> {
    pub fn with_codec(device: DeviceProfile, defaults: SessionDefaults, codec: C) -> Self {
        let scale = scale(&device);
        log::debug!("device '{}': {:.4} px/mm", device.name, scale);
        Self {
            scale,
            codec,
            output: defaults.output.clone(),
            exposure_time: defaults.exposure_time_s,
            exp_test: defaults.exp_test,
            defaults,
            device,
            pcb_width_px: None,
            pcb_height_px: None,
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    pub fn set_exposure_time(&mut self, seconds: f32) -> Result<()> {
        if !(seconds > 0.0) {
            return Err(PcbError::Config {
                message: format!("Exposure time must be positive, got {}", seconds),
                help: Some("Pass -e with a time in seconds, e.g. -e 480".to_string()),
            });
        }
        self.exposure_time = seconds;
        Ok(())
    }

    pub fn set_exp_test(&mut self, params: ExposureTestParams) -> Result<()> {
        params.validate()?;
        self.exp_test = params;
        Ok(())
    }

    pub fn device(&self) -> &DeviceProfile {
        &self.device
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn exposure_time(&self) -> f32 {
        self.exposure_time
    }

    pub fn exp_test_params(&self) -> ExposureTestParams {
        self.exp_test
    }

    pub fn pcb_width_px(&self) -> Option<u32> {
        self.pcb_width_px
    }

    pub fn pcb_height_px(&self) -> Option<u32> {
        self.pcb_height_px
    }

    pub fn pcb_width_mm(&self) -> Option<f64> {
        self.pcb_width_px.map(|px| px_to_mm(f64::from(px), self.scale))
    }

    pub fn pcb_height_mm(&self) -> Option<f64> {
        self.pcb_height_px.map(|px| px_to_mm(f64::from(px), self.scale))
    }

    /// Render a board into a single exposure.
    ///
    /// Without an explicit `drill`, the companion `.drl` next to `traces` is
    /// used when it exists.
    pub fn convert(&mut self, traces: &Path, drill: Option<&Path>) -> Result<RenderReport> {
        let (traces, drills) = load_artwork(traces, drill)?;
        let frame = LayerCompositor::new(self.scale).render(&traces, drills.as_ref());

        let mut bed = self.bed();
        let clipped = bed.blit(&frame, 0, 0);
        if clipped {
            self.warn_clipped(frame.width(), frame.height());
        }

        self.emit_single(&bed, self.exposure_time)?;
        self.pcb_width_px = Some(frame.width());
        self.pcb_height_px = Some(frame.height());
        Ok(self.report(1, clipped))
    }

    /// Render a fully lit rectangle the size of a previous board, written next
    /// to the current output as `<stem>_blank<.ext>`.
    pub fn render_blank(&mut self, previous: &RenderReport) -> Result<RenderReport> {
        let (width, height) = (previous.pcb_width_px, previous.pcb_height_px);
        let mut bed = self.bed();
        bed.fill_rect(0, 0, width, height, Ink::White);
        let clipped = width > bed.width() || height > bed.height();

        self.output = blank_output_path(&self.output);
        self.emit_single(&bed, previous.exposure_time_s)?;

        self.exposure_time = previous.exposure_time_s;
        self.pcb_width_px = Some(width);
        self.pcb_height_px = Some(height);
        Ok(self.report(1, clipped))
    }

    /// Render an exposure-time calibration ladder from `pattern`, or from the
    /// built-in pattern when `None`.
    pub fn exp_test(&mut self, pattern: Option<&Path>) -> Result<RenderReport> {
        let (traces, drills) = match pattern {
            Some(path) => load_artwork(path, None)?,
            None => {
                let (traces, drills) = self.defaults.pattern.layers()?;
                (traces, Some(drills))
            }
        };
        let frame = LayerCompositor::new(self.scale).render(&traces, drills.as_ref());
        let sequencer = ExposureSequencer::new(self.device.px);
        let series = sequencer.build(&frame, &self.exp_test)?;

        let scratch = scratch_dir()?;
        let mut layers = Vec::with_capacity(series.steps.len());
        for (index, step) in series.steps.iter().enumerate() {
            let path = scratch.path().join(format!("{:05}_{:02}.png", index, step.repeats));
            sequencer.render_step(&frame, step).save_png(&path)?;
            log::debug!(
                "step {}: {} copies, {}s (cumulative {}s)",
                index,
                step.repeats,
                step.exposure_s,
                step.cumulative_s
            );
            layers.push(SliceLayer::new(path, step.exposure_s));
        }

        let job = SliceJob {
            device: &self.device,
            bottom_layers: 1,
            layers,
        };
        self.codec.write(&job, &self.output)?;

        self.pcb_width_px = Some(frame.width());
        self.pcb_height_px = Some(series.total_height_px);
        self.exposure_time = series.total_exposure_time;
        Ok(self.report(self.exp_test.samples, series.clipped))
    }

    fn bed(&self) -> RasterFrame {
        RasterFrame::new(self.device.px.width, self.device.px.height, Ink::Black)
    }

    fn emit_single(&self, bed: &RasterFrame, exposure_s: f32) -> Result<()> {
        let scratch = scratch_dir()?;
        let path = scratch.path().join(format!("{:05}_{:02}.png", 0, 1));
        bed.save_png(&path)?;

        let job = SliceJob {
            device: &self.device,
            bottom_layers: 1,
            layers: vec![SliceLayer::new(path, exposure_s)],
        };
        self.codec.write(&job, &self.output)
    }

    fn warn_clipped(&self, width: u32, height: u32) {
        log::warn!(
            "artwork is {}x{} px but the {} bed is {}x{} px; it will be clipped",
            width,
            height,
            self.device.name,
            self.device.px.width,
            self.device.px.height
        );
    }

    fn report(&self, layers: u32, clipped: bool) -> RenderReport {
        let width = self.pcb_width_px.unwrap_or(0);
        let height = self.pcb_height_px.unwrap_or(0);
        RenderReport {
            output: self.output.clone(),
            pcb_width_px: width,
            pcb_height_px: height,
            pcb_width_mm: px_to_mm(f64::from(width), self.scale),
            pcb_height_mm: px_to_mm(f64::from(height), self.scale),
            exposure_time_s: self.exposure_time,
            layers,
            clipped,
        }
    }
}

fn scratch_dir() -> Result<TempDir> {
    Ok(tempfile::Builder::new().prefix("pcb-msla-").tempdir()?)
}

fn load_artwork(traces: &Path, drill: Option<&Path>) -> Result<(Layer, Option<Layer>)> {
    let traces_layer = load_layer(traces)?;

    let drills = match drill {
        Some(path) => Some(load_layer(path)?),
        None => {
            let companion = companion_drill_path(traces);
            if companion != traces && companion.exists() {
                log::debug!("using drill file {}", companion.display());
                Some(load_layer(&companion)?)
            } else {
                log::debug!("no drill file at {}, rendering traces only", companion.display());
                None
            }
        }
    };

    Ok((traces_layer, drills))
}
