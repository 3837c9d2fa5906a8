//! Rendering module for pcb-msla.
//!
//! This module turns parsed artwork into monochrome masks and builds the
//! exposure ladders used for calibration.

mod canvas;
mod compositor;
mod frame;
mod sequencer;

pub use canvas::{pixel_extent, LayerCanvas, RenderSettings};
pub use compositor::LayerCompositor;
pub use frame::{Ink, RasterFrame};
pub use sequencer::{ExposureSequencer, ExposureSeries, ExposureStep, ExposureTestParams};
