//! pcb-msla - PCB exposure files for mSLA resin printers
//!
//! A library for turning Gerber and Excellon artwork into `.cbddlp`/`.photon`
//! slicer files that photo-expose a circuit board on the printer's LCD.

pub mod artwork;
pub mod cli;
pub mod device;
pub mod error;
pub mod output;
pub mod render;
pub mod scale;
pub mod session;
pub mod slicer;

pub use artwork::{load_layer, parse_excellon, parse_gerber, BuiltinPattern, Layer, LayerKind};
pub use device::{DeviceCatalog, DeviceProfile, PrintParams, Size, SlicerFormat};
pub use error::{PcbError, Result};
pub use render::{
    ExposureSequencer, ExposureSeries, ExposureTestParams, Ink, LayerCanvas, LayerCompositor,
    RasterFrame, RenderSettings,
};
pub use scale::{mm_to_px, px_to_mm, scale};
pub use session::{blank_output_path, RenderReport, RenderSession, SessionDefaults};
pub use slicer::{PhotonCodec, SliceJob, SliceLayer, SlicerCodec};
