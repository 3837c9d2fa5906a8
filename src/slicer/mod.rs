//! Slicer file output.
//!
//! A [`SliceJob`] lists full-bed layer images (PNG files) with their exposure
//! times. A [`SlicerCodec`] turns the job into the binary file the printer
//! firmware reads.

mod photon;
pub mod rle;

use std::path::{Path, PathBuf};

use crate::device::DeviceProfile;
use crate::error::Result;

pub use photon::PhotonCodec;

/// One layer record. `count > 1` repeats the image on consecutive layers.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceLayer {
    pub path: PathBuf,
    pub exposure_s: f32,
    pub count: u32,
}

impl SliceLayer {
    pub fn new(path: impl Into<PathBuf>, exposure_s: f32) -> Self {
        Self {
            path: path.into(),
            exposure_s,
            count: 1,
        }
    }
}

/// Everything a codec needs to write a file.
#[derive(Debug, Clone)]
pub struct SliceJob<'a> {
    pub device: &'a DeviceProfile,
    /// Number of leading layers exposed with the bottom exposure.
    pub bottom_layers: u32,
    pub layers: Vec<SliceLayer>,
}

impl SliceJob<'_> {
    /// Layers after expanding repeated records.
    pub fn expanded(&self) -> impl Iterator<Item = &SliceLayer> {
        self.layers
            .iter()
            .flat_map(|l| std::iter::repeat(l).take(l.count as usize))
    }

    pub fn layer_count(&self) -> u32 {
        self.layers.iter().map(|l| l.count).sum()
    }

    /// Exposure recorded as the header's bottom exposure.
    pub fn bottom_exposure(&self) -> f32 {
        self.expanded().next().map_or(0.0, |l| l.exposure_s)
    }

    /// Exposure recorded as the header's normal exposure. Falls back to the
    /// bottom exposure when every layer is a bottom layer.
    pub fn normal_exposure(&self) -> f32 {
        self.expanded()
            .nth(self.bottom_layers as usize)
            .map_or_else(|| self.bottom_exposure(), |l| l.exposure_s)
    }

    /// Sum of all layer exposures, in seconds.
    pub fn total_exposure(&self) -> f32 {
        self.expanded().map(|l| l.exposure_s).sum()
    }
}

/// Writes slice jobs to disk.
pub trait SlicerCodec {
    fn write(&self, job: &SliceJob<'_>, output: &Path) -> Result<()>;
}
