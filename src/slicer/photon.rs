//! CBDDLP / Photon v2 writer.
//!
//! Both formats share one layout; only the file extension differs. Sections
//! are written back to back:
//!
//! ```text
//! header (112) | large preview | small preview | print params (60)
//!              | layer table (36 per layer) | layer data
//! ```
//!
//! Layers repeated through [`SliceLayer::count`](super::SliceLayer) share a
//! single copy of their image data.

use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use image::imageops::{self, FilterType};
use image::GrayImage;

use crate::device::DeviceProfile;
use crate::error::{PcbError, Result};

use super::rle::{encode_rle1, encode_rle15};
use super::{SliceJob, SlicerCodec};

pub(crate) const MAGIC: u32 = 0x12FD_0019;
const VERSION: u32 = 2;

pub(crate) const HEADER_SIZE: u32 = 112;
const PREVIEW_HEADER_SIZE: u32 = 32;
const PRINT_PARAMS_SIZE: u32 = 60;
pub(crate) const LAYER_HEADER_SIZE: u32 = 36;

const LARGE_PREVIEW: (u32, u32) = (400, 300);
const SMALL_PREVIEW: (u32, u32) = (200, 125);

/// Grey level at which a layer pixel counts as lit.
const THRESHOLD: u8 = 0x80;

const PROJECTOR_LCD_MIRROR: u32 = 1;
const ANTIALIAS_LEVEL: u32 = 1;

type Le = LittleEndian;

/// Writes `.cbddlp` and `.photon` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhotonCodec;

impl SlicerCodec for PhotonCodec {
    fn write(&self, job: &SliceJob<'_>, output: &Path) -> Result<()> {
        let bytes = self.encode(job)?;
        std::fs::write(output, &bytes).map_err(|e| PcbError::Io {
            path: output.to_path_buf(),
            message: format!("Failed to write slicer file: {}", e),
        })?;
        log::debug!(
            "wrote {} ({} bytes, {} layers)",
            output.display(),
            bytes.len(),
            job.layer_count()
        );
        Ok(())
    }
}

struct Preview {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Preview {
    fn from_layer(layer: &GrayImage, (width, height): (u32, u32)) -> Self {
        let thumb = imageops::resize(layer, width, height, FilterType::Triangle);
        let data = encode_rle15(thumb.pixels().map(|p| [p.0[0]; 3]));
        Self {
            width,
            height,
            data,
        }
    }

    fn write_header(&self, out: &mut Vec<u8>, offset: u32) -> Result<()> {
        out.write_u32::<Le>(self.width)?;
        out.write_u32::<Le>(self.height)?;
        out.write_u32::<Le>(offset + PREVIEW_HEADER_SIZE)?;
        out.write_u32::<Le>(len_u32(&self.data))?;
        write_padding(out, 4)
    }
}

fn len_u32(data: &[u8]) -> u32 {
    u32::try_from(data.len()).unwrap_or(u32::MAX)
}

fn write_padding(out: &mut Vec<u8>, words: usize) -> Result<()> {
    for _ in 0..words {
        out.write_u32::<Le>(0)?;
    }
    Ok(())
}

fn load_layer_image(path: &Path, device: &DeviceProfile) -> Result<GrayImage> {
    let image = image::open(path)
        .map_err(|e| PcbError::Io {
            path: path.to_path_buf(),
            message: format!("Failed to read layer image: {}", e),
        })?
        .to_luma8();

    if image.dimensions() != (device.px.width, device.px.height) {
        return Err(PcbError::Io {
            path: path.to_path_buf(),
            message: format!(
                "Layer image is {}x{} but device '{}' is {}x{}",
                image.width(),
                image.height(),
                device.name,
                device.px.width,
                device.px.height
            ),
        });
    }
    Ok(image)
}

/// Byte offsets of every section.
struct Layout {
    large_preview: u32,
    small_preview: u32,
    print_params: u32,
    layer_table: u32,
    /// Data offset of each layer record's image.
    record_data: Vec<u32>,
}

impl Layout {
    fn plan(large: &Preview, small: &Preview, layer_count: u32, encoded: &[Vec<u8>]) -> Self {
        let large_preview = HEADER_SIZE;
        let small_preview = large_preview + PREVIEW_HEADER_SIZE + len_u32(&large.data);
        let print_params = small_preview + PREVIEW_HEADER_SIZE + len_u32(&small.data);
        let layer_table = print_params + PRINT_PARAMS_SIZE;

        let mut next = layer_table + LAYER_HEADER_SIZE * layer_count;
        let record_data = encoded
            .iter()
            .map(|data| {
                let offset = next;
                next += len_u32(data);
                offset
            })
            .collect();

        Self {
            large_preview,
            small_preview,
            print_params,
            layer_table,
            record_data,
        }
    }
}

impl PhotonCodec {
    /// Encode a job into file bytes.
    pub fn encode(&self, job: &SliceJob<'_>) -> Result<Vec<u8>> {
        let device = job.device;
        let print = &device.print;

        // Only one decoded layer is held at a time.
        let mut previews = None;
        let mut encoded = Vec::with_capacity(job.layers.len());
        for layer in &job.layers {
            let image = load_layer_image(&layer.path, device)?;
            if previews.is_none() {
                previews = Some((
                    Preview::from_layer(&image, LARGE_PREVIEW),
                    Preview::from_layer(&image, SMALL_PREVIEW),
                ));
            }
            encoded.push(encode_rle1(image.as_raw(), THRESHOLD));
        }
        let Some((large, small)) = previews else {
            return Err(PcbError::config("Slice job has no layers"));
        };

        let layer_count = job.layer_count();
        let layout = Layout::plan(&large, &small, layer_count, &encoded);
        let print_time =
            (job.total_exposure() + print.light_off_time_s * layer_count as f32).round() as u32;

        let mut out = Vec::new();

        // Header
        out.write_u32::<Le>(MAGIC)?;
        out.write_u32::<Le>(VERSION)?;
        out.write_f32::<Le>(device.mm.width as f32)?;
        out.write_f32::<Le>(device.mm.height as f32)?;
        out.write_f32::<Le>(device.height_mm as f32)?;
        write_padding(&mut out, 3)?;
        out.write_f32::<Le>(print.layer_height_mm)?;
        out.write_f32::<Le>(job.normal_exposure())?;
        out.write_f32::<Le>(job.bottom_exposure())?;
        out.write_f32::<Le>(print.light_off_time_s)?;
        out.write_u32::<Le>(job.bottom_layers)?;
        out.write_u32::<Le>(device.px.width)?;
        out.write_u32::<Le>(device.px.height)?;
        out.write_u32::<Le>(layout.large_preview)?;
        out.write_u32::<Le>(layout.layer_table)?;
        out.write_u32::<Le>(layer_count)?;
        out.write_u32::<Le>(layout.small_preview)?;
        out.write_u32::<Le>(print_time)?;
        out.write_u32::<Le>(PROJECTOR_LCD_MIRROR)?;
        out.write_u32::<Le>(layout.print_params)?;
        out.write_u32::<Le>(PRINT_PARAMS_SIZE)?;
        out.write_u32::<Le>(ANTIALIAS_LEVEL)?;
        out.write_u16::<Le>(print.light_pwm)?;
        out.write_u16::<Le>(print.light_pwm)?;
        // Encryption key, slicer info offset and size: unused
        write_padding(&mut out, 3)?;

        // Previews
        large.write_header(&mut out, layout.large_preview)?;
        out.extend_from_slice(&large.data);
        small.write_header(&mut out, layout.small_preview)?;
        out.extend_from_slice(&small.data);

        // Print parameters
        for value in [
            print.lift_distance_mm,
            print.lift_speed_mmpm,
            print.lift_distance_mm,
            print.lift_speed_mmpm,
            print.retract_speed_mmpm,
            0.0, // volume (ml)
            0.0, // weight (g)
            0.0, // cost
            print.light_off_time_s,
            print.light_off_time_s,
        ] {
            out.write_f32::<Le>(value)?;
        }
        out.write_u32::<Le>(job.bottom_layers)?;
        write_padding(&mut out, 4)?;

        // Layer table
        let mut index = 0u32;
        for (record, layer) in job.layers.iter().enumerate() {
            for _ in 0..layer.count {
                index += 1;
                out.write_f32::<Le>(index as f32 * print.layer_height_mm)?;
                out.write_f32::<Le>(layer.exposure_s)?;
                out.write_f32::<Le>(print.light_off_time_s)?;
                out.write_u32::<Le>(layout.record_data[record])?;
                out.write_u32::<Le>(len_u32(&encoded[record]))?;
                write_padding(&mut out, 4)?;
            }
        }

        // Layer data
        for data in &encoded {
            out.extend_from_slice(data);
        }

        Ok(out)
    }
}
