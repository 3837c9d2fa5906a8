//! Monochrome raster frames.

use std::path::Path;

use image::{GrayImage, Luma};

use crate::error::{PcbError, Result};

/// Binary pixel value. White pixels let UV light through the mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ink {
    Black,
    White,
}

impl Ink {
    pub fn luma(self) -> u8 {
        match self {
            Ink::Black => 0,
            Ink::White => 255,
        }
    }

    pub fn inverse(self) -> Self {
        match self {
            Ink::Black => Ink::White,
            Ink::White => Ink::Black,
        }
    }

    /// Threshold a grey level at the midpoint.
    pub fn from_luma(value: u8) -> Self {
        if value >= 0x80 {
            Ink::White
        } else {
            Ink::Black
        }
    }
}

/// A greyscale image holding only black and white pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterFrame {
    image: GrayImage,
}

impl RasterFrame {
    /// A `width` x `height` frame filled with `ink`.
    pub fn new(width: u32, height: u32, ink: Ink) -> Self {
        Self {
            image: GrayImage::from_pixel(width, height, Luma([ink.luma()])),
        }
    }

    /// Wrap an existing image, thresholding every pixel.
    pub fn from_image(mut image: GrayImage) -> Self {
        for pixel in image.pixels_mut() {
            pixel.0[0] = Ink::from_luma(pixel.0[0]).luma();
        }
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Pixel at (x, y); `None` outside the frame.
    pub fn get(&self, x: u32, y: u32) -> Option<Ink> {
        self.image
            .get_pixel_checked(x, y)
            .map(|p| Ink::from_luma(p.0[0]))
    }

    pub(crate) fn put(&mut self, x: u32, y: u32, ink: Ink) {
        self.image.put_pixel(x, y, Luma([ink.luma()]));
    }

    /// Fill a rectangle, clipped to the frame.
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, ink: Ink) {
        let x_end = x.saturating_add(width).min(self.width());
        let y_end = y.saturating_add(height).min(self.height());
        for py in y.min(y_end)..y_end {
            for px in x.min(x_end)..x_end {
                self.put(px, py, ink);
            }
        }
    }

    /// Copy `src` with its top-left corner at (x, y). Pixels falling outside
    /// the frame are dropped; returns `true` if anything was dropped.
    pub fn blit(&mut self, src: &RasterFrame, x: u32, y: u32) -> bool {
        let mut clipped = false;
        for (sx, sy, pixel) in src.image.enumerate_pixels() {
            let (dx, dy) = (x.saturating_add(sx), y.saturating_add(sy));
            if dx < self.width() && dy < self.height() {
                self.image.put_pixel(dx, dy, *pixel);
            } else {
                clipped = true;
            }
        }
        clipped
    }

    /// Number of pixels of the given ink.
    pub fn count(&self, ink: Ink) -> usize {
        let luma = ink.luma();
        self.image.pixels().filter(|p| p.0[0] == luma).count()
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.image.save(path).map_err(|e| PcbError::Io {
            path: path.to_path_buf(),
            message: format!("Failed to write PNG: {}", e),
        })
    }
}
