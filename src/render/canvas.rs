//! Rasterizes artwork layers onto a pixel grid.
//!
//! The canvas maps millimetres to pixels at a fixed scale. Pixel (0, 0) is the
//! top-left corner, so the artwork's Y axis is flipped. A pixel is painted when
//! its centre falls inside a shape.

use crate::artwork::{Bounds, Layer, Point, Polarity, Shape};
use crate::scale::mm_to_px;

use super::frame::{Ink, RasterFrame};

/// How a layer is painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSettings {
    /// Ink for dark primitives.
    pub foreground: Ink,
    /// Fill applied to the whole canvas before drawing. `None` draws over
    /// whatever is already there.
    pub background: Option<Ink>,
}

impl RenderSettings {
    /// Ink used for clear primitives.
    fn clear_ink(&self) -> Ink {
        self.background.unwrap_or(self.foreground.inverse())
    }
}

/// Number of whole pixels needed to cover `mm` at `scale`, at least one.
pub fn pixel_extent(mm: f64, scale: f64) -> u32 {
    // Tolerate float noise so 30mm at 10px/mm is 300px, not 301.
    ((mm_to_px(mm, scale) - 1e-6).ceil().max(1.0)) as u32
}

/// A drawing surface bound to a region of board space.
#[derive(Debug, Clone)]
pub struct LayerCanvas {
    scale: f64,
    bounds: Option<Bounds>,
    frame: Option<RasterFrame>,
}

impl LayerCanvas {
    pub fn new(scale: f64) -> Self {
        Self {
            scale,
            bounds: None,
            frame: None,
        }
    }

    /// Fix the board region covered by the canvas and allocate its frame.
    pub fn bind(&mut self, bounds: Bounds) {
        let width = pixel_extent(bounds.width(), self.scale);
        let height = pixel_extent(bounds.height(), self.scale);
        self.bounds = Some(bounds);
        self.frame = Some(RasterFrame::new(width, height, Ink::White));
    }

    /// Pixel size of the bound frame.
    pub fn rendered_size(&self) -> Option<(u32, u32)> {
        self.frame.as_ref().map(RasterFrame::size)
    }

    /// Paint a layer. An unbound canvas binds to the layer's own extent.
    pub fn render(&mut self, layer: &Layer, settings: RenderSettings) {
        if self.frame.is_none() {
            let bounds = layer
                .bounds()
                .unwrap_or_else(|| Bounds::around(Point::default(), 0.5 / self.scale));
            self.bind(bounds);
        }
        let (Some(bounds), Some(frame)) = (self.bounds, self.frame.as_mut()) else {
            return;
        };

        if let Some(background) = settings.background {
            let (w, h) = frame.size();
            frame.fill_rect(0, 0, w, h, background);
        }

        let mapper = PixelMapper {
            origin_x: bounds.min_x,
            origin_y: bounds.max_y,
            scale: self.scale,
        };
        for primitive in layer.primitives() {
            let ink = match primitive.polarity {
                Polarity::Dark => settings.foreground,
                Polarity::Clear => settings.clear_ink(),
            };
            paint(frame, &mapper, &primitive.shape, ink);
        }
    }

    /// Take the rendered frame. An unbound canvas yields a single white pixel.
    pub fn into_frame(self) -> RasterFrame {
        self.frame
            .unwrap_or_else(|| RasterFrame::new(1, 1, Ink::White))
    }
}

struct PixelMapper {
    origin_x: f64,
    origin_y: f64,
    scale: f64,
}

impl PixelMapper {
    /// Board position of a pixel centre.
    fn center(&self, i: u32, j: u32) -> Point {
        Point::new(
            self.origin_x + (f64::from(i) + 0.5) / self.scale,
            self.origin_y - (f64::from(j) + 0.5) / self.scale,
        )
    }

    /// Pixel ranges (columns, rows) that may hold centres inside `b`.
    fn span(&self, b: &Bounds, width: u32, height: u32) -> (std::ops::Range<u32>, std::ops::Range<u32>) {
        let to_index = |v: f64, limit: u32| v.max(0.0).min(f64::from(limit)) as u32;
        let px = |mm: f64| mm_to_px(mm, self.scale);
        let i0 = to_index((px(b.min_x - self.origin_x) - 0.5).floor(), width);
        let i1 = to_index((px(b.max_x - self.origin_x) + 0.5).ceil(), width);
        let j0 = to_index((px(self.origin_y - b.max_y) - 0.5).floor(), height);
        let j1 = to_index((px(self.origin_y - b.min_y) + 0.5).ceil(), height);
        (i0..i1, j0..j1)
    }
}

fn paint(frame: &mut RasterFrame, mapper: &PixelMapper, shape: &Shape, ink: Ink) {
    let (columns, rows) = mapper.span(&shape.bounds(), frame.width(), frame.height());
    for j in rows {
        for i in columns.clone() {
            if contains(shape, mapper.center(i, j)) {
                frame.put(i, j, ink);
            }
        }
    }
}

fn contains(shape: &Shape, p: Point) -> bool {
    match shape {
        Shape::Circle { center, radius } => p.distance(*center) <= *radius,
        Shape::Capsule { from, to, radius } => segment_distance(p, *from, *to) <= *radius,
        Shape::Polygon { points } => even_odd(points, p),
    }
}

fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0);
    p.distance(a.offset(t * dx, t * dy))
}

/// Even-odd point-in-polygon test, contour implicitly closed.
fn even_odd(points: &[Point], p: Point) -> bool {
    let mut inside = false;
    let n = points.len();
    for k in 0..n {
        let a = points[k];
        let b = points[(k + 1) % n];
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x {
                inside = !inside;
            }
        }
    }
    inside
}
