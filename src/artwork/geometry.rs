//! Geometry primitives for parsed artwork, in millimetres.
//!
//! Gerber and Excellon use a Y-up coordinate system; everything here keeps
//! that convention. The rasterizer flips Y when mapping onto pixels.

use std::f64::consts::PI;

/// A point in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Rotate counter-clockwise about the origin by `degrees`.
    pub fn rotate(self, degrees: f64) -> Self {
        if degrees == 0.0 {
            return self;
        }
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Bounds of a single point, grown by `margin` on every side.
    pub fn around(p: Point, margin: f64) -> Self {
        Self::new(p.x - margin, p.y - margin, p.x + margin, p.y + margin)
    }

    pub fn expand(&mut self, other: &Bounds) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    pub fn union(a: Option<Bounds>, b: Option<Bounds>) -> Option<Bounds> {
        match (a, b) {
            (Some(mut a), Some(b)) => {
                a.expand(&b);
                Some(a)
            }
            (a, None) => a,
            (None, b) => b,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Whether a primitive adds material (dark) or removes it (clear).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Polarity {
    #[default]
    Dark,
    Clear,
}

impl Polarity {
    pub fn inverted(self) -> Self {
        match self {
            Polarity::Dark => Polarity::Clear,
            Polarity::Clear => Polarity::Dark,
        }
    }
}

/// A filled shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Circle { center: Point, radius: f64 },
    /// A segment swept by a circle (round-ended line).
    Capsule { from: Point, to: Point, radius: f64 },
    /// A closed contour filled with the even-odd rule.
    Polygon { points: Vec<Point> },
}

impl Shape {
    pub fn bounds(&self) -> Bounds {
        match self {
            Shape::Circle { center, radius } => Bounds::around(*center, *radius),
            Shape::Capsule { from, to, radius } => {
                let mut b = Bounds::around(*from, *radius);
                b.expand(&Bounds::around(*to, *radius));
                b
            }
            Shape::Polygon { points } => {
                let first = points.first().copied().unwrap_or_default();
                points.iter().fold(Bounds::around(first, 0.0), |mut b, p| {
                    b.expand(&Bounds::around(*p, 0.0));
                    b
                })
            }
        }
    }

    pub fn translate(self, dx: f64, dy: f64) -> Self {
        match self {
            Shape::Circle { center, radius } => Shape::Circle {
                center: center.offset(dx, dy),
                radius,
            },
            Shape::Capsule { from, to, radius } => Shape::Capsule {
                from: from.offset(dx, dy),
                to: to.offset(dx, dy),
                radius,
            },
            Shape::Polygon { points } => Shape::Polygon {
                points: points.into_iter().map(|p| p.offset(dx, dy)).collect(),
            },
        }
    }

    /// Axis-aligned rectangle centred on `center`.
    pub fn rectangle(center: Point, width: f64, height: f64) -> Self {
        let (hw, hh) = (width / 2.0, height / 2.0);
        Shape::Polygon {
            points: vec![
                center.offset(-hw, -hh),
                center.offset(hw, -hh),
                center.offset(hw, hh),
                center.offset(-hw, hh),
            ],
        }
    }

    /// Regular polygon with `vertices` corners on a circle of `diameter`.
    pub fn regular_polygon(center: Point, diameter: f64, vertices: u32, rotation: f64) -> Self {
        let radius = diameter / 2.0;
        let step = 2.0 * PI / f64::from(vertices);
        let start = rotation.to_radians();
        Shape::Polygon {
            points: (0..vertices)
                .map(|k| {
                    let a = start + step * f64::from(k);
                    center.offset(radius * a.cos(), radius * a.sin())
                })
                .collect(),
        }
    }
}

/// A shape with its polarity.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub shape: Shape,
    pub polarity: Polarity,
}

impl Primitive {
    pub fn dark(shape: Shape) -> Self {
        Self {
            shape,
            polarity: Polarity::Dark,
        }
    }

    pub fn new(shape: Shape, polarity: Polarity) -> Self {
        Self { shape, polarity }
    }
}

/// Convex hull of a point set (Andrew's monotone chain), counter-clockwise.
pub fn convex_hull(mut points: Vec<Point>) -> Vec<Point> {
    points.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    points.dedup();
    if points.len() < 3 {
        return points;
    }

    fn cross(o: Point, a: Point, b: Point) -> f64 {
        (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
    }

    let mut lower: Vec<Point> = Vec::new();
    for &p in &points {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<Point> = Vec::new();
    for &p in points.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_quarter_turn() {
        let p = Point::new(1.0, 0.0).rotate(90.0);
        assert!(p.x.abs() < 1e-12);
        assert!((p.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_capsule_bounds_include_radius() {
        let shape = Shape::Capsule {
            from: Point::new(0.0, 0.0),
            to: Point::new(10.0, 0.0),
            radius: 0.5,
        };
        assert_eq!(shape.bounds(), Bounds::new(-0.5, -0.5, 10.5, 0.5));
    }

    #[test]
    fn test_union_with_none() {
        let a = Bounds::new(0.0, 0.0, 1.0, 1.0);
        assert_eq!(Bounds::union(Some(a), None), Some(a));
        assert_eq!(Bounds::union(None, None), None);
        let b = Bounds::new(-1.0, 0.5, 0.5, 3.0);
        assert_eq!(
            Bounds::union(Some(a), Some(b)),
            Some(Bounds::new(-1.0, 0.0, 1.0, 3.0))
        );
    }

    #[test]
    fn test_convex_hull_of_two_rectangles() {
        let mut points = Vec::new();
        for cx in [0.0, 10.0] {
            if let Shape::Polygon { points: corners } = Shape::rectangle(Point::new(cx, 0.0), 2.0, 2.0) {
                points.extend(corners);
            }
        }
        let hull = convex_hull(points);
        // Inner corners are dropped
        assert_eq!(hull.len(), 4);
        let b = Shape::Polygon { points: hull }.bounds();
        assert_eq!(b, Bounds::new(-1.0, -1.0, 11.0, 1.0));
    }

    #[test]
    fn test_regular_polygon_vertex_count() {
        if let Shape::Polygon { points } = Shape::regular_polygon(Point::default(), 2.0, 6, 0.0) {
            assert_eq!(points.len(), 6);
            assert!((points[0].x - 1.0).abs() < 1e-12);
        } else {
            panic!("expected polygon");
        }
    }
}
