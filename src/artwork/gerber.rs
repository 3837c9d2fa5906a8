//! Gerber RS-274X parser.
//!
//! Reduces a Gerber file to a flat list of filled primitives in millimetres.
//! Attributes and other informational extended commands are skipped.

use std::collections::HashMap;
use std::f64::consts::PI;

use crate::error::{PcbError, Result};

use super::geometry::{convex_hull, Point, Polarity, Primitive, Shape};
use super::macros::{regular_polygon_vertices, ApertureMacro};
use super::{Layer, LayerKind};

const MM_PER_INCH: f64 = 25.4;

/// Angular step used when flattening arcs.
const ARC_STEP: f64 = PI / 72.0;

/// Parse Gerber source into a copper layer.
pub fn parse_gerber(source: &str) -> Result<Layer> {
    let mut state = GerberState::default();

    for token in tokenize(source)? {
        let keep_going = match token {
            Token::Extended(block) => {
                state.exec_extended(block)?;
                true
            }
            Token::Word(word) => state.exec_word(word)?,
        };
        if !keep_going {
            break;
        }
    }

    if state.region.is_some() {
        return Err(PcbError::Parse {
            message: "Region (G36) is never closed".to_string(),
            help: Some("Every G36 needs a matching G37".to_string()),
        });
    }

    Ok(Layer::new(LayerKind::Copper, state.primitives))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token<'a> {
    /// Contents between `%` delimiters.
    Extended(&'a str),
    /// A `*`-terminated word command.
    Word(&'a str),
}

fn tokenize(source: &str) -> Result<Vec<Token<'_>>> {
    let mut tokens = Vec::new();
    let mut rest = source;

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }

        if let Some(body) = rest.strip_prefix('%') {
            let end = body.find('%').ok_or_else(|| PcbError::Parse {
                message: "Unterminated extended command (missing closing %)".to_string(),
                help: None,
            })?;
            tokens.push(Token::Extended(&body[..end]));
            rest = &body[end + 1..];
        } else {
            let end = rest.find('*').ok_or_else(|| PcbError::Parse {
                message: format!("Unterminated command '{}'", first_line(rest)),
                help: Some("Gerber commands end with *".to_string()),
            })?;
            tokens.push(Token::Word(rest[..end].trim()));
            rest = &rest[end + 1..];
        }
    }

    Ok(tokens)
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or(s)
}

/// Coordinate number format from `%FS`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CoordinateFormat {
    integer: u32,
    decimal: u32,
    omit_trailing: bool,
}

impl Default for CoordinateFormat {
    fn default() -> Self {
        Self {
            integer: 3,
            decimal: 6,
            omit_trailing: false,
        }
    }
}

impl CoordinateFormat {
    fn parse(&self, raw: &str) -> Result<f64> {
        let invalid = || PcbError::parse(format!("Invalid coordinate '{}'", raw));

        if raw.contains('.') {
            return raw.parse::<f64>().map_err(|_| invalid());
        }

        let (negative, digits) = match raw.as_bytes().first() {
            Some(b'-') => (true, &raw[1..]),
            Some(b'+') => (false, &raw[1..]),
            _ => (false, raw),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let value: f64 = if self.omit_trailing {
            let width = (self.integer + self.decimal) as usize;
            format!("{:0<width$}", digits).parse::<f64>().map_err(|_| invalid())?
        } else {
            digits.parse::<f64>().map_err(|_| invalid())?
        };
        let value = value / 10f64.powi(self.decimal as i32);
        Ok(if negative { -value } else { value })
    }
}

/// A resolved aperture, dimensions in millimetres.
#[derive(Debug, Clone, PartialEq)]
enum Aperture {
    Circle { diameter: f64 },
    Rectangle { width: f64, height: f64 },
    Obround { width: f64, height: f64 },
    Polygon { diameter: f64, vertices: u32, rotation: f64 },
    Macro(Vec<super::macros::MacroShape>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interpolation {
    Linear,
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuadrantMode {
    Single,
    Multi,
}

#[derive(Debug, Default)]
struct Region {
    contours: Vec<Vec<Point>>,
    current: Vec<Point>,
}

impl Region {
    fn close_contour(&mut self) {
        let contour = std::mem::take(&mut self.current);
        if contour.len() >= 3 {
            self.contours.push(contour);
        }
    }
}

/// Coordinate data from one word command.
#[derive(Debug, Default)]
struct CoordinateData {
    x: Option<f64>,
    y: Option<f64>,
    i: Option<f64>,
    j: Option<f64>,
    op: Option<u32>,
}

struct GerberState {
    format: CoordinateFormat,
    /// Millimetres per file unit.
    unit: f64,
    macros: HashMap<String, ApertureMacro>,
    apertures: HashMap<u32, Aperture>,
    current_aperture: Option<u32>,
    position: Point,
    interpolation: Interpolation,
    quadrant: QuadrantMode,
    polarity: Polarity,
    region: Option<Region>,
    last_op: Option<u32>,
    primitives: Vec<Primitive>,
}

impl Default for GerberState {
    fn default() -> Self {
        Self {
            format: CoordinateFormat::default(),
            unit: 1.0,
            macros: HashMap::new(),
            apertures: HashMap::new(),
            current_aperture: None,
            position: Point::default(),
            interpolation: Interpolation::Linear,
            quadrant: QuadrantMode::Multi,
            polarity: Polarity::Dark,
            region: None,
            last_op: None,
            primitives: Vec::new(),
        }
    }
}

impl GerberState {
    fn exec_extended(&mut self, block: &str) -> Result<()> {
        let mut commands = block.split('*').map(str::trim).filter(|c| !c.is_empty());

        let Some(first) = commands.next() else {
            return Ok(());
        };

        if let Some(name) = first.strip_prefix("AM") {
            let aperture_macro = ApertureMacro::parse(name, commands)?;
            self.macros.insert(name.to_string(), aperture_macro);
            return Ok(());
        }

        for command in std::iter::once(first).chain(commands) {
            self.exec_extended_command(command)?;
        }
        Ok(())
    }

    fn exec_extended_command(&mut self, command: &str) -> Result<()> {
        let command: String = command.chars().filter(|c| !c.is_whitespace()).collect();

        if let Some(spec) = command.strip_prefix("FS") {
            self.format = parse_format_spec(spec)?;
        } else if let Some(units) = command.strip_prefix("MO") {
            self.unit = match units {
                "MM" => 1.0,
                "IN" => MM_PER_INCH,
                other => return Err(PcbError::parse(format!("Unknown unit '{}'", other))),
            };
        } else if let Some(polarity) = command.strip_prefix("LP") {
            self.polarity = match polarity {
                "D" => Polarity::Dark,
                "C" => Polarity::Clear,
                other => return Err(PcbError::parse(format!("Unknown polarity '{}'", other))),
            };
        } else if let Some(definition) = command.strip_prefix("ADD") {
            let (code, aperture) = self.parse_aperture(definition)?;
            self.apertures.insert(code, aperture);
        } else {
            log::debug!("ignoring extended command %{}*%", command);
        }
        Ok(())
    }

    fn parse_aperture(&self, definition: &str) -> Result<(u32, Aperture)> {
        let digits_end = definition
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(definition.len());
        let code = definition[..digits_end]
            .parse::<u32>()
            .map_err(|_| PcbError::parse(format!("Invalid aperture definition 'ADD{}'", definition)))?;

        let template = &definition[digits_end..];
        let (name, params) = template.split_once(',').unwrap_or((template, ""));
        let params = params
            .split('X')
            .filter(|p| !p.is_empty())
            .map(|p| {
                p.parse::<f64>()
                    .map_err(|_| PcbError::parse(format!("Invalid parameter '{}' for aperture D{}", p, code)))
            })
            .collect::<Result<Vec<_>>>()?;
        let param = |i: usize| -> Result<f64> {
            params.get(i).copied().ok_or_else(|| PcbError::Parse {
                message: format!("Aperture D{} ({}) is missing parameters", code, name),
                help: None,
            })
        };

        let u = self.unit;
        let aperture = match name {
            "C" => Aperture::Circle {
                diameter: param(0)? * u,
            },
            "R" => Aperture::Rectangle {
                width: param(0)? * u,
                height: param(1)? * u,
            },
            "O" => Aperture::Obround {
                width: param(0)? * u,
                height: param(1)? * u,
            },
            "P" => Aperture::Polygon {
                diameter: param(0)? * u,
                vertices: regular_polygon_vertices(param(1)?).ok_or_else(|| PcbError::Parse {
                    message: format!("Aperture D{}: polygon needs 3 to 12 vertices", code),
                    help: None,
                })?,
                rotation: params.get(2).copied().unwrap_or(0.0),
            },
            macro_name => {
                let aperture_macro = self.macros.get(macro_name).ok_or_else(|| PcbError::Parse {
                    message: format!("Aperture D{} uses unknown template '{}'", code, macro_name),
                    help: Some("Define the macro with %AM before using it".to_string()),
                })?;
                Aperture::Macro(aperture_macro.instantiate(&params, u)?)
            }
        };

        Ok((code, aperture))
    }

    /// Execute a word command. Returns `false` at end of file.
    fn exec_word(&mut self, raw: &str) -> Result<bool> {
        let mut rest = raw;

        // Leading G codes (a word may carry several, e.g. G01X..D01 or G54D10).
        while let Some(after) = rest.strip_prefix('G') {
            let digits_end = after.find(|c: char| !c.is_ascii_digit()).unwrap_or(after.len());
            let code = after[..digits_end]
                .parse::<u32>()
                .map_err(|_| PcbError::parse(format!("Invalid G code in '{}'", raw)))?;
            rest = &after[digits_end..];

            match code {
                4 => return Ok(true),
                1 => self.interpolation = Interpolation::Linear,
                2 => self.interpolation = Interpolation::Clockwise,
                3 => self.interpolation = Interpolation::CounterClockwise,
                36 => {
                    if self.region.is_some() {
                        return Err(PcbError::parse("Nested G36 region"));
                    }
                    self.region = Some(Region::default());
                }
                37 => self.end_region()?,
                70 => self.unit = MM_PER_INCH,
                71 => self.unit = 1.0,
                74 => self.quadrant = QuadrantMode::Single,
                75 => self.quadrant = QuadrantMode::Multi,
                91 => {
                    return Err(PcbError::Parse {
                        message: "Incremental coordinates (G91) are not supported".to_string(),
                        help: Some("Export the Gerber with absolute coordinates".to_string()),
                    })
                }
                _ => log::debug!("ignoring G{:02}", code),
            }
        }

        let word: String = rest.chars().filter(|c| !c.is_whitespace()).collect();
        let rest = word.as_str();

        if rest.is_empty() {
            return Ok(true);
        }

        if let Some(m) = rest.strip_prefix('M') {
            return Ok(!matches!(m, "02" | "2" | "00" | "0"));
        }

        if let Some(d) = rest.strip_prefix('D') {
            if let Ok(code) = d.parse::<u32>() {
                if code >= 10 {
                    if !self.apertures.contains_key(&code) {
                        return Err(PcbError::parse(format!("Aperture D{} selected but never defined", code)));
                    }
                    self.current_aperture = Some(code);
                    return Ok(true);
                }
            }
        }

        let data = self.parse_coordinate_data(rest)?;
        self.operate(data)?;
        Ok(true)
    }

    fn parse_coordinate_data(&self, word: &str) -> Result<CoordinateData> {
        let mut data = CoordinateData::default();
        let mut chars = word.char_indices().peekable();

        while let Some((start, letter)) = chars.next() {
            let value_start = start + letter.len_utf8();
            let mut value_end = value_start;
            while let Some(&(idx, c)) = chars.peek() {
                if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' {
                    value_end = idx + c.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let value = &word[value_start..value_end];

            match letter {
                'X' => data.x = Some(self.format.parse(value)? * self.unit),
                'Y' => data.y = Some(self.format.parse(value)? * self.unit),
                'I' => data.i = Some(self.format.parse(value)? * self.unit),
                'J' => data.j = Some(self.format.parse(value)? * self.unit),
                'D' => {
                    data.op = Some(
                        value
                            .parse::<u32>()
                            .map_err(|_| PcbError::parse(format!("Invalid operation in '{}'", word)))?,
                    )
                }
                other => {
                    return Err(PcbError::parse(format!("Unexpected '{}' in command '{}'", other, word)));
                }
            }
        }

        Ok(data)
    }

    fn operate(&mut self, data: CoordinateData) -> Result<()> {
        let op = match data.op.or(self.last_op) {
            Some(op) => op,
            None => return Ok(()),
        };
        self.last_op = Some(op);

        let target = Point::new(
            data.x.unwrap_or(self.position.x),
            data.y.unwrap_or(self.position.y),
        );
        let offset = (data.i.unwrap_or(0.0), data.j.unwrap_or(0.0));

        match op {
            1 => self.interpolate(target, offset)?,
            2 => {
                if let Some(region) = self.region.as_mut() {
                    region.close_contour();
                }
            }
            3 => self.flash(target)?,
            other => return Err(PcbError::parse(format!("Unknown operation D{:02}", other))),
        }

        self.position = target;
        Ok(())
    }

    fn interpolate(&mut self, target: Point, offset: (f64, f64)) -> Result<()> {
        let start = self.position;
        let mut path = vec![start];
        match self.interpolation {
            Interpolation::Linear => path.push(target),
            Interpolation::Clockwise => path.extend(self.arc_points(start, target, offset, true)?),
            Interpolation::CounterClockwise => {
                path.extend(self.arc_points(start, target, offset, false)?)
            }
        }

        if let Some(region) = self.region.as_mut() {
            if region.current.is_empty() {
                region.current.push(start);
            }
            region.current.extend_from_slice(&path[1..]);
            return Ok(());
        }

        let aperture = self.selected_aperture()?.clone();
        for segment in path.windows(2) {
            let shape = stroke_shape(&aperture, segment[0], segment[1])?;
            self.primitives.push(Primitive::new(shape, self.polarity));
        }
        Ok(())
    }

    fn flash(&mut self, at: Point) -> Result<()> {
        if self.region.is_some() {
            return Err(PcbError::parse("Flash (D03) is not allowed inside a region"));
        }

        let polarity = self.polarity;
        let aperture = self.selected_aperture()?;
        let primitives: Vec<Primitive> = match aperture {
            Aperture::Circle { diameter } => vec![Primitive::new(
                Shape::Circle {
                    center: at,
                    radius: diameter / 2.0,
                },
                polarity,
            )],
            Aperture::Rectangle { width, height } => {
                vec![Primitive::new(Shape::rectangle(at, *width, *height), polarity)]
            }
            Aperture::Obround { width, height } => {
                vec![Primitive::new(obround(at, *width, *height), polarity)]
            }
            Aperture::Polygon {
                diameter,
                vertices,
                rotation,
            } => vec![Primitive::new(
                Shape::regular_polygon(at, *diameter, (*vertices).max(3), *rotation),
                polarity,
            )],
            Aperture::Macro(shapes) => shapes
                .iter()
                .map(|s| {
                    let p = if s.exposure { polarity } else { polarity.inverted() };
                    Primitive::new(s.shape.clone().translate(at.x, at.y), p)
                })
                .collect(),
        };

        self.primitives.extend(primitives);
        Ok(())
    }

    fn end_region(&mut self) -> Result<()> {
        let mut region = self
            .region
            .take()
            .ok_or_else(|| PcbError::parse("G37 without a matching G36"))?;
        region.close_contour();
        for points in region.contours {
            self.primitives
                .push(Primitive::new(Shape::Polygon { points }, self.polarity));
        }
        Ok(())
    }

    fn selected_aperture(&self) -> Result<&Aperture> {
        let code = self.current_aperture.ok_or_else(|| PcbError::Parse {
            message: "Draw or flash before any aperture was selected".to_string(),
            help: Some("Select an aperture with Dnn* first".to_string()),
        })?;
        self.apertures
            .get(&code)
            .ok_or_else(|| PcbError::parse(format!("Aperture D{} is not defined", code)))
    }

    /// Points along an arc from `start` (exclusive) to `end` (inclusive).
    fn arc_points(&self, start: Point, end: Point, offset: (f64, f64), clockwise: bool) -> Result<Vec<Point>> {
        let (center, sweep) = match self.quadrant {
            QuadrantMode::Multi => {
                let center = start.offset(offset.0, offset.1);
                (center, arc_sweep(center, start, end, clockwise, true))
            }
            QuadrantMode::Single => {
                let (i, j) = (offset.0.abs(), offset.1.abs());
                [(i, j), (-i, j), (i, -j), (-i, -j)]
                    .into_iter()
                    .map(|(di, dj)| {
                        let center = start.offset(di, dj);
                        (center, arc_sweep(center, start, end, clockwise, false))
                    })
                    .filter(|(_, sweep)| sweep.abs() <= PI / 2.0 + 1e-6)
                    .min_by(|a, b| {
                        let ea = (a.0.distance(start) - a.0.distance(end)).abs();
                        let eb = (b.0.distance(start) - b.0.distance(end)).abs();
                        ea.total_cmp(&eb)
                    })
                    .ok_or_else(|| PcbError::parse("Single-quadrant arc spans more than 90 degrees"))?
            }
        };

        let radius = center.distance(start);
        let a0 = (start.y - center.y).atan2(start.x - center.x);
        let steps = ((sweep.abs() / ARC_STEP).ceil() as usize).max(1);

        let mut points: Vec<Point> = (1..steps)
            .map(|k| {
                let a = a0 + sweep * k as f64 / steps as f64;
                center.offset(radius * a.cos(), radius * a.sin())
            })
            .collect();
        points.push(end);
        Ok(points)
    }
}

/// Signed sweep angle from `start` to `end` around `center`.
fn arc_sweep(center: Point, start: Point, end: Point, clockwise: bool, full_circle: bool) -> f64 {
    let a0 = (start.y - center.y).atan2(start.x - center.x);
    let a1 = (end.y - center.y).atan2(end.x - center.x);
    let mut sweep = a1 - a0;

    if clockwise {
        if sweep > 0.0 || (sweep == 0.0 && full_circle) {
            sweep -= 2.0 * PI;
        }
    } else if sweep < 0.0 || (sweep == 0.0 && full_circle) {
        sweep += 2.0 * PI;
    }
    sweep
}

fn parse_format_spec(spec: &str) -> Result<CoordinateFormat> {
    let invalid = || PcbError::Parse {
        message: format!("Invalid format specification '%FS{}*%'", spec),
        help: Some("Expected something like %FSLAX46Y46*%".to_string()),
    };

    if spec.contains('I') && !spec.contains('A') {
        return Err(PcbError::Parse {
            message: "Incremental coordinate notation is not supported".to_string(),
            help: Some("Export the Gerber with absolute coordinates".to_string()),
        });
    }

    let omit_trailing = spec.starts_with('T');
    let x_at = spec.find('X').ok_or_else(invalid)?;
    let digits: Vec<u32> = spec[x_at + 1..]
        .chars()
        .take(2)
        .map(|c| c.to_digit(10))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(invalid)?;
    if digits.len() != 2 {
        return Err(invalid());
    }

    Ok(CoordinateFormat {
        integer: digits[0],
        decimal: digits[1],
        omit_trailing,
    })
}

fn obround(center: Point, width: f64, height: f64) -> Shape {
    if width > height {
        let half = (width - height) / 2.0;
        Shape::Capsule {
            from: center.offset(-half, 0.0),
            to: center.offset(half, 0.0),
            radius: height / 2.0,
        }
    } else {
        let half = (height - width) / 2.0;
        Shape::Capsule {
            from: center.offset(0.0, -half),
            to: center.offset(0.0, half),
            radius: width / 2.0,
        }
    }
}

fn stroke_shape(aperture: &Aperture, from: Point, to: Point) -> Result<Shape> {
    match aperture {
        Aperture::Circle { diameter } => Ok(Shape::Capsule {
            from,
            to,
            radius: diameter / 2.0,
        }),
        Aperture::Rectangle { width, height } => {
            let mut corners = Vec::with_capacity(8);
            for p in [from, to] {
                if let Shape::Polygon { points } = Shape::rectangle(p, *width, *height) {
                    corners.extend(points);
                }
            }
            Ok(Shape::Polygon {
                points: convex_hull(corners),
            })
        }
        _ => Err(PcbError::Parse {
            message: "Only circular or rectangular apertures can draw (D01)".to_string(),
            help: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artwork::geometry::Bounds;

    fn header() -> &'static str {
        "%FSLAX46Y46*%\n%MOMM*%\n"
    }

    #[test]
    fn test_coordinate_format_leading_omission() {
        let f = CoordinateFormat {
            integer: 4,
            decimal: 6,
            omit_trailing: false,
        };
        assert_eq!(f.parse("1500000").unwrap(), 1.5);
        assert_eq!(f.parse("-250000").unwrap(), -0.25);
        assert_eq!(f.parse("2.5").unwrap(), 2.5);
        assert!(f.parse("12a").is_err());
    }

    #[test]
    fn test_coordinate_format_trailing_omission() {
        let f = CoordinateFormat {
            integer: 2,
            decimal: 4,
            omit_trailing: true,
        };
        // "015" padded to "015000" -> 1.5
        assert_eq!(f.parse("015").unwrap(), 1.5);
    }

    #[test]
    fn test_parse_format_spec() {
        let f = parse_format_spec("LAX26Y26").unwrap();
        assert_eq!((f.integer, f.decimal, f.omit_trailing), (2, 6, false));
        assert!(parse_format_spec("LAY26").is_err());
    }

    #[test]
    fn test_flash_circle() {
        let src = format!("{}%ADD10C,1.000000*%\nD10*\nX2000000Y3000000D03*\nM02*\n", header());
        let layer = parse_gerber(&src).unwrap();
        assert_eq!(
            layer.primitives(),
            &[Primitive::dark(Shape::Circle {
                center: Point::new(2.0, 3.0),
                radius: 0.5
            })]
        );
        assert_eq!(layer.bounds(), Some(Bounds::new(1.5, 2.5, 2.5, 3.5)));
    }

    #[test]
    fn test_draw_with_modal_coordinates() {
        let src = format!(
            "{}%ADD10C,0.200000*%\nD10*\nX0Y0D02*\nX5000000D01*\nY5000000D01*\nM02*\n",
            header()
        );
        let layer = parse_gerber(&src).unwrap();
        assert_eq!(layer.primitives().len(), 2);
        assert_eq!(
            layer.primitives()[1].shape,
            Shape::Capsule {
                from: Point::new(5.0, 0.0),
                to: Point::new(5.0, 5.0),
                radius: 0.1
            }
        );
    }

    #[test]
    fn test_inch_units_convert_to_mm() {
        let src = "%FSLAX24Y24*%\n%MOIN*%\n%ADD10C,0.1*%\nD10*\nX10000Y0D03*\nM02*\n";
        let layer = parse_gerber(src).unwrap();
        match &layer.primitives()[0].shape {
            Shape::Circle { center, radius } => {
                assert!((center.x - 25.4).abs() < 1e-9);
                assert!((radius - 1.27).abs() < 1e-9);
            }
            other => panic!("expected circle, got {:?}", other),
        }
    }

    #[test]
    fn test_region_becomes_polygon() {
        let src = format!(
            "{}G36*\nX0Y0D02*\nG01X10000000Y0D01*\nX10000000Y5000000D01*\nX0Y5000000D01*\nX0Y0D01*\nG37*\nM02*\n",
            header()
        );
        let layer = parse_gerber(&src).unwrap();
        assert_eq!(layer.primitives().len(), 1);
        assert_eq!(layer.bounds(), Some(Bounds::new(0.0, 0.0, 10.0, 5.0)));
    }

    #[test]
    fn test_clear_polarity() {
        let src = format!(
            "{}%ADD10C,2.0*%\n%ADD11C,1.0*%\nD10*\nX0Y0D03*\n%LPC*%\nD11*\nX0Y0D03*\nM02*\n",
            header()
        );
        let layer = parse_gerber(&src).unwrap();
        assert_eq!(layer.primitives()[0].polarity, Polarity::Dark);
        assert_eq!(layer.primitives()[1].polarity, Polarity::Clear);
    }

    #[test]
    fn test_multi_quadrant_full_circle() {
        let src = format!(
            "{}%ADD10C,0.1*%\nD10*\nG75*\nX1000000Y0D02*\nG03X1000000Y0I-1000000J0D01*\nM02*\n",
            header()
        );
        let layer = parse_gerber(&src).unwrap();
        let b = layer.bounds().unwrap();
        assert!((b.min_x + 1.05).abs() < 1e-6);
        assert!((b.max_y - 1.05).abs() < 1e-6);
        assert!(layer.primitives().len() > 4);
    }

    #[test]
    fn test_single_quadrant_arc() {
        // Quarter circle from (1,0) to (0,1) counter-clockwise around origin.
        let src = format!(
            "{}%ADD10C,0.1*%\nD10*\nG74*\nX1000000Y0D02*\nG03X0Y1000000I1000000J0D01*\nM02*\n",
            header()
        );
        let layer = parse_gerber(&src).unwrap();
        let b = layer.bounds().unwrap();
        assert!(b.min_x > -0.06 && b.min_y > -0.06);
        assert!((b.max_x - 1.05).abs() < 1e-6);
    }

    #[test]
    fn test_macro_aperture_flash() {
        let src = format!(
            "{}%AMDONUT*\n1,1,$1,0,0*\n1,0,$2,0,0*%\n%ADD20DONUT,2.0X1.0*%\nD20*\nX0Y0D03*\nM02*\n",
            header()
        );
        let layer = parse_gerber(&src).unwrap();
        assert_eq!(layer.primitives().len(), 2);
        assert_eq!(layer.primitives()[1].polarity, Polarity::Clear);
    }

    #[test]
    fn test_rectangle_stroke_hull() {
        let src = format!(
            "{}%ADD10R,1.0X1.0*%\nD10*\nX0Y0D02*\nX4000000Y0D01*\nM02*\n",
            header()
        );
        let layer = parse_gerber(&src).unwrap();
        assert_eq!(layer.bounds(), Some(Bounds::new(-0.5, -0.5, 4.5, 0.5)));
    }

    #[test]
    fn test_attributes_and_comments_ignored() {
        let src = format!(
            "G04 generated by hand*\n%TF.FileFunction,Copper,L1,Top*%\n{}%ADD10C,1.0*%\nD10*\nX0Y0D03*\nM02*\n",
            header()
        );
        assert_eq!(parse_gerber(&src).unwrap().primitives().len(), 1);
    }

    #[test]
    fn test_undefined_aperture_is_error() {
        let src = format!("{}D11*\nX0Y0D03*\nM02*\n", header());
        assert!(matches!(parse_gerber(&src), Err(PcbError::Parse { .. })));
    }

    #[test]
    fn test_unclosed_region_is_error() {
        let src = format!("{}G36*\nX0Y0D02*\nX1000000Y0D01*\nM02*\n", header());
        assert!(parse_gerber(&src).is_err());
    }

    #[test]
    fn test_unterminated_command_is_error() {
        assert!(parse_gerber("%FSLAX46Y46*%\nX0Y0D03").is_err());
    }

    #[test]
    fn test_flash_without_aperture_is_error() {
        let src = format!("{}X0Y0D03*\n", header());
        assert!(parse_gerber(&src).is_err());
    }

    #[test]
    fn test_huge_outline_macro_is_parse_error() {
        let src = format!(
            "{}%AMBAD*4,1,99999999999999999999999,0,0,0*%\n%ADD10BAD*%\nD10*\nX0Y0D03*\nM02*\n",
            header()
        );
        assert!(matches!(parse_gerber(&src), Err(PcbError::Parse { .. })));
    }

    #[test]
    fn test_polygon_aperture_vertex_range() {
        let ok = format!("{}%ADD10P,2.0X8*%\nD10*\nX0Y0D03*\nM02*\n", header());
        assert_eq!(parse_gerber(&ok).unwrap().primitives().len(), 1);

        let bad = format!("{}%ADD10P,2.0X1000000*%\nD10*\nX0Y0D03*\nM02*\n", header());
        assert!(matches!(parse_gerber(&bad), Err(PcbError::Parse { .. })));
    }
}
