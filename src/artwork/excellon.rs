//! Excellon drill file parser.
//!
//! Produces one circle per hit and one capsule per routed slot (`G85`).

use std::collections::HashMap;

use crate::error::{PcbError, Result};

use super::geometry::{Point, Primitive, Shape};
use super::{Layer, LayerKind};

const MM_PER_INCH: f64 = 25.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Units {
    Metric,
    Inch,
}

impl Units {
    fn to_mm(self, value: f64) -> f64 {
        match self {
            Units::Metric => value,
            Units::Inch => value * MM_PER_INCH,
        }
    }

    /// Implied digit layout when coordinates have no decimal point.
    fn default_digits(self) -> (usize, u32) {
        match self {
            Units::Metric => (3, 3),
            Units::Inch => (2, 4),
        }
    }
}

struct ExcellonState {
    units: Units,
    /// `LZ` keeps leading zeros, so trailing ones are dropped.
    leading_zeros: bool,
    digits: Option<(usize, u32)>,
    /// Tool diameters in millimetres.
    tools: HashMap<u32, f64>,
    tool: Option<u32>,
    position: Point,
    primitives: Vec<Primitive>,
}

impl Default for ExcellonState {
    fn default() -> Self {
        Self {
            units: Units::Metric,
            leading_zeros: false,
            digits: None,
            tools: HashMap::new(),
            tool: None,
            position: Point::default(),
            primitives: Vec::new(),
        }
    }
}

/// Parse Excellon source into a drill layer.
pub fn parse_excellon(source: &str) -> Result<Layer> {
    let mut state = ExcellonState::default();
    let mut in_header = false;

    for (index, raw) in source.lines().enumerate() {
        let line = match raw.split_once(';') {
            Some((code, _)) => code.trim(),
            None => raw.trim(),
        };
        if line.is_empty() {
            continue;
        }
        let at_line = |e: PcbError| match e {
            PcbError::Parse { message, help } => PcbError::Parse {
                message: format!("line {}: {}", index + 1, message),
                help,
            },
            other => other,
        };

        match line {
            "M48" => {
                in_header = true;
                continue;
            }
            "%" | "M95" => {
                in_header = false;
                continue;
            }
            "M30" | "M00" => break,
            _ => {}
        }

        if in_header {
            state.header_line(line).map_err(at_line)?;
        } else {
            state.body_line(line).map_err(at_line)?;
        }
    }

    Ok(Layer::new(LayerKind::Drill, state.primitives))
}

impl ExcellonState {
    fn header_line(&mut self, line: &str) -> Result<()> {
        let mut fields = line.split(',').map(str::trim);
        match fields.next() {
            Some(unit @ ("METRIC" | "INCH")) => {
                self.units = if unit == "METRIC" { Units::Metric } else { Units::Inch };
                for field in fields {
                    match field {
                        "LZ" => self.leading_zeros = true,
                        "TZ" => self.leading_zeros = false,
                        layout if layout.contains('.') => {
                            let (int, dec) = layout.split_once('.').unwrap_or((layout, ""));
                            self.digits = Some((int.len(), dec.len() as u32));
                        }
                        _ => {}
                    }
                }
            }
            Some(tool) if tool.starts_with('T') => {
                let (code, diameter) = self.tool_definition(tool)?;
                self.tools.insert(code, diameter);
            }
            _ => log::debug!("ignoring drill header line '{}'", line),
        }
        Ok(())
    }

    fn body_line(&mut self, line: &str) -> Result<()> {
        if let Some(rest) = line.strip_prefix('T') {
            // Some tools are defined inline in the body (T1C0.8).
            if rest.contains('C') {
                let (code, diameter) = self.tool_definition(line)?;
                self.tools.insert(code, diameter);
                self.tool = Some(code);
                return Ok(());
            }
            let code = rest
                .parse::<u32>()
                .map_err(|_| PcbError::parse(format!("Invalid tool selection '{}'", line)))?;
            // T0 unloads the tool.
            self.tool = (code != 0).then_some(code);
            return Ok(());
        }

        match line {
            "M71" => {
                self.units = Units::Metric;
                return Ok(());
            }
            "M72" => {
                self.units = Units::Inch;
                return Ok(());
            }
            _ => {}
        }

        if line.starts_with('X') || line.starts_with('Y') {
            if let Some((start, end)) = line.split_once("G85") {
                let from = self.coordinates(start, self.position)?;
                let to = self.coordinates(end, from)?;
                let radius = self.tool_diameter()? / 2.0;
                self.primitives
                    .push(Primitive::dark(Shape::Capsule { from, to, radius }));
                self.position = to;
            } else {
                let center = self.coordinates(line, self.position)?;
                let radius = self.tool_diameter()? / 2.0;
                self.primitives
                    .push(Primitive::dark(Shape::Circle { center, radius }));
                self.position = center;
            }
            return Ok(());
        }

        log::debug!("ignoring drill command '{}'", line);
        Ok(())
    }

    fn tool_definition(&self, def: &str) -> Result<(u32, f64)> {
        let invalid = || PcbError::Parse {
            message: format!("Invalid tool definition '{}'", def),
            help: Some("Tools look like T1C0.800".to_string()),
        };
        let body = def.strip_prefix('T').ok_or_else(invalid)?;
        let code_end = body.find(|c: char| !c.is_ascii_digit()).unwrap_or(body.len());
        let code = body[..code_end].parse::<u32>().map_err(|_| invalid())?;

        let c_at = body.find('C').ok_or_else(invalid)?;
        let diameter_str: String = body[c_at + 1..]
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let diameter = diameter_str.parse::<f64>().map_err(|_| invalid())?;

        Ok((code, self.units.to_mm(diameter)))
    }

    fn tool_diameter(&self) -> Result<f64> {
        let code = self.tool.ok_or_else(|| PcbError::Parse {
            message: "Drill hit before any tool was selected".to_string(),
            help: Some("Select a tool with Tnn first".to_string()),
        })?;
        self.tools
            .get(&code)
            .copied()
            .ok_or_else(|| PcbError::parse(format!("Tool T{} is not defined in the header", code)))
    }

    /// Parse `X..Y..`, keeping missing axes from `previous`.
    fn coordinates(&self, text: &str, previous: Point) -> Result<Point> {
        let mut point = previous;
        let mut rest = text.trim();

        while let Some(axis) = rest.chars().next() {
            let tail = &rest[axis.len_utf8()..];
            let value_len = tail
                .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
                .unwrap_or(tail.len());
            let value = &tail[..value_len];
            match axis {
                'X' => point.x = self.number(value)?,
                'Y' => point.y = self.number(value)?,
                other => {
                    return Err(PcbError::parse(format!(
                        "Unexpected '{}' in drill coordinate '{}'",
                        other, text
                    )))
                }
            }
            rest = &tail[value_len..];
        }

        Ok(point)
    }

    fn number(&self, raw: &str) -> Result<f64> {
        let invalid = || PcbError::parse(format!("Invalid drill coordinate '{}'", raw));

        if raw.contains('.') {
            return raw.parse::<f64>().map(|v| self.units.to_mm(v)).map_err(|_| invalid());
        }

        let (negative, digits) = match raw.as_bytes().first() {
            Some(b'-') => (true, &raw[1..]),
            Some(b'+') => (false, &raw[1..]),
            _ => (false, raw),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let (integer, decimal) = self.digits.unwrap_or_else(|| self.units.default_digits());
        let value: f64 = if self.leading_zeros {
            let width = integer + decimal as usize;
            format!("{:0<width$}", digits).parse().map_err(|_| invalid())?
        } else {
            digits.parse().map_err(|_| invalid())?
        };
        let value = value / 10f64.powi(decimal as i32);

        Ok(self.units.to_mm(if negative { -value } else { value }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artwork::geometry::Bounds;

    #[test]
    fn test_metric_decimal_hits() {
        let src = "M48\nMETRIC,TZ\nT1C0.800\n%\nT1\nX10.0Y5.0\nX12.5Y5.0\nM30\n";
        let layer = parse_excellon(src).unwrap();
        assert_eq!(layer.kind(), LayerKind::Drill);
        assert_eq!(
            layer.primitives(),
            &[
                Primitive::dark(Shape::Circle {
                    center: Point::new(10.0, 5.0),
                    radius: 0.4
                }),
                Primitive::dark(Shape::Circle {
                    center: Point::new(12.5, 5.0),
                    radius: 0.4
                }),
            ]
        );
    }

    #[test]
    fn test_inch_implied_decimal() {
        // INCH,TZ: 2.4 layout, leading zeros omitted
        let src = "M48\nINCH,TZ\nT1C0.0400\n%\nT1\nX10000Y5000\nM30\n";
        let layer = parse_excellon(src).unwrap();
        match &layer.primitives()[0].shape {
            Shape::Circle { center, radius } => {
                assert!((center.x - 25.4).abs() < 1e-9);
                assert!((center.y - 12.7).abs() < 1e-9);
                assert!((radius - 0.508).abs() < 1e-9);
            }
            other => panic!("expected circle, got {:?}", other),
        }
    }

    #[test]
    fn test_leading_zero_format() {
        // METRIC,LZ with 3.3 layout: "0125" is 012.5
        let src = "M48\nMETRIC,LZ,000.000\nT1C1.0\n%\nT1\nX0125Y001\nM30\n";
        let layer = parse_excellon(src).unwrap();
        assert_eq!(
            layer.bounds(),
            Some(Bounds::new(12.0, 0.5, 13.0, 1.5))
        );
    }

    #[test]
    fn test_modal_axis_and_comments() {
        let src = "; drill file\nM48\nMETRIC\nT2C0.6 ; small\n%\nT2\nX1.0Y1.0\nX2.0\nM30\n";
        let layer = parse_excellon(src).unwrap();
        assert_eq!(layer.primitives().len(), 2);
        assert_eq!(
            layer.primitives()[1].shape,
            Shape::Circle {
                center: Point::new(2.0, 1.0),
                radius: 0.3
            }
        );
    }

    #[test]
    fn test_routed_slot() {
        let src = "M48\nMETRIC\nT1C1.0\n%\nT1\nX0.0Y0.0G85X4.0Y0.0\nM30\n";
        let layer = parse_excellon(src).unwrap();
        assert_eq!(
            layer.primitives()[0].shape,
            Shape::Capsule {
                from: Point::new(0.0, 0.0),
                to: Point::new(4.0, 0.0),
                radius: 0.5
            }
        );
    }

    #[test]
    fn test_hit_without_tool_is_error() {
        let err = parse_excellon("M48\nMETRIC\n%\nX1.0Y1.0\n").unwrap_err();
        match err {
            PcbError::Parse { message, .. } => assert!(message.starts_with("line 4:")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_undefined_tool_is_error() {
        assert!(parse_excellon("M48\nMETRIC\nT1C1.0\n%\nT3\nX1.0Y1.0\n").is_err());
    }

    #[test]
    fn test_empty_drill_file() {
        let layer = parse_excellon("M48\nMETRIC\n%\nM30\n").unwrap();
        assert!(layer.primitives().is_empty());
        assert_eq!(layer.bounds(), None);
    }

    #[test]
    fn test_non_ascii_in_coordinate_is_parse_error() {
        let err = parse_excellon("M48\nMETRIC\nT1C1.0\n%\nT1\nX1.0\u{e9}Y2.0\nM30\n").unwrap_err();
        match err {
            PcbError::Parse { message, .. } => {
                assert!(message.starts_with("line 6:"), "{}", message);
                assert!(message.contains('\u{e9}'));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
