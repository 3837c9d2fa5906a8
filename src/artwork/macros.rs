//! Gerber aperture macros (`%AM`).
//!
//! Supports arithmetic expressions over `$n` variables (`+`, `-`, `x`, `/`,
//! parentheses, unary minus), variable assignments and the primitives most
//! CAD exporters emit:
//! - `0` comment
//! - `1` circle
//! - `4` outline
//! - `5` regular polygon
//! - `20` vector line
//! - `21` center line

use crate::error::{PcbError, Result};

use super::geometry::{Point, Shape};

/// A parsed arithmetic expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(usize),
    Negate(Box<Expr>),
    Binary(Box<Expr>, Op, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

impl Expr {
    /// Parse an expression such as `$1+$1` or `-($2x0.5)`.
    pub fn parse(input: &str) -> Result<Self> {
        let chars: Vec<char> = input.chars().filter(|c| !c.is_whitespace()).collect();
        let mut parser = ExprParser { chars: &chars, pos: 0 };
        let expr = parser.sum()?;
        if parser.pos != chars.len() {
            return Err(PcbError::Parse {
                message: format!("Unexpected '{}' in macro expression '{}'", chars[parser.pos], input),
                help: None,
            });
        }
        Ok(expr)
    }

    /// Evaluate with `vars[0]` bound to `$1`. Unset variables read as zero.
    pub fn eval(&self, vars: &[f64]) -> f64 {
        match self {
            Expr::Number(n) => *n,
            Expr::Variable(i) => vars.get(i.wrapping_sub(1)).copied().unwrap_or(0.0),
            Expr::Negate(e) => -e.eval(vars),
            Expr::Binary(a, op, b) => {
                let (a, b) = (a.eval(vars), b.eval(vars));
                match op {
                    Op::Add => a + b,
                    Op::Sub => a - b,
                    Op::Mul => a * b,
                    Op::Div => a / b,
                }
            }
        }
    }
}

struct ExprParser<'a> {
    chars: &'a [char],
    pos: usize,
}

impl ExprParser<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn sum(&mut self) -> Result<Expr> {
        let mut lhs = self.product()?;
        while let Some(c) = self.peek() {
            let op = match c {
                '+' => Op::Add,
                '-' => Op::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.product()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn product(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        while let Some(c) = self.peek() {
            let op = match c {
                'x' | 'X' => Op::Mul,
                '/' => Op::Div,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some('-') => {
                self.pos += 1;
                Ok(Expr::Negate(Box::new(self.unary()?)))
            }
            Some('+') => {
                self.pos += 1;
                self.unary()
            }
            _ => self.atom(),
        }
    }

    fn atom(&mut self) -> Result<Expr> {
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let inner = self.sum()?;
                if self.peek() != Some(')') {
                    return Err(PcbError::parse("Unclosed parenthesis in macro expression"));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some('$') => {
                self.pos += 1;
                let digits = self.take_while(|c| c.is_ascii_digit());
                let index = digits
                    .parse::<usize>()
                    .map_err(|_| PcbError::parse(format!("Invalid macro variable '${}'", digits)))?;
                Ok(Expr::Variable(index))
            }
            Some(c) if c.is_ascii_digit() || c == '.' => {
                let digits = self.take_while(|c| c.is_ascii_digit() || c == '.');
                let value = digits
                    .parse::<f64>()
                    .map_err(|_| PcbError::parse(format!("Invalid number '{}' in macro", digits)))?;
                Ok(Expr::Number(value))
            }
            Some(c) => Err(PcbError::parse(format!("Unexpected '{}' in macro expression", c))),
            None => Err(PcbError::parse("Unexpected end of macro expression")),
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Statement {
    Assign { var: usize, expr: Expr },
    Primitive { code: u32, args: Vec<Expr> },
}

/// A macro shape with its exposure flag (`false` erases).
#[derive(Debug, Clone, PartialEq)]
pub struct MacroShape {
    pub shape: Shape,
    pub exposure: bool,
}

/// A named aperture macro definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ApertureMacro {
    pub name: String,
    statements: Vec<Statement>,
}

impl ApertureMacro {
    /// Parse the statements following `AM<name>*` (each without its `*`).
    pub fn parse<'a>(name: &str, body: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut statements = Vec::new();

        for raw in body {
            let stmt = raw.trim();
            if stmt.is_empty() {
                continue;
            }

            if let Some(rest) = stmt.strip_prefix('$') {
                let (var, expr) = rest.split_once('=').ok_or_else(|| PcbError::Parse {
                    message: format!("Macro '{}': malformed statement '{}'", name, stmt),
                    help: Some("Variable definitions look like $3=$1x2".to_string()),
                })?;
                let var = var
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .filter(|&v| v > 0)
                    .ok_or_else(|| PcbError::parse(format!("Macro '{}': invalid variable '${}'", name, var)))?;
                statements.push(Statement::Assign {
                    var,
                    expr: Expr::parse(expr)?,
                });
                continue;
            }

            let mut fields = stmt.split(',');
            let code_str = fields.next().unwrap_or("").trim();
            // Comments may contain anything, including commas.
            if code_str == "0" || code_str.starts_with("0 ") {
                continue;
            }
            let code = code_str.parse::<u32>().map_err(|_| PcbError::Parse {
                message: format!("Macro '{}': invalid primitive code '{}'", name, code_str),
                help: None,
            })?;
            if !matches!(code, 1 | 4 | 5 | 20 | 21) {
                return Err(PcbError::Parse {
                    message: format!("Macro '{}': primitive {} is not supported", name, code),
                    help: Some("Supported primitives: 1, 4, 5, 20, 21".to_string()),
                });
            }
            let args = fields.map(Expr::parse).collect::<Result<Vec<_>>>()?;
            statements.push(Statement::Primitive { code, args });
        }

        Ok(Self {
            name: name.to_string(),
            statements,
        })
    }

    /// Evaluate the macro with aperture parameters, scaling lengths by `unit`
    /// (millimetres per file unit). Shapes are centred on the flash origin.
    pub fn instantiate(&self, params: &[f64], unit: f64) -> Result<Vec<MacroShape>> {
        let mut vars = params.to_vec();
        let mut shapes = Vec::new();

        for stmt in &self.statements {
            match stmt {
                Statement::Assign { var, expr } => {
                    let value = expr.eval(&vars);
                    if vars.len() < *var {
                        vars.resize(*var, 0.0);
                    }
                    vars[var - 1] = value;
                }
                Statement::Primitive { code, args } => {
                    let values: Vec<f64> = args.iter().map(|a| a.eval(&vars)).collect();
                    shapes.push(self.primitive(*code, &values, unit)?);
                }
            }
        }

        Ok(shapes)
    }

    fn primitive(&self, code: u32, v: &[f64], unit: f64) -> Result<MacroShape> {
        let arg = |i: usize| v.get(i).copied().unwrap_or(0.0);
        let need = |n: usize| -> Result<()> {
            if v.len() < n {
                return Err(PcbError::Parse {
                    message: format!(
                        "Macro '{}': primitive {} needs {} parameters, got {}",
                        self.name,
                        code,
                        n,
                        v.len()
                    ),
                    help: None,
                });
            }
            Ok(())
        };

        let exposure = arg(0) != 0.0;
        let shape = match code {
            1 => {
                need(4)?;
                let center = Point::new(arg(2) * unit, arg(3) * unit).rotate(arg(4));
                Shape::Circle {
                    center,
                    radius: arg(1) * unit / 2.0,
                }
            }
            4 => {
                need(2)?;
                let count = arg(1);
                if !(count >= 1.0 && count <= v.len() as f64) || count.fract() != 0.0 {
                    return Err(PcbError::parse(format!(
                        "Macro '{}': outline has an invalid vertex count {}",
                        self.name, count
                    )));
                }
                let vertices = count as usize;
                let required = vertices
                    .checked_add(1)
                    .and_then(|n| n.checked_mul(2))
                    .and_then(|n| n.checked_add(2))
                    .ok_or_else(|| PcbError::parse(format!("Macro '{}': outline is too large", self.name)))?;
                need(required)?;
                let rotation = arg(4 + 2 * vertices);
                let points = (0..=vertices)
                    .map(|k| Point::new(arg(2 + 2 * k) * unit, arg(3 + 2 * k) * unit).rotate(rotation))
                    .collect();
                Shape::Polygon { points }
            }
            5 => {
                need(5)?;
                let center = Point::new(arg(2) * unit, arg(3) * unit);
                let vertices = regular_polygon_vertices(arg(1)).ok_or_else(|| {
                    PcbError::parse(format!(
                        "Macro '{}': polygon needs 3 to 12 vertices, got {}",
                        self.name,
                        arg(1)
                    ))
                })?;
                let polygon = Shape::regular_polygon(center, arg(4) * unit, vertices, 0.0);
                rotate_shape(polygon, arg(5))
            }
            20 => {
                need(6)?;
                let start = Point::new(arg(2) * unit, arg(3) * unit);
                let end = Point::new(arg(4) * unit, arg(5) * unit);
                let half = arg(1) * unit / 2.0;
                let len = start.distance(end);
                let (nx, ny) = if len > 0.0 {
                    (-(end.y - start.y) / len * half, (end.x - start.x) / len * half)
                } else {
                    (0.0, half)
                };
                let points = vec![
                    start.offset(nx, ny),
                    end.offset(nx, ny),
                    end.offset(-nx, -ny),
                    start.offset(-nx, -ny),
                ];
                rotate_shape(Shape::Polygon { points }, arg(6))
            }
            21 => {
                need(5)?;
                let center = Point::new(arg(3) * unit, arg(4) * unit);
                let rect = Shape::rectangle(center, arg(1) * unit, arg(2) * unit);
                rotate_shape(rect, arg(5))
            }
            other => {
                return Err(PcbError::parse(format!(
                    "Macro '{}': primitive {} is not supported",
                    self.name, other
                )))
            }
        };

        Ok(MacroShape { shape, exposure })
    }
}

/// Vertex count of a regular polygon, which must be a whole number in 3..=12.
pub(super) fn regular_polygon_vertices(value: f64) -> Option<u32> {
    (value.fract() == 0.0 && (3.0..=12.0).contains(&value)).then_some(value as u32)
}

fn rotate_shape(shape: Shape, degrees: f64) -> Shape {
    match shape {
        Shape::Polygon { points } => Shape::Polygon {
            points: points.into_iter().map(|p| p.rotate(degrees)).collect(),
        },
        Shape::Circle { center, radius } => Shape::Circle {
            center: center.rotate(degrees),
            radius,
        },
        Shape::Capsule { from, to, radius } => Shape::Capsule {
            from: from.rotate(degrees),
            to: to.rotate(degrees),
            radius,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expr_precedence() {
        let e = Expr::parse("1+2x3").unwrap();
        assert_eq!(e.eval(&[]), 7.0);
        let e = Expr::parse("(1+2)x3").unwrap();
        assert_eq!(e.eval(&[]), 9.0);
    }

    #[test]
    fn test_expr_variables_and_unary_minus() {
        let e = Expr::parse("-$2/2").unwrap();
        assert_eq!(e.eval(&[1.0, 4.0]), -2.0);
        // Unset variables read as zero
        let e = Expr::parse("$5+1").unwrap();
        assert_eq!(e.eval(&[1.0]), 1.0);
    }

    #[test]
    fn test_expr_rejects_garbage() {
        assert!(Expr::parse("1+").is_err());
        assert!(Expr::parse("(1").is_err());
        assert!(Expr::parse("1 ? 2").is_err());
    }

    #[test]
    fn test_circle_primitive_with_variables() {
        let m = ApertureMacro::parse("DOT", ["0 a dot, centred", "1,1,$1,0,0"]).unwrap();
        let shapes = m.instantiate(&[2.0], 1.0).unwrap();
        assert_eq!(
            shapes,
            vec![MacroShape {
                shape: Shape::Circle {
                    center: Point::new(0.0, 0.0),
                    radius: 1.0
                },
                exposure: true,
            }]
        );
    }

    #[test]
    fn test_assignment_statement() {
        let m = ApertureMacro::parse("SQ", ["$2=$1x2", "21,1,$2,$2,0,0,0"]).unwrap();
        let shapes = m.instantiate(&[0.5], 1.0).unwrap();
        let b = shapes[0].shape.bounds();
        assert!((b.width() - 1.0).abs() < 1e-12);
        assert!((b.height() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_outline_primitive_scaled_to_mm() {
        let m = ApertureMacro::parse("TRI", ["4,1,3,0,0,1,0,0,1,0,0,0"]).unwrap();
        let shapes = m.instantiate(&[], 25.4).unwrap();
        match &shapes[0].shape {
            Shape::Polygon { points } => {
                assert_eq!(points.len(), 4);
                assert_eq!(points[1], Point::new(25.4, 0.0));
            }
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_exposure_off_is_reported() {
        let m = ApertureMacro::parse("RING", ["1,1,2,0,0", "1,0,1,0,0"]).unwrap();
        let shapes = m.instantiate(&[], 1.0).unwrap();
        assert!(shapes[0].exposure);
        assert!(!shapes[1].exposure);
    }

    #[test]
    fn test_vector_line_width() {
        let m = ApertureMacro::parse("LINE", ["20,1,0.5,0,0,4,0,0"]).unwrap();
        let shapes = m.instantiate(&[], 1.0).unwrap();
        let b = shapes[0].shape.bounds();
        assert!((b.width() - 4.0).abs() < 1e-12);
        assert!((b.height() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_unsupported_primitive() {
        let err = ApertureMacro::parse("THERMAL", ["7,0,0,1,0.8,0.1,0"]).unwrap_err();
        assert!(matches!(err, PcbError::Parse { .. }));
    }

    #[test]
    fn test_missing_parameters() {
        let m = ApertureMacro::parse("SHORT", ["1,1"]).unwrap();
        assert!(m.instantiate(&[], 1.0).is_err());
    }

    #[test]
    fn test_outline_vertex_count_beyond_parameters_is_error() {
        let m = ApertureMacro::parse("BAD", ["4,1,99999999999999999999999,0,0,0"]).unwrap();
        let err = m.instantiate(&[], 1.0).unwrap_err();
        assert!(matches!(err, PcbError::Parse { .. }));

        let m = ApertureMacro::parse("HALF", ["4,1,2.5,0,0,1,0,0,1,0,0,0"]).unwrap();
        assert!(m.instantiate(&[], 1.0).is_err());
    }

    #[test]
    fn test_polygon_primitive_vertex_range() {
        let hex = ApertureMacro::parse("HEX", ["5,1,6,0,0,2,0"]).unwrap();
        match &hex.instantiate(&[], 1.0).unwrap()[0].shape {
            Shape::Polygon { points } => assert_eq!(points.len(), 6),
            other => panic!("expected polygon, got {:?}", other),
        }

        let huge = ApertureMacro::parse("MANY", ["5,1,1000,0,0,2,0"]).unwrap();
        assert!(matches!(huge.instantiate(&[], 1.0), Err(PcbError::Parse { .. })));
    }
}
