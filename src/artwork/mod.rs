//! PCB artwork loading.
//!
//! Artwork files are reduced to [`Layer`]s: flat lists of filled primitives
//! in millimetres, independent of the source format.

pub mod excellon;
pub mod geometry;
pub mod gerber;
pub mod macros;

use std::path::{Path, PathBuf};

use crate::error::{PcbError, Result};

pub use excellon::parse_excellon;
pub use geometry::{Bounds, Point, Polarity, Primitive, Shape};
pub use gerber::parse_gerber;

/// What a layer represents on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Copper,
    Drill,
}

/// A parsed artwork layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    kind: LayerKind,
    primitives: Vec<Primitive>,
    bounds: Option<Bounds>,
}

impl Layer {
    pub fn new(kind: LayerKind, primitives: Vec<Primitive>) -> Self {
        let bounds = primitives
            .iter()
            .fold(None, |acc, p| Bounds::union(acc, Some(p.shape.bounds())));
        Self {
            kind,
            primitives,
            bounds,
        }
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    /// Extent of every primitive, `None` for an empty layer.
    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }
}

/// Load a Gerber or Excellon file, picking the parser from the extension
/// or, failing that, from the content.
pub fn load_layer(path: &Path) -> Result<Layer> {
    if !path.exists() {
        return Err(PcbError::InputNotFound {
            path: path.to_path_buf(),
        });
    }
    let bytes = std::fs::read(path).map_err(|e| PcbError::Io {
        path: path.to_path_buf(),
        message: format!("Failed to read artwork: {}", e),
    })?;
    let source = String::from_utf8(bytes).map_err(|e| PcbError::Parse {
        message: format!("{}: not a text file ({})", path.display(), e.utf8_error()),
        help: Some("Gerber and Excellon files are plain ASCII".to_string()),
    })?;

    let parsed = if is_drill_file(path, &source) {
        parse_excellon(&source)
    } else {
        parse_gerber(&source)
    };

    parsed.map_err(|e| match e {
        PcbError::Parse { message, help } => PcbError::Parse {
            message: format!("{}: {}", path.display(), message),
            help,
        },
        other => other,
    })
}

fn is_drill_file(path: &Path, source: &str) -> bool {
    let by_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "drl" | "xln" | "exc" | "txt"))
        .unwrap_or(false);
    by_extension || source.trim_start().starts_with("M48")
}

/// The drill file conventionally exported next to a Gerber.
pub fn companion_drill_path(traces: &Path) -> PathBuf {
    traces.with_extension("drl")
}

/// Test pattern compiled into the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinPattern {
    pub traces: &'static str,
    pub drill: &'static str,
}

impl BuiltinPattern {
    pub const fn get() -> Self {
        Self {
            traces: include_str!("../../data/pattern.gbr"),
            drill: include_str!("../../data/pattern.drl"),
        }
    }

    pub fn layers(&self) -> Result<(Layer, Layer)> {
        Ok((parse_gerber(self.traces)?, parse_excellon(self.drill)?))
    }
}

impl Default for BuiltinPattern {
    fn default() -> Self {
        Self::get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_builtin_pattern_parses() {
        let (traces, drill) = BuiltinPattern::get().layers().unwrap();
        assert_eq!(traces.kind(), LayerKind::Copper);
        assert_eq!(drill.kind(), LayerKind::Drill);
        assert!(!traces.is_empty());
        assert_eq!(drill.primitives().len(), 4);

        let b = traces.bounds().unwrap();
        assert!(b.width() > 25.0 && b.height() > 6.0);
    }

    #[test]
    fn test_load_missing_is_input_not_found() {
        let dir = tempdir().unwrap();
        let err = load_layer(&dir.path().join("board.gbr")).unwrap_err();
        assert!(matches!(err, PcbError::InputNotFound { .. }));
    }

    #[test]
    fn test_load_detects_drill_by_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("holes.nc");
        std::fs::write(&path, "M48\nMETRIC\nT1C1.0\n%\nT1\nX1.0Y1.0\nM30\n").unwrap();
        assert_eq!(load_layer(&path).unwrap().kind(), LayerKind::Drill);
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.gbr");
        std::fs::write(&path, "%FSLAX46Y46*%\nX0Y0D03*\n").unwrap();
        match load_layer(&path).unwrap_err() {
            PcbError::Parse { message, .. } => assert!(message.contains("bad.gbr")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_binary_file_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.gbr");
        std::fs::write(&path, [0x25, 0xff, 0xfe, 0x2a]).unwrap();

        match load_layer(&path).unwrap_err() {
            PcbError::Parse { message, .. } => assert!(message.contains("bad.gbr"), "{}", message),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_companion_drill_path() {
        assert_eq!(
            companion_drill_path(Path::new("out/board.gbr")),
            PathBuf::from("out/board.drl")
        );
    }
}
