//! Printer device profiles.
//!
//! Profiles are read from a YAML catalog. The built-in catalog ships with the
//! binary (`data/devices.yml`); users may point `--devices` at their own file
//! using the same layout:
//!
//! ```yaml
//! devices:
//!   elegoo-mars:
//!     size_mm: { w: 68.04, h: 120.96 }
//!     size_px: { w: 1440, h: 2560 }
//!     format: cbddlp
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PcbError, Result};

/// Built-in catalog source.
const BUILTIN_DEVICES: &str = include_str!("../../data/devices.yml");

/// Device used when none is selected.
pub const DEFAULT_DEVICE: &str = "elegoo-mars";

/// A width/height pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size<T> {
    #[serde(rename = "w")]
    pub width: T,
    #[serde(rename = "h")]
    pub height: T,
}

/// Binary slicer format consumed by the printer firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlicerFormat {
    #[default]
    Cbddlp,
    Photon,
}

impl SlicerFormat {
    /// Conventional file extension (without the dot).
    pub fn extension(self) -> &'static str {
        match self {
            SlicerFormat::Cbddlp => "cbddlp",
            SlicerFormat::Photon => "photon",
        }
    }
}

impl fmt::Display for SlicerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Machine motion and light parameters recorded in the slicer file.
///
/// A PCB exposure is a single "layer" with the build plate parked, so these
/// mostly matter to firmware that refuses files with zeroed fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintParams {
    pub layer_height_mm: f32,
    pub light_off_time_s: f32,
    pub lift_distance_mm: f32,
    pub lift_speed_mmpm: f32,
    pub retract_speed_mmpm: f32,
    pub light_pwm: u16,
}

impl Default for PrintParams {
    fn default() -> Self {
        Self {
            layer_height_mm: 0.05,
            light_off_time_s: 1.0,
            lift_distance_mm: 5.0,
            lift_speed_mmpm: 60.0,
            retract_speed_mmpm: 150.0,
            light_pwm: 255,
        }
    }
}

/// An immutable, validated printer profile.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceProfile {
    pub name: String,
    /// Usable LCD area in millimetres.
    pub mm: Size<f64>,
    /// LCD resolution in pixels.
    pub px: Size<u32>,
    /// Build volume height, recorded in the file header only.
    pub height_mm: f64,
    pub format: SlicerFormat,
    pub print: PrintParams,
}

impl DeviceProfile {
    /// Create a profile with default format and print parameters.
    pub fn new(name: impl Into<String>, mm: Size<f64>, px: Size<u32>) -> Result<Self> {
        let profile = Self {
            name: name.into(),
            mm,
            px,
            height_mm: 150.0,
            format: SlicerFormat::default(),
            print: PrintParams::default(),
        };
        profile.validate()?;
        Ok(profile)
    }

    fn validate(&self) -> Result<()> {
        let mm_ok = self.mm.width > 0.0 && self.mm.height > 0.0;
        let px_ok = self.px.width > 0 && self.px.height > 0;
        if !(mm_ok && px_ok) {
            return Err(PcbError::Config {
                message: format!(
                    "Device '{}' has non-positive dimensions ({}x{} mm, {}x{} px)",
                    self.name, self.mm.width, self.mm.height, self.px.width, self.px.height
                ),
                help: Some("size_mm and size_px must be strictly positive".to_string()),
            });
        }
        if self.print.layer_height_mm <= 0.0 {
            return Err(PcbError::config(format!(
                "Device '{}' has a non-positive layer height",
                self.name
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    #[serde(default)]
    devices: BTreeMap<String, RawDevice>,
}

#[derive(Debug, Deserialize)]
struct RawDevice {
    size_mm: Size<f64>,
    size_px: Size<u32>,
    #[serde(default = "default_height_mm")]
    height_mm: f64,
    #[serde(default)]
    format: SlicerFormat,
    #[serde(default)]
    print: PrintParams,
}

fn default_height_mm() -> f64 {
    150.0
}

/// A named collection of device profiles.
#[derive(Debug, Clone)]
pub struct DeviceCatalog {
    devices: BTreeMap<String, DeviceProfile>,
}

impl DeviceCatalog {
    /// The catalog compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN_DEVICES)
    }

    /// Load a catalog from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PcbError::InputNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|e| PcbError::Io {
            path: path.to_path_buf(),
            message: format!("Failed to read device catalog: {}", e),
        })?;

        Self::parse(&content)
    }

    /// Parse a catalog from a YAML string.
    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawCatalog = serde_yaml::from_str(content).map_err(|e| PcbError::Parse {
            message: format!("Invalid device catalog: {}", e),
            help: Some("Expected a top-level `devices:` mapping".to_string()),
        })?;

        let mut devices = BTreeMap::new();
        for (name, raw) in raw.devices {
            let profile = DeviceProfile {
                name: name.clone(),
                mm: raw.size_mm,
                px: raw.size_px,
                height_mm: raw.height_mm,
                format: raw.format,
                print: raw.print,
            };
            profile.validate()?;
            devices.insert(name, profile);
        }

        Ok(Self { devices })
    }

    /// Look up a device by name.
    pub fn get(&self, name: &str) -> Result<&DeviceProfile> {
        self.devices.get(name).ok_or_else(|| PcbError::Config {
            message: format!("Unknown device: {}", name),
            help: Some(format!("Available devices: {}", self.names().join(", "))),
        })
    }

    /// Device names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.devices.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceProfile> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_builtin_catalog() {
        let catalog = DeviceCatalog::builtin().unwrap();
        assert_eq!(catalog.names(), vec!["elegoo-mars", "photon"]);

        let mars = catalog.get("elegoo-mars").unwrap();
        assert_eq!(mars.px, Size { width: 1440, height: 2560 });
        assert_eq!(mars.mm.width, 68.04);
        assert_eq!(mars.format, SlicerFormat::Cbddlp);

        let photon = catalog.get("photon").unwrap();
        assert_eq!(photon.format, SlicerFormat::Photon);
    }

    #[test]
    fn test_default_device_is_builtin() {
        let catalog = DeviceCatalog::builtin().unwrap();
        assert!(catalog.get(DEFAULT_DEVICE).is_ok());
    }

    #[test]
    fn test_unknown_device() {
        let catalog = DeviceCatalog::builtin().unwrap();
        let err = catalog.get("anycubic-x").unwrap_err();
        assert!(matches!(err, PcbError::Config { .. }));
    }

    #[test]
    fn test_parse_defaults_print_params() {
        let yaml = r#"
devices:
  tiny:
    size_mm: { w: 10.0, h: 5.0 }
    size_px: { w: 100, h: 50 }
"#;
        let catalog = DeviceCatalog::parse(yaml).unwrap();
        let tiny = catalog.get("tiny").unwrap();
        assert_eq!(tiny.print, PrintParams::default());
        assert_eq!(tiny.format, SlicerFormat::Cbddlp);
        assert_eq!(tiny.height_mm, 150.0);
    }

    #[test]
    fn test_parse_print_overrides() {
        let yaml = r#"
devices:
  tuned:
    size_mm: { w: 10.0, h: 5.0 }
    size_px: { w: 100, h: 50 }
    format: photon
    print:
      light_off_time_s: 0.0
      light_pwm: 128
"#;
        let catalog = DeviceCatalog::parse(yaml).unwrap();
        let tuned = catalog.get("tuned").unwrap();
        assert_eq!(tuned.print.light_off_time_s, 0.0);
        assert_eq!(tuned.print.light_pwm, 128);
        assert_eq!(tuned.print.layer_height_mm, 0.05);
    }

    #[test]
    fn test_non_positive_size_is_config_error() {
        let yaml = r#"
devices:
  broken:
    size_mm: { w: 0.0, h: 5.0 }
    size_px: { w: 100, h: 50 }
"#;
        let err = DeviceCatalog::parse(yaml).unwrap_err();
        assert!(matches!(err, PcbError::Config { .. }));
    }

    #[test]
    fn test_invalid_yaml_is_parse_error() {
        let err = DeviceCatalog::parse("devices: [1, 2").unwrap_err();
        assert!(matches!(err, PcbError::Parse { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = DeviceCatalog::load(&dir.path().join("nope.yml")).unwrap_err();
        assert!(matches!(err, PcbError::InputNotFound { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("devices.yml");
        std::fs::write(
            &path,
            "devices:\n  lab:\n    size_mm: { w: 20.0, h: 10.0 }\n    size_px: { w: 200, h: 100 }\n",
        )
        .unwrap();

        let catalog = DeviceCatalog::load(&path).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("lab").unwrap().px.width, 200);
    }

    #[test]
    fn test_profile_new_rejects_zero_pixels() {
        let err = DeviceProfile::new(
            "zero",
            Size { width: 1.0, height: 1.0 },
            Size { width: 0, height: 1 },
        )
        .unwrap_err();
        assert!(matches!(err, PcbError::Config { .. }));
    }
}
