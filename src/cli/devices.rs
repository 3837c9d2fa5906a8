//! Devices command implementation.

use std::io::Write;

use serde::Serialize;

use crate::device::{DeviceCatalog, DeviceProfile};
use crate::error::Result;

use super::GlobalArgs;

/// One catalog entry as printed by `devices --json`.
#[derive(Debug, Serialize)]
struct DeviceSummary<'a> {
    name: &'a str,
    resolution: String,
    lcd_mm: String,
    format: &'static str,
}

impl<'a> From<&'a DeviceProfile> for DeviceSummary<'a> {
    fn from(device: &'a DeviceProfile) -> Self {
        Self {
            name: &device.name,
            resolution: format!("{}x{}", device.px.width, device.px.height),
            lcd_mm: format!("{} x {}", device.mm.width, device.mm.height),
            format: device.format.extension(),
        }
    }
}

/// Fixed-width table of every device in the catalog.
pub fn format_device_table(catalog: &DeviceCatalog) -> String {
    let mut out = format!("{:<14}{:<12}{:<17}{}\n", "NAME", "RESOLUTION", "LCD (mm)", "FORMAT");
    for device in catalog.iter() {
        let row = DeviceSummary::from(device);
        out.push_str(&format!(
            "{:<14}{:<12}{:<17}{}\n",
            row.name, row.resolution, row.lcd_mm, row.format
        ));
    }
    out
}

fn format_device_json(catalog: &DeviceCatalog) -> Result<String> {
    let rows: Vec<DeviceSummary<'_>> = catalog.iter().map(DeviceSummary::from).collect();
    Ok(serde_json::to_string_pretty(&rows).map_err(std::io::Error::other)?)
}

pub fn run(global: &GlobalArgs) -> Result<()> {
    let catalog = global.catalog()?;
    let text = if global.json {
        format_device_json(&catalog)? + "\n"
    } else {
        format_device_table(&catalog)
    };
    std::io::stdout().write_all(text.as_bytes())?;
    Ok(())
}
