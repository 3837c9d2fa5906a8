//! Convert command implementation.
//!
//! Renders a Gerber file (and its drill file) into a single calibrated exposure.

use std::path::{Path, PathBuf};

use clap::Args;

use crate::device::DeviceProfile;
use crate::error::Result;
use crate::output::{display_path, duration, Printer};
use crate::session::{RenderReport, RenderSession};

use super::GlobalArgs;

/// Convert a Gerber file into a cbddlp/photon file.
///
/// A drill file with the same basename and the extension .drl is loaded
/// automatically if it exists.
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Exposure time in seconds [default: 480]
    #[arg(short, long)]
    pub exposure: Option<f32>,

    /// Drill file to punch through the traces
    #[arg(long, value_name = "FILE")]
    pub drill: Option<PathBuf>,

    /// Also write a fully lit <OUTFILE>_blank file of the same size
    #[arg(long)]
    pub blank: bool,

    /// Gerber file with the traces/pads layer
    pub infile: PathBuf,

    /// Output .cbddlp or .photon file, depending on the device
    pub outfile: PathBuf,
}

pub fn run(args: ConvertArgs, global: &GlobalArgs, printer: &Printer) -> Result<Vec<RenderReport>> {
    let device = global.profile()?;
    warn_extension(&args.outfile, &device, printer);

    let mut session = RenderSession::new(device).with_output(&args.outfile);
    if let Some(exposure) = args.exposure {
        session.set_exposure_time(exposure)?;
    }

    printer.info(
        "Device",
        &format!("{} ({:.2} px/mm)", session.device().name, session.scale()),
    );
    printer.status("Rendering", &display_path(&args.infile));
    let report = session.convert(&args.infile, args.drill.as_deref())?;
    print_report(&report, printer);

    let mut reports = vec![report];
    if args.blank {
        let blank = session.render_blank(&reports[0])?;
        print_report(&blank, printer);
        reports.push(blank);
    }

    Ok(reports)
}

pub(crate) fn warn_extension(output: &Path, device: &DeviceProfile, printer: &Printer) {
    let expected = device.format.extension();
    let actual = output.extension().and_then(|e| e.to_str());
    if actual.map(str::to_ascii_lowercase).as_deref() != Some(expected) {
        printer.warning(
            "Warning",
            &format!(
                "{} does not have the .{} extension expected by {}",
                display_path(output),
                expected,
                device.name
            ),
        );
    }
}

pub(crate) fn print_report(report: &RenderReport, printer: &Printer) {
    if report.clipped {
        printer.warning("Clipped", "artwork is larger than the printer bed");
    }
    printer.success(
        "Finished",
        &format!(
            "{} ({}x{} px, {} x {} mm, {})",
            display_path(&report.output),
            report.pcb_width_px,
            report.pcb_height_px,
            report.pcb_width_mm,
            report.pcb_height_mm,
            printer.bold(&duration(report.exposure_time_s)),
        ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use tempfile::tempdir;

    const BOARD: &str = "%FSLAX46Y46*%\n%MOMM*%\n%ADD10C,1.0*%\nD10*\nX1000000Y1000000D02*\nX9000000Y1000000D01*\nM02*\n";

    fn parse(args: &[&str]) -> (ConvertArgs, GlobalArgs) {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Convert(convert) => (convert, cli.global),
            other => panic!("expected convert, got {:?}", other),
        }
    }

    #[test]
    fn test_convert_writes_file() {
        let dir = tempdir().unwrap();
        let gbr = dir.path().join("board.gbr");
        let out = dir.path().join("board.cbddlp");
        std::fs::write(&gbr, BOARD).unwrap();

        let (args, global) = parse(&[
            "pcb-msla",
            "convert",
            "-e",
            "300",
            gbr.to_str().unwrap(),
            out.to_str().unwrap(),
        ]);
        let reports = run(args, &global, &Printer::quiet()).unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].exposure_time_s, 300.0);
        assert!(out.exists());
    }

    #[test]
    fn test_convert_with_blank() {
        let dir = tempdir().unwrap();
        let gbr = dir.path().join("board.gbr");
        let out = dir.path().join("board.photon");
        std::fs::write(&gbr, BOARD).unwrap();

        let (args, global) = parse(&[
            "pcb-msla",
            "--device",
            "photon",
            "convert",
            "--blank",
            gbr.to_str().unwrap(),
            out.to_str().unwrap(),
        ]);
        let reports = run(args, &global, &Printer::quiet()).unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].output, dir.path().join("board_blank.photon"));
        assert_eq!(reports[1].pcb_width_px, reports[0].pcb_width_px);
        assert!(dir.path().join("board_blank.photon").exists());
    }

    #[test]
    fn test_convert_missing_input() {
        let dir = tempdir().unwrap();
        let gbr = dir.path().join("missing.gbr");
        let out = dir.path().join("out.cbddlp");

        let (args, global) = parse(&["pcb-msla", "convert", gbr.to_str().unwrap(), out.to_str().unwrap()]);
        let err = run(args, &global, &Printer::quiet()).unwrap_err();
        assert!(matches!(err, crate::error::PcbError::InputNotFound { .. }));
        assert!(!out.exists());
    }

    #[test]
    fn test_convert_rejects_non_positive_exposure() {
        let dir = tempdir().unwrap();
        let gbr = dir.path().join("board.gbr");
        std::fs::write(&gbr, BOARD).unwrap();

        let (args, global) = parse(&["pcb-msla", "convert", "-e", "0", gbr.to_str().unwrap(), "out.cbddlp"]);
        let err = run(args, &global, &Printer::quiet()).unwrap_err();
        assert!(matches!(err, crate::error::PcbError::Config { .. }));
    }
}
