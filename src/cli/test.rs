//! Test command implementation.
//!
//! Builds an exposure-time calibration ladder. The pattern is shown STEPS
//! times; after START seconds, one copy is masked off every INTERVAL seconds.
//! START + STEPS * INTERVAL is reported as the maximum exposure.

use std::path::PathBuf;

use clap::Args;

use crate::error::Result;
use crate::output::{display_path, duration, plural, Printer};
use crate::render::ExposureTestParams;
use crate::session::{RenderReport, RenderSession};

use super::convert::{print_report, warn_extension};
use super::GlobalArgs;

const BUILTIN_PATTERN: &str = "built-in";

/// Generate an exposure test series
#[derive(Args, Debug)]
pub struct TestArgs {
    /// Start the series at this many seconds [default: 360]
    #[arg(long)]
    pub start: Option<f32>,

    /// Number of exposure steps [default: 4]
    #[arg(long)]
    pub steps: Option<u32>,

    /// Seconds each exposure step takes [default: 60]
    #[arg(long)]
    pub interval: Option<f32>,

    /// Gerber file to use instead of the built-in pattern
    #[arg(long, value_name = "FILE", default_value = BUILTIN_PATTERN)]
    pub test_pattern: String,

    /// Output .cbddlp or .photon file, depending on the device
    pub outfile: PathBuf,
}

impl TestArgs {
    fn pattern(&self) -> Option<PathBuf> {
        (self.test_pattern != BUILTIN_PATTERN).then(|| PathBuf::from(&self.test_pattern))
    }

    fn params(&self, defaults: ExposureTestParams) -> ExposureTestParams {
        ExposureTestParams {
            start: self.start.unwrap_or(defaults.start),
            interval: self.interval.unwrap_or(defaults.interval),
            samples: self.steps.unwrap_or(defaults.samples),
        }
    }
}

pub fn run(args: TestArgs, global: &GlobalArgs, printer: &Printer) -> Result<RenderReport> {
    let device = global.profile()?;
    warn_extension(&args.outfile, &device, printer);

    let mut session = RenderSession::new(device).with_output(&args.outfile);
    let params = args.params(session.exp_test_params());
    session.set_exp_test(params)?;

    let pattern = args.pattern();
    let source = pattern
        .as_deref()
        .map(display_path)
        .unwrap_or_else(|| "built-in pattern".to_string());
    printer.status(
        "Sequencing",
        &format!(
            "{} from {} every {}",
            plural(params.samples as usize, "step", "steps"),
            duration(params.start),
            duration(params.interval)
        ),
    );
    printer.status("Rendering", &source);

    let report = session.exp_test(pattern.as_deref())?;
    print_report(&report, printer);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use tempfile::tempdir;

    fn parse(args: &[&str]) -> (TestArgs, GlobalArgs) {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Test(test) => (test, cli.global),
            other => panic!("expected test, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults_follow_session() {
        let (args, _) = parse(&["pcb-msla", "test", "out.cbddlp"]);
        assert_eq!(args.pattern(), None);
        assert_eq!(
            args.params(ExposureTestParams::default()),
            ExposureTestParams {
                start: 360.0,
                interval: 60.0,
                samples: 4
            }
        );
    }

    #[test]
    fn test_builtin_series_end_to_end() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("series.cbddlp");

        let (args, global) = parse(&[
            "pcb-msla",
            "test",
            "--start",
            "300",
            "--steps",
            "3",
            "--interval",
            "30",
            out.to_str().unwrap(),
        ]);
        let report = run(args, &global, &Printer::quiet()).unwrap();

        assert_eq!(report.layers, 3);
        assert_eq!(report.exposure_time_s, 390.0);
        assert!(out.exists());
        // Layer count lives at offset 0x44 of the header
        let bytes = std::fs::read(&out).unwrap();
        assert_eq!(u32::from_le_bytes([bytes[0x44], bytes[0x45], bytes[0x46], bytes[0x47]]), 3);
    }

    #[test]
    fn test_custom_pattern() {
        let dir = tempdir().unwrap();
        let gbr = dir.path().join("pattern.gbr");
        std::fs::write(
            &gbr,
            "%FSLAX46Y46*%\n%MOMM*%\n%ADD10R,5.0X2.0*%\nD10*\nX2500000Y1000000D03*\nM02*\n",
        )
        .unwrap();
        let out = dir.path().join("series.cbddlp");

        let (args, global) = parse(&[
            "pcb-msla",
            "test",
            "--test-pattern",
            gbr.to_str().unwrap(),
            out.to_str().unwrap(),
        ]);
        let report = run(args, &global, &Printer::quiet()).unwrap();
        assert_eq!(report.pcb_height_px % 4, 0);
        assert_eq!(report.exposure_time_s, 600.0);
    }

    #[test]
    fn test_zero_steps_is_config_error() {
        let (args, global) = parse(&["pcb-msla", "test", "--steps", "0", "out.cbddlp"]);
        let err = run(args, &global, &Printer::quiet()).unwrap_err();
        assert!(matches!(err, crate::error::PcbError::Config { .. }));
    }
}
