pub mod completions;
pub mod convert;
pub mod devices;
pub mod test;

use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::device::{DeviceCatalog, DeviceProfile, DEFAULT_DEVICE};
use crate::error::Result;
use crate::output::Printer;
use crate::session::RenderReport;

/// pcb-msla - Expose PCBs with an mSLA resin printer
#[derive(Parser, Debug)]
#[command(name = "pcb-msla")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Target printer
    #[arg(short, long, global = true, default_value = DEFAULT_DEVICE)]
    pub device: String,

    /// Device catalog to use instead of the built-in one
    #[arg(long, global = true, value_name = "FILE")]
    pub devices: Option<PathBuf>,

    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,
}

impl GlobalArgs {
    pub fn catalog(&self) -> Result<DeviceCatalog> {
        match &self.devices {
            Some(path) => DeviceCatalog::load(path),
            None => DeviceCatalog::builtin(),
        }
    }

    pub fn profile(&self) -> Result<DeviceProfile> {
        self.catalog()?.get(&self.device).cloned()
    }

    /// Status output is silenced when stdout carries JSON.
    pub fn printer(&self) -> Printer {
        if self.json {
            Printer::quiet()
        } else {
            Printer::new()
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert a Gerber file into a cbddlp/photon file
    Convert(convert::ConvertArgs),

    /// Generate an exposure test series
    Test(test::TestArgs),

    /// List known printers
    Devices,

    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// Run a parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    let printer = cli.global.printer();

    match cli.command {
        Commands::Convert(args) => {
            let reports = convert::run(args, &cli.global, &printer)?;
            emit_reports(&cli.global, &reports)
        }
        Commands::Test(args) => {
            let report = test::run(args, &cli.global, &printer)?;
            emit_reports(&cli.global, &[report])
        }
        Commands::Devices => devices::run(&cli.global),
        Commands::Completions(args) => completions::run(args),
    }
}

fn emit_reports(global: &GlobalArgs, reports: &[RenderReport]) -> Result<()> {
    if !global.json {
        return Ok(());
    }
    let json = serde_json::to_string_pretty(reports).map_err(std::io::Error::other)?;
    writeln!(std::io::stdout(), "{}", json)?;
    Ok(())
}
