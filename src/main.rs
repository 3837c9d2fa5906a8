use clap::Parser;
use miette::Result;
use pcb_msla::cli::Cli;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    pcb_msla::cli::run(cli)?;

    Ok(())
}
