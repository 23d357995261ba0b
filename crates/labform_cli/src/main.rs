//! `labform`: clean lab measurement tables and fill pre-printed xlsx forms.

mod config;
mod load;
mod pipeline;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::load_config;
use crate::pipeline::{SpecPipelinePaths, run_pipeline};

#[derive(Parser)]
#[command(name = "labform")]
#[command(about = "Normalize lab measurement tables and fill xlsx forms", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a table and optionally fill the measurement form
    Process(ProcessArgs),
}

#[derive(Args)]
struct ProcessArgs {
    /// Raw table (.csv or .xlsx)
    #[arg(short, long)]
    input: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where to write the normalized table (overrides [paths].out_table)
    #[arg(long)]
    out_table: Option<PathBuf>,

    /// Form template workbook (overrides [paths].template)
    #[arg(long)]
    template: Option<PathBuf>,

    /// Base path of the filled form (overrides [paths].out_form)
    #[arg(long)]
    out_form: Option<PathBuf>,

    /// Skip keys without a measurement instead of failing
    #[arg(long)]
    drop_incomplete: bool,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_process(args: ProcessArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if args.drop_incomplete {
        config.form.drop_incomplete = true;
    }
    let paths = SpecPipelinePaths {
        input: args.input,
        out_table: args.out_table.or_else(|| config.paths.out_table.clone()),
        template: args.template.or_else(|| config.paths.template.clone()),
        out_form: args.out_form.or_else(|| config.paths.out_form.clone()),
    };

    let report = run_pipeline(&paths, &config)?;
    for c_line in report.summary_lines() {
        println!("{c_line}");
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Process(args) => run_process(args),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_process_flags() {
        let cli = Cli::parse_from([
            "labform",
            "process",
            "--input",
            "raw.csv",
            "--template",
            "form.xlsx",
            "--drop-incomplete",
            "-v",
        ]);
        assert!(cli.verbose);
        let Commands::Process(args) = cli.command;
        assert_eq!(args.input, PathBuf::from("raw.csv"));
        assert_eq!(args.template, Some(PathBuf::from("form.xlsx")));
        assert!(args.drop_incomplete);
        assert!(args.config.is_none());
    }
}
