use std::error::Error;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{
    config::{self, ConfigArgs},
    run::{self, RunArgs},
    summarize::{self, SummarizeArgs},
};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "consite", about = "Conservation site delineation CLI")]
struct Cli {
    /// Increase log verbosity (repeatable).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Delineate sites for a scene and write sites plus a run report.
    Run(RunArgs),
    /// Write a default pipeline configuration.
    Config(ConfigArgs),
    /// Print the headline counts and failures of a run report.
    Summarize(SummarizeArgs),
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    match cli.command {
        Command::Run(args) => run::run(&args),
        Command::Config(args) => config::run(&args),
        Command::Summarize(args) => summarize::run(&args),
    }
}
