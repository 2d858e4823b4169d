//! modscope CLI - checks module-scoped visibility across a Hack codebase

mod commands;
mod logging;
mod output;

use clap::{Parser, ValueEnum};
use commands::Commands;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "modscope",
    author,
    version,
    about = "Module-scoped visibility checker for Hack",
    long_about = "modscope checks `internal` declarations against the modules that reference them.\n\n\
                  Traits are flattened into the classes that use them, so every composed member\n\
                  is checked in the module its code actually runs in."
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        value_enum,
        default_value = "warn",
        help = "Set the log level"
    )]
    pub log_level: LogLevel,

    #[arg(long, global = true, help = "Output logs in JSON format")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level, cli.log_json);

    match cli.command {
        Commands::Check(args) => args.run(),
        Commands::Init(args) => args.run(),
        Commands::Explain(args) => args.run(),
    }
}
