//! CLI subcommands

pub mod check;
pub mod explain;
pub mod init;

use clap::Subcommand;

pub use check::CheckArgs;
pub use explain::ExplainArgs;
pub use init::InitArgs;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check a directory or file for module visibility violations
    Check(CheckArgs),

    /// Create a modscope.toml configuration file
    Init(InitArgs),

    /// Explain a diagnostic by code or name
    Explain(ExplainArgs),
}
