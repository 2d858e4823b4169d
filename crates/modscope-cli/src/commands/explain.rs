//! Explain command - prints the catalog entry for a diagnostic

use clap::Args;
use colored::Colorize;
use modscope_core::config::load_config_or_default_with_warnings;
use modscope_core::diagnostic::{DiagnosticCategory, DiagnosticKind};
use modscope_core::policy::DiagnosticPolicy;
use modscope_core::{AnalysisEngine, Severity};
use std::env;

#[derive(Args, Debug)]
pub struct ExplainArgs {
    #[arg(
        value_name = "ID",
        help = "Diagnostic code or name to explain (e.g., \"V001\", \"internal-access-violation\")"
    )]
    pub id: String,
}

impl ExplainArgs {
    pub fn run(&self) -> anyhow::Result<()> {
        let cwd = env::current_dir()?;
        let config = load_config_or_default_with_warnings(&cwd).config;
        let engine = AnalysisEngine::with_config(&config);

        match DiagnosticKind::from_code_or_name(&self.id) {
            Some(kind) => {
                print!("{}", describe(kind, engine.policy()));
                Ok(())
            }
            None => {
                eprintln!(
                    "{} unknown diagnostic '{}'",
                    "error:".red().bold(),
                    self.id
                );
                eprintln!();
                eprintln!("Available diagnostics:");
                for kind in DiagnosticKind::ALL {
                    eprintln!("  {} ({})", kind.code(), kind.name());
                }
                std::process::exit(1);
            }
        }
    }
}

fn describe(kind: DiagnosticKind, policy: &DiagnosticPolicy) -> String {
    let metadata = kind.metadata();
    let mut lines = vec![
        String::new(),
        format!("Diagnostic {}", metadata.code).bold().to_string(),
        String::new(),
        format!("  {}: {}", "Name".cyan(), metadata.name),
        format!("  {}: {}", "Description".cyan(), metadata.description),
        format!("  {}: {}", "Category".cyan(), format_category(metadata.category)),
        format!("  {}: {}", "Severity".cyan(), format_severity(metadata.severity)),
    ];

    if let Some(severity) = policy.severity_override(kind) {
        lines.push(format!(
            "  {}: {}",
            "Configured severity".cyan(),
            format_severity(severity)
        ));
    }

    if let Some(examples) = metadata.examples {
        lines.push(String::new());
        lines.push(format!("  {}:", "Example".cyan()));
        for line in examples.lines() {
            lines.push(format!("    {}", line));
        }
    }

    lines.push(String::new());
    let status = if policy.is_enabled(kind) {
        "enabled".green()
    } else {
        "disabled".red()
    };
    lines.push(format!("  {}: {}", "Status".cyan(), status));
    if !kind.is_configurable() {
        lines.push(format!(
            "  {}",
            "Errors cannot be disabled or re-graded in modscope.toml".dimmed()
        ));
    }
    lines.push(String::new());

    lines.join("\n")
}

fn format_category(category: DiagnosticCategory) -> &'static str {
    match category {
        DiagnosticCategory::Syntax => "syntax",
        DiagnosticCategory::Structure => "structure",
        DiagnosticCategory::Composition => "trait composition",
        DiagnosticCategory::Visibility => "visibility",
    }
}

fn format_severity(severity: Severity) -> String {
    match severity {
        Severity::Error => "error".red().to_string(),
        Severity::Warning => "warning".yellow().to_string(),
        Severity::Info => "info".blue().to_string(),
        Severity::Hint => "hint".cyan().to_string(),
    }
}
