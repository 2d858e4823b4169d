//! Pretty formatter for human-readable terminal output
//!
//! Displays diagnostics with colors, the offending source line and a summary.

use colored::{ColoredString, Colorize};
use modscope_core::diagnostic::Diagnostic;
use modscope_core::source::SourceMap;
use modscope_core::Severity;

pub struct PrettyFormatter<'a> {
    sources: Option<&'a SourceMap>,
}

impl<'a> PrettyFormatter<'a> {
    pub fn new() -> Self {
        Self { sources: None }
    }

    pub fn with_sources(sources: &'a SourceMap) -> Self {
        Self {
            sources: Some(sources),
        }
    }

    pub fn format(&self, diagnostics: &[Diagnostic]) -> String {
        let mut output = String::new();

        for diag in diagnostics {
            output.push_str(&self.format_diagnostic(diag));
            output.push('\n');
        }

        if !diagnostics.is_empty() {
            output.push_str(&format_summary(diagnostics));
        }

        output
    }

    fn format_diagnostic(&self, diag: &Diagnostic) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "{}[{}]: {}",
            colorize_severity(diag.severity),
            diag.rule_id.dimmed(),
            diag.message
        ));
        lines.push(format!(
            "  {} {}:{}:{}",
            "-->".blue(),
            diag.file,
            diag.line,
            diag.column
        ));

        let padding = " ".repeat(diag.line.to_string().len());

        if let Some(source_line) = self.source_line(diag) {
            lines.push(format!("{} {}", padding, "|".blue()));
            lines.push(format!(
                "{} {} {}",
                diag.line.to_string().blue(),
                "|".blue(),
                source_line
            ));

            let caret_padding = " ".repeat(diag.column.saturating_sub(1));
            let caret_len = if diag.end_line == diag.line && diag.end_column > diag.column {
                diag.end_column - diag.column
            } else {
                1
            };
            lines.push(format!(
                "{} {} {}{}",
                padding,
                "|".blue(),
                caret_padding,
                "^".repeat(caret_len).red()
            ));
            lines.push(format!("{} {}", padding, "|".blue()));
        }

        if let Some(suggestion) = &diag.suggestion {
            lines.push(format!(
                "{} {} {} {}",
                padding,
                "=".blue(),
                "suggestion:".green(),
                suggestion
            ));
        }

        lines.join("\n")
    }

    fn source_line(&self, diag: &Diagnostic) -> Option<&'a str> {
        let file = self.sources?.get(diag.unit)?;
        if file.path() != diag.file {
            return None;
        }
        file.get_line(diag.line)
    }
}

impl Default for PrettyFormatter<'_> {
    fn default() -> Self {
        Self::new()
    }
}

fn colorize_severity(severity: Severity) -> ColoredString {
    match severity {
        Severity::Error => "error".red().bold(),
        Severity::Warning => "warning".yellow().bold(),
        Severity::Info => "info".blue().bold(),
        Severity::Hint => "hint".cyan().bold(),
    }
}

fn format_summary(diagnostics: &[Diagnostic]) -> String {
    let error_count = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    let warning_count = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Warning)
        .count();
    let total = diagnostics.len();

    let errors_str = if error_count == 1 {
        format!("{} error", error_count)
    } else {
        format!("{} errors", error_count)
    };
    let warnings_str = if warning_count == 1 {
        format!("{} warning", warning_count)
    } else {
        format!("{} warnings", warning_count)
    };
    let problems_str = if total == 1 { "problem" } else { "problems" };

    format!(
        "\nFound {} {} ({}, {})\n",
        total.to_string().bold(),
        problems_str,
        errors_str.red(),
        warnings_str.yellow()
    )
}
