//! JSON output formatter for diagnostic display
//!
//! Structured output for editors and CI integrations.

use modscope_core::diagnostic::{Diagnostic, DiagnosticCategory};
use modscope_core::semantic::UnresolvedReference;
use modscope_core::Severity;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Serialize)]
pub struct JsonOutput<'a> {
    pub version: &'static str,
    pub metadata: JsonMetadata,
    pub summary: JsonSummary,
    pub diagnostics: Vec<JsonDiagnostic>,
    pub unresolved: &'a [UnresolvedReference],
}

#[derive(Serialize)]
pub struct JsonMetadata {
    pub modscope_version: &'static str,
    pub working_directory: String,
    pub analyzed_path: String,
}

#[derive(Serialize)]
pub struct JsonSummary {
    pub total_files: usize,
    pub files_with_issues: usize,
    pub total_diagnostics: usize,
    pub by_severity: SeverityCounts,
    pub by_category: CategoryCounts,
}

#[derive(Serialize, Default)]
pub struct SeverityCounts {
    pub error: usize,
    pub warning: usize,
    pub info: usize,
    pub hint: usize,
}

#[derive(Serialize, Default)]
pub struct CategoryCounts {
    pub syntax: usize,
    pub structure: usize,
    pub composition: usize,
    pub visibility: usize,
}

#[derive(Serialize)]
pub struct JsonDiagnostic {
    pub rule_id: String,
    pub rule_name: &'static str,
    pub category: DiagnosticCategory,
    pub severity: Severity,
    pub message: String,
    pub location: JsonLocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[derive(Serialize)]
pub struct JsonLocation {
    pub file: String,
    pub start: JsonPosition,
    pub end: JsonPosition,
}

#[derive(Serialize)]
pub struct JsonPosition {
    pub line: usize,
    pub column: usize,
}

#[derive(Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn new() -> Self {
        Self
    }

    pub fn format(
        &self,
        diagnostics: &[Diagnostic],
        unresolved: &[UnresolvedReference],
        total_files: usize,
        analyzed_path: &str,
    ) -> String {
        let output = JsonOutput {
            version: "1.0",
            metadata: build_metadata(analyzed_path),
            summary: build_summary(diagnostics, total_files),
            diagnostics: diagnostics.iter().map(convert_diagnostic).collect(),
            unresolved,
        };
        serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
    }
}

fn build_metadata(analyzed_path: &str) -> JsonMetadata {
    JsonMetadata {
        modscope_version: env!("CARGO_PKG_VERSION"),
        working_directory: std::env::current_dir()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default(),
        analyzed_path: analyzed_path.to_string(),
    }
}

fn build_summary(diagnostics: &[Diagnostic], total_files: usize) -> JsonSummary {
    let mut by_severity = SeverityCounts::default();
    let mut by_category = CategoryCounts::default();
    let mut files_with_issues: HashSet<&str> = HashSet::new();

    for diag in diagnostics {
        match diag.severity {
            Severity::Error => by_severity.error += 1,
            Severity::Warning => by_severity.warning += 1,
            Severity::Info => by_severity.info += 1,
            Severity::Hint => by_severity.hint += 1,
        }
        match diag.kind.metadata().category {
            DiagnosticCategory::Syntax => by_category.syntax += 1,
            DiagnosticCategory::Structure => by_category.structure += 1,
            DiagnosticCategory::Composition => by_category.composition += 1,
            DiagnosticCategory::Visibility => by_category.visibility += 1,
        }
        files_with_issues.insert(&diag.file);
    }

    JsonSummary {
        total_files,
        files_with_issues: files_with_issues.len(),
        total_diagnostics: diagnostics.len(),
        by_severity,
        by_category,
    }
}

fn convert_diagnostic(diag: &Diagnostic) -> JsonDiagnostic {
    let metadata = diag.kind.metadata();
    JsonDiagnostic {
        rule_id: diag.rule_id.clone(),
        rule_name: metadata.name,
        category: metadata.category,
        severity: diag.severity,
        message: diag.message.clone(),
        location: JsonLocation {
            file: diag.file.clone(),
            start: JsonPosition {
                line: diag.line,
                column: diag.column,
            },
            end: JsonPosition {
                line: diag.end_line,
                column: diag.end_column,
            },
        },
        suggestion: diag.suggestion.clone(),
    }
}
