//! Per-run diagnostic policy: which diagnostics are reported and at what severity.
//!
//! Only diagnostics whose catalog severity is below `Error` can be disabled
//! or re-graded; structural errors and access violations always surface.

use std::collections::{HashMap, HashSet};

use crate::config::DiagnosticsConfig;
use crate::diagnostic::{Diagnostic, DiagnosticKind, Severity};

#[derive(Debug, Clone, Default)]
pub struct DiagnosticPolicy {
    disabled: HashSet<DiagnosticKind>,
    severity_overrides: HashMap<DiagnosticKind, Severity>,
}

impl DiagnosticPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(&mut self, config: &DiagnosticsConfig) {
        self.disabled.clear();
        self.severity_overrides.clear();

        for id in &config.disabled {
            if let Some(kind) = DiagnosticKind::from_code_or_name(id) {
                if kind.is_configurable() {
                    self.disabled.insert(kind);
                }
            }
        }

        for (id, severity) in &config.severity {
            if let Some(kind) = DiagnosticKind::from_code_or_name(id) {
                if kind.is_configurable() {
                    self.severity_overrides.insert(kind, (*severity).into());
                }
            }
        }
    }

    pub fn is_enabled(&self, kind: DiagnosticKind) -> bool {
        !self.disabled.contains(&kind)
    }

    pub fn severity_override(&self, kind: DiagnosticKind) -> Option<Severity> {
        self.severity_overrides.get(&kind).copied()
    }

    pub fn apply(&self, diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
        diagnostics
            .into_iter()
            .filter(|diag| self.is_enabled(diag.kind))
            .map(|mut diag| {
                if let Some(severity) = self.severity_override(diag.kind) {
                    diag.severity = severity;
                }
                diag
            })
            .collect()
    }
}
