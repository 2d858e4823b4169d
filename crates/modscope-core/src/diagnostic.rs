//! Diagnostic reporting for analysis results
//!
//! Every problem found by the front-end or the semantic passes is reported
//! as a `Diagnostic` tagged with a `DiagnosticKind` from the fixed catalog.

use serde::Serialize;

use crate::ast::Span;
use crate::source::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

impl Severity {
    pub fn level(&self) -> u8 {
        match self {
            Severity::Error => 4,
            Severity::Warning => 3,
            Severity::Info => 2,
            Severity::Hint => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Hint => "hint",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticCategory {
    Syntax,
    Structure,
    Composition,
    Visibility,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticMetadata {
    pub code: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: DiagnosticCategory,
    pub severity: Severity,
    pub examples: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    ParseError,
    DuplicateSymbol,
    ModuleRedeclarationConflict,
    UnknownTrait,
    NotATrait,
    CyclicTraitComposition,
    TraitMethodCollision,
    InternalAccessViolation,
}

const PARSE_ERROR: DiagnosticMetadata = DiagnosticMetadata {
    code: "P001",
    name: "parse-error",
    description: "The source could not be parsed; the rest of the unit is analyzed from the next declaration.",
    category: DiagnosticCategory::Syntax,
    severity: Severity::Error,
    examples: None,
};

const DUPLICATE_SYMBOL: DiagnosticMetadata = DiagnosticMetadata {
    code: "S001",
    name: "duplicate-symbol",
    description: "A top-level name is declared more than once. The first declaration is kept and treated as public.",
    category: DiagnosticCategory::Structure,
    severity: Severity::Error,
    examples: Some("module A;\nfunction f(): void {}\n\n// Bad: second declaration of f\nfunction f(): void {}"),
};

const MODULE_REDECLARATION_CONFLICT: DiagnosticMetadata = DiagnosticMetadata {
    code: "M001",
    name: "module-redeclaration-conflict",
    description: "A module name is also used by a non-module declaration. Declarations in that module are treated as public.",
    category: DiagnosticCategory::Structure,
    severity: Severity::Error,
    examples: Some("new module Util {}\n\n// Bad: class shares the module's name\nclass Util {}"),
};

const UNKNOWN_TRAIT: DiagnosticMetadata = DiagnosticMetadata {
    code: "T001",
    name: "unknown-trait",
    description: "A `use` clause names a trait that is not declared anywhere in the program.",
    category: DiagnosticCategory::Composition,
    severity: Severity::Error,
    examples: Some("class C {\n  // Bad: Missing is never declared\n  use Missing;\n}"),
};

const NOT_A_TRAIT: DiagnosticMetadata = DiagnosticMetadata {
    code: "T002",
    name: "not-a-trait",
    description: "A `use` clause names a declaration that is not a trait.",
    category: DiagnosticCategory::Composition,
    severity: Severity::Error,
    examples: Some("class Base {}\nclass C {\n  // Bad: Base is a class\n  use Base;\n}"),
};

const CYCLIC_TRAIT_COMPOSITION: DiagnosticMetadata = DiagnosticMetadata {
    code: "T003",
    name: "cyclic-trait-composition",
    description: "A trait transitively uses itself. Traits on the cycle are composed without their cyclic uses and treated as public.",
    category: DiagnosticCategory::Composition,
    severity: Severity::Error,
    examples: Some("trait T1 { use T2; }\n// Bad: T2 uses T1 back\ntrait T2 { use T1; }"),
};

const TRAIT_METHOD_COLLISION: DiagnosticMetadata = DiagnosticMetadata {
    code: "T004",
    name: "trait-method-collision",
    description: "Two composed traits provide the same member; the one composed last wins. Reported as a warning when the winner silently turns a public member internal.",
    category: DiagnosticCategory::Composition,
    severity: Severity::Info,
    examples: Some("class C {\n  use T1; // provides m()\n  use T2; // also provides m(), wins\n}"),
};

const INTERNAL_ACCESS_VIOLATION: DiagnosticMetadata = DiagnosticMetadata {
    code: "V001",
    name: "internal-access-violation",
    description: "An internal declaration is referenced from a module other than its effective module. Code inside a module-level trait runs in the trait's module.",
    category: DiagnosticCategory::Visibility,
    severity: Severity::Error,
    examples: Some("module A;\ninternal function foo(): void {}\n\nmodule B;\n// Bad: foo is internal to A\nfunction bar(): void { foo(); }"),
};

impl DiagnosticKind {
    pub const ALL: [DiagnosticKind; 8] = [
        DiagnosticKind::ParseError,
        DiagnosticKind::DuplicateSymbol,
        DiagnosticKind::ModuleRedeclarationConflict,
        DiagnosticKind::UnknownTrait,
        DiagnosticKind::NotATrait,
        DiagnosticKind::CyclicTraitComposition,
        DiagnosticKind::TraitMethodCollision,
        DiagnosticKind::InternalAccessViolation,
    ];

    pub fn metadata(&self) -> &'static DiagnosticMetadata {
        match self {
            DiagnosticKind::ParseError => &PARSE_ERROR,
            DiagnosticKind::DuplicateSymbol => &DUPLICATE_SYMBOL,
            DiagnosticKind::ModuleRedeclarationConflict => &MODULE_REDECLARATION_CONFLICT,
            DiagnosticKind::UnknownTrait => &UNKNOWN_TRAIT,
            DiagnosticKind::NotATrait => &NOT_A_TRAIT,
            DiagnosticKind::CyclicTraitComposition => &CYCLIC_TRAIT_COMPOSITION,
            DiagnosticKind::TraitMethodCollision => &TRAIT_METHOD_COLLISION,
            DiagnosticKind::InternalAccessViolation => &INTERNAL_ACCESS_VIOLATION,
        }
    }

    pub fn code(&self) -> &'static str {
        self.metadata().code
    }

    pub fn name(&self) -> &'static str {
        self.metadata().name
    }

    /// Error-level diagnostics can be neither disabled nor re-graded.
    pub fn is_configurable(&self) -> bool {
        self.metadata().severity != Severity::Error
    }

    pub fn from_code_or_name(id: &str) -> Option<DiagnosticKind> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.code() == id || kind.name() == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub rule_id: String,
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
    pub file: String,
    pub unit: usize,
    pub span: Span,
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>, location: &Location) -> Self {
        Self {
            rule_id: kind.code().to_string(),
            kind,
            severity: kind.metadata().severity,
            message: message.into(),
            file: location.file.clone(),
            unit: location.unit,
            span: location.span,
            line: location.line,
            column: location.column,
            end_line: location.end_line,
            end_column: location.end_column,
            suggestion: None,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Ordering key: unit order, then source position.
    pub fn sort_key(&self) -> (usize, u32, u32) {
        (self.unit, self.span.lo, self.span.hi)
    }
}

/// Stable sort into declaration order; equal keys keep emission order.
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by_key(|d| d.sort_key());
}
