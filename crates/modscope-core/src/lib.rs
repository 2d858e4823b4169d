//! Module-scoped visibility and trait-origin resolution for Hack programs
//!
//! The crate parses Hack sources down to declarations and reference sites,
//! builds a whole-program module graph and symbol table, flattens trait
//! composition into per-class origin records and checks every reference
//! against `internal` visibility.

pub mod analysis;
pub mod ast;
pub mod config;
pub mod diagnostic;
pub mod parser;
pub mod policy;
pub mod semantic;
pub mod source;

pub use analysis::{AnalysisEngine, AnalysisResult};
pub use diagnostic::{Diagnostic, DiagnosticKind, Severity};
