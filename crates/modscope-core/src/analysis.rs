//! Analysis engine for whole-program visibility checking
//!
//! Runs the passes in order over every unit of a program: declarations,
//! trait flattening, then visibility checking. Each run owns its module graph
//! and symbol table; nothing is shared between runs.

use tracing::{debug, info_span, warn};

use crate::ast::MemberKind;
use crate::config::Config;
use crate::diagnostic::{Diagnostic, DiagnosticKind, Severity, sort_diagnostics};
use crate::parser::{ParsedUnit, parse_program};
use crate::policy::DiagnosticPolicy;
use crate::semantic::{
    Collector, Flattening, ModuleGraph, ModuleId, OriginMap, ResolvedMember, SymbolId,
    SymbolTable, TraitFlattener, UnresolvedReference, VisibilityChecker, effective_visibility,
    resolve_member,
};
use crate::source::SourceMap;

pub struct AnalysisEngine {
    policy: DiagnosticPolicy,
    parallel: bool,
}

impl AnalysisEngine {
    pub fn new() -> Self {
        Self {
            policy: DiagnosticPolicy::new(),
            parallel: true,
        }
    }

    pub fn with_config(config: &Config) -> Self {
        let mut policy = DiagnosticPolicy::new();
        policy.configure(&config.diagnostics);
        Self {
            policy,
            parallel: config.analysis.parallel,
        }
    }

    pub fn policy(&self) -> &DiagnosticPolicy {
        &self.policy
    }

    /// Parses and analyzes `(path, source)` pairs as one program.
    pub fn analyze_sources(&self, files: &[(&str, &str)]) -> AnalysisResult {
        self.analyze(parse_program(files))
    }

    pub fn analyze(&self, units: Vec<ParsedUnit>) -> AnalysisResult {
        let _span = info_span!("analyze", units = units.len()).entered();

        let mut sources = SourceMap::new();
        let mut diagnostics = Vec::new();
        let mut compilation_units = Vec::with_capacity(units.len());

        for parsed in units {
            let index = sources.add(parsed.file);
            for error in &parsed.errors {
                let location = sources.locate(index, error.span);
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::ParseError,
                    error.message.clone(),
                    &location,
                ));
            }
            compilation_units.push(parsed.unit);
        }

        let collected = Collector::new(&sources).collect(&compilation_units);
        diagnostics.extend(collected.diagnostics);
        let modules = collected.modules;
        let mut symbols = collected.symbols;

        let mut flattening = TraitFlattener::new(&symbols, &modules, &sources)
            .parallel(self.parallel)
            .flatten();
        diagnostics.append(&mut flattening.diagnostics);
        for &id in flattening.cyclic_traits() {
            warn!(name = %symbols.get(id).name, "trait on a composition cycle treated as public");
            symbols.mark_unresolved(id);
        }

        let checked = VisibilityChecker::new(&symbols, &modules, &flattening, &sources).check();
        diagnostics.extend(checked.diagnostics);

        let mut diagnostics = self.policy.apply(diagnostics);
        sort_diagnostics(&mut diagnostics);

        debug!(
            modules = modules.len() - 1,
            symbols = symbols.len(),
            diagnostics = diagnostics.len(),
            "analysis complete"
        );

        AnalysisResult {
            sources,
            modules,
            symbols,
            flattening,
            diagnostics,
            unresolved: checked.unresolved,
        }
    }
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}

pub struct AnalysisResult {
    pub sources: SourceMap,
    pub modules: ModuleGraph,
    pub symbols: SymbolTable,
    pub flattening: Flattening,
    pub diagnostics: Vec<Diagnostic>,
    pub unresolved: Vec<UnresolvedReference>,
}

impl AnalysisResult {
    pub fn module(&self, name: &str) -> Option<ModuleId> {
        self.modules.lookup(name)
    }

    pub fn origins(&self, class: &str) -> Option<&OriginMap> {
        let id = self.symbols.lookup_id(class)?;
        self.flattening.origins(id)
    }

    /// Finds `member` on `class`, either declared there or composed from a trait.
    pub fn resolve_member(&self, class: &str, kind: MemberKind, member: &str) -> Option<ResolvedMember> {
        let id = self.symbols.lookup_id(class)?;
        resolve_member(&self.symbols, &self.flattening, id, kind, member)
    }

    pub fn is_accessible(&self, referencing: ModuleId, target: SymbolId) -> bool {
        let symbol = self.symbols.get(target);
        effective_visibility(&self.modules, symbol.visibility, symbol.module, symbol.is_unresolved)
            .permits(referencing, symbol.module)
    }

    pub fn is_member_accessible(&self, referencing: ModuleId, member: &ResolvedMember) -> bool {
        effective_visibility(&self.modules, member.visibility, member.module, member.degraded)
            .permits(referencing, member.module)
    }

    pub fn count_at(&self, severity: Severity) -> usize {
        self.diagnostics.iter().filter(|d| d.severity == severity).count()
    }

    pub fn has_errors(&self) -> bool {
        self.count_at(Severity::Error) > 0
    }
}
