//! Declaration pass: builds the module graph and symbol table
//!
//! Every module named anywhere in the program is declared before any symbol,
//! so name clashes between modules and other declarations are found no matter
//! which unit comes first.

use tracing::{debug, warn};

use super::modules::{ModuleError, ModuleGraph};
use super::symbols::{SymbolError, SymbolPayload, SymbolTable};
use crate::ast::{CompilationUnit, Declaration, DeclarationKind};
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::source::SourceMap;

pub struct Collected {
    pub modules: ModuleGraph,
    pub symbols: SymbolTable,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct Collector<'a> {
    sources: &'a SourceMap,
    modules: ModuleGraph,
    symbols: SymbolTable,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Collector<'a> {
    pub fn new(sources: &'a SourceMap) -> Self {
        Self {
            sources,
            modules: ModuleGraph::new(),
            symbols: SymbolTable::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Units are numbered by iteration order, matching the source map.
    pub fn collect<'u>(mut self, units: impl IntoIterator<Item = &'u CompilationUnit>) -> Collected {
        let units: Vec<&CompilationUnit> = units.into_iter().collect();

        for (index, unit) in units.iter().enumerate() {
            self.declare_modules(index, unit);
        }
        for (index, unit) in units.iter().enumerate() {
            for declaration in &unit.declarations {
                self.declare_symbol(index, declaration);
            }
        }

        debug!(
            units = units.len(),
            modules = self.modules.len() - 1,
            symbols = self.symbols.len(),
            "collected declarations"
        );

        Collected {
            modules: self.modules,
            symbols: self.symbols,
            diagnostics: self.diagnostics,
        }
    }

    fn declare_modules(&mut self, index: usize, unit: &CompilationUnit) {
        for definition in &unit.module_definitions {
            // Entities are registered later, so declaring a module cannot clash yet.
            let _ = self.modules.declare_module(&definition.name);
        }
        if let Some(directive) = &unit.module {
            if let Ok(module) = self.modules.declare_module(&directive.name) {
                self.modules.enter_module(index, module, directive.span.hi);
            }
        }
    }

    fn declare_symbol(&mut self, index: usize, declaration: &Declaration) {
        let module = self.modules.current_module_at(index, declaration.span.lo);
        let payload = match &declaration.kind {
            DeclarationKind::Function(function) => SymbolPayload::Function {
                body: function.body.clone(),
            },
            DeclarationKind::Class(class) => SymbolPayload::Class {
                uses: class.uses.clone(),
                members: class.members.clone(),
            },
            DeclarationKind::Trait(decl) => SymbolPayload::Trait {
                is_module_level: decl.is_module_level,
                uses: decl.uses.clone(),
                members: decl.members.clone(),
            },
            DeclarationKind::Constant => SymbolPayload::Constant,
        };
        let kind = payload.kind();

        let declared = self.symbols.declare(
            &declaration.name,
            module,
            declaration.visibility,
            payload,
            index,
            declaration.span,
        );

        match declared {
            Ok(_) => {
                if let Err(ModuleError::RedeclarationConflict { name }) =
                    self.modules.register_entity(&declaration.name)
                {
                    warn!(name = %name, "module name reused by a declaration");
                    let location = self.sources.locate(index, declaration.span);
                    self.diagnostics.push(
                        Diagnostic::new(
                            DiagnosticKind::ModuleRedeclarationConflict,
                            format!(
                                "{} `{}` has the same name as module `{}`",
                                kind.as_str(),
                                declaration.name,
                                name
                            ),
                            &location,
                        )
                        .with_suggestion("rename the module or the declaration"),
                    );
                }
            }
            Err(SymbolError::DuplicateSymbol { name, existing }) => {
                self.symbols.mark_unresolved(existing);
                let previous = self.symbols.get(existing);
                let previous_location = self.sources.locate(previous.unit, previous.span);
                warn!(name = %name, "duplicate declaration");

                let location = self.sources.locate(index, declaration.span);
                self.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::DuplicateSymbol,
                    format!(
                        "`{}` is already declared as a {} at {}:{}:{}",
                        name,
                        previous.kind.as_str(),
                        previous_location.file,
                        previous_location.line,
                        previous_location.column
                    ),
                    &location,
                ));
            }
        }
    }
}
