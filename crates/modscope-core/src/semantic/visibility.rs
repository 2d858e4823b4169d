//! Visibility checking for reference sites
//!
//! The referencing module of a site is lexical: the module of the function or
//! class declaring the body, or the origin module of a trait member reached
//! through composition. A body inherited by several classes is checked once
//! per class; identical diagnostics are reported once.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, trace};

use super::modules::{ModuleGraph, ModuleId};
use super::symbols::{Symbol, SymbolId, SymbolKind, SymbolPayload, SymbolTable};
use super::traits::{FlatMember, Flattening, Origin};
use crate::ast::{ClassRef, Member, MemberKind, Reference, ReferenceKind, Span, Visibility};
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::source::SourceMap;

impl Visibility {
    /// Whether code in `referencing` may use a declaration with this
    /// visibility whose effective module is `effective`.
    pub fn permits(self, referencing: ModuleId, effective: ModuleId) -> bool {
        match self {
            Visibility::Public => true,
            Visibility::Internal => referencing == effective,
        }
    }
}

/// Visibility after degradation: unresolved declarations and declarations
/// outside a real module are public.
pub fn effective_visibility(
    modules: &ModuleGraph,
    visibility: Visibility,
    module: ModuleId,
    degraded: bool,
) -> Visibility {
    if degraded || !modules.scopes_internal(module) {
        Visibility::Public
    } else {
        visibility
    }
}

/// A member found on a class or trait, own or composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedMember {
    /// Class (or trait) the member was looked up on.
    pub owner: SymbolId,
    /// Declaration that contains the member.
    pub source: SymbolId,
    pub member_index: usize,
    pub visibility: Visibility,
    /// Module the member is checked against.
    pub module: ModuleId,
    pub degraded: bool,
}

impl ResolvedMember {
    pub fn member<'s>(&self, symbols: &'s SymbolTable) -> Option<&'s Member> {
        symbols.get(self.source).members().get(self.member_index)
    }
}

pub fn resolve_member(
    symbols: &SymbolTable,
    flattening: &Flattening,
    owner: SymbolId,
    kind: MemberKind,
    name: &str,
) -> Option<ResolvedMember> {
    let symbol = symbols.get(owner);

    if let Some((index, member)) = symbol.member(kind, name) {
        return Some(ResolvedMember {
            owner,
            source: owner,
            member_index: index,
            visibility: member.visibility,
            module: symbol.module,
            degraded: symbol.is_unresolved,
        });
    }

    match symbol.kind {
        SymbolKind::Class => flattening
            .origins(owner)
            .and_then(|origins| origins.get(kind, name))
            .map(|record| ResolvedMember {
                owner,
                source: record.source,
                member_index: record.member_index,
                visibility: record.visibility,
                module: record.module,
                degraded: record.degraded || symbol.is_unresolved,
            }),
        SymbolKind::Trait => flattening
            .trait_members(owner)
            .and_then(|members| members.get(kind, name))
            .map(|flat| ResolvedMember {
                owner,
                source: flat.source,
                member_index: flat.member_index,
                visibility: flat.visibility,
                module: match flat.origin {
                    Origin::Pinned(module) => module,
                    Origin::Composer => symbol.module,
                },
                degraded: flat.degraded || symbol.is_unresolved,
            }),
        _ => None,
    }
}

/// A reference site whose target is not declared in the program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedReference {
    pub name: String,
    pub unit: usize,
    pub span: Span,
}

#[derive(Debug, Default)]
pub struct CheckOutput {
    pub diagnostics: Vec<Diagnostic>,
    pub unresolved: Vec<UnresolvedReference>,
}

#[derive(Debug, Clone, Copy)]
struct Context {
    unit: usize,
    module: ModuleId,
    /// Class or trait that `self`, `static` and `$this` refer to.
    current: Option<SymbolId>,
}

pub struct VisibilityChecker<'a> {
    symbols: &'a SymbolTable,
    modules: &'a ModuleGraph,
    flattening: &'a Flattening,
    sources: &'a SourceMap,
}

impl<'a> VisibilityChecker<'a> {
    pub fn new(
        symbols: &'a SymbolTable,
        modules: &'a ModuleGraph,
        flattening: &'a Flattening,
        sources: &'a SourceMap,
    ) -> Self {
        Self {
            symbols,
            modules,
            flattening,
            sources,
        }
    }

    pub fn check(&self) -> CheckOutput {
        let mut out = CheckOutput::default();

        let mut composed: HashSet<(SymbolId, usize)> = self
            .symbols
            .of_kind(SymbolKind::Class)
            .filter_map(|class| self.flattening.origins(class.id))
            .flat_map(|origins| origins.iter().map(|(_, r)| (r.source, r.member_index)))
            .collect();
        composed.extend(
            self.symbols
                .of_kind(SymbolKind::Trait)
                .filter(|t| t.is_module_level_trait())
                .flat_map(|t| self.composed_trait_members(t))
                .map(|(member, _)| (member.source, member.member_index)),
        );

        for symbol in self.symbols.symbols() {
            match symbol.kind {
                SymbolKind::Function => {
                    let context = Context {
                        unit: symbol.unit,
                        module: symbol.module,
                        current: None,
                    };
                    if let Some(body) = function_body(symbol) {
                        self.check_body(body, context, &mut out);
                    }
                }
                SymbolKind::Class => self.check_class(symbol, &mut out),
                SymbolKind::Trait => {
                    let context = Context {
                        unit: symbol.unit,
                        module: symbol.module,
                        current: Some(symbol.id),
                    };
                    let module_level = symbol.is_module_level_trait();
                    for (index, member) in symbol.members().iter().enumerate() {
                        if module_level || !composed.contains(&(symbol.id, index)) {
                            self.check_body(&member.body, context, &mut out);
                        }
                    }
                    if module_level {
                        self.check_module_level_trait(symbol, &mut out);
                    }
                }
                SymbolKind::Constant => {}
            }
        }

        let before = out.diagnostics.len();
        let mut seen = HashSet::new();
        out.diagnostics
            .retain(|d| seen.insert((d.unit, d.span, d.message.clone())));
        debug!(
            diagnostics = out.diagnostics.len(),
            duplicates = before - out.diagnostics.len(),
            unresolved = out.unresolved.len(),
            "checked visibility"
        );

        out
    }

    fn check_class(&self, class: &Symbol, out: &mut CheckOutput) {
        let context = Context {
            unit: class.unit,
            module: class.module,
            current: Some(class.id),
        };
        for member in class.members() {
            self.check_body(&member.body, context, out);
        }

        let Some(origins) = self.flattening.origins(class.id) else {
            return;
        };
        for (_, record) in origins.iter() {
            let source = self.symbols.get(record.source);
            let Some(member) = source.members().get(record.member_index) else {
                continue;
            };
            let context = Context {
                unit: source.unit,
                module: record.module,
                current: Some(class.id),
            };
            self.check_body(&member.body, context, out);
        }
    }

    /// Ordinary trait members pulled into a module-level trait run in the
    /// module the trait pins them to.
    fn check_module_level_trait(&self, trait_symbol: &Symbol, out: &mut CheckOutput) {
        for (flat, body) in self.composed_trait_members(trait_symbol) {
            let context = Context {
                unit: self.symbols.get(flat.source).unit,
                module: match flat.origin {
                    Origin::Pinned(module) => module,
                    Origin::Composer => trait_symbol.module,
                },
                current: Some(trait_symbol.id),
            };
            self.check_body(body, context, out);
        }
    }

    /// Flattened members of `trait_symbol` declared by other traits, with
    /// their bodies.
    fn composed_trait_members(
        &self,
        trait_symbol: &Symbol,
    ) -> impl Iterator<Item = (&'a FlatMember, &'a [Reference])> + '_ {
        let (symbols, flattening) = (self.symbols, self.flattening);
        let id = trait_symbol.id;
        flattening
            .trait_members(id)
            .into_iter()
            .flat_map(|members| members.iter())
            .filter(move |(_, flat)| flat.source != id)
            .filter_map(move |(_, flat)| {
                let member = symbols.get(flat.source).members().get(flat.member_index)?;
                Some((flat, member.body.as_slice()))
            })
    }

    fn check_body(&self, body: &[Reference], context: Context, out: &mut CheckOutput) {
        for reference in body {
            self.check_reference(reference, context, out);
        }
    }

    fn check_reference(&self, reference: &Reference, context: Context, out: &mut CheckOutput) {
        match &reference.kind {
            ReferenceKind::FunctionCall { name, fallback } => {
                match self.lookup_or_global(name, fallback.as_deref(), SymbolKind::Function) {
                    Some(target) => self.check_symbol(target, reference.span, context, out),
                    None => self.unresolved(name.clone(), reference.span, context, out),
                }
            }
            ReferenceKind::ConstantAccess { name, fallback } => {
                match self.lookup_or_global(name, fallback.as_deref(), SymbolKind::Constant) {
                    Some(target) => self.check_symbol(target, reference.span, context, out),
                    None if self.symbols.lookup(name).is_some() => {}
                    None => self.unresolved(name.clone(), reference.span, context, out),
                }
            }
            ReferenceKind::New { class } => {
                if let ClassRef::Named(name) = class {
                    match self.lookup(name, SymbolKind::Class) {
                        Some(target) => self.check_symbol(target, reference.span, context, out),
                        None => self.unresolved(name.clone(), reference.span, context, out),
                    }
                }
            }
            ReferenceKind::MemberAccess {
                class,
                member,
                kind,
                is_static,
            } => {
                let owner = match class {
                    ClassRef::Named(name) => match self.symbols.lookup(name) {
                        Some(symbol) if matches!(symbol.kind, SymbolKind::Class | SymbolKind::Trait) => {
                            if *is_static {
                                self.check_symbol(symbol, reference.span, context, out);
                            }
                            symbol
                        }
                        _ => {
                            self.unresolved(format!("{name}::{member}"), reference.span, context, out);
                            return;
                        }
                    },
                    ClassRef::Current => match context.current {
                        Some(id) => self.symbols.get(id),
                        None => return,
                    },
                };

                match resolve_member(self.symbols, self.flattening, owner.id, *kind, member) {
                    Some(resolved) => {
                        let qualified = format!("{}::{}", owner.name, member);
                        trace!(member = %qualified, module = %self.modules.name(resolved.module), "resolved member");
                        let visibility = effective_visibility(
                            self.modules,
                            resolved.visibility,
                            resolved.module,
                            resolved.degraded,
                        );
                        if !visibility.permits(context.module, resolved.module) {
                            self.violation(kind.as_str(), &qualified, resolved.module, reference.span, context, out);
                        }
                    }
                    // Traits may rely on members the composing class provides.
                    None if matches!(class, ClassRef::Current) && owner.kind == SymbolKind::Trait => {}
                    None => self.unresolved(
                        format!("{}::{}", owner.name, member),
                        reference.span,
                        context,
                        out,
                    ),
                }
            }
        }
    }

    fn lookup(&self, name: &str, kind: SymbolKind) -> Option<&'a Symbol> {
        self.symbols.lookup(name).filter(|symbol| symbol.kind == kind)
    }

    fn lookup_or_global(&self, name: &str, fallback: Option<&str>, kind: SymbolKind) -> Option<&'a Symbol> {
        self.lookup(name, kind)
            .or_else(|| fallback.and_then(|global| self.lookup(global, kind)))
    }

    fn check_symbol(&self, target: &Symbol, span: Span, context: Context, out: &mut CheckOutput) {
        let visibility = effective_visibility(
            self.modules,
            target.visibility,
            target.module,
            target.is_unresolved,
        );
        trace!(symbol = %target.name, module = %self.modules.name(target.module), "resolved symbol");
        if !visibility.permits(context.module, target.module) {
            self.violation(target.kind.as_str(), &target.name, target.module, span, context, out);
        }
    }

    fn violation(
        &self,
        what: &str,
        name: &str,
        effective: ModuleId,
        span: Span,
        context: Context,
        out: &mut CheckOutput,
    ) {
        let location = self.sources.locate(context.unit, span);
        out.diagnostics.push(
            Diagnostic::new(
                DiagnosticKind::InternalAccessViolation,
                format!(
                    "{} `{}` is internal to module `{}` and cannot be accessed from module `{}`",
                    what,
                    name,
                    self.modules.name(effective),
                    self.modules.name(context.module)
                ),
                &location,
            )
            .with_suggestion(format!(
                "make `{}` public or move the access into module `{}`",
                name,
                self.modules.name(effective)
            )),
        );
    }

    fn unresolved(&self, name: String, span: Span, context: Context, out: &mut CheckOutput) {
        trace!(name = %name, "unresolved reference");
        let reference = UnresolvedReference {
            name,
            unit: context.unit,
            span,
        };
        if !out.unresolved.contains(&reference) {
            out.unresolved.push(reference);
        }
    }
}

fn function_body(symbol: &Symbol) -> Option<&[Reference]> {
    match &symbol.payload {
        SymbolPayload::Function { body } => Some(body),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;
    use crate::semantic::collector::Collector;
    use crate::semantic::traits::TraitFlattener;

    fn check(files: &[(&str, &str)]) -> CheckOutput {
        let parsed = parse_program(files);
        let mut sources = SourceMap::new();
        for unit in &parsed {
            sources.add(unit.file.clone());
        }
        let collected = Collector::new(&sources).collect(parsed.iter().map(|p| &p.unit));
        let flattening = TraitFlattener::new(&collected.symbols, &collected.modules, &sources).flatten();
        VisibilityChecker::new(&collected.symbols, &collected.modules, &flattening, &sources).check()
    }

    fn violations(out: &CheckOutput) -> Vec<&str> {
        out.diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::InternalAccessViolation)
            .map(|d| d.message.as_str())
            .collect()
    }

    #[test]
    fn permits_is_module_equality_for_internal() {
        let mut graph = ModuleGraph::new();
        let a = graph.declare_module("A").unwrap();
        let b = graph.declare_module("B").unwrap();

        assert!(Visibility::Public.permits(b, a));
        assert!(Visibility::Internal.permits(a, a));
        assert!(!Visibility::Internal.permits(b, a));
    }

    #[test]
    fn internal_function_from_other_module() {
        let out = check(&[
            ("a.php", "<?hh\nmodule A;\ninternal function foo(): void {}\n"),
            ("b.php", "<?hh\nmodule B;\nfunction bar(): void { foo(); }\n"),
        ]);

        assert_eq!(
            violations(&out),
            vec!["function `foo` is internal to module `A` and cannot be accessed from module `B`"]
        );
        assert_eq!(out.diagnostics[0].file, "b.php");
    }

    #[test]
    fn internal_function_within_module() {
        let out = check(&[
            ("a1.php", "<?hh\nmodule A;\ninternal function foo(): void {}\n"),
            ("a2.php", "<?hh\nmodule A;\nfunction bar(): void { foo(); }\n"),
        ]);

        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn global_module_has_no_internal() {
        let out = check(&[
            ("a.php", "<?hh\ninternal function foo(): void {}\n"),
            ("b.php", "<?hh\nmodule B;\nfunction bar(): void { foo(); }\n"),
        ]);

        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn internal_class_instantiation_and_static_access() {
        let out = check(&[
            ("a.php", "<?hh\nmodule A;\ninternal class Hidden { const int K = 1; }\nclass Open { internal static function make(): void {} }\n"),
            ("b.php", "<?hh\nmodule B;\nfunction f(): void { new Hidden(); Hidden::K; Open::make(); }\n"),
        ]);

        assert_eq!(
            violations(&out),
            vec![
                "class `Hidden` is internal to module `A` and cannot be accessed from module `B`",
                "class `Hidden` is internal to module `A` and cannot be accessed from module `B`",
                "method `Open::make` is internal to module `A` and cannot be accessed from module `B`",
            ]
        );
    }

    #[test]
    fn module_level_trait_member_runs_in_trait_module() {
        let out = check(&[
            ("a.php", "<?hh\nmodule A;\ninternal function foo(): void {}\n<<__ModuleLevelTrait>>\npublic trait T {\n  public function getFoo(): void { foo(); }\n}\n"),
            ("b.php", "<?hh\nmodule B;\nclass C { use T; }\nfunction main(): void { (new C())->getFoo(); }\n"),
        ]);

        assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
    }

    #[test]
    fn module_level_trait_cannot_reach_composer_internals() {
        let out = check(&[
            ("a.php", "<?hh\nmodule A;\n<<__ModuleLevelTrait>>\ntrait T {\n  public function getFoo(): void { foo(); }\n}\n"),
            ("b.php", "<?hh\nmodule B;\ninternal function foo(): void {}\nclass C { use T; }\n"),
        ]);

        assert_eq!(
            violations(&out),
            vec!["function `foo` is internal to module `B` and cannot be accessed from module `A`"]
        );
    }

    #[test]
    fn ordinary_trait_member_runs_in_class_module() {
        let out = check(&[
            ("a.php", "<?hh\nmodule A;\ninternal function foo(): void {}\ntrait T {\n  public function getFoo(): void { foo(); }\n}\n"),
            ("b.php", "<?hh\nmodule B;\nclass C { use T; }\nclass D { use T; }\n"),
        ]);

        assert_eq!(
            violations(&out),
            vec!["function `foo` is internal to module `A` and cannot be accessed from module `B`"]
        );
    }

    #[test]
    fn uncomposed_trait_is_checked_in_its_module() {
        let out = check(&[
            ("a.php", "<?hh\nmodule A;\ninternal function foo(): void {}\n"),
            ("b.php", "<?hh\nmodule B;\ntrait T {\n  public function g(): void { foo(); }\n}\n"),
        ]);

        assert_eq!(violations(&out).len(), 1);
    }

    #[test]
    fn internal_member_of_module_level_trait_via_class() {
        let out = check(&[
            ("a.php", "<?hh\nmodule A;\n<<__ModuleLevelTrait>>\ntrait T {\n  internal function secret(): void {}\n}\n"),
            ("b.php", "<?hh\nmodule B;\nclass C { use T; public function f(): void { $this->secret(); } }\n"),
        ]);

        assert_eq!(
            violations(&out),
            vec!["method `C::secret` is internal to module `A` and cannot be accessed from module `B`"]
        );
    }

    #[test]
    fn comparison_operands_are_checked_as_constants() {
        let out = check(&[
            ("a.php", "<?hh\nmodule A;\ninternal const int LIMIT = 3;\n"),
            ("b.php", "<?hh\nmodule B;\nfunction f(int $i): bool { return $i < LIMIT && LIMIT > $i && LIMIT == $i; }\n"),
        ]);

        assert_eq!(
            violations(&out),
            vec!["constant `LIMIT` is internal to module `A` and cannot be accessed from module `B`"; 3]
        );
    }

    #[test]
    fn namespaced_functions_are_distinct_symbols() {
        let out = check(&[
            ("a.php", "<?hh\nmodule A;\nnamespace N;\ninternal function f(): void {}\n"),
            ("b.php", "<?hh\nmodule B;\nnamespace M;\nfunction f(): void {}\n"),
            ("c.php", "<?hh\nmodule B;\nfunction g(): void { \\N\\f(); \\M\\f(); }\n"),
        ]);

        assert_eq!(
            violations(&out),
            vec!["function `N\\f` is internal to module `A` and cannot be accessed from module `B`"]
        );
        assert!(out.unresolved.is_empty(), "{:?}", out.unresolved);
    }

    #[test]
    fn unqualified_names_fall_back_to_global() {
        let out = check(&[
            ("a.php", "<?hh\nmodule A;\ninternal function helper(): void {}\ninternal const int LIMIT = 1;\n"),
            ("b.php", "<?hh\nmodule B;\nnamespace N;\nfunction g(): void { helper(); LIMIT; local(); }\nfunction local(): void {}\n"),
        ]);

        assert_eq!(
            violations(&out),
            vec![
                "function `helper` is internal to module `A` and cannot be accessed from module `B`",
                "constant `LIMIT` is internal to module `A` and cannot be accessed from module `B`",
            ]
        );
        assert!(out.unresolved.is_empty(), "{:?}", out.unresolved);
    }

    #[test]
    fn trait_members_provided_by_composer_are_resolved() {
        let out = check(&[
            ("a.php", "<?hh\nmodule A;\n<<__ModuleLevelTrait>>\ntrait T {\n  public function f(): void { $this->g(); }\n}\n"),
            ("b.php", "<?hh\nmodule B;\nclass C { use T; public function g(): void {} }\n"),
        ]);

        assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
        assert!(out.unresolved.is_empty(), "{:?}", out.unresolved);
    }

    #[test]
    fn ordinary_trait_in_module_level_trait_runs_in_pinned_module() {
        let out = check(&[
            ("a.php", "<?hh\nmodule A;\ninternal function bar(): void {}\ntrait U {\n  public function u(): void { foo(); bar(); }\n}\n"),
            ("b.php", "<?hh\nmodule B;\ninternal function foo(): void {}\n<<__ModuleLevelTrait>>\ntrait T { use U; }\n"),
        ]);

        assert_eq!(
            violations(&out),
            vec!["function `bar` is internal to module `A` and cannot be accessed from module `B`"]
        );
    }

    #[test]
    fn unresolved_targets_are_collected_not_reported() {
        let out = check(&[("a.php", "<?hh\nmodule A;\nfunction f(): void { missing(); Gone::m(); }\n")]);

        assert!(out.diagnostics.is_empty());
        let names: Vec<&str> = out.unresolved.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["missing", "Gone::m"]);
    }

    #[test]
    fn duplicate_symbols_degrade_to_public() {
        let out = check(&[
            ("a.php", "<?hh\nmodule A;\ninternal function foo(): void {}\nfunction foo(): void {}\n"),
            ("b.php", "<?hh\nmodule B;\nfunction bar(): void { foo(); }\n"),
        ]);

        assert!(violations(&out).is_empty());
    }
}
