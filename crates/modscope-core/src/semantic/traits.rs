//! Trait flattening and origin records
//!
//! Computes, for every class, the members it inherits through `use` clauses
//! and the module each of them must be checked against. Members of a
//! module-level trait keep the trait's module; members of an ordinary trait
//! take the module of whoever composes them.
//!
//! The pass runs in three steps over the trait graph: resolve use clauses,
//! reject cycles with an iterative depth-first search, then flatten traits
//! level by level (each level only depends on finished levels, so a level can
//! be processed in parallel) before flattening classes.

use std::collections::{BTreeMap, HashMap, HashSet};

use rayon::prelude::*;
use tracing::{debug, trace};

use super::modules::{ModuleGraph, ModuleId};
use super::symbols::{Symbol, SymbolId, SymbolKind, SymbolTable};
use crate::ast::{MemberKind, TraitUseClause, Visibility};
use crate::diagnostic::{Diagnostic, DiagnosticKind, Severity};
use crate::source::SourceMap;

/// Where a flattened member's effective module comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    Pinned(ModuleId),
    /// Resolved by the class (or module-level trait) that composes the member.
    Composer,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemberKey {
    pub kind: MemberKind,
    pub name: String,
}

impl MemberKey {
    pub fn new(kind: MemberKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatMember {
    pub visibility: Visibility,
    pub origin: Origin,
    /// Trait that declares the member.
    pub source: SymbolId,
    pub member_index: usize,
    /// Trait named in the composing declaration's `use` clause.
    pub via: SymbolId,
    /// Reached through an unresolved trait; treated as public.
    pub degraded: bool,
}

impl FlatMember {
    pub fn effective_visibility(&self) -> Visibility {
        if self.degraded {
            Visibility::Public
        } else {
            self.visibility
        }
    }
}

/// Flattened members of one trait: its own plus everything it composes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraitMembers {
    members: BTreeMap<MemberKey, FlatMember>,
}

impl TraitMembers {
    pub fn get(&self, kind: MemberKind, name: &str) -> Option<&FlatMember> {
        self.members.get(&MemberKey::new(kind, name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MemberKey, &FlatMember)> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginRecord {
    pub visibility: Visibility,
    /// Module the member is checked against and executes in.
    pub module: ModuleId,
    pub source: SymbolId,
    pub member_index: usize,
    pub via: SymbolId,
    pub degraded: bool,
}

impl OriginRecord {
    pub fn effective_visibility(&self) -> Visibility {
        if self.degraded {
            Visibility::Public
        } else {
            self.visibility
        }
    }
}

/// Inherited members of one class, keyed by member kind and name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginMap {
    records: BTreeMap<MemberKey, OriginRecord>,
}

impl OriginMap {
    pub fn get(&self, kind: MemberKind, name: &str) -> Option<&OriginRecord> {
        self.records.get(&MemberKey::new(kind, name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MemberKey, &OriginRecord)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct Flattening {
    traits: HashMap<SymbolId, TraitMembers>,
    classes: HashMap<SymbolId, OriginMap>,
    cyclic: Vec<SymbolId>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Flattening {
    pub fn origins(&self, class: SymbolId) -> Option<&OriginMap> {
        self.classes.get(&class)
    }

    pub fn trait_members(&self, trait_id: SymbolId) -> Option<&TraitMembers> {
        self.traits.get(&trait_id)
    }

    /// Traits that sit on a composition cycle, in declaration order.
    pub fn cyclic_traits(&self) -> &[SymbolId] {
        &self.cyclic
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// `use` clauses resolved to trait ids, aligned with each symbol's clauses.
type ResolvedUses = HashMap<SymbolId, Vec<Option<SymbolId>>>;

pub struct TraitFlattener<'a> {
    symbols: &'a SymbolTable,
    modules: &'a ModuleGraph,
    sources: &'a SourceMap,
    parallel: bool,
}

impl<'a> TraitFlattener<'a> {
    pub fn new(symbols: &'a SymbolTable, modules: &'a ModuleGraph, sources: &'a SourceMap) -> Self {
        Self {
            symbols,
            modules,
            sources,
            parallel: true,
        }
    }

    pub fn parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    pub fn flatten(&self) -> Flattening {
        let mut diagnostics = Vec::new();

        let traits: Vec<SymbolId> = self.symbols.of_kind(SymbolKind::Trait).map(|s| s.id).collect();
        let classes: Vec<SymbolId> = self.symbols.of_kind(SymbolKind::Class).map(|s| s.id).collect();

        let mut resolved = ResolvedUses::new();
        for symbol in self.symbols.symbols() {
            if matches!(symbol.kind, SymbolKind::Class | SymbolKind::Trait) {
                let uses = self.resolve_uses(symbol, &mut diagnostics);
                resolved.insert(symbol.id, uses);
            }
        }

        let (cyclic, back_edges) = self.reject_cycles(&traits, &resolved, &mut diagnostics);
        for &(from, clause) in &back_edges {
            if let Some(slot) = resolved.get_mut(&from).and_then(|uses| uses.get_mut(clause)) {
                *slot = None;
            }
        }
        let cyclic_set: HashSet<SymbolId> = cyclic.iter().copied().collect();

        let mut done: HashMap<SymbolId, TraitMembers> = HashMap::new();
        let levels = self.levels(&traits, &resolved);
        debug!(traits = traits.len(), levels = levels.len(), "flattening traits");

        for level in &levels {
            let results = map_ordered(level, self.parallel, |&id| {
                self.flatten_trait(id, &resolved, &done, &cyclic_set)
            });
            for (&id, (members, diags)) in level.iter().zip(results) {
                done.insert(id, members);
                diagnostics.extend(diags);
            }
        }

        let results = map_ordered(&classes, self.parallel, |&id| {
            self.flatten_class(id, &resolved, &done, &cyclic_set)
        });
        let mut origins = HashMap::new();
        for (&id, (map, diags)) in classes.iter().zip(results) {
            origins.insert(id, map);
            diagnostics.extend(diags);
        }
        debug!(classes = origins.len(), "flattened classes");

        Flattening {
            traits: done,
            classes: origins,
            cyclic,
            diagnostics,
        }
    }

    fn resolve_uses(&self, owner: &Symbol, diagnostics: &mut Vec<Diagnostic>) -> Vec<Option<SymbolId>> {
        owner
            .uses()
            .iter()
            .map(|clause| match self.symbols.lookup(&clause.name) {
                Some(target) if target.kind == SymbolKind::Trait => Some(target.id),
                Some(target) => {
                    let location = self.sources.locate(owner.unit, clause.span);
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::NotATrait,
                        format!(
                            "`{}` uses `{}`, which is a {} and not a trait",
                            owner.name,
                            clause.name,
                            target.kind.as_str()
                        ),
                        &location,
                    ));
                    None
                }
                None => {
                    let location = self.sources.locate(owner.unit, clause.span);
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::UnknownTrait,
                        format!("`{}` uses unknown trait `{}`", owner.name, clause.name),
                        &location,
                    ));
                    None
                }
            })
            .collect()
    }

    /// Iterative depth-first search over trait uses. Returns the traits on a
    /// cycle and the back edges (trait, clause index) that close cycles;
    /// removing those edges leaves a DAG.
    fn reject_cycles(
        &self,
        traits: &[SymbolId],
        resolved: &ResolvedUses,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> (Vec<SymbolId>, Vec<(SymbolId, usize)>) {
        let mut marks: HashMap<SymbolId, Mark> = HashMap::new();
        let mut back_edges = Vec::new();
        let mut on_cycle: HashSet<SymbolId> = HashSet::new();
        let mut reported: HashSet<Vec<String>> = HashSet::new();

        for &root in traits {
            if marks.contains_key(&root) {
                continue;
            }
            marks.insert(root, Mark::Visiting);
            let mut stack: Vec<(SymbolId, usize)> = vec![(root, 0)];

            while let Some(&(node, clause)) = stack.last() {
                let uses = resolved.get(&node).map(Vec::as_slice).unwrap_or(&[]);
                if clause >= uses.len() {
                    marks.insert(node, Mark::Done);
                    stack.pop();
                    continue;
                }
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }

                let Some(next) = uses[clause] else {
                    continue;
                };
                match marks.get(&next) {
                    None => {
                        marks.insert(next, Mark::Visiting);
                        stack.push((next, 0));
                    }
                    Some(Mark::Visiting) => {
                        back_edges.push((node, clause));
                        let start = stack.iter().position(|&(id, _)| id == next).unwrap_or(0);
                        let cycle: Vec<SymbolId> = stack[start..].iter().map(|&(id, _)| id).collect();
                        on_cycle.extend(cycle.iter().copied());
                        self.report_cycle(&cycle, &mut reported, diagnostics);
                    }
                    Some(Mark::Done) => {}
                }
            }
        }

        let cyclic = traits.iter().copied().filter(|id| on_cycle.contains(id)).collect();
        (cyclic, back_edges)
    }

    fn report_cycle(
        &self,
        cycle: &[SymbolId],
        reported: &mut HashSet<Vec<String>>,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let names: Vec<&str> = cycle.iter().map(|&id| self.symbols.get(id).name.as_str()).collect();
        let Some(start) = (0..names.len()).min_by_key(|&i| names[i]) else {
            return;
        };
        let rotated: Vec<SymbolId> = cycle[start..].iter().chain(&cycle[..start]).copied().collect();

        let mut key: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        key.sort();
        if !reported.insert(key) {
            return;
        }

        let head = self.symbols.get(rotated[0]);
        let successor = self.symbols.get(rotated[1 % rotated.len()]);
        let span = head
            .uses()
            .iter()
            .find(|clause| clause.name == successor.name)
            .map(|clause| clause.span)
            .unwrap_or(head.span);

        let mut path: Vec<&str> = rotated.iter().map(|&id| self.symbols.get(id).name.as_str()).collect();
        path.push(head.name.as_str());

        let location = self.sources.locate(head.unit, span);
        diagnostics.push(
            Diagnostic::new(
                DiagnosticKind::CyclicTraitComposition,
                format!("trait composition cycle: {}", path.join(" -> ")),
                &location,
            )
            .with_suggestion("remove one of the `use` clauses on the cycle"),
        );
    }

    /// Groups traits into dependency levels (Kahn's algorithm). Level `n`
    /// only uses traits from levels below `n`. Each level keeps declaration
    /// order.
    fn levels(&self, traits: &[SymbolId], resolved: &ResolvedUses) -> Vec<Vec<SymbolId>> {
        let order: HashMap<SymbolId, usize> = traits.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let mut pending: HashMap<SymbolId, usize> = HashMap::new();
        let mut dependents: HashMap<SymbolId, Vec<SymbolId>> = HashMap::new();

        for &id in traits {
            let deps: HashSet<SymbolId> = resolved
                .get(&id)
                .into_iter()
                .flatten()
                .flatten()
                .copied()
                .collect();
            pending.insert(id, deps.len());
            for dep in deps {
                dependents.entry(dep).or_default().push(id);
            }
        }

        let mut levels = Vec::new();
        let mut current: Vec<SymbolId> = traits.iter().copied().filter(|id| pending[id] == 0).collect();

        while !current.is_empty() {
            let mut next = Vec::new();
            for id in &current {
                for dependent in dependents.get(id).into_iter().flatten() {
                    if let Some(count) = pending.get_mut(dependent) {
                        *count -= 1;
                        if *count == 0 {
                            next.push(*dependent);
                        }
                    }
                }
            }
            next.sort_by_key(|id| order[id]);
            levels.push(std::mem::replace(&mut current, next));
        }

        levels
    }

    fn flatten_trait(
        &self,
        id: SymbolId,
        resolved: &ResolvedUses,
        done: &HashMap<SymbolId, TraitMembers>,
        cyclic: &HashSet<SymbolId>,
    ) -> (TraitMembers, Vec<Diagnostic>) {
        let owner = self.symbols.get(id);
        let pin = owner.is_module_level_trait();
        let mut members = BTreeMap::new();
        let mut diagnostics = Vec::new();

        self.compose_uses(owner, resolved, done, cyclic, &mut members, &mut diagnostics, |origin| {
            match origin {
                Origin::Composer if pin => Origin::Pinned(owner.module),
                other => other,
            }
        });

        let own_origin = if pin {
            Origin::Pinned(owner.module)
        } else {
            Origin::Composer
        };
        let degraded = self.is_unresolved(id, cyclic);
        for (index, member) in owner.members().iter().enumerate() {
            members.insert(
                MemberKey::new(member.kind, &member.name),
                FlatMember {
                    visibility: member.visibility,
                    origin: own_origin,
                    source: id,
                    member_index: index,
                    via: id,
                    degraded,
                },
            );
        }

        trace!(name = %owner.name, members = members.len(), "flattened trait");
        (TraitMembers { members }, diagnostics)
    }

    fn flatten_class(
        &self,
        id: SymbolId,
        resolved: &ResolvedUses,
        done: &HashMap<SymbolId, TraitMembers>,
        cyclic: &HashSet<SymbolId>,
    ) -> (OriginMap, Vec<Diagnostic>) {
        let owner = self.symbols.get(id);
        let mut members = BTreeMap::new();
        let mut diagnostics = Vec::new();

        self.compose_uses(owner, resolved, done, cyclic, &mut members, &mut diagnostics, |origin| {
            match origin {
                Origin::Composer => Origin::Pinned(owner.module),
                pinned => pinned,
            }
        });

        for member in owner.members() {
            members.remove(&MemberKey::new(member.kind, &member.name));
        }

        let records = members
            .into_iter()
            .map(|(key, flat)| {
                let module = match flat.origin {
                    Origin::Pinned(module) => module,
                    Origin::Composer => owner.module,
                };
                let record = OriginRecord {
                    visibility: flat.visibility,
                    module,
                    source: flat.source,
                    member_index: flat.member_index,
                    via: flat.via,
                    degraded: flat.degraded,
                };
                (key, record)
            })
            .collect();

        (OriginMap { records }, diagnostics)
    }

    #[allow(clippy::too_many_arguments)]
    fn compose_uses(
        &self,
        owner: &Symbol,
        resolved: &ResolvedUses,
        done: &HashMap<SymbolId, TraitMembers>,
        cyclic: &HashSet<SymbolId>,
        members: &mut BTreeMap<MemberKey, FlatMember>,
        diagnostics: &mut Vec<Diagnostic>,
        resolve_origin: impl Fn(Origin) -> Origin,
    ) {
        let targets = resolved.get(&owner.id).map(Vec::as_slice).unwrap_or(&[]);

        for (clause, target) in owner.uses().iter().zip(targets) {
            let Some(target) = *target else {
                continue;
            };
            let Some(composed) = done.get(&target) else {
                continue;
            };
            let degrade = self.is_unresolved(target, cyclic);

            for (key, member) in &composed.members {
                let incoming = FlatMember {
                    origin: resolve_origin(member.origin),
                    via: target,
                    degraded: member.degraded || degrade,
                    ..member.clone()
                };
                self.compose(owner, clause, key, incoming, members, diagnostics);
            }
        }
    }

    /// Inserts one composed member; a later trait replaces an earlier one.
    /// Collisions on a name the owner declares itself are not reported.
    fn compose(
        &self,
        owner: &Symbol,
        clause: &TraitUseClause,
        key: &MemberKey,
        incoming: FlatMember,
        members: &mut BTreeMap<MemberKey, FlatMember>,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        if let Some(existing) = members.get(key) {
            let same_member = existing.source == incoming.source
                && existing.member_index == incoming.member_index
                && existing.origin == incoming.origin;
            if same_member {
                return;
            }
            if owner.member(key.kind, &key.name).is_none() {
                diagnostics.push(self.collision(owner, clause, key, existing, &incoming));
            }
        }
        members.insert(key.clone(), incoming);
    }

    fn collision(
        &self,
        owner: &Symbol,
        clause: &TraitUseClause,
        key: &MemberKey,
        existing: &FlatMember,
        incoming: &FlatMember,
    ) -> Diagnostic {
        let narrows = existing.effective_visibility() == Visibility::Public
            && incoming.effective_visibility() == Visibility::Internal;

        let mut message = format!(
            "{} `{}` from trait `{}` replaces the one from trait `{}` in `{}`",
            key.kind.as_str(),
            key.name,
            self.symbols.get(incoming.via).name,
            self.symbols.get(existing.via).name,
            owner.name
        );
        if let (Origin::Pinned(before), Origin::Pinned(after)) = (existing.origin, incoming.origin) {
            if before != after {
                message.push_str(&format!(
                    "; its module changes from `{}` to `{}`",
                    self.modules.name(before),
                    self.modules.name(after)
                ));
            }
        }
        if narrows {
            message.push_str("; the member becomes internal");
        }

        let location = self.sources.locate(owner.unit, clause.span);
        let diagnostic = Diagnostic::new(DiagnosticKind::TraitMethodCollision, message, &location);
        if narrows {
            diagnostic.with_severity(Severity::Warning)
        } else {
            diagnostic
        }
    }

    fn is_unresolved(&self, id: SymbolId, cyclic: &HashSet<SymbolId>) -> bool {
        cyclic.contains(&id) || self.symbols.get(id).is_unresolved
    }
}

/// Maps `items` in parallel or sequentially; output order matches input order.
pub(crate) fn map_ordered<T, R, F>(items: &[T], parallel: bool, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    if parallel {
        items.par_iter().map(f).collect()
    } else {
        items.iter().map(f).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::collector::Collector;
    use crate::parser::parse_program;

    struct Fixture {
        modules: ModuleGraph,
        symbols: SymbolTable,
        sources: SourceMap,
    }

    impl Fixture {
        fn new(files: &[(&str, &str)]) -> Self {
            let parsed = parse_program(files);
            let mut sources = SourceMap::new();
            for unit in &parsed {
                sources.add(unit.file.clone());
            }
            let collected = Collector::new(&sources).collect(parsed.iter().map(|p| &p.unit));
            Self {
                modules: collected.modules,
                symbols: collected.symbols,
                sources,
            }
        }

        fn flatten(&self) -> Flattening {
            TraitFlattener::new(&self.symbols, &self.modules, &self.sources).flatten()
        }

        fn id(&self, name: &str) -> SymbolId {
            self.symbols.lookup_id(name).expect("declared symbol")
        }

        fn module(&self, name: &str) -> ModuleId {
            self.modules.lookup(name).expect("declared module")
        }
    }

    #[test]
    fn module_level_trait_pins_trait_module() {
        let fixture = Fixture::new(&[
            ("a.php", "<?hh\nmodule A;\n<<__ModuleLevelTrait>>\npublic trait T {\n  public function getFoo(): void {}\n}\n"),
            ("b.php", "<?hh\nmodule B;\nclass C { use T; }\n"),
        ]);

        let flattening = fixture.flatten();
        let record = flattening
            .origins(fixture.id("C"))
            .and_then(|map| map.get(MemberKind::Method, "getFoo"))
            .expect("getFoo is inherited");

        assert_eq!(record.module, fixture.module("A"));
        assert_eq!(record.source, fixture.id("T"));
        assert_eq!(record.via, fixture.id("T"));
        assert!(flattening.diagnostics.is_empty());
    }

    #[test]
    fn ordinary_trait_takes_class_module() {
        let fixture = Fixture::new(&[
            ("a.php", "<?hh\nmodule A;\npublic trait T {\n  internal function helper(): void {}\n}\n"),
            ("b.php", "<?hh\nmodule B;\nclass C { use T; }\n"),
        ]);

        let flattening = fixture.flatten();
        let record = flattening
            .origins(fixture.id("C"))
            .and_then(|map| map.get(MemberKind::Method, "helper"))
            .expect("helper is inherited");

        assert_eq!(record.module, fixture.module("B"));
        assert_eq!(record.visibility, Visibility::Internal);
    }

    #[test]
    fn later_trait_wins_collision_with_one_diagnostic() {
        let fixture = Fixture::new(&[(
            "a.php",
            "<?hh\nmodule A;\ntrait T1 { public function m(): void {} }\ntrait T2 { public function m(): void {} }\nclass C { use T1; use T2; }\n",
        )]);

        let flattening = fixture.flatten();
        let record = flattening
            .origins(fixture.id("C"))
            .and_then(|map| map.get(MemberKind::Method, "m"))
            .expect("m is inherited");

        assert_eq!(record.source, fixture.id("T2"));
        assert_eq!(flattening.diagnostics.len(), 1);
        assert_eq!(flattening.diagnostics[0].kind, DiagnosticKind::TraitMethodCollision);
        assert_eq!(flattening.diagnostics[0].severity, Severity::Info);
    }

    #[test]
    fn collision_narrowing_to_internal_is_a_warning() {
        let fixture = Fixture::new(&[(
            "a.php",
            "<?hh\nmodule A;\ntrait T1 { public function m(): void {} }\ntrait T2 { internal function m(): void {} }\nclass C { use T1, T2; }\n",
        )]);

        let flattening = fixture.flatten();

        assert_eq!(flattening.diagnostics.len(), 1);
        assert_eq!(flattening.diagnostics[0].severity, Severity::Warning);
        assert!(flattening.diagnostics[0].message.contains("becomes internal"));
    }

    #[test]
    fn module_level_traits_disagreeing_on_origin_collide() {
        let fixture = Fixture::new(&[
            ("a.php", "<?hh\nmodule A;\n<<__ModuleLevelTrait>>\ntrait T1 { public function m(): void {} }\n"),
            ("b.php", "<?hh\nmodule B;\n<<__ModuleLevelTrait>>\ntrait T2 { public function m(): void {} }\n"),
            ("c.php", "<?hh\nmodule C;\nclass K { use T1; use T2; }\n"),
        ]);

        let flattening = fixture.flatten();
        let record = flattening
            .origins(fixture.id("K"))
            .and_then(|map| map.get(MemberKind::Method, "m"))
            .expect("m is inherited");

        assert_eq!(record.module, fixture.module("B"));
        assert_eq!(flattening.diagnostics.len(), 1);
        assert!(flattening.diagnostics[0].message.contains("from `A` to `B`"));
    }

    #[test]
    fn diamond_composition_is_not_a_collision() {
        let fixture = Fixture::new(&[(
            "a.php",
            "<?hh\nmodule A;\ntrait Base { public function m(): void {} }\ntrait L { use Base; }\ntrait R { use Base; }\nclass C { use L; use R; }\n",
        )]);

        let flattening = fixture.flatten();

        assert!(flattening.diagnostics.is_empty());
        let record = flattening
            .origins(fixture.id("C"))
            .and_then(|map| map.get(MemberKind::Method, "m"))
            .expect("m is inherited");
        assert_eq!(record.source, fixture.id("Base"));
    }

    #[test]
    fn class_members_shadow_trait_members() {
        let fixture = Fixture::new(&[(
            "a.php",
            "<?hh\nmodule A;\ntrait T { public function m(): void {} public function n(): void {} }\nclass C { use T; public function m(): void {} }\n",
        )]);

        let flattening = fixture.flatten();
        let map = flattening.origins(fixture.id("C")).expect("class flattened");

        assert!(map.get(MemberKind::Method, "m").is_none());
        assert!(map.get(MemberKind::Method, "n").is_some());
        assert!(flattening.diagnostics.is_empty());
    }

    #[test]
    fn nested_ordinary_trait_is_pinned_by_module_level_trait() {
        let fixture = Fixture::new(&[
            ("inner.php", "<?hh\nmodule inner;\ntrait Helper { internal function assist(): void {} }\n"),
            ("outer.php", "<?hh\nmodule outer;\n<<__ModuleLevelTrait>>\ntrait Outer { use Helper; }\n"),
            ("user.php", "<?hh\nmodule user;\nclass C { use Outer; }\n"),
        ]);

        let flattening = fixture.flatten();
        let record = flattening
            .origins(fixture.id("C"))
            .and_then(|map| map.get(MemberKind::Method, "assist"))
            .expect("assist is inherited");

        assert_eq!(record.module, fixture.module("outer"));
        assert_eq!(record.source, fixture.id("Helper"));
        assert_eq!(record.via, fixture.id("Outer"));
    }

    #[test]
    fn nested_module_level_trait_keeps_its_own_module() {
        let fixture = Fixture::new(&[
            ("inner.php", "<?hh\nmodule inner;\n<<__ModuleLevelTrait>>\ntrait Helper { internal function assist(): void {} }\n"),
            ("outer.php", "<?hh\nmodule outer;\ntrait Wrapper { use Helper; }\n"),
            ("user.php", "<?hh\nmodule user;\nclass C { use Wrapper; }\n"),
        ]);

        let flattening = fixture.flatten();
        let record = flattening
            .origins(fixture.id("C"))
            .and_then(|map| map.get(MemberKind::Method, "assist"))
            .expect("assist is inherited");

        assert_eq!(record.module, fixture.module("inner"));
    }

    #[test]
    fn unknown_and_non_trait_uses_are_reported() {
        let fixture = Fixture::new(&[(
            "a.php",
            "<?hh\nmodule A;\nclass Base {}\nclass C { use Missing; use Base; }\n",
        )]);

        let flattening = fixture.flatten();
        let kinds: Vec<DiagnosticKind> = flattening.diagnostics.iter().map(|d| d.kind).collect();

        assert_eq!(kinds, vec![DiagnosticKind::UnknownTrait, DiagnosticKind::NotATrait]);
        assert!(flattening.origins(fixture.id("C")).is_some_and(OriginMap::is_empty));
    }

    #[test]
    fn two_trait_cycle_is_rejected_once() {
        let fixture = Fixture::new(&[(
            "a.php",
            "<?hh\nmodule A;\ntrait T2 { use T1; internal function b(): void {} }\ntrait T1 { use T2; internal function a(): void {} }\nclass C { use T1; }\n",
        )]);

        let flattening = fixture.flatten();
        let cycles: Vec<&Diagnostic> = flattening
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::CyclicTraitComposition)
            .collect();

        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].message, "trait composition cycle: T1 -> T2 -> T1");
        assert_eq!(flattening.cyclic_traits(), &[fixture.id("T2"), fixture.id("T1")]);

        let map = flattening.origins(fixture.id("C")).expect("class flattened");
        let a = map.get(MemberKind::Method, "a").expect("a is inherited");
        assert!(a.degraded);
        assert_eq!(a.effective_visibility(), Visibility::Public);
    }

    #[test]
    fn cycle_message_does_not_depend_on_unit_order() {
        let forward = Fixture::new(&[
            ("one.php", "<?hh\ntrait T1 { use T2; }\n"),
            ("two.php", "<?hh\ntrait T2 { use T1; }\n"),
        ]);
        let backward = Fixture::new(&[
            ("two.php", "<?hh\ntrait T2 { use T1; }\n"),
            ("one.php", "<?hh\ntrait T1 { use T2; }\n"),
        ]);

        let a = forward.flatten();
        let b = backward.flatten();

        assert_eq!(a.diagnostics.len(), 1);
        assert_eq!(b.diagnostics.len(), 1);
        assert_eq!(a.diagnostics[0].message, b.diagnostics[0].message);
        assert_eq!(a.diagnostics[0].file, "one.php");
        assert_eq!(b.diagnostics[0].file, "one.php");
    }

    #[test]
    fn self_use_is_a_cycle() {
        let fixture = Fixture::new(&[("a.php", "<?hh\ntrait Loop { use Loop; }\n")]);

        let flattening = fixture.flatten();

        assert_eq!(flattening.diagnostics.len(), 1);
        assert_eq!(flattening.diagnostics[0].message, "trait composition cycle: Loop -> Loop");
    }

    #[test]
    fn flattening_twice_is_identical() {
        let fixture = Fixture::new(&[
            ("a.php", "<?hh\nmodule A;\n<<__ModuleLevelTrait>>\ntrait T { public function getFoo(): void {} const X = 1; }\ntrait U { use T; internal function other(): void {} }\n"),
            ("b.php", "<?hh\nmodule B;\nclass C { use U; }\nclass D { use T; use U; }\n"),
        ]);

        let first = fixture.flatten();
        let second = fixture.flatten();

        for class in ["C", "D"] {
            assert_eq!(first.origins(fixture.id(class)), second.origins(fixture.id(class)));
        }
        assert_eq!(first.diagnostics, second.diagnostics);
    }

    #[test]
    fn sequential_and_parallel_agree() {
        let fixture = Fixture::new(&[(
            "a.php",
            "<?hh\nmodule A;\ntrait T0 { public function m(): void {} }\ntrait T1 { use T0; }\ntrait T2 { use T1; internal function m(): void {} }\nclass C { use T0; use T2; }\n",
        )]);

        let parallel = fixture.flatten();
        let sequential = TraitFlattener::new(&fixture.symbols, &fixture.modules, &fixture.sources)
            .parallel(false)
            .flatten();

        assert_eq!(parallel.origins(fixture.id("C")), sequential.origins(fixture.id("C")));
        assert_eq!(parallel.diagnostics, sequential.diagnostics);
    }
}
