//! Module graph: the nominal set of modules declared by a program
//!
//! Modules have no hierarchy and no imports. A unit joins a module with a
//! `module X;` directive; every declaration after the directive belongs to
//! it. Everything else lives in the sentinel global module, where `internal`
//! carries no meaning.

use std::collections::{HashMap, HashSet};

use id_arena::{Arena, Id};

pub type ModuleId = Id<Module>;

pub const GLOBAL_MODULE_NAME: &str = "<global>";

#[derive(Debug)]
pub struct Module {
    pub id: ModuleId,
    pub name: String,
    pub is_global: bool,
    /// Set when the module's name clashes with a non-module entity.
    pub is_unresolved: bool,
}

impl Module {
    /// Whether `internal` declarations in this module are enforced.
    pub fn scopes_internal(&self) -> bool {
        !self.is_global && !self.is_unresolved
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModuleError {
    #[error("module '{name}' conflicts with a non-module declaration of the same name")]
    RedeclarationConflict { name: String },
}

#[derive(Debug, Clone, Copy)]
struct UnitDirective {
    module: ModuleId,
    position: u32,
}

pub struct ModuleGraph {
    arena: Arena<Module>,
    by_name: HashMap<String, ModuleId>,
    entities: HashSet<String>,
    global: ModuleId,
    directives: HashMap<usize, UnitDirective>,
}

impl Default for ModuleGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleGraph {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let global = arena.alloc_with_id(|id| Module {
            id,
            name: GLOBAL_MODULE_NAME.to_string(),
            is_global: true,
            is_unresolved: false,
        });

        Self {
            arena,
            by_name: HashMap::new(),
            entities: HashSet::new(),
            global,
            directives: HashMap::new(),
        }
    }

    /// Declares `name`, returning the existing module when already declared.
    pub fn declare_module(&mut self, name: &str) -> Result<ModuleId, ModuleError> {
        if self.entities.contains(name) {
            if let Some(&id) = self.by_name.get(name) {
                self.arena[id].is_unresolved = true;
            }
            return Err(ModuleError::RedeclarationConflict {
                name: name.to_string(),
            });
        }

        if let Some(&id) = self.by_name.get(name) {
            return Ok(id);
        }

        let id = self.arena.alloc_with_id(|id| Module {
            id,
            name: name.to_string(),
            is_global: false,
            is_unresolved: false,
        });
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Records a non-module top-level name. Clashing with a module marks that
    /// module unresolved.
    pub fn register_entity(&mut self, name: &str) -> Result<(), ModuleError> {
        self.entities.insert(name.to_string());

        match self.by_name.get(name) {
            Some(&id) => {
                self.arena[id].is_unresolved = true;
                Err(ModuleError::RedeclarationConflict {
                    name: name.to_string(),
                })
            }
            None => Ok(()),
        }
    }

    /// Activates `module` for `unit` from byte `position` onwards.
    pub fn enter_module(&mut self, unit: usize, module: ModuleId, position: u32) {
        self.directives
            .insert(unit, UnitDirective { module, position });
    }

    pub fn current_module_at(&self, unit: usize, position: u32) -> ModuleId {
        match self.directives.get(&unit) {
            Some(directive) if position >= directive.position => directive.module,
            _ => self.global,
        }
    }

    pub fn global(&self) -> ModuleId {
        self.global
    }

    pub fn get(&self, id: ModuleId) -> &Module {
        &self.arena[id]
    }

    pub fn name(&self, id: ModuleId) -> &str {
        &self.arena[id].name
    }

    pub fn lookup(&self, name: &str) -> Option<ModuleId> {
        self.by_name.get(name).copied()
    }

    pub fn scopes_internal(&self, id: ModuleId) -> bool {
        self.arena[id].scopes_internal()
    }

    /// All modules in declaration order, the global sentinel first.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.arena.iter().map(|(_, m)| m)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.len() == 0
    }
}
