//! Symbol table for top-level declarations
//!
//! A flat, whole-program mapping from qualified name to declaration record.
//! It is filled during the collection pass and only read afterwards.

use std::collections::HashMap;

use id_arena::{Arena, Id};
use serde::Serialize;

use super::modules::ModuleId;
use crate::ast::{Member, MemberKind, Reference, Span, TraitUseClause, Visibility};

pub type SymbolId = Id<Symbol>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Class,
    Trait,
    Constant,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Trait => "trait",
            SymbolKind::Constant => "constant",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolPayload {
    Function {
        body: Vec<Reference>,
    },
    Class {
        uses: Vec<TraitUseClause>,
        members: Vec<Member>,
    },
    Trait {
        is_module_level: bool,
        uses: Vec<TraitUseClause>,
        members: Vec<Member>,
    },
    Constant,
}

impl SymbolPayload {
    pub fn kind(&self) -> SymbolKind {
        match self {
            SymbolPayload::Function { .. } => SymbolKind::Function,
            SymbolPayload::Class { .. } => SymbolKind::Class,
            SymbolPayload::Trait { .. } => SymbolKind::Trait,
            SymbolPayload::Constant => SymbolKind::Constant,
        }
    }
}

#[derive(Debug)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    pub module: ModuleId,
    pub visibility: Visibility,
    pub unit: usize,
    pub span: Span,
    pub payload: SymbolPayload,
    /// Set by structural errors; unresolved symbols are treated as public.
    pub is_unresolved: bool,
}

impl Symbol {
    pub fn uses(&self) -> &[TraitUseClause] {
        match &self.payload {
            SymbolPayload::Class { uses, .. } | SymbolPayload::Trait { uses, .. } => uses,
            _ => &[],
        }
    }

    pub fn members(&self) -> &[Member] {
        match &self.payload {
            SymbolPayload::Class { members, .. } | SymbolPayload::Trait { members, .. } => members,
            _ => &[],
        }
    }

    pub fn member(&self, kind: MemberKind, name: &str) -> Option<(usize, &Member)> {
        self.members()
            .iter()
            .enumerate()
            .find(|(_, m)| m.kind == kind && m.name == name)
    }

    pub fn is_module_level_trait(&self) -> bool {
        matches!(
            self.payload,
            SymbolPayload::Trait {
                is_module_level: true,
                ..
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbolError {
    #[error("'{name}' is already declared")]
    DuplicateSymbol { name: String, existing: SymbolId },
}

pub struct SymbolTable {
    arena: Arena<Symbol>,
    by_name: HashMap<String, SymbolId>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn declare(
        &mut self,
        name: &str,
        module: ModuleId,
        visibility: Visibility,
        payload: SymbolPayload,
        unit: usize,
        span: Span,
    ) -> Result<SymbolId, SymbolError> {
        if let Some(&existing) = self.by_name.get(name) {
            return Err(SymbolError::DuplicateSymbol {
                name: name.to_string(),
                existing,
            });
        }

        let id = self.arena.alloc_with_id(|id| Symbol {
            id,
            name: name.to_string(),
            kind: payload.kind(),
            module,
            visibility,
            unit,
            span,
            payload,
            is_unresolved: false,
        });
        self.by_name.insert(name.to_string(), id);

        Ok(id)
    }

    pub fn mark_unresolved(&mut self, id: SymbolId) {
        self.arena[id].is_unresolved = true;
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.by_name.get(name).map(|&id| &self.arena[id])
    }

    pub fn lookup_id(&self, name: &str) -> Option<SymbolId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.arena[id]
    }

    /// All symbols in declaration order.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.arena.iter().map(|(_, s)| s)
    }

    pub fn of_kind(&self, kind: SymbolKind) -> impl Iterator<Item = &Symbol> {
        self.symbols().filter(move |s| s.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.len() == 0
    }
}
