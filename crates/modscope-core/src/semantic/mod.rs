//! Semantic analysis module
//!
//! Provides the module graph, the whole-program symbol table, trait
//! flattening with origin records, and visibility checking.

pub mod collector;
pub mod modules;
pub mod symbols;
pub mod traits;
pub mod visibility;

pub use collector::{Collected, Collector};
pub use modules::{GLOBAL_MODULE_NAME, Module, ModuleError, ModuleGraph, ModuleId};
pub use symbols::{Symbol, SymbolError, SymbolId, SymbolKind, SymbolPayload, SymbolTable};
pub use traits::{
    FlatMember, Flattening, MemberKey, Origin, OriginMap, OriginRecord, TraitFlattener,
    TraitMembers,
};
pub use visibility::{
    CheckOutput, ResolvedMember, UnresolvedReference, VisibilityChecker, effective_visibility,
    resolve_member,
};
