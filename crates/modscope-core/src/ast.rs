//! Declaration-level syntax tree consumed by the semantic passes
//!
//! A `CompilationUnit` is the boundary between a front-end and the analysis:
//! it carries only what module and visibility checking needs (declarations,
//! trait uses, members and the reference sites found in bodies).

use serde::Serialize;

/// Byte range inside a unit's source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct Span {
    pub lo: u32,
    pub hi: u32,
}

impl Span {
    pub fn new(lo: u32, hi: u32) -> Self {
        Self { lo, hi }
    }

    pub fn to(self, other: Span) -> Span {
        Span::new(self.lo.min(other.lo), self.hi.max(other.hi))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Internal,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompilationUnit {
    pub path: String,
    /// The `module X;` directive, if any. It governs every declaration after it.
    pub module: Option<ModuleDirective>,
    /// `new module X {}` definitions found in this unit.
    pub module_definitions: Vec<ModuleDirective>,
    pub declarations: Vec<Declaration>,
}

impl CompilationUnit {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDirective {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub visibility: Visibility,
    pub span: Span,
    pub kind: DeclarationKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeclarationKind {
    Function(FunctionDecl),
    Class(ClassDecl),
    Trait(TraitDecl),
    Constant,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionDecl {
    pub body: Vec<Reference>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassDecl {
    pub uses: Vec<TraitUseClause>,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraitDecl {
    pub is_module_level: bool,
    pub uses: Vec<TraitUseClause>,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitUseClause {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    Method,
    Constant,
    Property,
}

impl MemberKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberKind::Method => "method",
            MemberKind::Constant => "constant",
            MemberKind::Property => "property",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub name: String,
    pub kind: MemberKind,
    pub visibility: Visibility,
    pub span: Span,
    pub body: Vec<Reference>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassRef {
    Named(String),
    /// `self`, `static` or `$this`: the class the executing member is reached through.
    Current,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceKind {
    /// `name` is namespace-qualified; `fallback` is the global name tried
    /// when `name` is not declared.
    FunctionCall {
        name: String,
        fallback: Option<String>,
    },
    ConstantAccess {
        name: String,
        fallback: Option<String>,
    },
    New {
        class: ClassRef,
    },
    MemberAccess {
        class: ClassRef,
        member: String,
        kind: MemberKind,
        is_static: bool,
    },
}
