//! Declaration-level parser for Hack sources
//!
//! Produces a `CompilationUnit` holding module directives, top-level
//! declarations, trait uses, members and the reference sites found in bodies.
//! Anything the analysis does not look at (statements, expressions, types) is
//! skipped by brace matching. Errors are collected and parsing resumes at the
//! next top-level declaration.

mod lexer;
mod names;
mod references;

use tracing::trace;

use crate::ast::{
    ClassDecl, CompilationUnit, Declaration, DeclarationKind, FunctionDecl, Member, MemberKind,
    ModuleDirective, Reference, Span, TraitDecl, TraitUseClause, Visibility,
};
use crate::source::SourceFile;

pub use lexer::{Token, TokenKind, tokenize};
pub use names::{ResolvedName, qualify, resolve_class, resolve_function};
pub use references::scan_references;

/// Marks the start of a new unit inside a multi-file source: `//// name.php`.
pub const UNIT_SEPARATOR: &str = "////";

pub const MODULE_LEVEL_TRAIT_ATTRIBUTE: &str = "__ModuleLevelTrait";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

#[derive(Debug)]
pub struct ParsedUnit {
    pub file: SourceFile,
    pub unit: CompilationUnit,
    pub errors: Vec<ParseError>,
}

impl ParsedUnit {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Splits a source on `//// name` separator lines. Sources without a
/// separator are a single unit named `path`.
pub fn split_units(path: &str, source: &str) -> Vec<(String, String)> {
    let mut sections: Vec<(String, String)> = Vec::new();
    let mut preamble = String::new();

    for line in source.split_inclusive('\n') {
        let trimmed = line.trim_end();
        match trimmed.strip_prefix(UNIT_SEPARATOR) {
            Some(name) if !name.trim().is_empty() && !name.starts_with('/') => {
                sections.push((format!("{path}#{}", name.trim()), String::new()));
            }
            _ => match sections.last_mut() {
                Some((_, text)) => text.push_str(line),
                None => preamble.push_str(line),
            },
        }
    }

    if sections.is_empty() {
        return vec![(path.to_string(), source.to_string())];
    }
    if !preamble.trim().is_empty() {
        sections.insert(0, (path.to_string(), preamble));
    }
    sections
}

pub fn parse_unit(path: &str, source: &str) -> ParsedUnit {
    let (tokens, mut errors) = tokenize(source);
    let mut parser = Parser::new(path, &tokens);
    parser.parse();
    errors.append(&mut parser.errors);
    errors.sort_by_key(|e| e.span);

    trace!(
        path,
        declarations = parser.unit.declarations.len(),
        errors = errors.len(),
        "parsed unit"
    );

    ParsedUnit {
        file: SourceFile::new(path, source),
        unit: parser.unit,
        errors,
    }
}

/// Parses every file, splitting multi-file sources, in input order.
pub fn parse_program(files: &[(&str, &str)]) -> Vec<ParsedUnit> {
    files
        .iter()
        .flat_map(|(path, source)| split_units(path, source))
        .map(|(path, source)| parse_unit(&path, &source))
        .collect()
}

#[derive(Debug, Default)]
struct Modifiers {
    visibility: Option<Visibility>,
    module_level: bool,
}

impl Modifiers {
    fn visibility(&self) -> Visibility {
        self.visibility.unwrap_or_default()
    }
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    unit: CompilationUnit,
    errors: Vec<ParseError>,
    /// Current namespace, empty for the global one.
    namespace: String,
    /// Enclosing namespaces of open `namespace N { ... }` blocks.
    namespace_blocks: Vec<String>,
}

impl<'t> Parser<'t> {
    fn new(path: &str, tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            unit: CompilationUnit::new(path),
            errors: Vec::new(),
            namespace: String::new(),
            namespace_blocks: Vec::new(),
        }
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&'t Token> {
        self.tokens.get(self.pos + offset)
    }

    fn bump(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_punct(&self, c: char) -> bool {
        self.peek().is_some_and(|t| t.is_punct(c))
    }

    fn eof_span(&self) -> Span {
        self.tokens
            .last()
            .map(|t| Span::new(t.span.hi, t.span.hi))
            .unwrap_or_default()
    }

    fn current_span(&self) -> Span {
        self.peek().map(|t| t.span).unwrap_or_else(|| self.eof_span())
    }

    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.errors.push(ParseError::new(message, span));
    }

    fn expect_name(&mut self, what: &str) -> Option<(String, Span)> {
        match self.peek() {
            Some(token) => match token.ident() {
                Some(name) => {
                    self.pos += 1;
                    Some((name.to_string(), token.span))
                }
                None => {
                    self.error(format!("expected {what}"), token.span);
                    None
                }
            },
            None => {
                let span = self.eof_span();
                self.error(format!("expected {what}, found end of file"), span);
                None
            }
        }
    }

    /// Dotted module name, e.g. `foo.bar`.
    fn module_name(&mut self) -> Option<(String, Span)> {
        let (mut name, mut span) = self.expect_name("module name")?;
        while self.at_punct('.') {
            self.pos += 1;
            let (part, part_span) = self.expect_name("module name segment")?;
            name.push('.');
            name.push_str(&part);
            span = span.to(part_span);
        }
        Some((name, span))
    }

    fn parse(&mut self) {
        let mut modifiers = Modifiers::default();

        while let Some(token) = self.peek() {
            let start = self.pos;
            let ok = match &token.kind {
                TokenKind::Punct(';') => {
                    self.pos += 1;
                    true
                }
                TokenKind::Punct('}') if !self.namespace_blocks.is_empty() => {
                    self.namespace = self.namespace_blocks.pop().unwrap_or_default();
                    self.pos += 1;
                    true
                }
                TokenKind::AttrOpen => {
                    modifiers.module_level |= self.attributes();
                    continue;
                }
                TokenKind::Ident(word) => match word.as_str() {
                    "public" => {
                        self.pos += 1;
                        modifiers.visibility = Some(Visibility::Public);
                        continue;
                    }
                    "internal" => {
                        self.pos += 1;
                        modifiers.visibility = Some(Visibility::Internal);
                        continue;
                    }
                    "abstract" | "final" | "async" | "xhp" => {
                        self.pos += 1;
                        continue;
                    }
                    "module" => self.module_directive(),
                    "new" if self.peek_at(1).is_some_and(|t| t.is_ident("module")) => {
                        self.module_definition()
                    }
                    "namespace" => self.namespace(),
                    "use" | "require" | "require_once" | "include" | "include_once" => {
                        self.skip_statement()
                    }
                    "function" => self.function(&modifiers),
                    "class" | "interface" => self.class(&modifiers),
                    "trait" => self.trait_decl(&modifiers),
                    "const" => self.constant(&modifiers),
                    "enum" | "type" | "newtype" => self.skip_declaration(),
                    _ => {
                        self.error(format!("unexpected `{word}` at top level"), token.span);
                        false
                    }
                },
                _ => {
                    self.error("unexpected token at top level", token.span);
                    false
                }
            };

            modifiers = Modifiers::default();
            if !ok {
                self.recover(start);
            }
        }
    }

    /// Skips to the next token that can start a top-level declaration.
    fn recover(&mut self, start: usize) {
        if self.pos == start {
            self.pos += 1;
        }
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            if token.is_punct('{') {
                depth += 1;
            } else if token.is_punct('}') {
                depth = depth.saturating_sub(1);
            } else if depth == 0 && starts_declaration(token) {
                return;
            }
            self.pos += 1;
        }
    }

    /// Consumes `<<...>>`; returns whether `__ModuleLevelTrait` was present.
    fn attributes(&mut self) -> bool {
        self.pos += 1;
        let mut module_level = false;
        let mut depth = 0usize;
        while let Some(token) = self.bump() {
            match &token.kind {
                TokenKind::AttrClose if depth == 0 => return module_level,
                TokenKind::Punct('(') => depth += 1,
                TokenKind::Punct(')') => depth = depth.saturating_sub(1),
                TokenKind::Ident(name) if name == MODULE_LEVEL_TRAIT_ATTRIBUTE => {
                    module_level = true
                }
                _ => {}
            }
        }
        let span = self.eof_span();
        self.error("unterminated attribute list", span);
        module_level
    }

    fn module_directive(&mut self) -> bool {
        let keyword = self.current_span();
        self.pos += 1;
        let Some((name, span)) = self.module_name() else {
            return false;
        };
        if !self.at_punct(';') {
            let span = self.current_span();
            self.error("expected `;` after module declaration", span);
            return false;
        }
        self.pos += 1;

        if let Some(existing) = &self.unit.module {
            let message = format!(
                "a file can only belong to one module; it already declares module `{}`",
                existing.name
            );
            self.error(message, keyword.to(span));
            return true;
        }
        self.unit.module = Some(ModuleDirective { name, span });
        true
    }

    fn module_definition(&mut self) -> bool {
        self.pos += 2;
        let Some((name, span)) = self.module_name() else {
            return false;
        };
        if !self.at_punct('{') {
            let span = self.current_span();
            self.error("expected `{` after module name", span);
            return false;
        }
        if self.skip_block().is_none() {
            return false;
        }
        self.unit
            .module_definitions
            .push(ModuleDirective { name, span });
        true
    }

    /// `namespace N;` switches the namespace for the rest of the file;
    /// `namespace N { ... }` and `namespace { ... }` scope it to the block.
    fn namespace(&mut self) -> bool {
        self.pos += 1;
        let name = match self.peek().and_then(Token::ident) {
            Some(name) => {
                self.pos += 1;
                name.trim_start_matches('\\').to_string()
            }
            None => String::new(),
        };
        match self.bump() {
            Some(token) if token.is_punct(';') => {
                self.namespace = name;
                true
            }
            Some(token) if token.is_punct('{') => {
                let outer = std::mem::replace(&mut self.namespace, name);
                self.namespace_blocks.push(outer);
                true
            }
            Some(token) => {
                self.error("expected `;` or `{` after namespace name", token.span);
                false
            }
            None => {
                let span = self.eof_span();
                self.error("unexpected end of file in namespace declaration", span);
                false
            }
        }
    }

    fn skip_statement(&mut self) -> bool {
        while let Some(token) = self.bump() {
            if token.is_punct(';') {
                return true;
            }
            if token.is_punct('{') {
                self.pos -= 1;
                return self.skip_block().is_some();
            }
        }
        true
    }

    fn skip_declaration(&mut self) -> bool {
        while let Some(token) = self.peek() {
            if token.is_punct(';') {
                self.pos += 1;
                return true;
            }
            if token.is_punct('{') {
                return self.skip_block().is_some();
            }
            self.pos += 1;
        }
        true
    }

    /// Skips a `{ ... }` block at the current position. Returns the index
    /// range of the tokens inside the braces.
    fn skip_block(&mut self) -> Option<(usize, usize)> {
        let open = self.pos;
        let mut depth = 0usize;
        while let Some(token) = self.bump() {
            if token.is_punct('{') {
                depth += 1;
            } else if token.is_punct('}') {
                depth -= 1;
                if depth == 0 {
                    return Some((open + 1, self.pos - 1));
                }
            }
        }
        let span = self.tokens[open].span;
        self.error("unclosed `{`", span);
        None
    }

    /// Skips a signature up to its body or terminating `;`.
    /// Returns the body's token range; `Some(None)` for a body-less declaration.
    fn signature_then_body(&mut self) -> Option<Option<(usize, usize)>> {
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            match &token.kind {
                TokenKind::Punct('(') | TokenKind::Punct('[') => depth += 1,
                TokenKind::Punct(')') | TokenKind::Punct(']') => depth = depth.saturating_sub(1),
                TokenKind::Punct(';') if depth == 0 => {
                    self.pos += 1;
                    return Some(None);
                }
                TokenKind::Punct('{') if depth == 0 => return self.skip_block().map(Some),
                TokenKind::Punct('}') if depth == 0 => {
                    self.error("expected a body or `;`", token.span);
                    return None;
                }
                _ => {}
            }
            self.pos += 1;
        }
        let span = self.eof_span();
        self.error("unexpected end of file in declaration", span);
        None
    }

    fn references_in(&self, range: Option<(usize, usize)>) -> Vec<Reference> {
        match range {
            Some((lo, hi)) => scan_references(&self.tokens[lo..hi], &self.namespace),
            None => Vec::new(),
        }
    }

    fn function(&mut self, modifiers: &Modifiers) -> bool {
        self.pos += 1;
        let Some((name, span)) = self.expect_name("function name") else {
            return false;
        };
        let Some(body) = self.signature_then_body() else {
            return false;
        };
        let body = self.references_in(body);
        self.unit.declarations.push(Declaration {
            name: qualify(&self.namespace, &name),
            visibility: modifiers.visibility(),
            span,
            kind: DeclarationKind::Function(FunctionDecl { body }),
        });
        true
    }

    fn constant(&mut self, modifiers: &Modifiers) -> bool {
        self.pos += 1;
        let start = self.pos;
        while let Some(token) = self.peek() {
            if token.is_punct(';') {
                break;
            }
            self.pos += 1;
        }
        let end = self.pos;
        if self.bump().is_none() {
            let span = self.eof_span();
            self.error("expected `;` after constant", span);
            return false;
        }

        for (name, span) in constant_names(&self.tokens[start..end]) {
            self.unit.declarations.push(Declaration {
                name: qualify(&self.namespace, &name),
                visibility: modifiers.visibility(),
                span,
                kind: DeclarationKind::Constant,
            });
        }
        true
    }

    fn class(&mut self, modifiers: &Modifiers) -> bool {
        self.pos += 1;
        let Some((name, span)) = self.expect_name("class name") else {
            return false;
        };
        let Some((uses, members)) = self.class_body() else {
            return false;
        };
        self.unit.declarations.push(Declaration {
            name: qualify(&self.namespace, &name),
            visibility: modifiers.visibility(),
            span,
            kind: DeclarationKind::Class(ClassDecl { uses, members }),
        });
        true
    }

    fn trait_decl(&mut self, modifiers: &Modifiers) -> bool {
        self.pos += 1;
        let Some((name, span)) = self.expect_name("trait name") else {
            return false;
        };
        let Some((uses, members)) = self.class_body() else {
            return false;
        };
        self.unit.declarations.push(Declaration {
            name: qualify(&self.namespace, &name),
            visibility: modifiers.visibility(),
            span,
            kind: DeclarationKind::Trait(TraitDecl {
                is_module_level: modifiers.module_level,
                uses,
                members,
            }),
        });
        true
    }

    fn class_body(&mut self) -> Option<(Vec<TraitUseClause>, Vec<Member>)> {
        while let Some(token) = self.peek() {
            if token.is_punct('{') {
                break;
            }
            if token.is_punct(';') || token.is_punct('}') {
                self.error("expected `{` to open the body", token.span);
                return None;
            }
            self.pos += 1;
        }
        let Some(open) = self.bump() else {
            let span = self.eof_span();
            self.error("expected `{` to open the body, found end of file", span);
            return None;
        };

        let mut uses = Vec::new();
        let mut members = Vec::new();
        let mut visibility = None;

        loop {
            let Some(token) = self.peek() else {
                self.error("unclosed `{`", open.span);
                return None;
            };
            match &token.kind {
                TokenKind::Punct('}') => {
                    self.pos += 1;
                    return Some((uses, members));
                }
                TokenKind::Punct(';') => self.pos += 1,
                TokenKind::AttrOpen => {
                    self.attributes();
                }
                TokenKind::Ident(word) => match word.as_str() {
                    "public" | "private" | "protected" => {
                        self.pos += 1;
                        visibility = Some(Visibility::Public);
                    }
                    "internal" => {
                        self.pos += 1;
                        visibility = Some(Visibility::Internal);
                    }
                    "static" | "abstract" | "final" | "async" | "readonly" | "var" => {
                        self.pos += 1;
                    }
                    "use" => {
                        self.pos += 1;
                        self.trait_uses(&mut uses)?;
                        visibility = None;
                    }
                    "function" => {
                        self.pos += 1;
                        let member = self.method(visibility.take().unwrap_or_default())?;
                        members.push(member);
                    }
                    "const" => {
                        self.pos += 1;
                        let vis = visibility.take().unwrap_or_default();
                        self.class_constants(vis, &mut members)?;
                    }
                    "require" | "case" | "attribute" | "children" | "category" => {
                        self.member_statement()?;
                        visibility = None;
                    }
                    _ => {
                        let vis = visibility.take().unwrap_or_default();
                        self.properties(vis, &mut members)?;
                    }
                },
                _ => {
                    let vis = visibility.take().unwrap_or_default();
                    self.properties(vis, &mut members)?;
                }
            }
        }
    }

    fn trait_uses(&mut self, uses: &mut Vec<TraitUseClause>) -> Option<()> {
        loop {
            let (name, span) = self.expect_name("trait name")?;
            uses.push(TraitUseClause {
                name: resolve_class(&self.namespace, &name),
                span,
            });

            // Generic arguments, e.g. `use T<int>;`
            if self.at_punct('<') {
                let mut depth = 0usize;
                while let Some(token) = self.bump() {
                    if token.is_punct('<') {
                        depth += 1;
                    } else if token.is_punct('>') {
                        depth = depth.saturating_sub(1);
                    } else if token.kind == TokenKind::AttrClose {
                        depth = depth.saturating_sub(2);
                    }
                    if depth == 0 {
                        break;
                    }
                }
            }

            match self.peek() {
                Some(token) if token.is_punct(',') => self.pos += 1,
                Some(token) if token.is_punct(';') => {
                    self.pos += 1;
                    return Some(());
                }
                Some(token) if token.is_punct('{') => {
                    self.skip_block()?;
                    return Some(());
                }
                Some(token) => {
                    self.error("expected `,`, `;` or `{` after trait name", token.span);
                    return None;
                }
                None => {
                    let span = self.eof_span();
                    self.error("unexpected end of file in `use` clause", span);
                    return None;
                }
            }
        }
    }

    fn method(&mut self, visibility: Visibility) -> Option<Member> {
        let (name, span) = self.expect_name("method name")?;
        let body = self.signature_then_body()?;
        Some(Member {
            name,
            kind: MemberKind::Method,
            visibility,
            span,
            body: self.references_in(body),
        })
    }

    fn class_constants(&mut self, visibility: Visibility, members: &mut Vec<Member>) -> Option<()> {
        let (start, end) = self.member_statement()?;
        let tokens = &self.tokens[start..end];
        if tokens.first().is_some_and(|t| t.is_ident("type")) {
            return Some(());
        }
        for (name, span) in constant_names(tokens) {
            members.push(Member {
                name,
                kind: MemberKind::Constant,
                visibility,
                span,
                body: scan_initializer(tokens, span, &self.namespace),
            });
        }
        Some(())
    }

    fn properties(&mut self, visibility: Visibility, members: &mut Vec<Member>) -> Option<()> {
        let (start, end) = self.member_statement()?;
        let tokens = &self.tokens[start..end];
        let mut found = false;
        for (index, token) in tokens.iter().enumerate() {
            let TokenKind::Variable(name) = &token.kind else {
                continue;
            };
            let declares = tokens
                .get(index + 1)
                .is_none_or(|next| next.is_punct('=') || next.is_punct(','));
            let after_initializer_start = tokens[..index].iter().any(|t| t.is_punct('='));
            if declares && (!after_initializer_start || previous_is_comma(tokens, index)) {
                found = true;
                members.push(Member {
                    name: name.clone(),
                    kind: MemberKind::Property,
                    visibility,
                    span: token.span,
                    body: scan_initializer(tokens, token.span, &self.namespace),
                });
            }
        }
        if !found {
            let span = tokens
                .first()
                .map(|t| t.span)
                .unwrap_or_else(|| self.current_span());
            self.error("expected a member declaration", span);
        }
        Some(())
    }

    /// Consumes a member statement up to its `;`; returns the token range
    /// before the `;`.
    fn member_statement(&mut self) -> Option<(usize, usize)> {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            match &token.kind {
                TokenKind::Punct('(') | TokenKind::Punct('[') | TokenKind::Punct('{') => {
                    depth += 1
                }
                TokenKind::Punct(')') | TokenKind::Punct(']') => depth = depth.saturating_sub(1),
                TokenKind::Punct('}') if depth == 0 => {
                    self.error("expected `;`", token.span);
                    return None;
                }
                TokenKind::Punct('}') => depth -= 1,
                TokenKind::Punct(';') if depth == 0 => {
                    let end = self.pos;
                    self.pos += 1;
                    return Some((start, end));
                }
                _ => {}
            }
            self.pos += 1;
        }
        let span = self.eof_span();
        self.error("unexpected end of file in class body", span);
        None
    }
}

fn starts_declaration(token: &Token) -> bool {
    match &token.kind {
        TokenKind::AttrOpen => true,
        TokenKind::Ident(word) => matches!(
            word.as_str(),
            "function"
                | "class"
                | "interface"
                | "trait"
                | "const"
                | "module"
                | "abstract"
                | "final"
                | "internal"
                | "public"
                | "namespace"
        ),
        _ => false,
    }
}

fn previous_is_comma(tokens: &[Token], index: usize) -> bool {
    index > 0 && tokens[index - 1].is_punct(',')
}

/// Names declared by `const [type] A = ..., B = ...`: each identifier
/// directly followed by `=` at nesting depth zero, or the last identifier of
/// an abstract declaration without an initializer.
fn constant_names(tokens: &[Token]) -> Vec<(String, Span)> {
    let mut names = Vec::new();
    let mut depth = 0usize;
    for (index, token) in tokens.iter().enumerate() {
        match &token.kind {
            TokenKind::Punct('(') | TokenKind::Punct('[') | TokenKind::Punct('{') => depth += 1,
            TokenKind::Punct(')') | TokenKind::Punct(']') | TokenKind::Punct('}') => {
                depth = depth.saturating_sub(1)
            }
            TokenKind::Ident(name) if depth == 0 => {
                if tokens.get(index + 1).is_some_and(|next| next.is_punct('=')) {
                    names.push((name.clone(), token.span));
                }
            }
            _ => {}
        }
    }
    if names.is_empty() {
        if let Some(last) = tokens.iter().rev().find_map(|t| t.ident().map(|n| (n, t.span))) {
            names.push((last.0.to_string(), last.1));
        }
    }
    names
}

/// References inside the initializer that follows a declared name.
fn scan_initializer(tokens: &[Token], name: Span, namespace: &str) -> Vec<Reference> {
    let Some(start) = tokens.iter().position(|t| t.span == name) else {
        return Vec::new();
    };
    let rest = &tokens[start + 1..];
    if !rest.first().is_some_and(|t| t.is_punct('=')) {
        return Vec::new();
    }
    let mut depth = 0usize;
    let mut end = rest.len();
    for (index, token) in rest.iter().enumerate().skip(1) {
        match &token.kind {
            TokenKind::Punct('(') | TokenKind::Punct('[') => depth += 1,
            TokenKind::Punct(')') | TokenKind::Punct(']') => depth = depth.saturating_sub(1),
            TokenKind::Punct(',') if depth == 0 => {
                end = index;
                break;
            }
            _ => {}
        }
    }
    scan_references(&rest[1..end], namespace)
}
