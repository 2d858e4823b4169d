//! Reference-site extraction from function and member bodies
//!
//! Bodies are not parsed into statements. The scanner walks the token slice
//! and recognizes the access forms the visibility checker resolves: calls,
//! constants, `new`, instance access through `$this` or a parenthesized
//! `new`, and `::` access.

use crate::ast::{ClassRef, MemberKind, Reference, ReferenceKind, Span};

use super::lexer::{Token, TokenKind};
use super::names::{ResolvedName, resolve_class, resolve_function};

const KEYWORDS: &[&str] = &[
    "abstract", "array", "arraykey", "as", "async", "await", "bool", "break", "case", "catch",
    "class", "clone", "concurrent", "const", "continue", "default", "dict", "die", "do", "dynamic",
    "echo", "else", "elseif", "empty", "enum", "eval", "exit", "false", "final", "finally",
    "float", "for", "foreach", "function", "if", "include", "include_once", "inout", "instanceof",
    "int", "interface", "internal", "is", "isset", "keyset", "let", "list", "match", "mixed",
    "namespace", "new", "newtype", "noreturn", "nonnull", "nothing", "null", "num", "parent",
    "print", "private", "protected", "public", "readonly", "require", "require_once", "return",
    "self", "shape", "static", "string", "switch", "this", "throw", "trait", "true", "try",
    "tuple", "type", "unset", "use", "using", "var", "vec", "void", "where", "while", "yield",
];

pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name) || KEYWORDS.contains(&name.to_ascii_lowercase().as_str())
}

pub struct ReferenceScanner<'t> {
    tokens: &'t [Token],
    namespace: &'t str,
    references: Vec<Reference>,
}

impl<'t> ReferenceScanner<'t> {
    pub fn new(tokens: &'t [Token], namespace: &'t str) -> Self {
        Self {
            tokens,
            namespace,
            references: Vec::new(),
        }
    }

    pub fn scan(mut self) -> Vec<Reference> {
        let tokens = self.tokens;
        for (index, token) in tokens.iter().enumerate() {
            match &token.kind {
                TokenKind::Ident(name) => self.ident(index, name),
                TokenKind::Variable(name) if name == "this" => self.this_access(index),
                _ => {}
            }
        }
        self.references
    }

    fn at(&self, index: usize) -> Option<&'t Token> {
        self.tokens.get(index)
    }

    fn previous(&self, index: usize) -> Option<&'t Token> {
        index.checked_sub(1).and_then(|i| self.tokens.get(i))
    }

    fn ident(&mut self, index: usize, name: &str) {
        let tokens = self.tokens;
        let token = &tokens[index];
        let after = self.at(index + 1);
        let follows_access = self.previous(index).is_some_and(|prev| {
            matches!(prev.kind, TokenKind::Arrow | TokenKind::DoubleColon)
                || prev.is_ident("function")
                || prev.is_ident("new")
                || prev.is_ident("const")
        });
        if follows_access {
            return;
        }

        let lowered = name.to_ascii_lowercase();
        if lowered == "new" {
            self.new_expression(index);
            return;
        }
        if after.is_some_and(|t| t.kind == TokenKind::DoubleColon) {
            let class = match lowered.as_str() {
                "self" | "static" => Some(ClassRef::Current),
                "parent" => None,
                _ if is_keyword(name) => None,
                _ => Some(ClassRef::Named(resolve_class(self.namespace, name))),
            };
            if let Some(class) = class {
                self.static_access(index, class);
            }
            return;
        }
        if is_keyword(name) {
            return;
        }

        let ResolvedName { name, fallback } = resolve_function(self.namespace, name);
        let kind = if after.is_some_and(|t| t.is_punct('(')) {
            ReferenceKind::FunctionCall { name, fallback }
        } else if !self.is_type_position(index) {
            ReferenceKind::ConstantAccess { name, fallback }
        } else {
            return;
        };
        self.references.push(Reference {
            kind,
            span: token.span,
        });
    }

    /// Names that are clearly types rather than values: annotations after a
    /// `:` in a lambda signature, `as`/`is`/`instanceof` operands, generic
    /// types and arguments, and parameter types preceding a variable.
    fn is_type_position(&self, index: usize) -> bool {
        let parameter_type = self
            .at(index + 1)
            .is_some_and(|t| matches!(t.kind, TokenKind::Variable(_)));
        let operand_type = self.previous(index).is_some_and(|t| {
            t.is_ident("as") || t.is_ident("is") || t.is_ident("instanceof") || t.is_ident("catch")
        });
        let return_type = index >= 2
            && self.tokens[index - 1].is_punct(':')
            && self.tokens[index - 2].is_punct(')');
        parameter_type
            || operand_type
            || return_type
            || self.opens_generic(index)
            || self.in_generic_args(index)
    }

    /// `Name<` with no space before the `<` and a type after it.
    fn opens_generic(&self, index: usize) -> bool {
        let Some(open) = self.at(index + 1) else {
            return false;
        };
        open.is_punct('<')
            && self.tokens[index].span.hi == open.span.lo
            && self.at(index + 2).is_some_and(|t| t.ident().is_some())
    }

    /// Whether the name sits inside the `<...>` of a generic type. Walks back
    /// over type names and separators to an unmatched `<` glued to a name.
    fn in_generic_args(&self, index: usize) -> bool {
        let mut depth = 0usize;
        let mut cursor = index;
        while cursor > 0 {
            cursor -= 1;
            let token = &self.tokens[cursor];
            match &token.kind {
                TokenKind::Ident(_) | TokenKind::DoubleColon => {}
                TokenKind::Punct(',') | TokenKind::Punct('?') => {}
                TokenKind::Punct('>') => depth += 1,
                TokenKind::AttrClose => depth += 2,
                TokenKind::Punct('<') => {
                    let glued = cursor > 0 && {
                        let head = &self.tokens[cursor - 1];
                        head.ident().is_some() && head.span.hi == token.span.lo
                    };
                    if !glued {
                        return false;
                    }
                    if depth == 0 {
                        return true;
                    }
                    depth -= 1;
                }
                _ => return false,
            }
        }
        false
    }

    fn new_expression(&mut self, index: usize) {
        let Some(class_token) = self.at(index + 1) else {
            return;
        };
        let Some(class_name) = class_token.ident() else {
            return;
        };
        let class = match class_name.to_ascii_lowercase().as_str() {
            "self" | "static" => ClassRef::Current,
            "parent" | "class" => return,
            _ => ClassRef::Named(resolve_class(self.namespace, class_name)),
        };

        let new_span = self.tokens[index].span.to(class_token.span);
        self.references.push(Reference {
            kind: ReferenceKind::New {
                class: class.clone(),
            },
            span: new_span,
        });

        // `(new C(...))->member`
        let opened = self.previous(index).is_some_and(|t| t.is_punct('('));
        if !opened {
            return;
        }
        let mut cursor = index + 2;
        if self.at(cursor).is_some_and(|t| t.is_punct('(')) {
            match self.matching(cursor, '(', ')') {
                Some(close) => cursor = close + 1,
                None => return,
            }
        }
        let closes = self.at(cursor).is_some_and(|t| t.is_punct(')'));
        let arrow = self.at(cursor + 1).is_some_and(|t| t.kind == TokenKind::Arrow);
        if closes && arrow {
            self.instance_member(cursor + 2, class);
        }
    }

    fn this_access(&mut self, index: usize) {
        if self.at(index + 1).is_some_and(|t| t.kind == TokenKind::Arrow) {
            self.instance_member(index + 2, ClassRef::Current);
        }
    }

    fn instance_member(&mut self, index: usize, class: ClassRef) {
        let Some(member_token) = self.at(index) else {
            return;
        };
        let Some(member) = member_token.ident() else {
            return;
        };
        let kind = if self.at(index + 1).is_some_and(|t| t.is_punct('(')) {
            MemberKind::Method
        } else {
            MemberKind::Property
        };
        self.references.push(Reference {
            kind: ReferenceKind::MemberAccess {
                class,
                member: member.to_string(),
                kind,
                is_static: false,
            },
            span: member_token.span,
        });
    }

    fn static_access(&mut self, index: usize, class: ClassRef) {
        let Some(member_token) = self.at(index + 2) else {
            return;
        };
        let (member, kind) = match &member_token.kind {
            TokenKind::Variable(name) => (name.as_str(), MemberKind::Property),
            TokenKind::Ident(name) if name == "class" => return,
            TokenKind::Ident(name) => {
                let kind = if self.at(index + 3).is_some_and(|t| t.is_punct('(')) {
                    MemberKind::Method
                } else {
                    MemberKind::Constant
                };
                (name.as_str(), kind)
            }
            _ => return,
        };
        let span = Span::new(self.tokens[index].span.lo, member_token.span.hi);
        self.references.push(Reference {
            kind: ReferenceKind::MemberAccess {
                class,
                member: member.to_string(),
                kind,
                is_static: true,
            },
            span,
        });
    }

    fn matching(&self, open: usize, open_char: char, close_char: char) -> Option<usize> {
        let mut depth = 0usize;
        for (offset, token) in self.tokens[open..].iter().enumerate() {
            if token.is_punct(open_char) {
                depth += 1;
            } else if token.is_punct(close_char) {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
        }
        None
    }
}

/// References in `tokens`, with names resolved against `namespace`.
pub fn scan_references(tokens: &[Token], namespace: &str) -> Vec<Reference> {
    ReferenceScanner::new(tokens, namespace).scan()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lexer::tokenize;

    fn scan(source: &str) -> Vec<ReferenceKind> {
        scan_in("", source)
    }

    fn scan_in(namespace: &str, source: &str) -> Vec<ReferenceKind> {
        let (tokens, _) = tokenize(source);
        scan_references(&tokens, namespace)
            .into_iter()
            .map(|r| r.kind)
            .collect()
    }

    fn call(name: &str) -> ReferenceKind {
        ReferenceKind::FunctionCall {
            name: name.to_string(),
            fallback: None,
        }
    }

    fn constant(name: &str) -> ReferenceKind {
        ReferenceKind::ConstantAccess {
            name: name.to_string(),
            fallback: None,
        }
    }

    fn member(class: ClassRef, member: &str, kind: MemberKind, is_static: bool) -> ReferenceKind {
        ReferenceKind::MemberAccess {
            class,
            member: member.to_string(),
            kind,
            is_static,
        }
    }

    fn named(name: &str) -> ClassRef {
        ClassRef::Named(name.to_string())
    }

    #[test]
    fn function_calls_and_constants() {
        let refs = scan("foo(); $x = LIMIT + bar(1);");
        assert_eq!(
            refs,
            vec![call("foo"), constant("LIMIT"), call("bar")]
        );
    }

    #[test]
    fn keywords_are_not_references() {
        let refs = scan("if (true) { return null; } foreach ($xs as $x) { echo $x; }");
        assert!(refs.is_empty());
    }

    #[test]
    fn new_and_parenthesized_method_call() {
        let refs = scan("(new C())->getFoo();");
        assert_eq!(
            refs,
            vec![
                ReferenceKind::New { class: named("C") },
                member(named("C"), "getFoo", MemberKind::Method, false),
            ]
        );
    }

    #[test]
    fn new_with_arguments_then_property() {
        let refs = scan("$v = (new C(f(), 2))->prop;");
        assert_eq!(
            refs,
            vec![
                ReferenceKind::New { class: named("C") },
                member(named("C"), "prop", MemberKind::Property, false),
                call("f"),
            ]
        );
    }

    #[test]
    fn this_member_access() {
        let refs = scan("$this->helper(); $this->count;");
        assert_eq!(
            refs,
            vec![
                member(ClassRef::Current, "helper", MemberKind::Method, false),
                member(ClassRef::Current, "count", MemberKind::Property, false),
            ]
        );
    }

    #[test]
    fn static_access_forms() {
        let refs = scan("C::make(); C::LIMIT; self::$cache; static::build(); C::class; parent::f();");
        assert_eq!(
            refs,
            vec![
                member(named("C"), "make", MemberKind::Method, true),
                member(named("C"), "LIMIT", MemberKind::Constant, true),
                member(ClassRef::Current, "cache", MemberKind::Property, true),
                member(ClassRef::Current, "build", MemberKind::Method, true),
            ]
        );
    }

    #[test]
    fn static_span_covers_class_and_member() {
        let (tokens, _) = tokenize("  C::m()");
        let refs = scan_references(&tokens, "");
        assert_eq!(refs[0].span, Span::new(2, 6));
    }

    #[test]
    fn types_are_not_constants() {
        let refs = scan("$f = (Foo $x): Bar ==> $x; $y = $z as Baz; vec<Qux>[];");
        assert!(refs.is_empty(), "unexpected references: {refs:?}");
    }

    #[test]
    fn comparison_operands_are_constants() {
        let refs = scan("if ($i < LIMIT && MAX > $i && $j<LOW) {}");
        assert_eq!(refs, vec![constant("LIMIT"), constant("MAX"), constant("LOW")]);
    }

    #[test]
    fn generic_arguments_are_types() {
        let refs = scan("$m = Map<string, Foo>{}; $v = vec<vec<Bar>>[];");
        assert!(refs.is_empty(), "unexpected references: {refs:?}");
    }

    #[test]
    fn names_resolve_against_the_namespace() {
        let refs = scan_in(r"N", r"f(); \g(); C::m(); new \M\D(); Sub\h(); LIMIT;");
        assert_eq!(
            refs,
            vec![
                ReferenceKind::FunctionCall {
                    name: r"N\f".to_string(),
                    fallback: Some("f".to_string()),
                },
                call("g"),
                member(named(r"N\C"), "m", MemberKind::Method, true),
                ReferenceKind::New {
                    class: named(r"M\D")
                },
                call(r"N\Sub\h"),
                ReferenceKind::ConstantAccess {
                    name: r"N\LIMIT".to_string(),
                    fallback: Some("LIMIT".to_string()),
                },
            ]
        );
    }

    #[test]
    fn method_names_after_arrow_are_not_calls() {
        let refs = scan("$obj->foo(); $obj?->bar;");
        assert!(refs.is_empty());
    }
}
