//! Tokenizer for the Hack subset understood by the declaration parser
//!
//! Only the shape of the program matters here: identifiers, variables,
//! grouping punctuation and the handful of multi-character operators the
//! parser looks at. String and numeric literals collapse into `Literal`.

use crate::ast::Span;

use super::ParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// A name, possibly namespace-qualified (`Foo\Bar`). A fully qualified
    /// name keeps its leading `\`.
    Ident(String),
    /// `$name`, stored without the `$`.
    Variable(String),
    Literal,
    DoubleColon,
    /// `->` or `?->`
    Arrow,
    /// `<<`
    AttrOpen,
    /// `>>`
    AttrClose,
    Punct(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn ident(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_ident(&self, keyword: &str) -> bool {
        self.ident() == Some(keyword)
    }

    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct(c)
    }
}

pub struct Lexer<'src> {
    source: &'src str,
    bytes: &'src [u8],
    pos: usize,
    tokens: Vec<Token>,
    errors: Vec<ParseError>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> (Vec<Token>, Vec<ParseError>) {
        while self.pos < self.bytes.len() {
            let start = self.pos;
            let c = self.bytes[self.pos];

            match c {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                b'<' if self.starts_with("<?") => self.skip_line(),
                b'<' if self.starts_with("<<<") => self.heredoc(start),
                b'<' if self.starts_with("<<") => self.push_fixed(TokenKind::AttrOpen, 2),
                b'>' if self.starts_with(">>") => self.push_fixed(TokenKind::AttrClose, 2),
                b'/' if self.starts_with("//") => self.skip_line(),
                b'#' => self.skip_line(),
                b'/' if self.starts_with("/*") => self.block_comment(start),
                b'\'' | b'"' | b'`' => self.string(start, c),
                b':' if self.starts_with("::") => self.push_fixed(TokenKind::DoubleColon, 2),
                b'-' if self.starts_with("->") => self.push_fixed(TokenKind::Arrow, 2),
                b'?' if self.starts_with("?->") => self.push_fixed(TokenKind::Arrow, 3),
                b'$' if self.peek_is_name_start(1) => {
                    self.pos += 1;
                    let name = self.name();
                    self.push(TokenKind::Variable(name), start);
                }
                b'0'..=b'9' => {
                    while self.pos < self.bytes.len()
                        && (self.bytes[self.pos].is_ascii_alphanumeric()
                            || matches!(self.bytes[self.pos], b'_' | b'.'))
                    {
                        self.pos += 1;
                    }
                    self.push(TokenKind::Literal, start);
                }
                b'\\' if self.peek_is_name_start(1) => {
                    self.pos += 1;
                    let name = format!("\\{}", self.qualified_name());
                    self.push(TokenKind::Ident(name), start);
                }
                _ if is_name_start(c) => {
                    let name = self.qualified_name();
                    self.push(TokenKind::Ident(name), start);
                }
                _ => {
                    let ch = self.source[self.pos..].chars().next().unwrap_or('\0');
                    self.pos += ch.len_utf8().max(1);
                    self.push(TokenKind::Punct(ch), start);
                }
            }
        }

        (self.tokens, self.errors)
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.bytes[self.pos..].starts_with(prefix.as_bytes())
    }

    fn peek_is_name_start(&self, offset: usize) -> bool {
        self.bytes
            .get(self.pos + offset)
            .is_some_and(|&b| is_name_start(b))
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            span: Span::new(start as u32, self.pos as u32),
        });
    }

    fn push_fixed(&mut self, kind: TokenKind, len: usize) {
        let start = self.pos;
        self.pos += len;
        self.push(kind, start);
    }

    fn name(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.bytes.len() && is_name_continue(self.bytes[self.pos]) {
            self.pos += 1;
        }
        self.source[start..self.pos].to_string()
    }

    fn qualified_name(&mut self) -> String {
        let mut name = self.name();
        while self.starts_with("\\") && self.peek_is_name_start(1) {
            self.pos += 1;
            name.push('\\');
            name.push_str(&self.name());
        }
        name
    }

    fn skip_line(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
    }

    fn block_comment(&mut self, start: usize) {
        match self.source[self.pos + 2..].find("*/") {
            Some(end) => self.pos += 2 + end + 2,
            None => {
                self.pos = self.bytes.len();
                self.error("unterminated block comment", start);
            }
        }
    }

    fn string(&mut self, start: usize, quote: u8) {
        self.pos += 1;
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'\\' => self.pos += 2,
                b if b == quote => {
                    self.pos += 1;
                    self.push(TokenKind::Literal, start);
                    return;
                }
                _ => self.pos += 1,
            }
        }
        self.pos = self.pos.min(self.bytes.len());
        self.error("unterminated string literal", start);
        self.push(TokenKind::Literal, start);
    }

    fn heredoc(&mut self, start: usize) {
        self.pos += 3;
        while self.starts_with(" ") {
            self.pos += 1;
        }
        let quoted = matches!(self.bytes.get(self.pos), Some(b'\'' | b'"'));
        if quoted {
            self.pos += 1;
        }
        let label = self.name();
        if label.is_empty() {
            self.tokens.push(Token {
                kind: TokenKind::AttrOpen,
                span: Span::new(start as u32, start as u32 + 2),
            });
            self.pos = start + 2;
            return;
        }

        let mut line_start = self.source[self.pos..]
            .find('\n')
            .map(|offset| self.pos + offset + 1);
        while let Some(line) = line_start {
            let rest = &self.source[line..];
            if rest.trim_start().starts_with(label.as_str()) {
                let indent = rest.len() - rest.trim_start().len();
                self.pos = line + indent + label.len();
                self.push(TokenKind::Literal, start);
                return;
            }
            line_start = rest.find('\n').map(|offset| line + offset + 1);
        }

        self.pos = self.bytes.len();
        self.error("unterminated heredoc", start);
        self.push(TokenKind::Literal, start);
    }

    fn error(&mut self, message: &str, start: usize) {
        self.errors.push(ParseError::new(
            message,
            Span::new(start as u32, self.pos as u32),
        ));
    }
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_name_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

pub fn tokenize(source: &str) -> (Vec<Token>, Vec<ParseError>) {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, errors) = tokenize(source);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        tokens.into_iter().map(|t| t.kind).collect()
    }

    fn ident(name: &str) -> TokenKind {
        TokenKind::Ident(name.to_string())
    }

    #[test]
    fn skips_open_tag_and_comments() {
        let tokens = kinds("<?hh // strict\n# note\n/* block\n */ foo");
        assert_eq!(tokens, vec![ident("foo")]);
    }

    #[test]
    fn lexes_member_access_operators() {
        let tokens = kinds("$this->m(); C::K; $x?->y");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Variable("this".to_string()),
                TokenKind::Arrow,
                ident("m"),
                TokenKind::Punct('('),
                TokenKind::Punct(')'),
                TokenKind::Punct(';'),
                ident("C"),
                TokenKind::DoubleColon,
                ident("K"),
                TokenKind::Punct(';'),
                TokenKind::Variable("x".to_string()),
                TokenKind::Arrow,
                ident("y"),
            ]
        );
    }

    #[test]
    fn attributes_use_angle_pairs() {
        let tokens = kinds("<<__ModuleLevelTrait>> trait T {}");
        assert_eq!(tokens[0], TokenKind::AttrOpen);
        assert_eq!(tokens[1], ident("__ModuleLevelTrait"));
        assert_eq!(tokens[2], TokenKind::AttrClose);
    }

    #[test]
    fn strings_hide_their_contents() {
        let tokens = kinds(r#"f("foo() \" bar", 'x::y')"#);
        assert_eq!(
            tokens,
            vec![
                ident("f"),
                TokenKind::Punct('('),
                TokenKind::Literal,
                TokenKind::Punct(','),
                TokenKind::Literal,
                TokenKind::Punct(')'),
            ]
        );
    }

    #[test]
    fn heredoc_is_one_literal() {
        let tokens = kinds("$x = <<<EOT\nfoo() bar\nEOT;\nbaz();");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Variable("x".to_string()),
                TokenKind::Punct('='),
                TokenKind::Literal,
                TokenKind::Punct(';'),
                ident("baz"),
                TokenKind::Punct('('),
                TokenKind::Punct(')'),
                TokenKind::Punct(';'),
            ]
        );
    }

    #[test]
    fn qualified_names_keep_leading_backslash() {
        let tokens = kinds(r"\HH\Lib\Str\join(); namespace\f");
        assert_eq!(tokens[0], ident(r"\HH\Lib\Str\join"));
        assert_eq!(tokens[4], ident(r"namespace\f"));
    }

    #[test]
    fn spans_cover_token_text() {
        let (tokens, _) = tokenize("  foo $bar");
        assert_eq!(tokens[0].span, Span::new(2, 5));
        assert_eq!(tokens[1].span, Span::new(6, 10));
    }

    #[test]
    fn unterminated_comment_is_an_error() {
        let (_, errors) = tokenize("foo /* never closed");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "unterminated block comment");
        assert_eq!(errors[0].span.lo, 4);
    }
}
