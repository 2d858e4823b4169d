//! Source text bookkeeping for turning spans into line/column locations.

use std::ops::Range;

use crate::ast::Span;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub unit: usize,
    pub file: String,
    pub span: Span,
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

#[derive(Debug, Clone)]
pub struct SourceFile {
    path: String,
    source: String,
    line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(path: &str, source: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));

        Self {
            path: path.to_string(),
            source: source.to_string(),
            line_starts,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn line_count(&self) -> usize {
        if self.source.is_empty() {
            0
        } else {
            self.source.lines().count()
        }
    }

    /// 1-based line and column of a byte offset.
    pub fn line_column(&self, offset: u32) -> (usize, usize) {
        let offset = (offset as usize).min(self.source.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next - 1,
        };
        (line + 1, offset - self.line_starts[line] + 1)
    }

    pub fn line_range(&self, line_number: usize) -> Option<Range<usize>> {
        if line_number == 0 || line_number > self.line_starts.len() {
            return None;
        }
        let start = self.line_starts[line_number - 1];
        let end = self
            .line_starts
            .get(line_number)
            .map(|next| next - 1)
            .unwrap_or(self.source.len());
        Some(start..end.max(start))
    }

    pub fn get_line(&self, line_number: usize) -> Option<&str> {
        self.line_range(line_number)
            .map(|range| self.source[range].trim_end_matches('\r'))
    }

    pub fn text(&self, span: Span) -> Option<&str> {
        let (lo, hi) = (span.lo as usize, span.hi as usize);
        if lo <= hi && hi <= self.source.len() {
            self.source.get(lo..hi)
        } else {
            None
        }
    }
}

/// Every unit of one analysis run, indexed by unit position.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, file: SourceFile) -> usize {
        self.files.push(file);
        self.files.len() - 1
    }

    pub fn get(&self, unit: usize) -> Option<&SourceFile> {
        self.files.get(unit)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn locate(&self, unit: usize, span: Span) -> Location {
        match self.files.get(unit) {
            Some(file) => {
                let (line, column) = file.line_column(span.lo);
                let (end_line, end_column) = file.line_column(span.hi);
                Location {
                    unit,
                    file: file.path.clone(),
                    span,
                    line,
                    column,
                    end_line,
                    end_column,
                }
            }
            None => Location {
                unit,
                file: String::new(),
                span,
                line: 0,
                column: 0,
                end_line: 0,
                end_column: 0,
            },
        }
    }
}
