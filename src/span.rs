//! Source coordinates threaded alongside AST nodes and symbol-table entries.
//!
//! The external front-end stamps every AST node and every symbol-table
//! entry with `line`, `column`, `end_column`. We carry the same triple
//! rather than a byte-offset range, since that is the coordinate system
//! the producer actually emits.

use serde::Deserialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Default)]
pub struct Span {
    pub line: u32,
    pub column: u32,
    pub end_column: u32,
}

impl Span {
    pub fn new(line: u32, column: u32, end_column: u32) -> Self {
        Self {
            line,
            column,
            end_column,
        }
    }

    /// A span for synthetic nodes with no source origin.
    pub fn dummy() -> Self {
        Self {
            line: 0,
            column: 0,
            end_column: 0,
        }
    }
}

/// A value annotated with its source span.
#[derive(Clone, Debug)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }

    pub fn dummy(node: T) -> Self {
        Self {
            node,
            span: Span::dummy(),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            node: f(self.node),
            span: self.span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dummy_is_zeroed() {
        let s = Span::dummy();
        assert_eq!((s.line, s.column, s.end_column), (0, 0, 0));
    }

    #[test]
    fn spanned_map_preserves_span() {
        let span = Span::new(3, 4, 9);
        let spanned = Spanned::new(41, span);
        let mapped = spanned.map(|v| v + 1);
        assert_eq!(mapped.node, 42);
        assert_eq!(mapped.span, span);
    }
}
