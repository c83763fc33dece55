//! Compile-time error handling and diagnostics.
//!
//! A closed set of error kinds, each carrying the offending symbol name and
//! source coordinates when available. All pipeline stages propagate
//! failures immediately; there is no local recovery.

use std::fmt;

use crate::span::Span;

/// The closed set of error kinds a compilation can fail with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed AST node or undeclared identifier usage.
    ParseError,
    /// Assignment between incompatible inferred types.
    TypeMismatch,
    /// Constant index outside declared vector bounds.
    OutOfRange,
    /// Use of a name not in any reachable table.
    UndefinedSymbol,
    /// Call argument count wrong.
    ArityMismatch,
    /// Internal inconsistency while lowering (missing temporary, unreachable opcode).
    IRError,
    /// Buffer-address compile-time check failure (e.g. `print` given a non-buffer).
    RuntimeError,
    /// Invariant violation inside the compiler itself (a bug).
    AssertionFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::ParseError => "ParseError",
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::OutOfRange => "OutOfRange",
            ErrorKind::UndefinedSymbol => "UndefinedSymbol",
            ErrorKind::ArityMismatch => "ArityMismatch",
            ErrorKind::IRError => "IRError",
            ErrorKind::RuntimeError => "RuntimeError",
            ErrorKind::AssertionFailure => "AssertionFailure",
        };
        write!(f, "{}", s)
    }
}

/// A compile-time error, carrying enough context to render the
/// user-visible format below.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    pub symbol: String,
    pub span: Span,
}

impl CompileError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            symbol: symbol.into(),
            span: Span::dummy(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn parse(message: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseError, message, symbol)
    }

    pub fn type_mismatch(message: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch, message, symbol)
    }

    pub fn out_of_range(message: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self::new(ErrorKind::OutOfRange, message, symbol)
    }

    pub fn undefined_symbol(symbol: impl Into<String>) -> Self {
        let symbol = symbol.into();
        Self::new(
            ErrorKind::UndefinedSymbol,
            format!("undefined symbol '{}'", symbol),
            symbol,
        )
    }

    pub fn arity_mismatch(message: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self::new(ErrorKind::ArityMismatch, message, symbol)
    }

    pub fn ir(message: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self::new(ErrorKind::IRError, message, symbol)
    }

    pub fn runtime(message: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self::new(ErrorKind::RuntimeError, message, symbol)
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AssertionFailure, message, "<compiler>")
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Credence could not compile source:\n  on {} '{}'\n  with: \"{}\"\n> from line {} column {}:{}",
            self.kind, self.symbol, self.message, self.span.line, self.span.column, self.span.end_column
        )
    }
}

impl std::error::Error for CompileError {}

/// Render a diagnostic to stderr using `ariadne`, with source context.
pub fn render(err: &CompileError, filename: &str, source: &str) {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let offset = line_column_to_offset(source, err.span.line, err.span.column);
    let end_offset = line_column_to_offset(source, err.span.line, err.span.end_column);

    let mut report = Report::build(ReportKind::Error, filename, offset)
        .with_message(&err.message)
        .with_label(
            Label::new((filename, offset..end_offset.max(offset + 1)))
                .with_message(format!("{}: '{}'", err.kind, err.symbol))
                .with_color(Color::Red),
        );
    report = report.with_note(format!("{}", err.kind));
    report
        .finish()
        .eprint((filename, Source::from(source)))
        .ok();
}

fn line_column_to_offset(source: &str, line: u32, column: u32) -> usize {
    let mut offset = 0usize;
    for (idx, text) in source.lines().enumerate() {
        if idx as u32 + 1 == line {
            return offset + column as usize;
        }
        offset += text.len() + 1;
    }
    offset
}

pub type CompileResult<T> = Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_user_visible_format() {
        let err = CompileError::out_of_range("index 10 exceeds array size 3", "v")
            .with_span(Span::new(7, 14, 16));
        let rendered = format!("{}", err);
        assert!(rendered.contains("on OutOfRange 'v'"));
        assert!(rendered.contains("with: \"index 10 exceeds array size 3\""));
        assert!(rendered.contains("from line 7 column 14:16"));
    }

    #[test]
    fn undefined_symbol_message() {
        let err = CompileError::undefined_symbol("missing");
        assert_eq!(err.kind, ErrorKind::UndefinedSymbol);
        assert!(err.message.contains("missing"));
    }

    #[test]
    fn render_does_not_panic() {
        let err = CompileError::parse("bad node", "foo").with_span(Span::new(1, 0, 3));
        render(&err, "test.b", "foo();\n");
    }
}
