//! Error reporting for TypeQL
//!
//! Every public failure is a `TypeQLError`. Lexical and syntactic errors
//! carry a rendered pointer into the offending source line: the raw line
//! text followed by a caret aligned under the first unconsumed column.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TypeQLError>;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TypeQLError {
    /// The lexer could not tokenize the input.
    #[error("There is a syntax error at line {line}:\n{text}\n{caret}\n{message}")]
    Lexical {
        line: usize,
        text: String,
        caret: String,
        message: String,
    },

    /// The token stream deviated from the grammar.
    #[error("There is a syntax error at line {line}:\n{text}\n{caret}\n{message}")]
    Syntax {
        line: usize,
        text: String,
        caret: String,
        message: String,
    },

    /// A date-time value carries sub-millisecond precision.
    #[error("the date-time value '{value}' is more precise than 1 millisecond")]
    Precision { value: String },

    /// A variable is referenced outside the scope that binds it.
    #[error("invalid pattern scope: {message}")]
    BoundVariable { message: String },

    /// The query is grammatical but structurally invalid.
    #[error("invalid query structure: {message}")]
    Structural { message: String },

    /// A query or pattern was projected to a variant it does not have.
    #[error("the value is not a {expected}")]
    TypeMismatch { expected: &'static str },
}

impl TypeQLError {
    pub(crate) fn structural(message: impl Into<String>) -> TypeQLError {
        TypeQLError::Structural {
            message: message.into(),
        }
    }

    pub(crate) fn bound_variable(message: impl Into<String>) -> TypeQLError {
        TypeQLError::BoundVariable {
            message: message.into(),
        }
    }
}

/// 1-based line and 0-based character column of a byte offset.
pub(crate) fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let col = match before.rfind('\n') {
        Some(nl) => before[nl + 1..].chars().count(),
        None => before.chars().count(),
    };
    (line, col)
}

fn line_text(source: &str, line: usize) -> &str {
    source.lines().nth(line - 1).unwrap_or("")
}

/// Build a syntax error pointing at `offset`. `base_line` is the global
/// 1-based line on which the current query starts, so that multi-query
/// inputs report line numbers local to the failing query.
pub(crate) fn syntax_error(
    source: &str,
    base_line: usize,
    offset: usize,
    message: String,
) -> TypeQLError {
    let (line, col) = line_col(source, offset);
    TypeQLError::Syntax {
        line: line + 1 - base_line,
        text: line_text(source, line).trim_end().to_string(),
        caret: caret_line(col),
        message,
    }
}

/// Like [`syntax_error`] but classified as a lexical failure. Lexing runs
/// over the whole input, so line numbers here are always global.
pub(crate) fn lexical_error(source: &str, offset: usize, message: String) -> TypeQLError {
    let (line, col) = line_col(source, offset);
    TypeQLError::Lexical {
        line,
        text: line_text(source, line).trim_end().to_string(),
        caret: caret_line(col),
        message,
    }
}

fn caret_line(col: usize) -> String {
    let mut caret = " ".repeat(col);
    caret.push('^');
    caret
}
