//! Compilation errors.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Errors produced while turning an equation's tokens into an expression tree.
///
/// None of these are fatal to a worksheet: the caller turns them into a per-equation status.
pub enum CompileError {
    #[error("equation is incomplete: placeholder at index {index}")]
    /// A placeholder is still waiting to be filled in.
    Incomplete {
        /// Token index of the first placeholder.
        index: usize,
    },

    #[error("unrecognised input '{text}' at index {position}")]
    /// Glyph text that no lexeme pattern matches.
    Lex {
        /// Token index where the bad text starts.
        position: usize,
        /// The unmatched text.
        text: String,
    },

    #[error("syntax error: {message}")]
    /// Lexemes that do not form a valid statement.
    Parse {
        /// What went wrong, naming the offending token index when there is one.
        message: String,
    },
}

impl CompileError {
    pub(crate) fn parse(message: impl Into<String>) -> Self {
        CompileError::Parse {
            message: message.into(),
        }
    }
}
