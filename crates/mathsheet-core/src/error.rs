//! Error types of the editing core.

use crate::token::KeywordKind;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Keyword structure is not properly nested.
///
/// Edit operations only ever produce balanced sequences, so this surfaces as a fatal internal
/// error on the edit path and as a load failure on the deserialization path.
pub enum UnbalancedError {
    #[error("unexpected closing keyword {kind:?} at index {index}")]
    /// A closing keyword that does not close the innermost open construct.
    UnexpectedClose {
        /// Token index of the offending keyword.
        index: usize,
        /// Its kind.
        kind: KeywordKind,
    },

    #[error("keyword {kind:?} at index {index} is never closed")]
    /// An opening keyword left on the stack at the end of the sequence.
    Unclosed {
        /// Token index of the innermost unclosed keyword.
        index: usize,
        /// Its kind.
        kind: KeywordKind,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Errors returned by [`crate::CommandExecutor`] and the edit operations.
pub enum CommandError {
    #[error("unbalanced structure: {0}")]
    /// An edit produced an unbalanced token sequence (internal error).
    Unbalanced(#[from] UnbalancedError),

    #[error("nothing to undo")]
    /// Undo requested with an empty history.
    NothingToUndo,

    #[error("nothing to redo")]
    /// Redo requested with an empty redo stack.
    NothingToRedo,

    #[error("index {index} out of range (length {len})")]
    /// A token index outside the document.
    InvalidIndex {
        /// Requested index.
        index: usize,
        /// Document length.
        len: usize,
    },

    #[error("not allowed here: {0}")]
    /// The operation is not valid at the current cursor position.
    NotAllowed(&'static str),
}

#[derive(Debug, Error)]
/// Errors produced while loading or saving a document.
pub enum SerializeError {
    #[error("JSON error: {0}")]
    /// `serde_json` failed.
    Json(#[from] serde_json::Error),

    #[error("unknown token kind '{0}'")]
    /// A token record with an `object_type` that is neither `character` nor `keyword`.
    UnknownKind(String),

    #[error("loaded document is unbalanced: {0}")]
    /// Keyword records do not nest.
    Unbalanced(#[from] UnbalancedError),
}
