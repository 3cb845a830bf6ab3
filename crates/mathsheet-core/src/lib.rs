#![warn(missing_docs)]
//! Mathsheet Core - Structural Kernel of a WYSIWYG Math Editor
//!
//! # Overview
//!
//! `mathsheet-core` owns one equation as a flat vector of tokens: visible glyphs plus
//! invisible keyword pairs that delimit fractions, radicals, matrices, sums, integrals,
//! limits and program blocks. It keeps that vector well-formed under editing, moves the
//! caret through it, and lays it out into page coordinates. It draws nothing itself.
//!
//! # Core Features
//!
//! - **Token Model**: closed keyword set, partner indices rebuilt after every edit
//! - **Edit Operations**: atomic construct insertion, placeholder handling, two-step delete
//! - **Cursor & Navigation**: table-driven arrow steps, vertical moves, hit testing
//! - **Layout Engine**: recursive positioning with per-construct handlers
//! - **Result Splicing**: evaluated values drawn after the equation
//! - **Command & State Layers**: snapshot undo/redo, versioned change notifications
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Command Interface & State Management       │  ← Public API
//! ├─────────────────────────────────────────────┤
//! │  Edit Operations / Result Splicing          │  ← Token mutation
//! ├─────────────────────────────────────────────┤
//! │  Cursor & Navigation                        │  ← Caret model
//! ├─────────────────────────────────────────────┤
//! │  Layout Engine / Geometry                   │  ← Presentation data
//! ├─────────────────────────────────────────────┤
//! │  Token Model & Matcher                      │  ← Storage
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use mathsheet_core::{Command, CommandExecutor, Construct, CursorCommand, EditCommand};
//!
//! let mut executor = CommandExecutor::empty();
//! executor
//!     .execute(Command::Edit(EditCommand::InsertText { text: "x".to_string() }))
//!     .unwrap();
//! executor.execute(Command::Construct(Construct::Power)).unwrap();
//! executor
//!     .execute(Command::Edit(EditCommand::InsertText { text: "2".to_string() }))
//!     .unwrap();
//! executor.execute(Command::Cursor(CursorCommand::MoveRight)).unwrap();
//!
//! let doc = executor.document();
//! assert!(doc.is_complete());
//! assert_eq!(doc.cursor(), Some(doc.len()));
//! ```
//!
//! # Module Description
//!
//! - [`token`] - Glyphs, keywords and their flags
//! - [`matcher`] - Partner index rebuild and balance checks
//! - [`construct`] - Templates for every insertable construct
//! - [`document`] - The equation: tokens, caret, flags
//! - [`cursor`] - Caret movement, hit testing, selection snapping
//! - [`edit`] - Insertion and deletion
//! - [`layout`] - Positioning and presentation geometry
//! - [`result`] - Result formatting and splicing
//! - [`serialize`] - Saved-document records
//! - [`commands`] - Unified command interface
//! - [`state`] - State management and query interface

pub mod commands;
pub mod construct;
pub mod cursor;
pub mod document;
pub mod edit;
pub mod error;
pub mod layout;
pub mod matcher;
pub mod result;
pub mod serialize;
pub mod state;
pub mod token;

pub use commands::{
    Command, CommandExecutor, CommandResult, CursorCommand, EditCommand, HistoryCommand,
    ResultCommand,
};
pub use construct::{Construct, LimitSide};
pub use cursor::{CaretRect, CaretShape, StepRule};
pub use document::{Caret, Document, DocumentSnapshot, EquationFlags, Selection};
pub use error::{CommandError, SerializeError, UnbalancedError};
pub use layout::{
    BoundingBox, Geometry, GlyphMeasurer, GlyphRect, GlyphSize, LayoutConfig, MonospaceMeasurer,
};
pub use matcher::{is_balanced, rebuild_matches};
pub use result::{FormattedNumber, ResultValue, format_result};
pub use serialize::{DocumentRecord, FORMAT_VERSION};
pub use state::{
    CursorState, DocumentState, EquationStateManager, StateChange, StateChangeCallback,
    StateChangeType, UndoRedoState,
};
pub use token::{
    Glyph, GlyphShape, GlyphStyle, Keyword, KeywordKind, Metrics, Payload, Token, same_structure,
};

pub use mathsheet_lang::{OperatorStyle, ProgramWord};
