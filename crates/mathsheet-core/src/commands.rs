//! Command Interface Layer
//!
//! A single entry point for frontends: every user action is a [`Command`] executed by a
//! [`CommandExecutor`], which owns the [`Document`] and its undo history.
//!
//! # Overview
//!
//! - **Edit**: type text and symbols, backspace, new program lines
//! - **Cursor**: arrow keys, clicks and selections
//! - **Construct**: insert fractions, radicals, matrices, program blocks...
//! - **Result**: splice or remove an evaluation result
//! - **History**: undo, redo and clean-point tracking
//!
//! Undo works on whole snapshots: each undoable command records the document state before
//! and after it ran. Consecutive typed text coalesces into one undo group.
//!
//! # Example
//!
//! ```rust
//! use mathsheet_core::{Command, CommandExecutor, Construct, EditCommand, HistoryCommand};
//!
//! let mut executor = CommandExecutor::empty();
//! executor
//!     .execute(Command::Construct(Construct::Fraction))
//!     .unwrap();
//! executor
//!     .execute(Command::Edit(EditCommand::InsertText { text: "1".to_string() }))
//!     .unwrap();
//! executor.execute(Command::History(HistoryCommand::Undo)).unwrap();
//! assert_eq!(executor.document().len(), 9);
//! ```

use crate::construct::Construct;
use crate::document::{Caret, Document, DocumentSnapshot};
use crate::error::CommandError;
use crate::result::ResultValue;

/// Editing commands.
#[derive(Debug, Clone, PartialEq)]
pub enum EditCommand {
    /// Type text at the caret, one grapheme at a time.
    InsertText {
        /// Text to type.
        text: String,
    },
    /// Insert a named symbol (`__alpha__`).
    InsertSymbol {
        /// Symbol tag.
        tag: String,
    },
    /// Delete backwards.
    Backspace,
    /// Delete the active selection.
    DeleteSelection,
    /// Add a program line below the current one.
    Newline,
}

/// Caret and selection commands.
#[derive(Debug, Clone, PartialEq)]
pub enum CursorCommand {
    /// Left arrow.
    MoveLeft,
    /// Right arrow.
    MoveRight,
    /// Up arrow.
    MoveUp,
    /// Down arrow.
    MoveDown,
    /// Home key.
    MoveHome,
    /// End key.
    MoveEnd,
    /// Place the caret before a token.
    SetCursor {
        /// Token index.
        index: usize,
    },
    /// Mouse click in page coordinates.
    Click {
        /// Page x.
        x: f64,
        /// Page y.
        y: f64,
    },
    /// Select a token range, snapped to whole constructs.
    SelectRange {
        /// One end.
        start: usize,
        /// Other end.
        end: usize,
    },
    /// Select the editable part of the equation.
    SelectAll,
    /// Drop the selection.
    ClearSelection,
}

/// Result splice commands.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultCommand {
    /// Show a value after the equation.
    Set {
        /// The value.
        value: ResultValue,
        /// Significant digits.
        digits: usize,
    },
    /// Remove the shown value.
    Delete,
}

/// Undo history commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryCommand {
    /// Undo the last group.
    Undo,
    /// Redo the last undone group.
    Redo,
    /// Close the current typing group.
    EndGroup,
    /// Record the current state as saved.
    MarkClean,
}

/// Unified command enum
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Editing commands
    Edit(EditCommand),
    /// Cursor commands
    Cursor(CursorCommand),
    /// Insert a construct
    Construct(Construct),
    /// Result commands
    Result(ResultCommand),
    /// History commands
    History(HistoryCommand),
}

/// Command execution result
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// The document changed.
    Success,
    /// The command was valid but changed nothing.
    Unchanged,
    /// Caret after a cursor command.
    Caret(Caret),
}

#[derive(Debug, Clone)]
struct UndoStep {
    group_id: usize,
    before: DocumentSnapshot,
    after: DocumentSnapshot,
}

#[derive(Debug)]
struct UndoRedoManager {
    undo_stack: Vec<UndoStep>,
    redo_stack: Vec<UndoStep>,
    max_undo: usize,
    /// Saved position in the linear history, as an `undo_stack` length.
    clean_index: Option<usize>,
    next_group_id: usize,
    open_group_id: Option<usize>,
}

impl UndoRedoManager {
    fn new(max_undo: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_undo,
            clean_index: Some(0),
            next_group_id: 0,
            open_group_id: None,
        }
    }

    fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    fn is_clean(&self) -> bool {
        self.clean_index == Some(self.undo_stack.len())
    }

    fn mark_clean(&mut self) {
        self.clean_index = Some(self.undo_stack.len());
        self.end_group();
    }

    fn end_group(&mut self) {
        self.open_group_id = None;
    }

    fn clear_redo_and_adjust_clean(&mut self) {
        if self.redo_stack.is_empty() {
            return;
        }
        // A clean point in the redo area is unreachable once redo is cleared.
        if let Some(clean_index) = self.clean_index
            && clean_index > self.undo_stack.len()
        {
            self.clean_index = None;
        }
        self.redo_stack.clear();
    }

    fn push_step(&mut self, before: DocumentSnapshot, after: DocumentSnapshot, typing: bool) {
        self.clear_redo_and_adjust_clean();

        if self.undo_stack.len() >= self.max_undo {
            self.undo_stack.remove(0);
            self.clean_index = match self.clean_index {
                Some(0) | None => None,
                Some(index) => Some(index - 1),
            };
        }

        let group_id = match self.open_group_id {
            Some(open) if typing && self.clean_index != Some(self.undo_stack.len()) => open,
            _ => {
                let id = self.next_group_id;
                self.next_group_id = self.next_group_id.wrapping_add(1);
                id
            }
        };
        self.open_group_id = typing.then_some(group_id);
        self.undo_stack.push(UndoStep {
            group_id,
            before,
            after,
        });
    }

    fn pop_group(stack: &mut Vec<UndoStep>) -> Option<Vec<UndoStep>> {
        let group_id = stack.last()?.group_id;
        let mut steps = Vec::new();
        while stack.last().is_some_and(|s| s.group_id == group_id) {
            steps.extend(stack.pop());
        }
        Some(steps)
    }
}

/// Owns a document and executes commands against it.
#[derive(Debug)]
pub struct CommandExecutor {
    document: Document,
    command_history: Vec<Command>,
    undo_redo: UndoRedoManager,
}

impl CommandExecutor {
    /// Create an executor around an existing document.
    pub fn new(document: Document) -> Self {
        Self {
            document,
            command_history: Vec::new(),
            undo_redo: UndoRedoManager::new(1000),
        }
    }

    /// Create an executor with an empty equation.
    pub fn empty() -> Self {
        Self::new(Document::new())
    }

    /// Execute a command.
    pub fn execute(&mut self, command: Command) -> Result<CommandResult, CommandError> {
        self.command_history.push(command.clone());
        let typing = matches!(command, Command::Edit(EditCommand::InsertText { .. }));
        if !typing {
            self.undo_redo.end_group();
        }

        match command {
            Command::Edit(edit) => self.record(typing, |doc| match edit {
                EditCommand::InsertText { text } => doc.insert_text(&text),
                EditCommand::InsertSymbol { tag } => doc.insert_symbol(&tag),
                EditCommand::Backspace => doc.backspace(),
                EditCommand::DeleteSelection => match doc.selection() {
                    Some(selection) => {
                        doc.delete_selection(selection)?;
                        doc.commit()?;
                        Ok(true)
                    }
                    None => Ok(false),
                },
                EditCommand::Newline => doc.newline(),
            }),
            Command::Construct(construct) => {
                self.record(false, |doc| doc.insert_construct(construct))
            }
            Command::Cursor(cursor) => Ok(self.execute_cursor(cursor)),
            Command::Result(ResultCommand::Set { value, digits }) => {
                let changed = self.document.set_result(&value, digits)?;
                Ok(Self::outcome(changed))
            }
            Command::Result(ResultCommand::Delete) => {
                let changed = self.document.delete_result();
                if changed {
                    self.document.relayout();
                }
                Ok(Self::outcome(changed))
            }
            Command::History(history) => self.execute_history(history),
        }
    }

    /// Execute commands in order, stopping at the first error.
    pub fn execute_batch(
        &mut self,
        commands: Vec<Command>,
    ) -> Result<Vec<CommandResult>, CommandError> {
        let mut results = Vec::new();
        for command in commands {
            results.push(self.execute(command)?);
        }
        Ok(results)
    }

    /// Commands executed so far.
    pub fn get_command_history(&self) -> &[Command] {
        &self.command_history
    }

    /// Whether undo is possible.
    pub fn can_undo(&self) -> bool {
        self.undo_redo.can_undo()
    }

    /// Whether redo is possible.
    pub fn can_redo(&self) -> bool {
        self.undo_redo.can_redo()
    }

    /// Undo stack depth in steps.
    pub fn undo_depth(&self) -> usize {
        self.undo_redo.undo_stack.len()
    }

    /// Redo stack depth in steps.
    pub fn redo_depth(&self) -> usize {
        self.undo_redo.redo_stack.len()
    }

    /// Whether the document is at the clean point (for dirty tracking).
    pub fn is_clean(&self) -> bool {
        self.undo_redo.is_clean()
    }

    /// Mark the current state as saved.
    pub fn mark_clean(&mut self) {
        self.undo_redo.mark_clean();
    }

    /// The document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Mutable access to the document. Changes made here bypass the undo history.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    fn outcome(changed: bool) -> CommandResult {
        if changed {
            CommandResult::Success
        } else {
            CommandResult::Unchanged
        }
    }

    /// Run an edit transactionally and record it for undo.
    fn record(
        &mut self,
        typing: bool,
        edit: impl FnOnce(&mut Document) -> Result<bool, CommandError>,
    ) -> Result<CommandResult, CommandError> {
        let before = self.document.snapshot();
        match edit(&mut self.document) {
            Ok(true) => {
                let after = self.document.snapshot();
                if before == after {
                    return Ok(CommandResult::Unchanged);
                }
                self.undo_redo.push_step(before, after, typing);
                Ok(CommandResult::Success)
            }
            Ok(false) => Ok(CommandResult::Unchanged),
            Err(err) => {
                tracing::debug!(error = %err, "edit rejected, restoring previous state");
                self.document.restore(before);
                Err(err)
            }
        }
    }

    fn execute_cursor(&mut self, command: CursorCommand) -> CommandResult {
        let doc = &mut self.document;
        match command {
            CursorCommand::MoveLeft => doc.move_left(),
            CursorCommand::MoveRight => doc.move_right(),
            CursorCommand::MoveUp => doc.move_up(),
            CursorCommand::MoveDown => doc.move_down(),
            CursorCommand::MoveHome => doc.move_home(),
            CursorCommand::MoveEnd => doc.move_end(),
            CursorCommand::SetCursor { index } => doc.set_cursor(index),
            CursorCommand::Click { x, y } => doc.click(x, y),
            CursorCommand::SelectRange { start, end } => doc.select_range(start, end),
            CursorCommand::SelectAll => doc.select_all(),
            CursorCommand::ClearSelection => doc.clear_selection(),
        }
        CommandResult::Caret(doc.caret())
    }

    fn execute_history(&mut self, command: HistoryCommand) -> Result<CommandResult, CommandError> {
        match command {
            HistoryCommand::Undo => {
                let steps = UndoRedoManager::pop_group(&mut self.undo_redo.undo_stack)
                    .ok_or(CommandError::NothingToUndo)?;
                // Popped newest first; the oldest step holds the group's starting state.
                if let Some(oldest) = steps.last() {
                    self.document.restore(oldest.before.clone());
                }
                // Redo pops the oldest step of the group first.
                self.undo_redo.redo_stack.extend(steps);
                tracing::debug!(undo_depth = self.undo_depth(), "undo");
                Ok(CommandResult::Success)
            }
            HistoryCommand::Redo => {
                let steps = UndoRedoManager::pop_group(&mut self.undo_redo.redo_stack)
                    .ok_or(CommandError::NothingToRedo)?;
                if let Some(newest) = steps.last() {
                    self.document.restore(newest.after.clone());
                }
                self.undo_redo.undo_stack.extend(steps);
                tracing::debug!(redo_depth = self.redo_depth(), "redo");
                Ok(CommandResult::Success)
            }
            HistoryCommand::EndGroup => {
                self.undo_redo.end_group();
                Ok(CommandResult::Success)
            }
            HistoryCommand::MarkClean => {
                self.undo_redo.mark_clean();
                Ok(CommandResult::Success)
            }
        }
    }
}
