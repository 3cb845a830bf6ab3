//! Equation State Interface
//!
//! Read-only state snapshots and change notifications for frontends.
//!
//! # Overview
//!
//! - **State Queries**: document, caret and undo/redo snapshots
//! - **Version Tracking**: a counter bumped on every effective change
//! - **Change Notifications**: subscribers receive a [`StateChange`] per change
//!
//! # Example
//!
//! ```rust
//! use mathsheet_core::{Command, Construct, EquationStateManager, StateChangeType};
//! use std::sync::{Arc, Mutex};
//!
//! let mut manager = EquationStateManager::empty();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! manager.subscribe(move |change| sink.lock().unwrap().push(change.change_type));
//!
//! manager.execute(Command::Construct(Construct::Fraction)).unwrap();
//! assert_eq!(manager.version(), 1);
//! assert_eq!(*seen.lock().unwrap(), vec![StateChangeType::DocumentModified]);
//! ```

use crate::commands::{Command, CommandExecutor, CommandResult, CursorCommand, HistoryCommand};
use crate::document::{Caret, Document, Selection};
use crate::error::CommandError;
use crate::layout::Geometry;
use std::ops::Range;

/// Document state
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentState {
    /// Token count
    pub token_count: usize,
    /// No placeholder is left
    pub is_complete: bool,
    /// A result is shown
    pub has_result: bool,
    /// Shown result text
    pub result_string: Option<String>,
    /// Changed since the last save
    pub is_modified: bool,
    /// State version
    pub version: u64,
}

/// Caret state
#[derive(Debug, Clone, PartialEq)]
pub struct CursorState {
    /// Insert position, `None` while selecting
    pub index: Option<usize>,
    /// Active selection
    pub selection: Option<Selection>,
}

/// Undo/redo stack state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoRedoState {
    /// Can undo
    pub can_undo: bool,
    /// Can redo
    pub can_redo: bool,
    /// Undo stack depth
    pub undo_depth: usize,
    /// Redo stack depth
    pub redo_depth: usize,
}

/// State change type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChangeType {
    /// Tokens changed
    DocumentModified,
    /// Caret moved
    CursorMoved,
    /// Selection changed
    SelectionChanged,
    /// Result spliced or removed
    ResultChanged,
}

/// State change record
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    /// Change type
    pub change_type: StateChangeType,
    /// Old version number
    pub old_version: u64,
    /// New version number
    pub new_version: u64,
    /// Affected token range
    pub affected_region: Option<Range<usize>>,
}

impl StateChange {
    /// Create a change record without an affected region.
    pub fn new(change_type: StateChangeType, old_version: u64, new_version: u64) -> Self {
        Self {
            change_type,
            old_version,
            new_version,
            affected_region: None,
        }
    }

    /// Attach the affected token range.
    pub fn with_region(mut self, region: Range<usize>) -> Self {
        self.affected_region = Some(region);
        self
    }
}

/// State change callback function type
pub type StateChangeCallback = Box<dyn FnMut(&StateChange) + Send>;

/// Wraps a [`CommandExecutor`], versions its state and notifies subscribers.
///
/// Commands that turn out to be no-ops (an arrow key at the end, a rejected program
/// insertion) do not bump the version.
pub struct EquationStateManager {
    executor: CommandExecutor,
    state_version: u64,
    is_modified: bool,
    callbacks: Vec<StateChangeCallback>,
}

impl std::fmt::Debug for EquationStateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EquationStateManager")
            .field("executor", &self.executor)
            .field("state_version", &self.state_version)
            .field("is_modified", &self.is_modified)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl EquationStateManager {
    /// Manage an existing document.
    pub fn new(document: Document) -> Self {
        Self {
            executor: CommandExecutor::new(document),
            state_version: 0,
            is_modified: false,
            callbacks: Vec::new(),
        }
    }

    /// Manage an empty equation.
    pub fn empty() -> Self {
        Self::new(Document::new())
    }

    /// The document.
    pub fn document(&self) -> &Document {
        self.executor.document()
    }

    /// The executor.
    pub fn executor(&self) -> &CommandExecutor {
        &self.executor
    }

    /// Execute a command and publish the resulting change, if any.
    pub fn execute(&mut self, command: Command) -> Result<CommandResult, CommandError> {
        let change_type = Self::change_type_for_command(&command);
        let caret_before = self.document().caret();
        let len_before = self.document().len();

        let result = self.executor.execute(command)?;

        let changed = match change_type {
            StateChangeType::CursorMoved | StateChangeType::SelectionChanged => {
                self.document().caret() != caret_before
            }
            StateChangeType::DocumentModified | StateChangeType::ResultChanged => {
                result == CommandResult::Success
            }
        };
        if changed {
            let change_type = match (change_type, self.document().caret()) {
                (StateChangeType::CursorMoved, Caret::Select(_)) => {
                    StateChangeType::SelectionChanged
                }
                (other, _) => other,
            };
            let region = 0..len_before.max(self.document().len());
            self.mark_modified_in(change_type, Some(region));
        }
        Ok(result)
    }

    fn change_type_for_command(command: &Command) -> StateChangeType {
        match command {
            Command::Edit(_) | Command::Construct(_) | Command::History(_) => {
                StateChangeType::DocumentModified
            }
            Command::Cursor(
                CursorCommand::SelectRange { .. }
                | CursorCommand::SelectAll
                | CursorCommand::ClearSelection,
            ) => StateChangeType::SelectionChanged,
            Command::Cursor(_) => StateChangeType::CursorMoved,
            Command::Result(_) => StateChangeType::ResultChanged,
        }
    }

    /// Current state version.
    pub fn version(&self) -> u64 {
        self.state_version
    }

    /// Check if state has changed since a version
    pub fn has_changed_since(&self, version: u64) -> bool {
        self.state_version > version
    }

    /// Document state snapshot.
    pub fn get_document_state(&self) -> DocumentState {
        let doc = self.document();
        DocumentState {
            token_count: doc.len(),
            is_complete: doc.is_complete(),
            has_result: doc.flags().has_result,
            result_string: doc.result_string().map(str::to_string),
            is_modified: self.is_modified,
            version: self.state_version,
        }
    }

    /// Caret state snapshot.
    pub fn get_cursor_state(&self) -> CursorState {
        let doc = self.document();
        CursorState {
            index: doc.cursor(),
            selection: doc.selection(),
        }
    }

    /// Undo/redo state snapshot.
    pub fn get_undo_redo_state(&self) -> UndoRedoState {
        UndoRedoState {
            can_undo: self.executor.can_undo(),
            can_redo: self.executor.can_redo(),
            undo_depth: self.executor.undo_depth(),
            redo_depth: self.executor.redo_depth(),
        }
    }

    /// Presentation geometry.
    pub fn get_geometry(&self) -> Geometry {
        self.document().geometry()
    }

    /// Subscribe to state change notifications
    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: FnMut(&StateChange) + Send + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    /// Bump the version and notify subscribers.
    pub fn mark_modified(&mut self, change_type: StateChangeType) {
        self.mark_modified_in(change_type, None);
    }

    fn mark_modified_in(&mut self, change_type: StateChangeType, region: Option<Range<usize>>) {
        let old_version = self.state_version;
        self.state_version += 1;
        if change_type == StateChangeType::DocumentModified {
            self.is_modified = !self.executor.is_clean();
        }
        let mut change = StateChange::new(change_type, old_version, self.state_version);
        if let Some(region) = region {
            change = change.with_region(region);
        }
        for callback in &mut self.callbacks {
            callback(&change);
        }
    }

    /// Record the current state as saved.
    pub fn mark_saved(&mut self) {
        // Ignoring the result: MarkClean cannot fail.
        let _ = self.executor.execute(Command::History(HistoryCommand::MarkClean));
        self.is_modified = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::EditCommand;
    use std::sync::{Arc, Mutex};

    #[test]
    fn no_op_commands_keep_the_version() {
        let mut manager = EquationStateManager::empty();
        manager
            .execute(Command::Cursor(CursorCommand::MoveRight))
            .unwrap();
        assert_eq!(manager.version(), 0);
        assert!(!manager.has_changed_since(0));
    }

    #[test]
    fn changes_are_versioned_and_published() {
        let mut manager = EquationStateManager::empty();
        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&changes);
        manager.subscribe(move |change| sink.lock().unwrap().push(change.clone()));

        manager
            .execute(Command::Edit(EditCommand::InsertText {
                text: "xy".to_string(),
            }))
            .unwrap();
        manager
            .execute(Command::Cursor(CursorCommand::MoveLeft))
            .unwrap();
        manager
            .execute(Command::Cursor(CursorCommand::SelectAll))
            .unwrap();

        let changes = changes.lock().unwrap();
        let kinds: Vec<_> = changes.iter().map(|c| c.change_type).collect();
        assert_eq!(
            kinds,
            vec![
                StateChangeType::DocumentModified,
                StateChangeType::CursorMoved,
                StateChangeType::SelectionChanged,
            ]
        );
        assert_eq!(changes[2].old_version, 2);
        assert_eq!(changes[2].new_version, 3);
        assert!(manager.get_document_state().is_modified);
        assert_eq!(manager.get_cursor_state().selection, Some(Selection::new(0, 1)));
    }

    #[test]
    fn saving_clears_modified() {
        let mut manager = EquationStateManager::empty();
        manager
            .execute(Command::Edit(EditCommand::InsertText {
                text: "1".to_string(),
            }))
            .unwrap();
        manager.mark_saved();
        assert!(!manager.get_document_state().is_modified);
        assert!(!manager.get_undo_redo_state().can_redo);
        assert!(manager.get_undo_redo_state().can_undo);
    }
}
