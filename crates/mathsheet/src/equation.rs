//! One equation of a worksheet.
//!
//! An [`Equation`] wraps the editable document with its command history and adds what
//! evaluation needs: an id, an edit generation that advances on every change to the tokens,
//! the last compiled form and an [`EquationStatus`].

use crate::config::MathsheetConfig;
use mathsheet_compiler::{CompileError, CompiledEquation, compile};
use mathsheet_core::{
    Command, CommandError, CommandResult, Document, EditCommand, EquationStateManager,
    MonospaceMeasurer, ResultCommand,
};
use mathsheet_exec::{EquationId, Response, Submission};
use std::fmt;
use std::sync::Arc;

/// Outcome of the last compile or evaluation of an equation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EquationStatus {
    /// Compiled, and evaluated without error if it was submitted.
    #[default]
    Ok,
    /// A placeholder is left; nothing was submitted.
    Incomplete,
    /// The tokens do not form an equation.
    SyntaxError(String),
    /// Evaluation failed.
    RuntimeError(String),
}

impl EquationStatus {
    /// The error message, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            EquationStatus::SyntaxError(message) | EquationStatus::RuntimeError(message) => {
                Some(message)
            }
            EquationStatus::Ok | EquationStatus::Incomplete => None,
        }
    }
}

impl fmt::Display for EquationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EquationStatus::Ok => f.write_str("ok"),
            EquationStatus::Incomplete => f.write_str("incomplete"),
            EquationStatus::SyntaxError(message) => write!(f, "syntax error: {message}"),
            EquationStatus::RuntimeError(message) => write!(f, "error: {message}"),
        }
    }
}

/// An editable equation that can be submitted for evaluation.
#[derive(Debug)]
pub struct Equation {
    id: EquationId,
    state: EquationStateManager,
    generation: u64,
    status: EquationStatus,
    compiled: Option<CompiledEquation>,
    pending: bool,
}

impl Equation {
    /// An empty equation laid out with `config`.
    pub fn new(id: EquationId, config: &MathsheetConfig) -> Self {
        let mut document =
            Document::with_config(config.layout_config(), Arc::new(MonospaceMeasurer));
        document.set_operator_style(config.operator_style());
        Self::from_document(id, document)
    }

    /// Wrap an existing document, such as one loaded from a file.
    pub fn from_document(id: EquationId, document: Document) -> Self {
        Self {
            id,
            state: EquationStateManager::new(document),
            generation: 0,
            status: EquationStatus::Ok,
            compiled: None,
            pending: false,
        }
    }

    /// Worksheet id.
    pub fn id(&self) -> EquationId {
        self.id
    }

    /// The document.
    pub fn document(&self) -> &Document {
        self.state.document()
    }

    /// Versioned editing state, for frontends that subscribe to changes.
    pub fn state(&self) -> &EquationStateManager {
        &self.state
    }

    /// Mutable editing state.
    pub fn state_mut(&mut self) -> &mut EquationStateManager {
        &mut self.state
    }

    /// Edit generation: how many times the tokens have changed.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Last status.
    pub fn status(&self) -> &EquationStatus {
        &self.status
    }

    /// The last successful compile, if it is still current.
    pub fn compiled(&self) -> Option<&CompiledEquation> {
        self.compiled.as_ref()
    }

    /// Submitted and waiting for its response.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Code text of the compiled equation.
    pub fn code(&self) -> Option<String> {
        self.compiled.as_ref().map(ToString::to_string)
    }

    /// Shown result text.
    pub fn result_string(&self) -> Option<&str> {
        self.document().result_string()
    }

    /// Execute an editing command.
    ///
    /// Any change to the tokens advances the generation, so a response to an earlier
    /// submission is recognized as stale. Cursor and result commands leave it alone.
    pub fn execute(&mut self, command: Command) -> Result<CommandResult, CommandError> {
        let edits = !matches!(command, Command::Cursor(_) | Command::Result(_));
        let version = self.state.version();
        let result = self.state.execute(command)?;
        if edits && self.state.has_changed_since(version) {
            self.generation += 1;
            self.compiled = None;
            self.pending = false;
            self.status = EquationStatus::Ok;
            tracing::debug!(equation = %self.id, generation = self.generation, "equation edited");
        }
        Ok(result)
    }

    /// Type text at the caret.
    pub fn type_text(&mut self, text: &str) -> Result<CommandResult, CommandError> {
        self.execute(Command::Edit(EditCommand::InsertText {
            text: text.to_string(),
        }))
    }

    /// Compile the current tokens and record the status.
    ///
    /// Returns `None` when the equation is incomplete or does not parse.
    pub fn compile(&mut self) -> Option<&CompiledEquation> {
        match compile(self.document().tokens()) {
            Ok(compiled) => {
                self.status = EquationStatus::Ok;
                self.compiled = Some(compiled);
            }
            Err(CompileError::Incomplete { index }) => {
                tracing::debug!(equation = %self.id, index, "equation is incomplete");
                self.status = EquationStatus::Incomplete;
                self.compiled = None;
            }
            Err(err) => {
                tracing::debug!(equation = %self.id, error = %err, "equation does not compile");
                self.status = EquationStatus::SyntaxError(err.to_string());
                self.compiled = None;
            }
        }
        self.compiled.as_ref()
    }

    /// Compile and package the equation for the worker, marking it pending.
    pub fn submission(&mut self) -> Option<Submission> {
        let compiled = self.compile()?.clone();
        let mut submission = Submission::new(self.id, self.generation, compiled);
        submission.force_symbolic = self.document().flags().force_symbolic;
        self.pending = true;
        Some(submission)
    }

    /// Apply a worker response, splicing its value after the equation.
    ///
    /// Returns `false` without touching anything when the response belongs to an earlier
    /// generation.
    pub fn apply(&mut self, response: &Response, digits: usize) -> Result<bool, CommandError> {
        if response.equation != self.id || response.generation != self.generation {
            return Ok(false);
        }
        self.pending = false;
        let command = match (&response.value, &response.error) {
            (_, Some(message)) => {
                self.status = EquationStatus::RuntimeError(message.clone());
                ResultCommand::Delete
            }
            (Some(value), None) => {
                self.status = EquationStatus::Ok;
                ResultCommand::Set {
                    value: value.to_result(),
                    digits,
                }
            }
            (None, None) => {
                self.status = EquationStatus::Ok;
                ResultCommand::Delete
            }
        };
        self.state.execute(Command::Result(command))?;
        Ok(true)
    }
}
