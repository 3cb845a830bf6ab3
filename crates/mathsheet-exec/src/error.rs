//! Evaluation and worker errors.

use thiserror::Error;

/// Errors raised while running a compiled equation.
///
/// The worker reports them back as text; they mark one equation as failed and leave the rest
/// of the worksheet alone.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// A name that no equation has assigned.
    #[error("name '{0}' is not defined")]
    UndefinedVariable(String),

    /// A name used inside an index that no equation has assigned.
    #[error("index variable '{0}' is not defined")]
    UndefinedIndexVariable(String),

    /// Operands whose lengths or shapes do not line up.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Length the operation required.
        expected: usize,
        /// Length it got.
        found: usize,
    },

    /// An operand of the wrong kind.
    #[error("type error: {0}")]
    Type(String),

    /// A value outside a function's domain.
    #[error("math domain error: {0}")]
    Domain(String),

    /// A call to a function that is neither built in nor defined.
    #[error("function '{0}' is not defined")]
    UnknownFunction(String),

    /// A call with the wrong number of arguments.
    #[error("{function}() takes {expected} argument(s), {found} given")]
    Arity {
        /// Called function.
        function: String,
        /// Accepted argument count, as text (`"1"`, `"1 or 2"`).
        expected: String,
        /// Given argument count.
        found: usize,
    },

    /// A form that only a computer-algebra engine could answer.
    #[error("symbolic evaluation is not available: {0}")]
    SymbolicUnavailable(String),

    /// An index outside an array, or an index that is not a whole number.
    #[error("index error: {0}")]
    Index(String),

    /// The evaluator itself failed on this equation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EvalError {
    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        EvalError::Type(message.into())
    }

    pub(crate) fn domain(message: impl Into<String>) -> Self {
        EvalError::Domain(message.into())
    }

    pub(crate) fn index(message: impl Into<String>) -> Self {
        EvalError::Index(message.into())
    }
}

/// Errors talking to the evaluation worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The worker thread has stopped.
    #[error("evaluation worker disconnected")]
    Disconnected,

    /// The worker thread could not be started.
    #[error("failed to start evaluation worker: {0}")]
    Spawn(#[from] std::io::Error),
}
