//! Evaluation worker.
//!
//! One background thread owns the [`Interpreter`] and runs submissions strictly in the order
//! they arrive. Requests and responses travel over `std::sync::mpsc` channels; dropping the
//! [`Worker`] stops the thread and waits for it.

use crate::error::{EvalError, WorkerError};
use crate::interp::Interpreter;
use crate::value::Value;
use mathsheet_compiler::{CompiledEquation, Statement};
use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Stack of the evaluation thread. Deep enough that a runaway recursion stops at
/// [`crate::MAX_CALL_DEPTH`] before the stack runs out, in unoptimized builds too.
pub const WORKER_STACK_SIZE: usize = 256 * 1024 * 1024;

/// Identifies one equation of a worksheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EquationId(pub u64);

impl fmt::Display for EquationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A compiled equation queued for evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    /// Equation the result belongs to.
    pub equation: EquationId,
    /// Edit generation of the equation when it was submitted.
    pub generation: u64,
    /// What to run.
    pub program: CompiledEquation,
    /// Names that must already have values.
    pub free_variables: BTreeSet<String>,
    /// Functions that must already exist.
    pub called_functions: BTreeSet<String>,
    /// Send the value back, not just the error status.
    pub wants_result: bool,
    /// The equation asked for a symbolic answer (it holds a limit).
    pub force_symbolic: bool,
}

impl Submission {
    /// A submission that wants its result, with the name sets taken from `program`.
    pub fn new(equation: EquationId, generation: u64, program: CompiledEquation) -> Self {
        Self {
            equation,
            generation,
            free_variables: program.free_variables.clone(),
            called_functions: program.called_functions.clone(),
            program,
            wants_result: true,
            force_symbolic: false,
        }
    }
}

/// The outcome of one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Equation the result belongs to.
    pub equation: EquationId,
    /// Generation copied from the submission.
    pub generation: u64,
    /// The value, when one was wanted and produced.
    pub value: Option<Value>,
    /// Error text when evaluation failed.
    pub error: Option<String>,
    /// The value is a symbolic expression rather than a number.
    pub is_symbolic: bool,
}

#[derive(Debug)]
/// Messages sent to the worker thread.
enum Request {
    Evaluate(Box<Submission>),
    Forget(String),
    Reset,
    Shutdown,
}

/// Handle to the evaluation thread.
#[derive(Debug)]
pub struct Worker {
    tx: mpsc::Sender<Request>,
    rx: mpsc::Receiver<Response>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Start the worker thread with an empty namespace.
    pub fn spawn() -> Result<Self, WorkerError> {
        let (tx_req, rx_req) = mpsc::channel::<Request>();
        let (tx_resp, rx_resp) = mpsc::channel::<Response>();
        let handle = thread::Builder::new()
            .name("mathsheet-eval".to_string())
            .stack_size(WORKER_STACK_SIZE)
            .spawn(move || worker_loop(rx_req, tx_resp))?;
        tracing::debug!("evaluation worker started");
        Ok(Self {
            tx: tx_req,
            rx: rx_resp,
            handle: Some(handle),
        })
    }

    fn send(&self, request: Request) -> Result<(), WorkerError> {
        self.tx.send(request).map_err(|_| WorkerError::Disconnected)
    }

    /// Queue a submission.
    pub fn submit(&self, submission: Submission) -> Result<(), WorkerError> {
        tracing::debug!(
            equation = %submission.equation,
            generation = submission.generation,
            "submitting equation"
        );
        self.send(Request::Evaluate(Box::new(submission)))
    }

    /// Remove a variable or function from the namespace, after the queued work.
    pub fn forget(&self, name: impl Into<String>) -> Result<(), WorkerError> {
        self.send(Request::Forget(name.into()))
    }

    /// Empty the namespace, after the queued work.
    pub fn reset(&self) -> Result<(), WorkerError> {
        self.send(Request::Reset)
    }

    /// The next response if one is ready.
    pub fn try_recv(&self) -> Result<Option<Response>, WorkerError> {
        match self.rx.try_recv() {
            Ok(response) => Ok(Some(response)),
            Err(mpsc::TryRecvError::Empty) => Ok(None),
            Err(mpsc::TryRecvError::Disconnected) => Err(WorkerError::Disconnected),
        }
    }

    /// Wait for the next response.
    pub fn recv(&self) -> Result<Response, WorkerError> {
        self.rx.recv().map_err(|_| WorkerError::Disconnected)
    }

    /// Wait up to `timeout` for the next response.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Response>, WorkerError> {
        match self.rx.recv_timeout(timeout) {
            Ok(response) => Ok(Some(response)),
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(WorkerError::Disconnected),
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // The thread may already be gone; nothing to report then.
        let _ = self.tx.send(Request::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn worker_loop(rx: mpsc::Receiver<Request>, tx: mpsc::Sender<Response>) {
    let mut interpreter = Interpreter::new();
    for request in rx {
        match request {
            Request::Evaluate(submission) => {
                let response = isolated(&submission, || evaluate(&mut interpreter, &submission));
                if tx.send(response).is_err() {
                    break;
                }
            }
            Request::Forget(name) => {
                interpreter.namespace_mut().forget(&name);
            }
            Request::Reset => interpreter.namespace_mut().clear(),
            Request::Shutdown => break,
        }
    }
    tracing::debug!("evaluation worker stopped");
}

/// Run `f`, turning a panic into an error response for `submission`.
///
/// The namespace is only written once an equation has finished, so the worker keeps serving
/// later submissions with it.
fn isolated(submission: &Submission, f: impl FnOnce() -> Response) -> Response {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let err = EvalError::Internal(panic_message(payload.as_ref()).to_string());
        tracing::error!(equation = %submission.equation, error = %err, "evaluation panicked");
        Response {
            equation: submission.equation,
            generation: submission.generation,
            value: None,
            error: Some(err.to_string()),
            is_symbolic: false,
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("evaluation panicked")
}

/// Check that every name the equation reads or calls exists.
fn check_names(interpreter: &Interpreter, submission: &Submission) -> Result<(), EvalError> {
    // A definition only needs its names when it is called.
    if let Statement::Define { .. } = submission.program.statement {
        return Ok(());
    }
    let namespace = interpreter.namespace();
    if let Some(name) = submission
        .free_variables
        .iter()
        .find(|name| !namespace.is_readable(name))
    {
        return Err(EvalError::UndefinedVariable(name.clone()));
    }
    let defining = submission.program.defined_function.as_deref();
    if let Some(name) = submission
        .called_functions
        .iter()
        .find(|name| !namespace.is_callable(name) && defining != Some(name.as_str()))
    {
        return Err(EvalError::UnknownFunction(name.clone()));
    }
    Ok(())
}

/// Run one submission against `interpreter` and build its response.
pub fn evaluate(interpreter: &mut Interpreter, submission: &Submission) -> Response {
    let outcome = check_names(interpreter, submission)
        .and_then(|()| interpreter.run(&submission.program))
        .map_err(|err| match err {
            EvalError::UndefinedVariable(name) if submission.force_symbolic => {
                EvalError::SymbolicUnavailable(format!("'{name}' has no value"))
            }
            other => other,
        });
    let (value, error) = match outcome {
        Ok(value) => {
            tracing::debug!(equation = %submission.equation, "evaluated");
            (value.filter(|_| submission.wants_result), None)
        }
        Err(err) => {
            tracing::debug!(equation = %submission.equation, error = %err, "evaluation failed");
            (None, Some(err.to_string()))
        }
    };
    Response {
        equation: submission.equation,
        generation: submission.generation,
        value,
        error,
        is_symbolic: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mathsheet_core::Document;

    fn submission(text: &str) -> Submission {
        let mut doc = Document::new();
        doc.insert_text(text).unwrap();
        let program = mathsheet_compiler::compile(doc.tokens()).unwrap();
        Submission::new(EquationId(7), 3, program)
    }

    #[test]
    fn a_panic_becomes_an_error_response() {
        let submission = submission("1+1");
        let response = isolated(&submission, || -> Response { panic!("cell out of range") });
        assert_eq!(response.equation, EquationId(7));
        assert_eq!(response.generation, 3);
        assert_eq!(response.value, None);
        assert_eq!(
            response.error.as_deref(),
            Some("internal error: cell out of range")
        );

        let mut interpreter = Interpreter::new();
        let response = isolated(&submission, || evaluate(&mut interpreter, &submission));
        assert_eq!(response.value, Some(Value::real(2.0)));
    }

    #[test]
    fn formatted_panics_keep_their_message() {
        let submission = submission("2");
        let row = 4;
        let response = isolated(&submission, || -> Response { panic!("row {row} missing") });
        assert_eq!(response.error.as_deref(), Some("internal error: row 4 missing"));
    }
}
