#![warn(missing_docs)]
//! Mathsheet Exec - Execution Bridge
//!
//! # Overview
//!
//! `mathsheet-exec` runs what `mathsheet-compiler` produces. Compiled equations are
//! interpreted as data against a namespace that lives on one worker thread; there is no
//! `eval` of generated source anywhere.
//!
//! # Core Features
//!
//! - **Value Model**: real and complex scalars, strings, 1-D and 2-D matrices and arrays
//! - **Interpreter**: operators, builtins, user functions, program blocks, index loops
//! - **Numeric Calculus**: Simpson quadrature, central differences, one-sided limits
//! - **Worker**: FIFO evaluation thread with `(equation, generation)` tagged responses
//!
//! # Quick Start
//!
//! ```rust
//! use mathsheet_core::Document;
//! use mathsheet_exec::{EquationId, Submission, Value, Worker};
//!
//! let worker = Worker::spawn().unwrap();
//!
//! let mut doc = Document::new();
//! doc.insert_text("2+3").unwrap();
//! let compiled = mathsheet_compiler::compile(doc.tokens()).unwrap();
//! worker.submit(Submission::new(EquationId(1), 0, compiled)).unwrap();
//!
//! let response = worker.recv().unwrap();
//! assert_eq!(response.value, Some(Value::real(5.0)));
//! ```
//!
//! # Module Description
//!
//! - [`value`] - Runtime values and grids
//! - [`ops`] - Operators on values
//! - [`builtins`] - Built-in functions and constants
//! - [`numeric`] - Integrals, derivatives and limits
//! - [`interp`] - The tree interpreter and its namespace
//! - [`worker`] - The evaluation thread
//! - [`error`] - Error types

pub mod builtins;
pub mod error;
pub mod interp;
pub mod numeric;
pub mod ops;
pub mod value;
pub mod worker;

pub use error::{EvalError, WorkerError};
pub use interp::{Function, Interpreter, MAX_CALL_DEPTH, Namespace};
pub use value::{Grid, GridKind, Shape, Value};
pub use worker::{EquationId, Response, Submission, Worker, evaluate};
