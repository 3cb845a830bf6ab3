#![warn(missing_docs)]
//! Mathsheet - A Headless Math Worksheet
//!
//! # Overview
//!
//! `mathsheet` ties the workspace together. An [`Equation`] is an editable
//! [`Document`](mathsheet_core::Document) that compiles itself and accepts evaluated
//! results; a [`Worksheet`] keeps equations in reading order and evaluates them on a
//! background worker, discarding results that arrive after their equation was edited.
//!
//! # Crates
//!
//! - `mathsheet-lang` - symbol catalog and operator display
//! - `mathsheet-core` - token model, editing, cursor, layout, result splicing
//! - `mathsheet-compiler` - tokens to expression tree and dependency metadata
//! - `mathsheet-exec` - values, interpreter and evaluation worker
//!
//! # Quick Start
//!
//! ```rust
//! use mathsheet::{EquationStatus, MathsheetConfig, Worksheet};
//!
//! let mut sheet = Worksheet::new(MathsheetConfig::default()).unwrap();
//! sheet.add_text("a:3").unwrap();
//! let sum = sheet.add_text("2a+1").unwrap();
//! sheet.recalculate().unwrap();
//!
//! let equation = sheet.equation(sum).unwrap();
//! assert_eq!(equation.status(), &EquationStatus::Ok);
//! assert_eq!(equation.result_string(), Some("7"));
//! ```

pub mod config;
pub mod equation;
pub mod error;
pub mod worksheet;

pub use config::MathsheetConfig;
pub use equation::{Equation, EquationStatus};
pub use error::{ConfigError, WorksheetError};
pub use worksheet::{WORKSHEET_VERSION, Worksheet, WorksheetRecord};

pub use mathsheet_compiler::{CompileError, CompiledEquation};
pub use mathsheet_core::{Command, Construct, Document};
pub use mathsheet_exec::{EquationId, Value};
