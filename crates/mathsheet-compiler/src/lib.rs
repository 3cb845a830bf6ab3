#![warn(missing_docs)]
//! Mathsheet Compiler - Equation Tokens to Expression Trees
//!
//! # Overview
//!
//! `mathsheet-compiler` turns the token vector of one equation into a [`Statement`] the
//! evaluator can run, together with the names the statement reads, calls and assigns. The
//! worksheet uses that metadata to order equations and to tell which ones must be recomputed
//! after an edit.
//!
//! Compilation runs in two passes:
//!
//! ```text
//! tokens ──lex──▶ lexemes ──parse──▶ Statement + name sets
//! ```
//!
//! The lexer joins adjacent glyph tags into text runs and splits each run with a fixed table of
//! patterns; keywords pass through untouched. The parser is a recursive descent over lexemes
//! with one function per precedence level and one per construct.
//!
//! # Quick Start
//!
//! ```rust
//! use mathsheet_core::Document;
//!
//! let mut doc = Document::new();
//! doc.insert_text("2x+y").unwrap();
//!
//! let compiled = mathsheet_compiler::compile(doc.tokens()).unwrap();
//! assert_eq!(compiled.to_string(), "2 * x + y");
//! assert_eq!(compiled.free_variables.len(), 2);
//! ```

pub mod ast;
pub mod error;
pub mod lexer;
mod parser;

pub use ast::{
    BinaryOp, Block, Expr, FunctionBody, IndexItem, Intrinsic, ProgramStatement, SeriesKind,
    Statement, UnaryOp,
};
pub use error::CompileError;
pub use lexer::{Lexeme, Operator, Spanned, lex};

use mathsheet_core::Token;
use std::collections::BTreeSet;
use std::fmt;

/// A compiled equation and the names it touches.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledEquation {
    /// The statement to evaluate.
    pub statement: Statement,
    /// Variables read but not bound inside the equation.
    pub free_variables: BTreeSet<String>,
    /// User functions called.
    pub called_functions: BTreeSet<String>,
    /// Variable assigned with `:=`, if any.
    pub assignment: Option<String>,
    /// Function defined with `f(x) := ...`, if any.
    pub defined_function: Option<String>,
    /// Names read inside `[...]` that nothing binds, in order of first use.
    ///
    /// Each one must name an array when the equation runs; the equation is then evaluated once
    /// per element, in the manner of `y[i] := x[i]^2`.
    pub index_variables: Vec<String>,
}

impl CompiledEquation {
    /// Returns `true` when the statement contains a program block.
    pub fn is_program(&self) -> bool {
        match &self.statement {
            Statement::Program(_) | Statement::AssignProgram { .. } => true,
            Statement::Define { body, .. } => matches!(body, FunctionBody::Program(_)),
            _ => false,
        }
    }

    /// Everything another equation has to provide: free variables, index variables and
    /// called functions.
    pub fn dependencies(&self) -> BTreeSet<String> {
        self.free_variables
            .iter()
            .chain(&self.index_variables)
            .chain(&self.called_functions)
            .cloned()
            .collect()
    }

    /// The name this equation provides to later equations, if any.
    pub fn provides(&self) -> Option<&str> {
        self.assignment
            .as_deref()
            .or(self.defined_function.as_deref())
    }
}

impl fmt::Display for CompiledEquation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.statement.fmt(f)
    }
}

/// Compile an equation's tokens.
///
/// Tokens from the result span onwards are ignored. An equation that still holds a placeholder
/// fails with [`CompileError::Incomplete`].
pub fn compile(tokens: &[Token]) -> Result<CompiledEquation, CompileError> {
    let lexemes = lex(tokens)?;
    let compiled = parser::parse(&lexemes)?;
    tracing::debug!(
        statement = %compiled,
        free = ?compiled.free_variables,
        functions = ?compiled.called_functions,
        "compiled equation"
    );
    Ok(compiled)
}
