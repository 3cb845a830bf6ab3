//! A worksheet: equations in reading order plus the evaluation worker.
//!
//! [`Worksheet::evaluate`] clears the worker's namespace and submits every complete
//! equation top to bottom. The worker answers in the same order; responses are matched back
//! to their equation by id and generation, and anything stale is dropped.

use crate::config::MathsheetConfig;
use crate::equation::Equation;
use crate::error::WorksheetError;
use mathsheet_core::{Command, CommandResult, Document, DocumentRecord};
use mathsheet_exec::{EquationId, Response, Worker};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Saved worksheet version.
pub const WORKSHEET_VERSION: u32 = 1;

/// Saved form of a worksheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorksheetRecord {
    /// Format version.
    pub version: u32,
    /// Equations in reading order.
    pub equations: Vec<DocumentRecord>,
}

/// Many equations evaluated by one background worker.
#[derive(Debug)]
pub struct Worksheet {
    config: MathsheetConfig,
    equations: Vec<Equation>,
    next_id: u64,
    worker: Worker,
    in_flight: VecDeque<(EquationId, u64)>,
}

impl Worksheet {
    /// An empty worksheet with its own worker thread.
    pub fn new(config: MathsheetConfig) -> Result<Self, WorksheetError> {
        let in_flight = VecDeque::with_capacity(config.worker_queue_capacity_hint);
        Ok(Self {
            config,
            equations: Vec::new(),
            next_id: 1,
            worker: Worker::spawn()?,
            in_flight,
        })
    }

    /// Configuration.
    pub fn config(&self) -> &MathsheetConfig {
        &self.config
    }

    /// Equations in reading order.
    pub fn equations(&self) -> &[Equation] {
        &self.equations
    }

    /// Look up an equation.
    pub fn equation(&self, id: EquationId) -> Option<&Equation> {
        self.equations.iter().find(|eq| eq.id() == id)
    }

    fn equation_mut(&mut self, id: EquationId) -> Result<&mut Equation, WorksheetError> {
        self.equations
            .iter_mut()
            .find(|eq| eq.id() == id)
            .ok_or(WorksheetError::UnknownEquation(id))
    }

    /// Submissions still waiting for a response.
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    fn allocate_id(&mut self) -> EquationId {
        let id = EquationId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Append an empty equation.
    pub fn add_equation(&mut self) -> EquationId {
        let id = self.allocate_id();
        self.equations.push(Equation::new(id, &self.config));
        tracing::debug!(equation = %id, "added equation");
        id
    }

    /// Append an equation typed as text, e.g. `"a:3"` or `"2a+1"`.
    pub fn add_text(&mut self, text: &str) -> Result<EquationId, WorksheetError> {
        let id = self.add_equation();
        self.equation_mut(id)?.type_text(text)?;
        Ok(id)
    }

    /// Append an existing document.
    pub fn add_document(&mut self, document: Document) -> EquationId {
        let id = self.allocate_id();
        self.equations.push(Equation::from_document(id, document));
        id
    }

    /// Run an editing command on one equation.
    pub fn execute(
        &mut self,
        id: EquationId,
        command: Command,
    ) -> Result<CommandResult, WorksheetError> {
        Ok(self.equation_mut(id)?.execute(command)?)
    }

    /// Remove an equation and forget the name it assigned or defined.
    pub fn remove_equation(&mut self, id: EquationId) -> Result<Equation, WorksheetError> {
        let position = self
            .equations
            .iter()
            .position(|eq| eq.id() == id)
            .ok_or(WorksheetError::UnknownEquation(id))?;
        let equation = self.equations.remove(position);
        if let Some(name) = equation.compiled().and_then(|c| c.provides()) {
            self.worker.forget(name)?;
        }
        tracing::debug!(equation = %id, "removed equation");
        Ok(equation)
    }

    /// Recompute the whole worksheet.
    ///
    /// Returns how many equations were submitted. Incomplete equations and syntax errors
    /// are skipped and keep their status.
    pub fn evaluate(&mut self) -> Result<usize, WorksheetError> {
        self.worker.reset()?;
        let mut submitted = 0;
        for equation in &mut self.equations {
            let Some(submission) = equation.submission() else {
                continue;
            };
            tracing::debug!(
                equation = %submission.equation,
                generation = submission.generation,
                "submitting"
            );
            self.in_flight
                .push_back((submission.equation, submission.generation));
            self.worker.submit(submission)?;
            submitted += 1;
        }
        Ok(submitted)
    }

    /// Apply every response that has already arrived. Returns how many were applied.
    pub fn poll(&mut self) -> Result<usize, WorksheetError> {
        let mut applied = 0;
        while let Some(response) = self.worker.try_recv()? {
            applied += usize::from(self.apply(response)?);
        }
        Ok(applied)
    }

    /// Block until every submission has been answered. Returns how many were applied.
    pub fn wait(&mut self) -> Result<usize, WorksheetError> {
        let mut applied = 0;
        while !self.in_flight.is_empty() {
            let response = self.worker.recv()?;
            applied += usize::from(self.apply(response)?);
        }
        Ok(applied)
    }

    /// Evaluate and wait for every result.
    pub fn recalculate(&mut self) -> Result<usize, WorksheetError> {
        self.evaluate()?;
        self.wait()
    }

    fn apply(&mut self, response: Response) -> Result<bool, WorksheetError> {
        if let Some(position) = self
            .in_flight
            .iter()
            .position(|&entry| entry == (response.equation, response.generation))
        {
            self.in_flight.remove(position);
        }
        let digits = self.config.significant_digits;
        let Some(equation) = self
            .equations
            .iter_mut()
            .find(|eq| eq.id() == response.equation)
        else {
            tracing::warn!(
                equation = %response.equation,
                "discarding result of a removed equation"
            );
            return Ok(false);
        };
        if !equation.apply(&response, digits)? {
            tracing::warn!(
                equation = %response.equation,
                generation = response.generation,
                current = equation.generation(),
                "discarding stale result"
            );
            return Ok(false);
        }
        Ok(true)
    }

    /// Saved form of the worksheet.
    pub fn to_record(&self) -> WorksheetRecord {
        WorksheetRecord {
            version: WORKSHEET_VERSION,
            equations: self
                .equations
                .iter()
                .map(|eq| eq.document().to_record())
                .collect(),
        }
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, WorksheetError> {
        Ok(serde_json::to_string_pretty(&self.to_record())?)
    }

    /// Load a worksheet saved with [`Worksheet::to_json`].
    pub fn from_json(json: &str, config: MathsheetConfig) -> Result<Self, WorksheetError> {
        let record: WorksheetRecord = serde_json::from_str(json)?;
        if record.version > WORKSHEET_VERSION {
            tracing::warn!(version = record.version, "worksheet saved by a newer version");
        }
        let mut worksheet = Self::new(config)?;
        for equation in record.equations {
            let mut document = equation.into_document()?;
            document.set_operator_style(worksheet.config.operator_style());
            worksheet.add_document(document);
        }
        Ok(worksheet)
    }
}
