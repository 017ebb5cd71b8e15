//! Sampled model output and its CSV/JSON writers.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::error::{ClassResult, DomainError};
use crate::model::MixedLayerModel;
use crate::variables::{DiagnosticVariable, OutputVariable};

/// Column-oriented time series collected by the runner.
///
/// Serializes as `{"t": [...], "<var>": [...], ...}` with the requested
/// output variables first and diagnostics after them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassOutput {
    variables: Vec<OutputVariable>,
    diagnostics: Vec<DiagnosticVariable>,
    t: Vec<f64>,
    values: Vec<Vec<f64>>,
    diagnostic_values: Vec<Vec<f64>>,
}

impl ClassOutput {
    pub fn new(variables: Vec<OutputVariable>, diagnostics: Vec<DiagnosticVariable>) -> Self {
        let values = vec![Vec::new(); variables.len()];
        let diagnostic_values = vec![Vec::new(); diagnostics.len()];
        Self {
            variables,
            diagnostics,
            t: Vec::new(),
            values,
            diagnostic_values,
        }
    }

    /// Append the current state of `model` as one sample.
    ///
    /// # Errors
    ///
    /// Fails only when diagnostics are requested and cannot be evaluated for
    /// the current state. Nothing is appended in that case.
    pub fn record(&mut self, model: &MixedLayerModel) -> Result<(), DomainError> {
        if !self.diagnostics.is_empty() {
            let diag = model.diagnostics()?;
            for (column, var) in self.diagnostic_values.iter_mut().zip(&self.diagnostics) {
                column.push(diag.get(*var));
            }
        }
        self.t.push(model.t());
        for (column, var) in self.values.iter_mut().zip(&self.variables) {
            column.push(model.value(*var));
        }
        Ok(())
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.t
    }

    pub fn variables(&self) -> &[OutputVariable] {
        &self.variables
    }

    pub fn diagnostic_variables(&self) -> &[DiagnosticVariable] {
        &self.diagnostics
    }

    /// Samples of `var`, or `None` if it was not requested.
    pub fn column(&self, var: OutputVariable) -> Option<&[f64]> {
        self.variables
            .iter()
            .position(|v| *v == var)
            .map(|i| self.values[i].as_slice())
    }

    pub fn diagnostic(&self, var: DiagnosticVariable) -> Option<&[f64]> {
        self.diagnostics
            .iter()
            .position(|v| *v == var)
            .map(|i| self.diagnostic_values[i].as_slice())
    }

    /// Column headers in output order, starting with `t`.
    pub fn headers(&self) -> Vec<&'static str> {
        std::iter::once("t")
            .chain(self.variables.iter().copied().map(OutputVariable::key))
            .chain(self.diagnostics.iter().copied().map(DiagnosticVariable::key))
            .collect()
    }

    fn columns(&self) -> impl Iterator<Item = &Vec<f64>> {
        std::iter::once(&self.t)
            .chain(self.values.iter())
            .chain(self.diagnostic_values.iter())
    }

    /// Write one header row and one row per sample.
    ///
    /// # Errors
    ///
    /// Propagates any I/O error from `writer`.
    pub fn write_csv<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writeln!(writer, "{}", self.headers().join(","))?;

        let columns: Vec<&Vec<f64>> = self.columns().collect();
        for row in 0..self.len() {
            let line: Vec<String> = columns.iter().map(|col| col[row].to_string()).collect();
            writeln!(writer, "{}", line.join(","))?;
        }
        Ok(())
    }

    /// Write CSV to a file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ClassError::Io`] if the file cannot be created or written.
    pub fn write_csv_file<P: AsRef<Path>>(&self, path: P) -> ClassResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_csv(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Write pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ClassError::Parse`] if serialization fails and
    /// [`crate::ClassError::Io`] if the writer does.
    pub fn write_json<W: Write>(&self, writer: &mut W) -> ClassResult<()> {
        serde_json::to_writer_pretty(&mut *writer, self)?;
        writeln!(writer)?;
        Ok(())
    }

    /// Write JSON to a file at the given path.
    ///
    /// # Errors
    ///
    /// Same as [`ClassOutput::write_json`], plus file creation failures.
    pub fn write_json_file<P: AsRef<Path>>(&self, path: P) -> ClassResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_json(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

impl Serialize for ClassOutput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = 1 + self.values.len() + self.diagnostic_values.len();
        let mut map = serializer.serialize_map(Some(len))?;
        for (key, column) in self.headers().into_iter().zip(self.columns()) {
            map.serialize_entry(key, column)?;
        }
        map.end()
    }
}
