//! Fixed-cadence driver that steps a model to its end time and samples it.

use tracing::{debug, info};

use crate::config::Config;
use crate::error::ClassResult;
use crate::model::MixedLayerModel;
use crate::output::ClassOutput;
use crate::variables::{DiagnosticVariable, OutputVariable};

/// Default sampling interval (s).
pub const DEFAULT_OUTPUT_FREQUENCY: f64 = 600.0;

/// What to record and how often.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Sampling interval (s); must be a whole multiple of `dt`.
    pub freq: f64,
    pub variables: Vec<OutputVariable>,
    pub diagnostics: Vec<DiagnosticVariable>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            freq: DEFAULT_OUTPUT_FREQUENCY,
            variables: OutputVariable::ALL.to_vec(),
            diagnostics: Vec::new(),
        }
    }
}

impl RunOptions {
    pub fn with_freq(mut self, freq: f64) -> Self {
        self.freq = freq;
        self
    }

    pub fn with_variables(mut self, variables: Vec<OutputVariable>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Vec<DiagnosticVariable>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Record every diagnostic quantity.
    pub fn with_all_diagnostics(self) -> Self {
        self.with_diagnostics(DiagnosticVariable::ALL.to_vec())
    }
}

/// Build a model from `config` and run it to `runtime`.
///
/// # Errors
///
/// Returns a configuration error for an invalid `config` or `freq`, and the
/// first domain error hit while stepping.
pub fn run_class(config: &Config, options: &RunOptions) -> ClassResult<ClassOutput> {
    let mut model = MixedLayerModel::new(config.clone())?;
    drive(&mut model, options)
}

/// Step `model` from its current time to its end time, sampling every
/// `options.freq` seconds.
///
/// The current state is always the first sample. Cadence is counted from
/// `t = 0`, so a model resumed mid-run keeps the same sample times as one
/// run from the start.
///
/// # Errors
///
/// Same as [`run_class`].
pub fn drive(model: &mut MixedLayerModel, options: &RunOptions) -> ClassResult<ClassOutput> {
    let time = model.config().time_control;
    let cadence = time.steps_per_sample(options.freq)?;
    let total = time.step_count();
    let taken = (model.t() / time.dt).round() as u64;

    info!(
        "Running {} of {} steps, sampling every {} step(s)",
        total.saturating_sub(taken),
        total,
        cadence
    );

    let mut output = ClassOutput::new(options.variables.clone(), options.diagnostics.clone());
    output.record(model)?;

    for step in (taken + 1)..=total {
        model.update()?;
        if step % cadence == 0 {
            output.record(model)?;
            debug!("Sampled t={:.0}s h={:.2}m", model.t(), model.h());
        }
    }

    info!(
        "Run finished at t={:.0}s with {} samples",
        model.t(),
        output.len()
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClassError, DomainError};
    use approx::assert_relative_eq;

    fn hour_config() -> Config {
        let mut config = Config::default();
        config.time_control.runtime = 3600.0;
        config
    }

    #[test]
    fn default_cadence_samples_every_ten_minutes() {
        let output = run_class(&hour_config(), &RunOptions::default()).unwrap();
        assert_eq!(output.len(), 7);
        assert_eq!(output.times(), &[0.0, 600.0, 1200.0, 1800.0, 2400.0, 3000.0, 3600.0]);
    }

    #[test]
    fn first_sample_is_initial_state() {
        let output = run_class(&hour_config(), &RunOptions::default().with_freq(60.0)).unwrap();
        assert_eq!(output.len(), 61);
        assert_eq!(output.column(OutputVariable::H).unwrap()[0], 200.0);
        assert_eq!(output.column(OutputVariable::DQ).unwrap()[0], -0.001);
    }

    #[test]
    fn runtime_not_multiple_of_dt_overshoots_once() {
        let mut config = hour_config();
        config.time_control.runtime = 90.0;
        let output = run_class(&config, &RunOptions::default().with_freq(60.0)).unwrap();
        assert_eq!(output.times(), &[0.0, 60.0, 120.0]);
    }

    #[test]
    fn zero_runtime_records_only_initial_state() {
        let mut config = hour_config();
        config.time_control.runtime = 0.0;
        let output = run_class(&config, &RunOptions::default()).unwrap();
        assert_eq!(output.len(), 1);
    }

    #[test]
    fn rejects_frequency_off_the_step_grid() {
        let err = run_class(&hour_config(), &RunOptions::default().with_freq(90.0)).unwrap_err();
        assert!(matches!(err, ClassError::Configuration { .. }));
    }

    #[test]
    fn domain_error_aborts_the_run() {
        let mut config = hour_config();
        config.initial_state.dtheta_0 = 0.0;
        config.initial_state.dq_0 = 0.0;
        let err = run_class(&config, &RunOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            ClassError::Domain(DomainError::VanishingVirtualJump)
        ));
    }

    #[test]
    fn resumed_model_keeps_sample_times() {
        let mut model = MixedLayerModel::new(hour_config()).unwrap();
        for _ in 0..5 {
            model.update().unwrap();
        }
        let output = drive(&mut model, &RunOptions::default()).unwrap();
        assert_eq!(output.times()[0], 300.0);
        assert_eq!(output.times()[1], 600.0);
        assert_relative_eq!(*output.times().last().unwrap(), 3600.0, epsilon = 1e-9);
    }

    #[test]
    fn diagnostics_are_recorded_alongside() {
        let options = RunOptions::default().with_all_diagnostics();
        let output = run_class(&hour_config(), &options).unwrap();
        let we = output.diagnostic(DiagnosticVariable::We).unwrap();
        assert_eq!(we.len(), output.len());
        assert!(we.iter().all(|w| *w >= 0.0));
    }
}
