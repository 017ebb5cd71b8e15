//! Lightweight Basic Model Interface (BMI) adapter.
//!
//! Follows the BMI naming (<https://bmi.readthedocs.io>) with a few
//! deviations: values are returned instead of written into a destination
//! buffer, `initialize` takes a [`Config`] rather than a file name, and
//! [`BmiClass::run`] is an extra convenience method.

use tracing::debug;

use crate::config::Config;
use crate::error::ClassResult;
use crate::model::MixedLayerModel;
use crate::output::ClassOutput;
use crate::runner::{drive, RunOptions};
use crate::variables::OutputVariable;

/// Names returned by [`BmiLight::get_output_var_names`].
pub const OUTPUT_VAR_NAMES: [&str; 5] = ["h", "theta", "dtheta", "q", "dq"];

pub trait BmiLight {
    // Model control

    /// Replace the running model with a fresh one built from `config`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error; the previous model is kept in that case.
    fn initialize(&mut self, config: Config) -> ClassResult<()>;

    /// Advance the model by one time step.
    ///
    /// # Errors
    ///
    /// Returns a domain error if the step is undefined.
    fn update(&mut self) -> ClassResult<()>;

    // Model information

    fn get_component_name(&self) -> &'static str;
    fn get_output_item_count(&self) -> usize;
    fn get_output_var_names(&self) -> &'static [&'static str];

    // Variable information

    /// # Errors
    ///
    /// Returns [`crate::ClassError::UnknownVariable`] for names outside the output set.
    fn get_var_grid(&self, name: &str) -> ClassResult<i32>;

    /// # Errors
    ///
    /// Returns [`crate::ClassError::UnknownVariable`] for names outside the output set.
    fn get_var_type(&self, name: &str) -> ClassResult<&'static str>;

    /// # Errors
    ///
    /// Returns [`crate::ClassError::UnknownVariable`] for names outside the output set.
    fn get_var_location(&self, name: &str) -> ClassResult<&'static str>;

    // Time

    fn get_current_time(&self) -> f64;
    fn get_end_time(&self) -> f64;
    fn get_time_units(&self) -> &'static str;
    fn get_time_step(&self) -> f64;

    // Values

    /// Current value of an output variable.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ClassError::UnknownVariable`] for names outside the output set.
    fn get_value(&self, name: &str) -> ClassResult<f64>;

    // Grid

    fn get_grid_type(&self) -> &'static str;
}

/// BMI wrapper around a [`MixedLayerModel`].
#[derive(Debug, Clone, Default)]
pub struct BmiClass {
    model: MixedLayerModel,
}

impl BmiClass {
    /// # Errors
    ///
    /// Returns a configuration error if `config` is invalid.
    pub fn new(config: Config) -> ClassResult<Self> {
        Ok(Self {
            model: MixedLayerModel::new(config)?,
        })
    }

    pub fn model(&self) -> &MixedLayerModel {
        &self.model
    }

    /// Run the model to its end time and return samples every `freq` seconds.
    ///
    /// An empty `var_names` records every output variable.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ClassError::UnknownVariable`] for an unknown name, a
    /// configuration error for an invalid `freq`, or the first domain error.
    pub fn run(&mut self, freq: f64, var_names: &[&str]) -> ClassResult<ClassOutput> {
        let variables = if var_names.is_empty() {
            OutputVariable::ALL.to_vec()
        } else {
            var_names
                .iter()
                .map(|name| name.parse())
                .collect::<ClassResult<Vec<OutputVariable>>>()?
        };
        let options = RunOptions::default()
            .with_freq(freq)
            .with_variables(variables);
        drive(&mut self.model, &options)
    }
}

impl BmiLight for BmiClass {
    fn initialize(&mut self, config: Config) -> ClassResult<()> {
        debug!("BMI initialize: {}", config.name);
        self.model = MixedLayerModel::new(config)?;
        Ok(())
    }

    fn update(&mut self) -> ClassResult<()> {
        Ok(self.model.update()?)
    }

    fn get_component_name(&self) -> &'static str {
        "Chemistry Land-surface Atmosphere Soil Slab model"
    }

    fn get_output_item_count(&self) -> usize {
        OUTPUT_VAR_NAMES.len()
    }

    fn get_output_var_names(&self) -> &'static [&'static str] {
        &OUTPUT_VAR_NAMES
    }

    fn get_var_grid(&self, name: &str) -> ClassResult<i32> {
        name.parse::<OutputVariable>()?;
        Ok(1)
    }

    fn get_var_type(&self, name: &str) -> ClassResult<&'static str> {
        name.parse::<OutputVariable>()?;
        Ok("float")
    }

    fn get_var_location(&self, name: &str) -> ClassResult<&'static str> {
        name.parse::<OutputVariable>()?;
        Ok("node")
    }

    fn get_current_time(&self) -> f64 {
        self.model.t()
    }

    fn get_end_time(&self) -> f64 {
        self.model.end_time()
    }

    fn get_time_units(&self) -> &'static str {
        "s"
    }

    fn get_time_step(&self) -> f64 {
        self.model.time_step()
    }

    fn get_value(&self, name: &str) -> ClassResult<f64> {
        Ok(self.model.value(name.parse()?))
    }

    fn get_grid_type(&self) -> &'static str {
        "scalar"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClassError;

    #[test]
    fn returns_the_component_name() {
        let bmi = BmiClass::default();
        assert_eq!(
            bmi.get_component_name(),
            "Chemistry Land-surface Atmosphere Soil Slab model"
        );
    }

    #[test]
    fn exposes_fixed_output_set() {
        let bmi = BmiClass::default();
        assert_eq!(bmi.get_output_item_count(), 5);
        assert_eq!(bmi.get_output_var_names(), &["h", "theta", "dtheta", "q", "dq"]);
        for name in bmi.get_output_var_names() {
            assert_eq!(bmi.get_var_grid(name).unwrap(), 1);
            assert_eq!(bmi.get_var_type(name).unwrap(), "float");
            assert_eq!(bmi.get_var_location(name).unwrap(), "node");
        }
        assert_eq!(bmi.get_grid_type(), "scalar");
    }

    #[test]
    fn unknown_variable_is_an_error() {
        let bmi = BmiClass::default();
        assert!(matches!(
            bmi.get_value("windspeed"),
            Err(ClassError::UnknownVariable(_))
        ));
        assert!(bmi.get_var_type("t").is_err());
    }

    #[test]
    fn time_functions_follow_config() {
        let mut bmi = BmiClass::default();
        assert_eq!(bmi.get_current_time(), 0.0);
        assert_eq!(bmi.get_end_time(), 43200.0);
        assert_eq!(bmi.get_time_step(), 60.0);
        assert_eq!(bmi.get_time_units(), "s");

        bmi.update().unwrap();
        assert_eq!(bmi.get_current_time(), 60.0);
        assert!(bmi.get_value("h").unwrap() > 200.0);
    }

    #[test]
    fn failed_initialize_keeps_previous_model() {
        let mut bmi = BmiClass::default();
        bmi.update().unwrap();

        let mut config = Config::default();
        config.time_control.dt = -1.0;
        assert!(bmi.initialize(config).is_err());
        assert_eq!(bmi.get_current_time(), 60.0);
    }

    #[test]
    fn run_collects_requested_variables() {
        let mut config = Config::default();
        config.time_control.runtime = 1800.0;
        let mut bmi = BmiClass::new(config).unwrap();

        let output = bmi.run(600.0, &["h", "theta"]).unwrap();
        assert_eq!(output.times(), &[0.0, 600.0, 1200.0, 1800.0]);
        assert_eq!(output.variables(), &[OutputVariable::H, OutputVariable::Theta]);
        assert_eq!(bmi.get_current_time(), 1800.0);

        assert!(bmi.run(600.0, &["windspeed"]).is_err());
    }
}
