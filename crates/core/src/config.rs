//! Model configuration: initial state, time control and mixed-layer parameters.
//!
//! The JSON layout uses the section names `initialState`, `timeControl` and
//! `mixedLayer`. Every section and field is optional on input and falls back
//! to the defaults below, but unknown keys are rejected so typos do not pass
//! silently.
//!
//! ```
//! use class_core::Config;
//!
//! let config = Config::from_json_str(r#"{"initialState": {"h_0": 350}}"#).unwrap();
//! assert_eq!(config.initial_state.h_0, 350.0);
//! assert_eq!(config.time_control.dt, 60.0);
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ClassError, ClassResult};

/// Relative tolerance used when deciding whether a ratio of times is integral.
const TIME_RATIO_TOLERANCE: f64 = 1e-9;

/// Complete model settings for one run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct Config {
    /// Free-text experiment name.
    pub name: String,
    /// Free-text experiment description.
    pub description: String,
    pub initial_state: InitialState,
    pub time_control: TimeControl,
    pub mixed_layer: MixedLayer,
}

/// Prognostic variables at `t = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct InitialState {
    /// ABL height (m).
    pub h_0: f64,
    /// Mixed-layer potential temperature (K).
    pub theta_0: f64,
    /// Potential temperature jump at h (K).
    pub dtheta_0: f64,
    /// Mixed-layer specific humidity (kg/kg).
    pub q_0: f64,
    /// Specific humidity jump at h (kg/kg).
    pub dq_0: f64,
}

impl Default for InitialState {
    fn default() -> Self {
        Self {
            h_0: 200.0,
            theta_0: 288.0,
            dtheta_0: 1.0,
            q_0: 0.008,
            dq_0: -0.001,
        }
    }
}

/// Integration step and run length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TimeControl {
    /// Time step (s).
    pub dt: f64,
    /// Total run time (s).
    pub runtime: f64,
}

impl Default for TimeControl {
    fn default() -> Self {
        Self {
            dt: 60.0,
            runtime: 43200.0,
        }
    }
}

impl TimeControl {
    /// Number of `update()` calls needed to reach `runtime`.
    ///
    /// `runtime / dt` is rounded up, except that a ratio within floating-point
    /// noise of an integer is taken as that integer (so 3600 s at 60 s is 60
    /// steps, not 61).
    pub fn step_count(&self) -> u64 {
        let ratio = self.runtime / self.dt;
        let nearest = ratio.round();
        if (ratio - nearest).abs() <= TIME_RATIO_TOLERANCE * nearest.max(1.0) {
            nearest as u64
        } else {
            ratio.ceil() as u64
        }
    }

    /// Convert an output frequency in seconds into a whole number of steps.
    ///
    /// # Errors
    ///
    /// Returns [`ClassError::Configuration`] if `freq` is not finite, not
    /// positive, or not an integer multiple of `dt`.
    pub fn steps_per_sample(&self, freq: f64) -> ClassResult<u64> {
        if !freq.is_finite() || freq <= 0.0 {
            return Err(ClassError::configuration(
                "freq",
                format!("must be finite and positive, got {freq}"),
            ));
        }
        let ratio = freq / self.dt;
        let nearest = ratio.round();
        if nearest < 1.0 || (ratio - nearest).abs() > TIME_RATIO_TOLERANCE * nearest {
            return Err(ClassError::configuration(
                "freq",
                format!(
                    "must be a whole multiple of dt = {} s, got {freq} s",
                    self.dt
                ),
            ));
        }
        Ok(nearest as u64)
    }
}

/// Surface forcing, large-scale forcing and entrainment closure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MixedLayer {
    /// Surface kinematic heat flux (K m/s).
    pub wtheta: f64,
    /// Advection of heat (K/s).
    pub advtheta: f64,
    /// Free atmosphere potential temperature lapse rate (K/m).
    pub gammatheta: f64,
    /// Surface kinematic moisture flux (kg/kg m/s).
    pub wq: f64,
    /// Advection of moisture (kg/kg/s).
    pub advq: f64,
    /// Free atmosphere specific humidity lapse rate (kg/kg/m).
    pub gammaq: f64,
    /// Horizontal large-scale divergence of wind (1/s).
    #[serde(rename = "divU")]
    pub div_u: f64,
    /// Entrainment ratio for virtual heat (-).
    pub beta: f64,
}

impl Default for MixedLayer {
    fn default() -> Self {
        Self {
            wtheta: 0.1,
            advtheta: 0.0,
            gammatheta: 0.006,
            wq: 0.0001,
            advq: 0.0,
            gammaq: 0.0,
            div_u: 0.0,
            beta: 0.2,
        }
    }
}

impl Config {
    /// Decode and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClassError::Parse`] for malformed JSON or unknown keys and
    /// [`ClassError::Configuration`] for out-of-domain values.
    pub fn from_json_str(text: &str) -> ClassResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Decode and validate a configuration from an already-parsed JSON value.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_json_str`].
    pub fn from_value(value: Value) -> ClassResult<Self> {
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, decode and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ClassError::Io`] if the file cannot be read, otherwise the
    /// errors of [`Config::from_json_str`].
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ClassResult<Self> {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Pretty-printed JSON form of this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClassError::Parse`] if serialization fails.
    pub fn to_json_pretty(&self) -> ClassResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every field against its valid domain.
    ///
    /// # Errors
    ///
    /// Returns [`ClassError::Configuration`] naming the first offending field:
    /// any non-finite number, `h_0 <= 0`, `theta_0 < 0`, `dt <= 0` or
    /// `runtime < 0`.
    pub fn validate(&self) -> ClassResult<()> {
        let init = &self.initial_state;
        let time = &self.time_control;
        let ml = &self.mixed_layer;

        let fields = [
            ("initialState.h_0", init.h_0),
            ("initialState.theta_0", init.theta_0),
            ("initialState.dtheta_0", init.dtheta_0),
            ("initialState.q_0", init.q_0),
            ("initialState.dq_0", init.dq_0),
            ("timeControl.dt", time.dt),
            ("timeControl.runtime", time.runtime),
            ("mixedLayer.wtheta", ml.wtheta),
            ("mixedLayer.advtheta", ml.advtheta),
            ("mixedLayer.gammatheta", ml.gammatheta),
            ("mixedLayer.wq", ml.wq),
            ("mixedLayer.advq", ml.advq),
            ("mixedLayer.gammaq", ml.gammaq),
            ("mixedLayer.divU", ml.div_u),
            ("mixedLayer.beta", ml.beta),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(ClassError::configuration(
                    field,
                    format!("must be finite, got {value}"),
                ));
            }
        }

        if init.h_0 <= 0.0 {
            return Err(ClassError::configuration(
                "initialState.h_0",
                format!("must be positive, got {}", init.h_0),
            ));
        }
        if init.theta_0 < 0.0 {
            return Err(ClassError::configuration(
                "initialState.theta_0",
                format!("must be non-negative, got {}", init.theta_0),
            ));
        }
        if time.dt <= 0.0 {
            return Err(ClassError::configuration(
                "timeControl.dt",
                format!("must be positive, got {}", time.dt),
            ));
        }
        if time.runtime < 0.0 {
            return Err(ClassError::configuration(
                "timeControl.runtime",
                format!("must be non-negative, got {}", time.runtime),
            ));
        }
        Ok(())
    }

    /// Apply a partial configuration on top of this one and validate the result.
    ///
    /// # Errors
    ///
    /// Returns [`ClassError::Parse`] if the merged document no longer matches
    /// the schema and [`ClassError::Configuration`] if it fails validation.
    pub fn with_overrides(&self, partial: &Value) -> ClassResult<Self> {
        let base = serde_json::to_value(self)?;
        Self::from_value(merge_configurations(&base, partial))
    }
}

/// Overwrite values in `first` with those in `second`.
///
/// Objects merge key by key, recursively; any other value in `second`
/// (numbers, strings, arrays, null) replaces the value in `first`.
pub fn merge_configurations(first: &Value, second: &Value) -> Value {
    match (first, second) {
        (Value::Object(base), Value::Object(overlay)) => {
            let mut merged = base.clone();
            for (key, value) in overlay {
                let entry = match merged.get(key) {
                    Some(existing) if value.is_object() => merge_configurations(existing, value),
                    _ => value.clone(),
                };
                merged.insert(key.clone(), entry);
            }
            Value::Object(merged)
        }
        _ => second.clone(),
    }
}

/// Strip from `permutation` every parameter equal to `reference` (and, when
/// given, to `preset`).
///
/// `name` and `description` are always kept. Sections left empty are removed,
/// so the result is the minimal partial configuration describing how the
/// permutation differs.
///
/// # Errors
///
/// Returns [`ClassError::Parse`] if a configuration cannot be serialized.
pub fn prune_config(
    permutation: &Config,
    reference: &Config,
    preset: Option<&Config>,
) -> ClassResult<Value> {
    let perm = serde_json::to_value(permutation)?;
    let mut pruned = prune_object(&perm, &serde_json::to_value(reference)?);
    if let Some(preset) = preset {
        pruned = prune_object(&pruned, &serde_json::to_value(preset)?);
    }
    Ok(pruned)
}

fn prune_object(config: &Value, other: &Value) -> Value {
    let Value::Object(config) = config else {
        return config.clone();
    };
    let empty = Map::new();
    let other = other.as_object().unwrap_or(&empty);

    let mut pruned = Map::new();
    for (key, value) in config {
        if key == "name" || key == "description" {
            pruned.insert(key.clone(), value.clone());
            continue;
        }
        match (value, other.get(key)) {
            (Value::Object(_), Some(other_value)) => {
                let section = prune_object(value, other_value);
                if section.as_object().is_some_and(|s| !s.is_empty()) {
                    pruned.insert(key.clone(), section);
                }
            }
            (_, Some(other_value)) if other_value == value => {}
            _ => {
                pruned.insert(key.clone(), value.clone());
            }
        }
    }
    Value::Object(pruned)
}
