//! Parameter sweeps and parallel ensembles.
//!
//! A [`Sweep`] varies one configuration parameter over an evenly spaced range.
//! Several sweeps combine into their cartesian product, and every resulting
//! partial configuration becomes one ensemble member.

use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::{merge_configurations, Config};
use crate::error::{ClassError, ClassResult};
use crate::output::ClassOutput;
use crate::runner::{run_class, RunOptions};

/// Decimal places kept in generated sweep values.
const SWEEP_DECIMALS: i32 = 4;

/// One parameter varied over `steps` values `start, start + step, ...`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sweep {
    /// Configuration section, e.g. `initialState`.
    pub section: String,
    /// Parameter within the section, e.g. `h_0`.
    pub parameter: String,
    pub start: f64,
    pub step: f64,
    pub steps: usize,
}

impl Sweep {
    /// Values of this sweep, rounded to four decimals to hide float noise.
    pub fn values(&self) -> Vec<f64> {
        let scale = 10f64.powi(SWEEP_DECIMALS);
        (0..self.steps)
            .map(|i| ((self.start + i as f64 * self.step) * scale).round() / scale)
            .collect()
    }

    /// Check that the sweep targets an existing numeric parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ClassError::Configuration`] if `section.parameter` is not a
    /// numeric field of `config`.
    pub fn validate(&self, config: &Config) -> ClassResult<()> {
        let document = serde_json::to_value(config)?;
        let is_number = document
            .get(&self.section)
            .and_then(|section| section.get(&self.parameter))
            .is_some_and(Value::is_number);
        if is_number {
            Ok(())
        } else {
            Err(ClassError::configuration(
                self.target(),
                "not a numeric configuration parameter",
            ))
        }
    }

    /// `section.parameter`.
    pub fn target(&self) -> String {
        format!("{}.{}", self.section, self.parameter)
    }

    fn permutations(&self) -> Vec<Value> {
        self.values()
            .into_iter()
            .map(|value| json!({ self.section.as_str(): { self.parameter.as_str(): value } }))
            .collect()
    }
}

impl fmt::Display for Sweep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}:{}:{}",
            self.target(),
            self.start,
            self.step,
            self.steps
        )
    }
}

/// Parses `section.parameter=start:step:steps`.
impl FromStr for Sweep {
    type Err = ClassError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid =
            |reason: &str| ClassError::configuration("sweep", format!("{reason}: {text:?}"));

        let (target, range) = text
            .split_once('=')
            .ok_or_else(|| invalid("expected section.parameter=start:step:steps"))?;
        let (section, parameter) = target
            .split_once('.')
            .ok_or_else(|| invalid("target must be section.parameter"))?;
        if section.is_empty() || parameter.is_empty() {
            return Err(invalid("target must be section.parameter"));
        }

        let parts: Vec<&str> = range.split(':').collect();
        let [start, step, steps] = parts.as_slice() else {
            return Err(invalid("range must be start:step:steps"));
        };
        let start: f64 = start.trim().parse().map_err(|_| invalid("invalid start"))?;
        let step: f64 = step.trim().parse().map_err(|_| invalid("invalid step"))?;
        let steps: usize = steps.trim().parse().map_err(|_| invalid("invalid steps"))?;
        if !start.is_finite() || !step.is_finite() {
            return Err(invalid("start and step must be finite"));
        }

        Ok(Self {
            section: section.to_string(),
            parameter: parameter.to_string(),
            start,
            step,
            steps,
        })
    }
}

/// Cartesian product of all sweeps as partial configurations.
///
/// Earlier sweeps vary slowest. No sweeps give no permutations.
pub fn perform_sweep(sweeps: &[Sweep]) -> Vec<Value> {
    if sweeps.is_empty() {
        return Vec::new();
    }
    sweeps.iter().fold(vec![json!({})], |acc, sweep| {
        let values = sweep.permutations();
        acc.iter()
            .flat_map(|a| values.iter().map(move |b| merge_configurations(a, b)))
            .collect()
    })
}

/// Result of one ensemble run.
#[derive(Debug)]
pub struct EnsembleMember {
    /// Position in [`perform_sweep`] order.
    pub index: usize,
    /// Partial configuration applied on top of the base.
    pub overrides: Value,
    pub result: ClassResult<ClassOutput>,
}

/// Run every permutation of `sweeps` on top of `base` in parallel.
///
/// Members are independent: a failing member is reported in its own
/// [`EnsembleMember::result`] and does not stop the others.
///
/// # Errors
///
/// Returns [`ClassError::Configuration`] if a sweep targets an unknown
/// parameter.
pub fn run_ensemble(
    base: &Config,
    sweeps: &[Sweep],
    options: &RunOptions,
) -> ClassResult<Vec<EnsembleMember>> {
    for sweep in sweeps {
        sweep.validate(base)?;
    }
    let permutations = perform_sweep(sweeps);
    info!("Running ensemble of {} members", permutations.len());

    let members: Vec<EnsembleMember> = permutations
        .into_par_iter()
        .enumerate()
        .map(|(index, overrides)| {
            let result = base
                .with_overrides(&overrides)
                .and_then(|config| run_class(&config, options));
            match &result {
                Ok(output) => debug!("Member {} finished with {} samples", index, output.len()),
                Err(err) => warn!("Member {} ({}) failed: {}", index, overrides, err),
            }
            EnsembleMember {
                index,
                overrides,
                result,
            }
        })
        .collect();

    Ok(members)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sweep(section: &str, parameter: &str, start: f64, step: f64, steps: usize) -> Sweep {
        Sweep {
            section: section.into(),
            parameter: parameter.into(),
            start,
            step,
            steps,
        }
    }

    #[test]
    fn zero_sweeps() {
        assert!(perform_sweep(&[]).is_empty());
    }

    #[test]
    fn one_sweep() {
        let perms = perform_sweep(&[sweep("initialState", "h_0", 100.0, 100.0, 5)]);
        let expected: Vec<Value> = [100.0, 200.0, 300.0, 400.0, 500.0]
            .into_iter()
            .map(|h| json!({"initialState": {"h_0": h}}))
            .collect();
        assert_eq!(perms, expected);
    }

    #[test]
    fn two_sweeps() {
        let perms = perform_sweep(&[
            sweep("initialState", "h_0", 100.0, 100.0, 2),
            sweep("mixedLayer", "beta", 0.1, 0.1, 2),
        ]);
        assert_eq!(
            perms,
            vec![
                json!({"initialState": {"h_0": 100.0}, "mixedLayer": {"beta": 0.1}}),
                json!({"initialState": {"h_0": 100.0}, "mixedLayer": {"beta": 0.2}}),
                json!({"initialState": {"h_0": 200.0}, "mixedLayer": {"beta": 0.1}}),
                json!({"initialState": {"h_0": 200.0}, "mixedLayer": {"beta": 0.2}}),
            ]
        );
    }

    #[test]
    fn three_uneven_sweeps_share_sections() {
        let perms = perform_sweep(&[
            sweep("initialState", "h_0", 100.0, 100.0, 2),
            sweep("mixedLayer", "beta", 0.1, 0.1, 3),
            sweep("initialState", "theta_0", 268.0, 5.0, 4),
        ]);
        assert_eq!(perms.len(), 24);
        assert_eq!(
            perms[0],
            json!({"initialState": {"h_0": 100.0, "theta_0": 268.0}, "mixedLayer": {"beta": 0.1}})
        );
        assert_eq!(
            perms[11],
            json!({"initialState": {"h_0": 100.0, "theta_0": 283.0}, "mixedLayer": {"beta": 0.3}})
        );
        assert_eq!(
            perms[23],
            json!({"initialState": {"h_0": 200.0, "theta_0": 283.0}, "mixedLayer": {"beta": 0.3}})
        );
    }

    #[test]
    fn values_are_rounded() {
        let values = sweep("mixedLayer", "beta", 0.1, 0.1, 3).values();
        assert_eq!(values, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn parses_command_line_form() {
        let parsed: Sweep = "mixedLayer.beta=0.1:0.05:3".parse().unwrap();
        assert_eq!(parsed, sweep("mixedLayer", "beta", 0.1, 0.05, 3));
        assert_eq!(parsed.to_string(), "mixedLayer.beta=0.1:0.05:3");

        assert!("mixedLayer.beta=0.1:0.05".parse::<Sweep>().is_err());
        assert!("beta=0.1:0.05:3".parse::<Sweep>().is_err());
        assert!("mixedLayer.beta=a:0.05:3".parse::<Sweep>().is_err());
    }

    #[test]
    fn rejects_unknown_targets() {
        let config = Config::default();
        assert!(sweep("mixedLayer", "beta", 0.1, 0.1, 2).validate(&config).is_ok());
        assert!(sweep("mixedLayer", "windspeed", 1.0, 1.0, 2).validate(&config).is_err());
        assert!(sweep("initialState", "name", 1.0, 1.0, 2).validate(&config).is_err());
    }

    #[test]
    fn ensemble_preserves_permutation_order() {
        let mut base = Config::default();
        base.time_control.runtime = 600.0;
        let sweeps = [sweep("initialState", "h_0", 100.0, 100.0, 4)];
        let members = run_ensemble(&base, &sweeps, &RunOptions::default()).unwrap();

        assert_eq!(members.len(), 4);
        for (i, member) in members.iter().enumerate() {
            assert_eq!(member.index, i);
            let output = member.result.as_ref().unwrap();
            let h0 = output.column(crate::variables::OutputVariable::H).unwrap()[0];
            assert_eq!(h0, 100.0 * (i as f64 + 1.0));
        }
    }

    #[test]
    fn failing_member_does_not_stop_the_rest() {
        let mut base = Config::default();
        base.time_control.runtime = 600.0;
        // h_0 = 0 is rejected, h_0 = 100 runs.
        let sweeps = [sweep("initialState", "h_0", 0.0, 100.0, 2)];
        let members = run_ensemble(&base, &sweeps, &RunOptions::default()).unwrap();
        assert!(matches!(
            members[0].result,
            Err(ClassError::Configuration { .. })
        ));
        assert!(members[1].result.is_ok());
    }
}
