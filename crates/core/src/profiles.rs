//! Vertical profiles reconstructed from a mixed-layer snapshot.
//!
//! The slab model itself has no vertical coordinate. For plotting and for
//! sounding-style output the column is rebuilt as three segments: a constant
//! mixed layer up to `h`, a jump at `h`, and a linear free troposphere above it
//! with the configured lapse rates. Pressure follows from hydrostatic balance
//! integrated on half levels from the surface pressure `p0`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{ClassError, ClassResult, DomainError};
use crate::model::ModelState;
use crate::thermodynamics::{dewpoint, exner, virtual_temperature, CP, GRAVITY, RD};

/// Vertical grid and reference pressure for profile reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ProfileSettings {
    /// Surface pressure (Pa).
    pub p0: f64,
    /// Top of the profile (m).
    pub z_top: f64,
    /// Vertical resolution (m).
    pub dz: f64,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            p0: 101300.0,
            z_top: 4000.0,
            dz: 10.0,
        }
    }
}

impl ProfileSettings {
    /// # Errors
    ///
    /// Returns [`ClassError::Configuration`] for a non-positive `p0` or `dz`,
    /// or a `z_top` that leaves no full level.
    pub fn validate(&self) -> ClassResult<()> {
        if !(self.p0.is_finite() && self.p0 > 0.0) {
            return Err(ClassError::configuration(
                "profile.p0",
                format!("must be finite and positive, got {}", self.p0),
            ));
        }
        if !(self.dz.is_finite() && self.dz > 0.0) {
            return Err(ClassError::configuration(
                "profile.dz",
                format!("must be finite and positive, got {}", self.dz),
            ));
        }
        if !(self.z_top.is_finite() && self.z_top > 0.5 * self.dz) {
            return Err(ClassError::configuration(
                "profile.z_top",
                format!("must exceed dz/2 = {}, got {}", 0.5 * self.dz, self.z_top),
            ));
        }
        Ok(())
    }

    /// Number of full (cell-centre) levels below `z_top`.
    fn level_count(&self) -> usize {
        (self.z_top / self.dz - 0.5).ceil() as usize
    }
}

/// Atmospheric column on full levels.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct VerticalProfile {
    /// Height of cell centres (m).
    pub z: Vec<f64>,
    /// Potential temperature (K).
    pub theta: Vec<f64>,
    /// Virtual potential temperature (K).
    pub thetav: Vec<f64>,
    /// Total specific humidity (kg/kg).
    pub qt: Vec<f64>,
    /// Pressure (Pa).
    pub p: Vec<f64>,
    /// Exner function (-).
    pub exner: Vec<f64>,
    /// Temperature (K).
    #[serde(rename = "T")]
    pub temperature: Vec<f64>,
    /// Dew point temperature (K).
    #[serde(rename = "Td")]
    pub dewpoint: Vec<f64>,
    /// Density (kg/m³).
    pub rho: Vec<f64>,
}

impl VerticalProfile {
    pub fn len(&self) -> usize {
        self.z.len()
    }

    pub fn is_empty(&self) -> bool {
        self.z.is_empty()
    }

    /// Write pretty-printed JSON, one array per quantity.
    ///
    /// # Errors
    ///
    /// Returns [`ClassError::Parse`] if serialization fails and
    /// [`ClassError::Io`] if the writer does.
    pub fn write_json<W: Write>(&self, writer: &mut W) -> ClassResult<()> {
        serde_json::to_writer_pretty(&mut *writer, self)?;
        writeln!(writer)?;
        Ok(())
    }

    /// Write JSON to a file at the given path.
    ///
    /// # Errors
    ///
    /// Same as [`VerticalProfile::write_json`], plus file creation failures.
    pub fn write_json_file<P: AsRef<Path>>(&self, path: P) -> ClassResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_json(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// Build the vertical column implied by `state` under `config`.
///
/// The base state is assumed dry (no liquid water) when computing virtual
/// temperature and density.
///
/// # Errors
///
/// Returns [`ClassError::Configuration`] if `settings` are invalid and
/// [`DomainError::NonPositiveHumidity`] if any level is dry or has negative
/// humidity, where the dew point is undefined.
pub fn generate_profiles(
    config: &Config,
    state: &ModelState,
    settings: &ProfileSettings,
) -> ClassResult<VerticalProfile> {
    settings.validate()?;
    let ml = &config.mixed_layer;
    let dz = settings.dz;
    let n = settings.level_count();

    let z: Vec<f64> = (0..n).map(|i| (i as f64 + 0.5) * dz).collect();
    let zh: Vec<f64> = (0..=n).map(|i| i as f64 * dz).collect();

    let theta = piecewise_profile(&z, state.h, state.theta, state.dtheta, ml.gammatheta);
    let qt = piecewise_profile(&z, state.h, state.q, state.dq, ml.gammaq);

    let thetah = piecewise_profile(&zh, state.h, state.theta, state.dtheta, ml.gammatheta);
    let qth = piecewise_profile(&zh, state.h, state.q, state.dq, ml.gammaq);
    let thetavh: Vec<f64> = thetah
        .iter()
        .zip(&qth)
        .map(|(&t, &q)| virtual_temperature(t, q, 0.0))
        .collect();

    let thetav: Vec<f64> = theta
        .iter()
        .zip(&qt)
        .map(|(&t, &q)| virtual_temperature(t, q, 0.0))
        .collect();
    let p = hydrostatic_pressure(settings.p0, &thetavh, dz);
    let exner: Vec<f64> = p.iter().map(|&pi| exner(pi, settings.p0)).collect();
    let temperature: Vec<f64> = exner.iter().zip(&theta).map(|(ex, th)| ex * th).collect();
    let dewpoint = p
        .iter()
        .zip(z.iter().zip(&qt))
        .map(|(&pi, (&zi, &q))| {
            dewpoint(q, pi / 100.0).ok_or(DomainError::NonPositiveHumidity { z: zi, qt: q })
        })
        .collect::<Result<Vec<f64>, DomainError>>()?;
    let rho: Vec<f64> = p
        .iter()
        .zip(exner.iter().zip(&thetav))
        .map(|(pi, (ex, tv))| pi / (RD * ex * tv))
        .collect();

    Ok(VerticalProfile {
        z,
        theta,
        thetav,
        qt,
        p,
        exner,
        temperature,
        dewpoint,
        rho,
    })
}

/// Mixed layer, jump, then a single free-troposphere lapse rate.
fn piecewise_profile(z: &[f64], h: f64, ml_value: f64, jump: f64, gamma: f64) -> Vec<f64> {
    z.iter()
        .map(|&zi| {
            if zi <= h {
                ml_value
            } else {
                ml_value + jump + gamma * (zi - h)
            }
        })
        .collect()
}

/// Integrate `p^(Rd/cp)` upward on half levels and return full-level pressure
/// as the geometric mean of the bounding half levels.
fn hydrostatic_pressure(p0: f64, thetavh: &[f64], dz: f64) -> Vec<f64> {
    let kappa = RD / CP;
    let p0_kappa = p0.powf(kappa);

    let mut ph_kappa = Vec::with_capacity(thetavh.len());
    let mut current = p0_kappa;
    ph_kappa.push(current);
    for thetav in &thetavh[..thetavh.len() - 1] {
        current -= (GRAVITY / CP) * p0_kappa / thetav * dz;
        ph_kappa.push(current);
    }

    let ph: Vec<f64> = ph_kappa.iter().map(|x| x.powf(1.0 / kappa)).collect();
    ph.windows(2)
        .map(|pair| (0.5 * (pair[0].ln() + pair[1].ln())).exp())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MixedLayerModel;
    use approx::assert_relative_eq;

    fn default_profile() -> (ModelState, VerticalProfile) {
        let config = Config::default();
        let model = MixedLayerModel::new(config.clone()).unwrap();
        let state = *model.state();
        let profile = generate_profiles(&config, &state, &ProfileSettings::default()).unwrap();
        (state, profile)
    }

    #[test]
    fn levels_are_cell_centres() {
        let (_, profile) = default_profile();
        assert_eq!(profile.len(), 400);
        assert_eq!(profile.z[0], 5.0);
        assert_eq!(profile.z[399], 3995.0);
        assert_eq!(profile.p.len(), profile.len());
        assert_eq!(profile.rho.len(), profile.len());
    }

    #[test]
    fn mixed_layer_is_well_mixed_and_jumps_at_h() {
        let (state, profile) = default_profile();
        for (z, theta) in profile.z.iter().zip(&profile.theta) {
            if *z <= state.h {
                assert_eq!(*theta, state.theta);
            }
        }
        // First level above h = 200 m is z = 205 m.
        let idx = profile.z.iter().position(|&z| z > state.h).unwrap();
        assert_eq!(profile.z[idx], 205.0);
        assert_relative_eq!(
            profile.theta[idx],
            state.theta + state.dtheta + 0.006 * 5.0,
            epsilon = 1e-9
        );
        assert_relative_eq!(profile.qt[idx], state.q + state.dq, epsilon = 1e-12);
    }

    #[test]
    fn pressure_decreases_with_height() {
        let (_, profile) = default_profile();
        assert!(profile.p[0] < 101300.0);
        assert!(profile.p[0] > 101200.0);
        assert!(profile.p.windows(2).all(|w| w[1] < w[0]));
        // Roughly 620 hPa at 4 km.
        assert!(profile.p[399] > 58000.0 && profile.p[399] < 66000.0);
    }

    #[test]
    fn near_surface_density_is_physical() {
        let (_, profile) = default_profile();
        assert!(profile.rho[0] > 1.1 && profile.rho[0] < 1.3);
        assert!(profile.temperature[0] < profile.theta[0]);
        assert!(profile.dewpoint[0] < profile.temperature[0]);
    }

    #[test]
    fn dry_column_has_no_dewpoint() {
        let mut config = Config::default();
        config.initial_state.q_0 = 0.0;
        config.initial_state.dq_0 = 0.0;
        let model = MixedLayerModel::new(config.clone()).unwrap();

        let err = generate_profiles(&config, model.state(), &ProfileSettings::default()).unwrap_err();
        match err {
            ClassError::Domain(DomainError::NonPositiveHumidity { z, qt }) => {
                assert_eq!(z, 5.0);
                assert_eq!(qt, 0.0);
            }
            other => panic!("expected NonPositiveHumidity, got {other}"),
        }
    }

    #[test]
    fn drying_free_troposphere_is_reported_at_its_height() {
        let mut config = Config::default();
        // q = 0.008 - 0.001 - 1e-5 (z - 200) reaches zero at z = 900 m.
        config.mixed_layer.gammaq = -1e-5;
        let model = MixedLayerModel::new(config.clone()).unwrap();

        let err = generate_profiles(&config, model.state(), &ProfileSettings::default()).unwrap_err();
        assert!(
            matches!(err, ClassError::Domain(DomainError::NonPositiveHumidity { z, .. }) if z > 890.0 && z < 910.0),
            "{err}"
        );
    }

    #[test]
    fn json_has_one_array_per_quantity() {
        let (_, profile) = default_profile();
        let mut buf = Vec::new();
        profile.write_json(&mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value.as_object().unwrap().len(), 9);
        assert_eq!(value["Td"].as_array().unwrap().len(), 400);
        assert!(value["Td"][0].as_f64().unwrap() < value["T"][0].as_f64().unwrap());
    }

    #[test]
    fn rejects_degenerate_grid() {
        let config = Config::default();
        let model = MixedLayerModel::new(config.clone()).unwrap();
        let settings = ProfileSettings {
            dz: 0.0,
            ..ProfileSettings::default()
        };
        assert!(generate_profiles(&config, model.state(), &settings).is_err());

        let settings = ProfileSettings {
            z_top: 4.0,
            ..ProfileSettings::default()
        };
        assert!(generate_profiles(&config, model.state(), &settings).is_err());
    }
}
