//! Mixed-layer slab model of the convective boundary layer.
//!
//! A single well-mixed column of air is capped by a jump in potential
//! temperature and specific humidity. Five prognostic variables are advanced
//! with forward Euler:
//!
//! ```text
//! dh/dt       = we + ws
//! dθ/dt       = (w'θ'ₛ - w'θ'ₑ) / h + advθ
//! dΔθ/dt      = γθ we - dθ/dt
//! dq/dt       = (w'q'ₛ - w'q'ₑ) / h + advq
//! dΔq/dt      = γq we - dq/dt
//! ```
//!
//! with the entrainment velocity closed on the virtual heat flux,
//! `we = max(β (w'θ'ᵥ)ₛ / Δθᵥ, 0)`, and large-scale subsidence `ws = -div(U) h`.
//! The free-troposphere contribution to the jump tendencies is a constant zero.
//!
//! # References
//!
//! - Tennekes, H. (1973). "A model for the dynamics of the inversion above a
//!   convective boundary layer." J. Atmos. Sci.
//! - Vilà-Guerau de Arellano, J. et al. (2015). "Atmospheric Boundary Layer:
//!   Integrating Air Chemistry and Land Interactions." Cambridge University Press.

use nalgebra::Vector5;
use serde::Serialize;
use tracing::{info, trace};

use crate::config::{Config, InitialState};
use crate::error::{ClassResult, DomainError};
use crate::variables::{DiagnosticVariable, OutputVariable};

/// Coefficient of specific humidity in the virtual temperature (≈ Rv/Rd - 1).
pub const VIRTUAL_TEMPERATURE_FACTOR: f64 = 0.61;

/// Free-troposphere forcing of the jump tendencies (switch not implemented).
const FREE_TROPOSPHERE_TENDENCY: f64 = 0.0;

/// Order of the prognostic vector used by [`ModelState::prognostic`].
const PROGNOSTIC_NAMES: [&str; 5] = ["h", "theta", "dtheta", "q", "dq"];

/// Current values of the prognostic variables and model time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelState {
    /// ABL height (m).
    pub h: f64,
    /// Mixed-layer potential temperature (K).
    pub theta: f64,
    /// Potential temperature jump at h (K).
    pub dtheta: f64,
    /// Mixed-layer specific humidity (kg/kg).
    pub q: f64,
    /// Specific humidity jump at h (kg/kg).
    pub dq: f64,
    /// Model time (s).
    pub t: f64,
}

impl ModelState {
    fn from_initial(init: &InitialState) -> Self {
        Self {
            h: init.h_0,
            theta: init.theta_0,
            dtheta: init.dtheta_0,
            q: init.q_0,
            dq: init.dq_0,
            t: 0.0,
        }
    }

    /// Prognostic variables as `(h, theta, dtheta, q, dq)`.
    pub fn prognostic(&self) -> Vector5<f64> {
        Vector5::new(self.h, self.theta, self.dtheta, self.q, self.dq)
    }

    fn set_prognostic(&mut self, values: &Vector5<f64>) {
        self.h = values[0];
        self.theta = values[1];
        self.dtheta = values[2];
        self.q = values[3];
        self.dq = values[4];
    }

    pub fn get(&self, var: OutputVariable) -> f64 {
        match var {
            OutputVariable::H => self.h,
            OutputVariable::Theta => self.theta,
            OutputVariable::DTheta => self.dtheta,
            OutputVariable::Q => self.q,
            OutputVariable::DQ => self.dq,
        }
    }
}

/// Time derivatives of the prognostic variables, all evaluated from the same
/// state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tendencies {
    /// m/s
    pub h: f64,
    /// K/s
    pub theta: f64,
    /// K/s
    pub dtheta: f64,
    /// kg/kg/s
    pub q: f64,
    /// kg/kg/s
    pub dq: f64,
}

impl Tendencies {
    /// Tendencies in the order of [`ModelState::prognostic`].
    pub fn as_vector(&self) -> Vector5<f64> {
        Vector5::new(self.h, self.theta, self.dtheta, self.q, self.dq)
    }
}

/// Snapshot of the derived fluxes and velocities for the current state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Diagnostics {
    /// Virtual temperature jump at h (K).
    pub dthetav: f64,
    /// Entrainment velocity (m/s).
    pub we: f64,
    /// Large-scale vertical velocity (m/s).
    pub ws: f64,
    /// Surface kinematic virtual heat flux (K m/s).
    pub wthetav: f64,
    /// Entrainment kinematic virtual heat flux (K m/s).
    pub wthetave: f64,
    /// Entrainment kinematic heat flux (K m/s).
    pub wthetae: f64,
    /// Entrainment moisture flux (kg/kg m/s).
    pub wqe: f64,
    /// Surface kinematic heat flux (K m/s).
    pub wtheta: f64,
    /// Surface kinematic moisture flux (kg/kg m/s).
    pub wq: f64,
}

impl Diagnostics {
    pub fn get(&self, var: DiagnosticVariable) -> f64 {
        match var {
            DiagnosticVariable::DThetaV => self.dthetav,
            DiagnosticVariable::We => self.we,
            DiagnosticVariable::Ws => self.ws,
            DiagnosticVariable::WThetaVE => self.wthetave,
            DiagnosticVariable::WThetaV => self.wthetav,
            DiagnosticVariable::WTheta => self.wtheta,
            DiagnosticVariable::Wq => self.wq,
        }
    }
}

/// The mixed-layer model: configuration plus mutable state.
///
/// Derived quantities are recomputed from the current state on every call;
/// nothing is cached between steps.
#[derive(Debug, Clone)]
pub struct MixedLayerModel {
    config: Config,
    state: ModelState,
}

impl MixedLayerModel {
    /// Validate `config` and initialise the state from its initial-state block.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ClassError::Configuration`] if the configuration is
    /// out of domain (for example `h_0 <= 0` or `dt <= 0`).
    pub fn new(config: Config) -> ClassResult<Self> {
        config.validate()?;
        let state = ModelState::from_initial(&config.initial_state);

        info!(
            "Mixed-layer model initialised: h={:.1}m, theta={:.2}K, dt={}s, runtime={}s",
            state.h, state.theta, config.time_control.dt, config.time_control.runtime
        );

        Ok(Self { config, state })
    }

    /// Model initialised from [`Config::default`], which always validates.
    pub fn with_defaults() -> Self {
        let config = Config::default();
        let state = ModelState::from_initial(&config.initial_state);
        Self { config, state }
    }

    /// Advance the state by one time step with forward Euler.
    ///
    /// All five tendencies are evaluated from the pre-step state before any
    /// variable changes. The proposed state is checked before it is committed,
    /// so on error the model is left exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns a [`DomainError`] if a tendency is undefined or the step would
    /// produce a non-finite value or a negative layer height.
    pub fn update(&mut self) -> Result<(), DomainError> {
        let dt = self.config.time_control.dt;
        let tendencies = self.tendencies()?;
        let next = self.state.prognostic() + tendencies.as_vector() * dt;

        for (quantity, value) in PROGNOSTIC_NAMES.into_iter().zip(next.iter().copied()) {
            if !value.is_finite() {
                return Err(DomainError::NonFinite { quantity, value });
            }
        }
        if next[0] < 0.0 {
            return Err(DomainError::CollapsedLayer { h: next[0] });
        }

        self.state.set_prognostic(&next);
        self.state.t += dt;

        trace!(
            "t={:.0}s h={:.2}m theta={:.4}K dtheta={:.4}K q={:.6} dq={:.6}",
            self.state.t,
            self.state.h,
            self.state.theta,
            self.state.dtheta,
            self.state.q,
            self.state.dq
        );
        Ok(())
    }

    /// All prognostic tendencies for the current state.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::VanishingVirtualJump`] if `dthetav == 0` and
    /// [`DomainError::CollapsedLayer`] if `h <= 0`.
    pub fn tendencies(&self) -> Result<Tendencies, DomainError> {
        Ok(Tendencies {
            h: self.htend()?,
            theta: self.thetatend()?,
            dtheta: self.dthetatend()?,
            q: self.qtend()?,
            dq: self.dqtend()?,
        })
    }

    /// Derived fluxes and velocities for the current state.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::VanishingVirtualJump`] if `dthetav == 0`.
    pub fn diagnostics(&self) -> Result<Diagnostics, DomainError> {
        let ml = &self.config.mixed_layer;
        Ok(Diagnostics {
            dthetav: self.dthetav(),
            we: self.we()?,
            ws: self.ws(),
            wthetav: self.wthetav(),
            wthetave: self.wthetave(),
            wthetae: self.wthetae()?,
            wqe: self.wqe()?,
            wtheta: ml.wtheta,
            wq: ml.wq,
        })
    }

    /// Tendency of the ABL height (m/s).
    ///
    /// # Errors
    ///
    /// Propagates [`MixedLayerModel::we`].
    pub fn htend(&self) -> Result<f64, DomainError> {
        Ok(self.we()? + self.ws())
    }

    /// Tendency of mixed-layer potential temperature (K/s).
    ///
    /// # Errors
    ///
    /// Fails if `h <= 0` or the entrainment velocity is undefined.
    pub fn thetatend(&self) -> Result<f64, DomainError> {
        let ml = &self.config.mixed_layer;
        let h = self.positive_height()?;
        Ok((ml.wtheta - self.wthetae()?) / h + ml.advtheta)
    }

    /// Tendency of the potential temperature jump at h (K/s).
    ///
    /// # Errors
    ///
    /// Same as [`MixedLayerModel::thetatend`].
    pub fn dthetatend(&self) -> Result<f64, DomainError> {
        let gammatheta = self.config.mixed_layer.gammatheta;
        Ok(gammatheta * self.we()? - self.thetatend()? + FREE_TROPOSPHERE_TENDENCY)
    }

    /// Tendency of mixed-layer specific humidity (kg/kg/s).
    ///
    /// # Errors
    ///
    /// Fails if `h <= 0` or the entrainment velocity is undefined.
    pub fn qtend(&self) -> Result<f64, DomainError> {
        let ml = &self.config.mixed_layer;
        let h = self.positive_height()?;
        Ok((ml.wq - self.wqe()?) / h + ml.advq)
    }

    /// Tendency of the specific humidity jump at h (kg/kg/s).
    ///
    /// # Errors
    ///
    /// Same as [`MixedLayerModel::qtend`].
    pub fn dqtend(&self) -> Result<f64, DomainError> {
        let gammaq = self.config.mixed_layer.gammaq;
        Ok(gammaq * self.we()? - self.qtend()? + FREE_TROPOSPHERE_TENDENCY)
    }

    /// Entrainment velocity (m/s), clamped at zero so entrainment never
    /// shrinks the layer.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::VanishingVirtualJump`] if `dthetav` is exactly zero.
    pub fn we(&self) -> Result<f64, DomainError> {
        let dthetav = self.dthetav();
        if dthetav == 0.0 {
            return Err(DomainError::VanishingVirtualJump);
        }
        Ok((-self.wthetave() / dthetav).max(0.0))
    }

    /// Large-scale vertical velocity at h (m/s); negative means subsidence.
    pub fn ws(&self) -> f64 {
        -self.config.mixed_layer.div_u * self.state.h
    }

    /// Entrainment kinematic heat flux (K m/s).
    ///
    /// # Errors
    ///
    /// Propagates [`MixedLayerModel::we`].
    pub fn wthetae(&self) -> Result<f64, DomainError> {
        Ok(-self.we()? * self.state.dtheta)
    }

    /// Entrainment moisture flux (kg/kg m/s).
    ///
    /// # Errors
    ///
    /// Propagates [`MixedLayerModel::we`].
    pub fn wqe(&self) -> Result<f64, DomainError> {
        Ok(-self.we()? * self.state.dq)
    }

    /// Entrainment kinematic virtual heat flux (K m/s).
    pub fn wthetave(&self) -> f64 {
        -self.config.mixed_layer.beta * self.wthetav()
    }

    /// Virtual temperature jump at h (K).
    pub fn dthetav(&self) -> f64 {
        let s = &self.state;
        (s.theta + s.dtheta) * (1.0 + VIRTUAL_TEMPERATURE_FACTOR * (s.q + s.dq))
            - s.theta * (1.0 + VIRTUAL_TEMPERATURE_FACTOR * s.q)
    }

    /// Surface kinematic virtual heat flux (K m/s).
    pub fn wthetav(&self) -> f64 {
        let ml = &self.config.mixed_layer;
        ml.wtheta + VIRTUAL_TEMPERATURE_FACTOR * self.state.theta * ml.wq
    }

    fn positive_height(&self) -> Result<f64, DomainError> {
        let h = self.state.h;
        if h > 0.0 {
            Ok(h)
        } else {
            Err(DomainError::CollapsedLayer { h })
        }
    }

    // Accessors

    pub fn state(&self) -> &ModelState {
        &self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn value(&self, var: OutputVariable) -> f64 {
        self.state.get(var)
    }

    pub fn h(&self) -> f64 {
        self.state.h
    }

    pub fn theta(&self) -> f64 {
        self.state.theta
    }

    pub fn dtheta(&self) -> f64 {
        self.state.dtheta
    }

    pub fn q(&self) -> f64 {
        self.state.q
    }

    pub fn dq(&self) -> f64 {
        self.state.dq
    }

    /// Model time (s).
    pub fn t(&self) -> f64 {
        self.state.t
    }

    pub fn time_step(&self) -> f64 {
        self.config.time_control.dt
    }

    pub fn end_time(&self) -> f64 {
        self.config.time_control.runtime
    }
}

impl Default for MixedLayerModel {
    fn default() -> Self {
        Self::with_defaults()
    }
}
