//! Error hierarchy for the mixed-layer model.
//!
//! Three failure families matter to callers:
//! - configuration problems, caught before a model exists
//! - numerical domain failures while stepping (a vanishing virtual
//!   temperature jump or a collapsed layer) or while rebuilding a profile
//! - lookups of variables outside the fixed output set
//!
//! Everything surfaces synchronously from the call that triggered it.

use thiserror::Error;

/// Undefined mathematical operation hit while evaluating tendencies or profiles.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// `dthetav == 0`, so the entrainment velocity is a division by zero.
    #[error("virtual temperature jump at h is zero; entrainment velocity is undefined")]
    VanishingVirtualJump,

    /// The layer height reached zero (or below), so the flux divergence
    /// terms `(w'x')/h` are undefined.
    #[error("boundary layer height {h} m is not positive; flux divergence is undefined")]
    CollapsedLayer { h: f64 },

    /// A proposed next state contains NaN or infinity.
    #[error("{quantity} became non-finite ({value})")]
    NonFinite { quantity: &'static str, value: f64 },

    /// Specific humidity at a profile level is not positive, so the dew point
    /// has no finite value.
    #[error("specific humidity {qt} kg/kg at z = {z} m is not positive; dew point is undefined")]
    NonPositiveHumidity { z: f64, qt: f64 },
}

/// Root error type for all model failures.
#[derive(Error, Debug)]
pub enum ClassError {
    /// A configuration field is missing or outside its valid domain.
    #[error("configuration error in {field}: {reason}")]
    Configuration { field: String, reason: String },

    /// Numerical domain failure while computing derived quantities.
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    /// Variable name outside `{h, theta, dtheta, q, dq}` (or the diagnostic set).
    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    /// Configuration text could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// Reading a configuration or writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClassError {
    pub(crate) fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for errors raised while integrating, as opposed to setup errors.
    pub fn is_domain(&self) -> bool {
        matches!(self, Self::Domain(_))
    }
}

impl From<serde_json::Error> for ClassError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

pub type ClassResult<T> = Result<T, ClassError>;
