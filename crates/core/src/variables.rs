//! Named model variables.
//!
//! The externally visible output set is fixed: `h, theta, dtheta, q, dq`.
//! Names coming from outside (BMI queries, CLI flags, FFI strings) are parsed
//! into [`OutputVariable`] once at the boundary; anything else is an
//! [`ClassError::UnknownVariable`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ClassError;

/// Prognostic variables exposed as model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputVariable {
    H,
    Theta,
    DTheta,
    Q,
    DQ,
}

impl OutputVariable {
    /// All output variables in canonical order.
    pub const ALL: [Self; 5] = [Self::H, Self::Theta, Self::DTheta, Self::Q, Self::DQ];

    pub fn key(self) -> &'static str {
        match self {
            Self::H => "h",
            Self::Theta => "theta",
            Self::DTheta => "dtheta",
            Self::Q => "q",
            Self::DQ => "dq",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::H => "ABL height",
            Self::Theta => "Potential temperature",
            Self::DTheta => "Potential temperature jump",
            Self::Q => "Specific humidity",
            Self::DQ => "Specific humidity jump",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Self::H => "m",
            Self::Theta | Self::DTheta => "K",
            Self::Q | Self::DQ => "kg kg⁻¹",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::H => "h",
            Self::Theta => "θ",
            Self::DTheta => "Δθ",
            Self::Q => "q",
            Self::DQ => "Δq",
        }
    }
}

impl FromStr for OutputVariable {
    type Err = ClassError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|var| var.key() == name)
            .ok_or_else(|| ClassError::UnknownVariable(name.to_string()))
    }
}

impl fmt::Display for OutputVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Derived quantities that can be recorded next to the prognostic output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticVariable {
    DThetaV,
    We,
    Ws,
    WThetaVE,
    WThetaV,
    WTheta,
    Wq,
}

impl DiagnosticVariable {
    pub const ALL: [Self; 7] = [
        Self::DThetaV,
        Self::We,
        Self::Ws,
        Self::WThetaVE,
        Self::WThetaV,
        Self::WTheta,
        Self::Wq,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::DThetaV => "dthetav",
            Self::We => "we",
            Self::Ws => "ws",
            Self::WThetaVE => "wthetave",
            Self::WThetaV => "wthetav",
            Self::WTheta => "wtheta",
            Self::Wq => "wq",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::DThetaV => "Virtual temperature jump at h",
            Self::We => "Entrainment velocity",
            Self::Ws => "Large-scale vertical velocity",
            Self::WThetaVE => "Entrainment virtual heat flux",
            Self::WThetaV => "Surface virtual heat flux",
            Self::WTheta => "Surface kinematic heat flux",
            Self::Wq => "Surface kinematic moisture flux",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Self::DThetaV => "K",
            Self::We | Self::Ws => "m s⁻¹",
            Self::WThetaVE | Self::WThetaV | Self::WTheta => "K m s⁻¹",
            Self::Wq => "kg kg⁻¹ m s⁻¹",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::DThetaV => "Δθᵥ",
            Self::We => "wₑ",
            Self::Ws => "wₛ",
            Self::WThetaVE => "(w'θ')ᵥₑ",
            Self::WThetaV => "(w'θ')ᵥ",
            Self::WTheta => "(w'θ')ₛ",
            Self::Wq => "(w'q')ₛ",
        }
    }
}

impl FromStr for DiagnosticVariable {
    type Err = ClassError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|var| var.key() == name)
            .ok_or_else(|| ClassError::UnknownVariable(name.to_string()))
    }
}

impl fmt::Display for DiagnosticVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_output_key() {
        for var in OutputVariable::ALL {
            assert_eq!(var.key().parse::<OutputVariable>().unwrap(), var);
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "windspeed".parse::<OutputVariable>().unwrap_err();
        assert!(matches!(err, ClassError::UnknownVariable(ref name) if name == "windspeed"));
        // Time is not part of the output set.
        assert!("t".parse::<OutputVariable>().is_err());
        // Diagnostics are a separate namespace.
        assert!("we".parse::<OutputVariable>().is_err());
        assert_eq!("we".parse::<DiagnosticVariable>().unwrap(), DiagnosticVariable::We);
    }

    #[test]
    fn serde_keys_match_names() {
        for var in OutputVariable::ALL {
            let json = serde_json::to_string(&var).unwrap();
            assert_eq!(json, format!("\"{}\"", var.key()));
        }
        for var in DiagnosticVariable::ALL {
            let json = serde_json::to_string(&var).unwrap();
            assert_eq!(json, format!("\"{}\"", var.key()));
        }
    }
}
