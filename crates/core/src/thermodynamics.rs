//! Moist thermodynamics helpers used to reconstruct vertical profiles.
//!
//! # References
//!
//! - Wallace, J.M. & Hobbs, P.V. (2006). "Atmospheric Science: An Introductory Survey."
//! - Sonntag, D. (1990). "Important new values of the physical constants of 1986,
//!   vapour pressure formulations based on the ITS-90, and psychrometer formulae."

/// Gravitational acceleration (m/s²).
pub const GRAVITY: f64 = 9.81;

/// Gas constant for dry air (J/(kg·K)).
pub const RD: f64 = 287.0;

/// Gas constant for water vapour (J/(kg·K)).
pub const RV: f64 = 461.0;

/// Specific heat of dry air at constant pressure (J/(kg·K)).
pub const CP: f64 = 1004.0;

/// Ratio of gas constants `Rd / Rv`.
pub const EP: f64 = RD / RV;

/// Virtual (potential) temperature.
///
/// `t` may be a temperature or a potential temperature; the factor is the same.
/// `qt` is total specific humidity and `ql` liquid water (kg/kg).
pub fn virtual_temperature(t: f64, qt: f64, ql: f64) -> f64 {
    t * (1.0 - (1.0 - RV / RD) * qt - (RV / RD) * ql)
}

/// Saturation vapour pressure over liquid water (Pa).
///
/// The Celsius temperature is capped at 50 °C to keep the exponential bounded.
pub fn esat_liq(t: f64) -> f64 {
    let tc = (t - 273.15).min(50.0);
    611.21 * ((17.502 * tc) / (240.97 + tc)).exp()
}

/// Saturation specific humidity over liquid water (kg/kg) at pressure `p` (Pa).
pub fn qsat_liq(p: f64, t: f64) -> f64 {
    let e = esat_liq(t);
    EP * e / (p - (1.0 - EP) * e)
}

/// Dew point temperature (K) from specific humidity `q` (kg/kg) and pressure
/// `p_hpa` (hPa), using the Sonntag (1990) Magnus fit.
///
/// Returns `None` for `q <= 0`, where the vapour pressure vanishes.
pub fn dewpoint(q: f64, p_hpa: f64) -> Option<f64> {
    const A: f64 = 6.112;
    const B: f64 = 17.62;
    const C: f64 = 243.12;

    if q <= 0.0 {
        return None;
    }
    // Mixing ratio, then actual vapour pressure (Wallace and Hobbs 3.59).
    let w = q / (1.0 - q);
    let e = (w * p_hpa) / (w + 0.622);
    let ln = (e / A).ln();

    let td = (C * ln) / (B - ln) + 273.15;
    td.is_finite().then_some(td)
}

/// Exner function `(p / p0)^(Rd/cp)`.
pub fn exner(p: f64, p0: f64) -> f64 {
    (p / p0).powf(RD / CP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn dry_air_has_no_virtual_correction() {
        assert_eq!(virtual_temperature(300.0, 0.0, 0.0), 300.0);
    }

    #[test]
    fn moisture_raises_virtual_temperature() {
        let tv = virtual_temperature(300.0, 0.01, 0.0);
        // (Rv/Rd - 1) ≈ 0.606
        assert_relative_eq!(tv, 300.0 * (1.0 + 0.01 * (RV / RD - 1.0)), epsilon = 1e-12);
        assert!(tv > 300.0);
        // Liquid water loads the parcel.
        assert!(virtual_temperature(300.0, 0.01, 0.002) < tv);
    }

    #[test]
    fn saturation_pressure_at_freezing() {
        assert_relative_eq!(esat_liq(273.15), 611.21, epsilon = 1e-9);
        assert!(esat_liq(303.15) > esat_liq(293.15));
    }

    #[test]
    fn saturated_air_has_dewpoint_equal_to_temperature() {
        let p = 100000.0;
        let t = 293.15;
        let qs = qsat_liq(p, t);
        // Different fits for esat and dew point, so agreement is approximate.
        assert!((dewpoint(qs, p / 100.0).unwrap() - t).abs() < 0.5);
    }

    #[test]
    fn dry_air_has_no_dewpoint() {
        assert_eq!(dewpoint(0.0, 1000.0), None);
        assert_eq!(dewpoint(-1e-4, 1000.0), None);
        assert!(dewpoint(1e-6, 1000.0).is_some());
    }

    #[test]
    fn exner_is_one_at_reference_pressure() {
        assert_eq!(exner(101300.0, 101300.0), 1.0);
        assert!(exner(85000.0, 101300.0) < 1.0);
    }
}
