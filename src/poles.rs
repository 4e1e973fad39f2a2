use serde::{Deserialize, Serialize};

use crate::error::ControlError;

/// Desired closed-loop pole locations for pole placement.
///
/// Pole locations are given as positive magnitudes: `Real { a, b, c }` places
/// the roots at `-a, -b, -c`, `Complex { a, b, c }` places them at `-a` and
/// `-b ± ci`. Second order designs ignore `c` for real poles and `a` for
/// complex poles.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Poles {
    Real { a: f64, b: f64, c: f64 },
    Complex { a: f64, b: f64, c: f64 },
}

impl Default for Poles {
    /// Complex poles `-5, -2 ± 2i`: settles in 4-5 seconds with roughly 15%
    /// overshoot.
    fn default() -> Self {
        Poles::Complex { a: 5.0, b: 2.0, c: 2.0 }
    }
}

/// Gains of a three-term controller or integral observer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

/// Gains of a two-term controller or observer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PdGains {
    pub kp: f64,
    pub kd: f64,
}

impl Poles {
    /// Solves `s³ + coeff·Kd·s² + coeff·Kp·s + coeff·Ki = 0` for gains whose
    /// roots are these poles.
    ///
    /// The plant is `Dx = v`, `Dv = coeff·u`, `Dintegral = x - target` under
    /// `u = -Kp·x - Kd·v - Ki·integral`.
    ///
    /// # Errors
    ///
    /// [`ControlError::DegenerateCoefficient`] if `coeff` is zero or not finite.
    pub fn pid_gains(&self, coeff: f64) -> Result<PidGains, ControlError> {
        check_coefficient(coeff)?;
        let (kd, kp, ki) = match *self {
            // s³ + (a+2b)s² + (2ab+b²+c²)s + a(b²+c²)
            Poles::Complex { a, b, c } => (
                a + 2.0 * b,
                2.0 * a * b + b * b + c * c,
                a * (b * b + c * c),
            ),
            // s³ + (a+b+c)s² + (ab+bc+ca)s + abc
            Poles::Real { a, b, c } => (a + b + c, a * b + b * c + c * a, a * b * c),
        };
        Ok(PidGains {
            kp: kp / coeff,
            ki: ki / coeff,
            kd: kd / coeff,
        })
    }

    /// Solves `s² + coeff·Kd·s + coeff·Kp = 0` for a two-term design.
    ///
    /// Complex poles use `-b ± ci`, real poles use `-a, -b`.
    pub fn pd_gains(&self, coeff: f64) -> Result<PdGains, ControlError> {
        check_coefficient(coeff)?;
        let (kd, kp) = match *self {
            Poles::Complex { b, c, .. } => (2.0 * b, b * b + c * c),
            Poles::Real { a, b, .. } => (a + b, a * b),
        };
        Ok(PdGains {
            kp: kp / coeff,
            kd: kd / coeff,
        })
    }
}

fn check_coefficient(coeff: f64) -> Result<(), ControlError> {
    if coeff == 0.0 || !coeff.is_finite() {
        return Err(ControlError::DegenerateCoefficient(coeff));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Matrix3;

    /// Largest real part among the roots of s³ + p2·s² + p1·s + p0.
    fn max_real_root(p2: f64, p1: f64, p0: f64) -> f64 {
        let companion = Matrix3::new(-p2, -p1, -p0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0);
        companion
            .complex_eigenvalues()
            .iter()
            .map(|root| root.re)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    #[test]
    fn test_complex_pole_gains() {
        let gains = Poles::Complex { a: 5.0, b: 2.0, c: 2.0 }.pid_gains(1000.0).unwrap();
        assert_relative_eq!(gains.kd, 0.009, epsilon = 1e-12);
        assert_relative_eq!(gains.kp, 0.028, epsilon = 1e-12);
        assert_relative_eq!(gains.ki, 0.04, epsilon = 1e-12);
    }

    #[test]
    fn test_real_pole_gains() {
        let gains = Poles::Real { a: 1.0, b: 2.0, c: 3.0 }.pid_gains(2.0).unwrap();
        assert_relative_eq!(gains.kd, 3.0);
        assert_relative_eq!(gains.kp, 5.5);
        assert_relative_eq!(gains.ki, 3.0);
    }

    #[test]
    fn test_pd_gains() {
        let complex = Poles::Complex { a: 9.0, b: 2.0, c: 3.0 }.pd_gains(1.0).unwrap();
        assert_relative_eq!(complex.kd, 4.0);
        assert_relative_eq!(complex.kp, 13.0);

        let real = Poles::Real { a: 2.0, b: 3.0, c: 9.0 }.pd_gains(0.5).unwrap();
        assert_relative_eq!(real.kd, 10.0);
        assert_relative_eq!(real.kp, 12.0);
    }

    #[test]
    fn test_zero_coefficient_rejected() {
        let err = Poles::default().pid_gains(0.0).unwrap_err();
        assert_eq!(err, ControlError::DegenerateCoefficient(0.0));
        assert!(Poles::default().pd_gains(f64::NAN).is_err());
    }

    #[test]
    fn test_placed_poles_are_stable() {
        let coeff = 350.0;
        let designs = [
            Poles::Complex { a: 5.0, b: 2.0, c: 2.0 },
            Poles::Complex { a: 0.5, b: 0.1, c: 7.0 },
            Poles::Real { a: 2.0, b: 1.0, c: 1.0 },
            Poles::Real { a: 0.3, b: 4.0, c: 11.0 },
        ];
        for poles in designs {
            let g = poles.pid_gains(coeff).unwrap();
            let worst = max_real_root(coeff * g.kd, coeff * g.kp, coeff * g.ki);
            assert!(worst < 0.0, "{:?} gave a root with real part {}", poles, worst);
        }
    }

    #[test]
    fn test_roots_match_requested_poles() {
        let coeff = 1000.0;
        let g = Poles::Real { a: 1.0, b: 2.0, c: 3.0 }.pid_gains(coeff).unwrap();
        assert_relative_eq!(max_real_root(coeff * g.kd, coeff * g.kp, coeff * g.ki), -1.0, epsilon = 1e-6);
    }
}
