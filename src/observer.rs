use nalgebra::Vector2;

use crate::poles::{PdGains, PidGains, Poles};

/// Two-state observer reconstructing position and velocity from a noisy
/// position measurement and the known control input.
///
/// The observer model is
///
/// `D xa0 = xa1 + Kxa·(y - xa0)`, `D xa1 = coeff·u + Kva·(y - xa0)`
///
/// and its error dynamics have the characteristic equation
/// `s² + Kxa·s + Kva = 0`. Gains are chosen so these poles sit further left
/// than the controller's, letting the estimate converge to the measurement
/// faster than the plant converges to its target. Zero gains give an open
/// loop model that ignores the measurement.
///
/// Each update integrates one control period with a fourth order
/// Runge-Kutta step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StateObserver {
    coeff: f64,
    dtime: f64,
    gains: PdGains,
    xa: Vector2<f64>,
}

/// Default observer poles `-5 ± 5i`.
pub const DEFAULT_OBSERVER_POLES: Poles = Poles::Complex { a: 0.0, b: 5.0, c: 5.0 };

impl StateObserver {
    pub fn new(coeff: f64, dtime: f64) -> Self {
        Self::with_poles(coeff, dtime, DEFAULT_OBSERVER_POLES)
    }

    /// Creates an observer whose error dynamics have the given poles:
    /// complex `-b ± ci` gives `Kxa = 2b, Kva = b² + c²`, real `-a, -b` gives
    /// `Kxa = a + b, Kva = a·b`.
    pub fn with_poles(coeff: f64, dtime: f64, poles: Poles) -> Self {
        Self {
            coeff,
            dtime,
            gains: observer_gains(poles),
            xa: Vector2::zeros(),
        }
    }

    pub fn set_poles(&mut self, poles: Poles) {
        self.gains = observer_gains(poles);
    }

    /// `(Kxa, Kva)` as `kd` and `kp` of a two-term gain set.
    pub fn gains(&self) -> PdGains {
        self.gains
    }

    pub fn set_coeff(&mut self, coeff: f64) {
        self.coeff = coeff;
    }

    pub fn set_initial_values(&mut self, x: f64, v: f64) {
        self.xa = Vector2::new(x, v);
    }

    /// Current `[position, velocity]` estimate.
    pub fn estimate(&self) -> Vector2<f64> {
        self.xa
    }

    /// Advances the estimate by one period given measurement `y` and the
    /// control input `u` applied over that period.
    pub fn update(&mut self, y: f64, u: f64) -> Vector2<f64> {
        let dt = self.dtime;
        let k1 = self.derivative(&self.xa, y, u) * (dt * 0.5);
        let k2 = self.derivative(&(self.xa + k1), y, u) * (dt * 0.5);
        let k3 = self.derivative(&(self.xa + k2), y, u) * dt;
        let k4 = self.derivative(&(self.xa + k3), y, u) * dt;
        self.xa += k1 / 3.0 + k2 * (2.0 / 3.0) + k3 / 3.0 + k4 / 6.0;
        self.xa
    }

    fn derivative(&self, z: &Vector2<f64>, y: f64, u: f64) -> Vector2<f64> {
        let innovation = y - z[0];
        Vector2::new(
            z[1] + self.gains.kd * innovation,
            self.coeff * u + self.gains.kp * innovation,
        )
    }
}

/// The observer's error dynamics are the second order design with a unit
/// coefficient.
fn observer_gains(poles: Poles) -> PdGains {
    poles.pd_gains(1.0).unwrap_or_default()
}

/// Three-state observer: position, velocity and the integral of the
/// estimation error.
///
/// The model is
///
/// `D xa0 = xa1 - Kd·(xa0 - y)`
/// `D xa1 = coeff·u - Kp·(xa0 - y) - Ki·integral`
/// `D integral = xa0 - y`
///
/// whose characteristic equation `s³ + Kd·s² + Kp·s + Ki = 0` is the same
/// one the PID controller places, so the gains come from the same formulas
/// with a unit coefficient.
///
/// Updates use a semi-implicit trapezoidal step solved with three
/// fixed-point sub-iterations (local error `O(dt²)`). The half-step terms of
/// the previous update (`ir`, `xr`, `vr`) are carried across calls.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StateObserverWithIntegral {
    coeff: f64,
    dtime: f64,
    gains: PidGains,
    xa: Vector2<f64>,
    integral: f64,
    ir: f64,
    xr: f64,
    vr: f64,
}

const SUB_ITERATIONS: usize = 3;

impl StateObserverWithIntegral {
    /// Creates an observer with the default poles `-5, -2 ± 2i`.
    pub fn new(coeff: f64, dtime: f64) -> Self {
        Self::with_gains(coeff, dtime, unit_pid_gains(Poles::default()))
    }

    pub fn with_poles(coeff: f64, dtime: f64, poles: Poles) -> Self {
        Self::with_gains(coeff, dtime, unit_pid_gains(poles))
    }

    fn with_gains(coeff: f64, dtime: f64, gains: PidGains) -> Self {
        Self {
            coeff,
            dtime,
            gains,
            xa: Vector2::zeros(),
            integral: 0.0,
            ir: 0.0,
            xr: 0.0,
            vr: 0.0,
        }
    }

    pub fn set_poles(&mut self, poles: Poles) {
        self.gains = unit_pid_gains(poles);
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn set_coeff(&mut self, coeff: f64) {
        self.coeff = coeff;
    }

    /// Seeds the state for a clean resume from known position, velocity and
    /// integral. The carried half-step terms are those of a previous update
    /// that ended exactly on the measurement.
    pub fn set_initial_values(&mut self, x: f64, v: f64, integral: f64) {
        let half = self.dtime * 0.5;
        self.xa = Vector2::new(x, v);
        self.integral = integral;
        self.ir = integral;
        self.xr = x + v * half;
        self.vr = v - self.gains.ki * half * integral;
    }

    pub fn estimate(&self) -> Vector2<f64> {
        self.xa
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn dtime(&self) -> f64 {
        self.dtime
    }

    pub fn update(&mut self, y: f64, u: f64) -> Vector2<f64> {
        let PidGains { kp, ki, kd } = self.gains;
        let half = self.dtime * 0.5;
        for _ in 0..SUB_ITERATIONS {
            self.xa[1] = self.vr + self.coeff * u * self.dtime
                - kp * half * (self.xa[0] - y)
                - ki * half * self.integral;
            self.xa[0] = self.xr + self.xa[1] * half - kd * half * (self.xa[0] - y);
            self.integral = self.ir + half * (self.xa[0] - y);
        }
        let error = self.xa[0] - y;
        self.ir = self.integral + half * error;
        self.xr = self.xa[0] + self.xa[1] * half - kd * half * error;
        self.vr = self.xa[1] - kp * half * error - ki * half * self.integral;
        self.xa
    }
}

fn unit_pid_gains(poles: Poles) -> PidGains {
    // A unit coefficient never fails the degeneracy check.
    poles.pid_gains(1.0).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_observer_gains_from_poles() {
        let complex = StateObserver::with_poles(1.0, 0.02, Poles::Complex { a: 0.0, b: 3.0, c: 4.0 });
        assert_relative_eq!(complex.gains().kd, 6.0);
        assert_relative_eq!(complex.gains().kp, 25.0);

        let real = StateObserver::with_poles(1.0, 0.02, Poles::Real { a: 2.0, b: 7.0, c: 0.0 });
        assert_relative_eq!(real.gains().kd, 9.0);
        assert_relative_eq!(real.gains().kp, 14.0);

        let default = StateObserver::new(1.0, 0.02);
        assert_relative_eq!(default.gains().kd, 10.0);
        assert_relative_eq!(default.gains().kp, 50.0);
    }

    #[test]
    fn test_integral_observer_gains_match_controller_design() {
        let observer = StateObserverWithIntegral::new(100.0, 0.02);
        assert_relative_eq!(observer.gains().kd, 9.0);
        assert_relative_eq!(observer.gains().kp, 28.0);
        assert_relative_eq!(observer.gains().ki, 40.0);
    }

    #[test]
    fn test_runge_kutta_converges_to_constant_position() {
        let mut observer = StateObserver::new(100.0, 0.02);
        for _ in 0..200 {
            observer.update(5.0, 0.0);
        }
        for step in 200..500 {
            let xa = observer.update(5.0, 0.0);
            assert!((xa[0] - 5.0).abs() < 1e-3, "estimate left the band at step {}: {}", step, xa[0]);
        }
        assert_relative_eq!(observer.estimate()[0], 5.0, epsilon = 1e-9);
        assert_relative_eq!(observer.estimate()[1], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_runge_kutta_single_step() {
        // Pure model propagation: D xa0 = xa1, D xa1 = coeff·u.
        let mut observer = StateObserver::with_poles(2.0, 0.1, Poles::Real { a: 0.0, b: 0.0, c: 0.0 });
        observer.set_initial_values(1.0, 3.0);
        let xa = observer.update(0.0, 5.0);
        // Exact for a constant acceleration of 10: x = 1 + 0.3 + 0.05, v = 3 + 1
        assert_relative_eq!(xa[0], 1.35, epsilon = 1e-12);
        assert_relative_eq!(xa[1], 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_integral_observer_converges_to_constant_position() {
        let mut observer = StateObserverWithIntegral::new(100.0, 0.02);
        for _ in 0..400 {
            observer.update(5.0, 0.0);
        }
        for _ in 0..100 {
            let xa = observer.update(5.0, 0.0);
            assert!((xa[0] - 5.0).abs() < 1e-3, "position estimate {}", xa[0]);
            assert!(xa[1].abs() < 1e-2, "velocity estimate {}", xa[1]);
        }
        assert!(observer.integral().abs() < 1e-3);
    }

    #[test]
    fn test_integral_observer_tracks_ramp() {
        let dt = 0.02;
        let mut observer = StateObserverWithIntegral::new(100.0, dt);
        observer.set_initial_values(0.0, 50.0, 0.0);
        let mut xa = observer.estimate();
        for i in 1..=1000 {
            xa = observer.update(50.0 * i as f64 * dt, 0.0);
        }
        assert_relative_eq!(xa[1], 50.0, epsilon = 0.5);
    }

    #[test]
    fn test_seeded_resume_has_no_transient() {
        let dt = 0.02;
        let mut observer = StateObserverWithIntegral::new(100.0, dt);
        observer.set_initial_values(3.0, 2.0, 0.0);
        for i in 1..=50 {
            let y = 3.0 + 2.0 * i as f64 * dt;
            let xa = observer.update(y, 0.0);
            assert!((xa[0] - y).abs() < 1e-3, "step {}: {} vs {}", i, xa[0], y);
        }
    }

    #[test]
    fn test_clone_is_independent() {
        let mut observer = StateObserverWithIntegral::new(10.0, 0.02);
        observer.update(1.0, 0.0);
        let snapshot = observer;
        observer.update(1.0, 0.0);
        assert_ne!(snapshot.estimate(), observer.estimate());
    }
}
