use crate::error::ControlError;
use crate::poles::{PdGains, PidGains, Poles};

/// Three-term controller for one axis of the plant `Dx = v`, `Dv = coeff·u`.
///
/// The control law is
///
/// `integral += (x - target)·dt`, `u = -Kp·x - Kd·v - Ki·integral`
///
/// The proportional and derivative terms act on the raw measurement; the
/// target only enters through the integral. At steady state the integral
/// drives `x` to the target while the output stays smooth when the target
/// steps.
///
/// Gains come either from pole placement ([`PidController::with_poles`]) or
/// are set directly ([`PidController::manual`]).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PidController {
    /// Plant coupling from output to acceleration (zero for manual gains)
    coeff: f64,
    /// Control period in seconds
    dtime: f64,
    integral: f64,
    gains: PidGains,
}

impl PidController {
    /// Creates a controller with the default poles `-5, -2 ± 2i`.
    pub fn new(coeff: f64, dtime: f64) -> Result<Self, ControlError> {
        Self::with_poles(coeff, dtime, Poles::default())
    }

    /// Creates a controller whose closed loop has the given poles.
    ///
    /// # Errors
    ///
    /// [`ControlError::DegenerateCoefficient`] when `coeff` is zero or not finite.
    ///
    /// # Example
    ///
    /// let pid = PidController::with_poles(1000.0, 0.02, Poles::Complex { a: 5.0, b: 2.0, c: 2.0 })?;
    /// assert!((pid.gains().kd - 0.009).abs() < 1e-12);
    pub fn with_poles(coeff: f64, dtime: f64, poles: Poles) -> Result<Self, ControlError> {
        Ok(Self {
            coeff,
            dtime,
            integral: 0.0,
            gains: poles.pid_gains(coeff)?,
        })
    }

    /// Creates a controller from explicit gains.
    pub fn manual(dtime: f64, gains: PidGains) -> Self {
        Self {
            coeff: 0.0,
            dtime,
            integral: 0.0,
            gains,
        }
    }

    /// Re-derives the gains from new poles, keeping the integral state.
    pub fn set_poles(&mut self, poles: Poles) -> Result<(), ControlError> {
        self.gains = poles.pid_gains(self.coeff)?;
        Ok(())
    }

    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn coeff(&self) -> f64 {
        self.coeff
    }

    pub fn dtime(&self) -> f64 {
        self.dtime
    }

    /// Cold start: back to `x = 0, v = 0, u = 0`.
    pub fn reset_integral(&mut self) {
        self.integral = 0.0;
    }

    /// Seeds the integral so that control resumed at measured `(x, v)`
    /// reproduces the previously applied output `u`.
    ///
    /// # Errors
    ///
    /// [`ControlError::ZeroIntegralGain`] when `Ki` is zero; the integral is
    /// left unchanged.
    pub fn reset_integral_at(&mut self, x: f64, v: f64, u: f64) -> Result<(), ControlError> {
        let PidGains { kp, ki, kd } = self.gains;
        if ki == 0.0 {
            return Err(ControlError::ZeroIntegralGain);
        }
        self.integral = -(u + kp * x + kd * v) / ki;
        Ok(())
    }

    /// Computes the output for measurement `x`, its rate `v` and the target.
    pub fn control(&mut self, x: f64, v: f64, target: f64) -> f64 {
        let PidGains { kp, ki, kd } = self.gains;
        self.integral += (x - target) * self.dtime;
        -kp * x - kd * v - ki * self.integral
    }
}

/// Two-term controller: `u = -Kp·(x - target) - Kd·v`.
///
/// Placing the roots of `s² + coeff·Kd·s + coeff·Kp = 0`. There is no
/// integral, so integral resets are accepted and ignored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PdController {
    coeff: f64,
    gains: PdGains,
}

impl PdController {
    /// Creates a controller with the default poles `-2 ± 2i`.
    pub fn new(coeff: f64) -> Result<Self, ControlError> {
        Self::with_poles(coeff, Poles::default())
    }

    pub fn with_poles(coeff: f64, poles: Poles) -> Result<Self, ControlError> {
        Ok(Self {
            coeff,
            gains: poles.pd_gains(coeff)?,
        })
    }

    pub fn manual(gains: PdGains) -> Self {
        Self { coeff: 0.0, gains }
    }

    pub fn set_poles(&mut self, poles: Poles) -> Result<(), ControlError> {
        self.gains = poles.pd_gains(self.coeff)?;
        Ok(())
    }

    pub fn set_gains(&mut self, gains: PdGains) {
        self.gains = gains;
    }

    pub fn gains(&self) -> PdGains {
        self.gains
    }

    pub fn control(&self, x: f64, v: f64, target: f64) -> f64 {
        -self.gains.kp * (x - target) - self.gains.kd * v
    }
}

/// Three-term controller with a slew-limited target and a bounded output.
///
/// Each call moves the smoothed target at most `max_change` towards the real
/// target, then applies
///
/// `integral += (x - ts)·dt`, `u = -Kp·(x - ts) - Kd·v - Ki·integral`
///
/// Unlike [`PidController`] the proportional term acts on the error. When the
/// output exceeds `±u_bound` it is clamped and the integral is moved back by
/// the excess so it does not wind up against the limit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SmoothedBoundedPid {
    coeff: f64,
    dtime: f64,
    integral: f64,
    gains: PidGains,
    target_smoothed: f64,
    max_change: f64,
    /// Negative disables saturation
    u_bound: f64,
}

/// Slew limit used until [`SmoothedBoundedPid::set_max_change`] is called.
pub const DEFAULT_MAX_CHANGE: f64 = 1_000_000.0;

impl SmoothedBoundedPid {
    pub fn new(coeff: f64, dtime: f64) -> Result<Self, ControlError> {
        Self::with_poles(coeff, dtime, Poles::default())
    }

    pub fn with_poles(coeff: f64, dtime: f64, poles: Poles) -> Result<Self, ControlError> {
        Ok(Self {
            coeff,
            dtime,
            integral: 0.0,
            gains: poles.pid_gains(coeff)?,
            target_smoothed: 0.0,
            max_change: DEFAULT_MAX_CHANGE,
            u_bound: -1.0,
        })
    }

    pub fn manual(dtime: f64, gains: PidGains) -> Self {
        Self {
            coeff: 0.0,
            dtime,
            integral: 0.0,
            gains,
            target_smoothed: 0.0,
            max_change: DEFAULT_MAX_CHANGE,
            u_bound: -1.0,
        }
    }

    /// Builder form of [`set_u_bound`](Self::set_u_bound) and
    /// [`set_max_change`](Self::set_max_change).
    pub fn bounded(mut self, u_bound: f64, max_change: f64) -> Self {
        self.set_u_bound(u_bound);
        self.set_max_change(max_change);
        self
    }

    /// Output limit; the magnitude of `bound` is used.
    pub fn set_u_bound(&mut self, bound: f64) {
        self.u_bound = bound.abs();
    }

    /// Removes the output limit.
    pub fn clear_u_bound(&mut self) {
        self.u_bound = -1.0;
    }

    /// Largest target step per call; the magnitude of `max_change` is used.
    pub fn set_max_change(&mut self, max_change: f64) {
        self.max_change = max_change.abs();
    }

    pub fn set_poles(&mut self, poles: Poles) -> Result<(), ControlError> {
        self.gains = poles.pid_gains(self.coeff)?;
        Ok(())
    }

    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn target_smoothed(&self) -> f64 {
        self.target_smoothed
    }

    pub fn u_bound(&self) -> f64 {
        self.u_bound
    }

    pub fn dtime(&self) -> f64 {
        self.dtime
    }

    /// Zeroes both the integral and the smoothed target.
    pub fn reset_integral(&mut self) {
        self.integral = 0.0;
        self.target_smoothed = 0.0;
    }

    /// Seeds the integral against the current smoothed target.
    pub fn reset_integral_at(&mut self, x: f64, v: f64, u: f64) -> Result<(), ControlError> {
        let target = self.target_smoothed;
        self.reset_integral_with_target(x, v, target, u)
    }

    /// Seeds the integral so that `(x, v)` against `target` yields `u`.
    pub fn reset_integral_with_target(
        &mut self,
        x: f64,
        v: f64,
        target: f64,
        u: f64,
    ) -> Result<(), ControlError> {
        let PidGains { kp, ki, kd } = self.gains;
        if ki == 0.0 {
            return Err(ControlError::ZeroIntegralGain);
        }
        self.integral = -(u + kp * (x - target) + kd * v) / ki;
        Ok(())
    }

    pub fn reset_smoothed_target(&mut self, value: f64) {
        self.target_smoothed = value;
    }

    pub fn control(&mut self, x: f64, v: f64, target: f64) -> f64 {
        let PidGains { kp, ki, kd } = self.gains;
        self.target_smoothed += (target - self.target_smoothed).clamp(-self.max_change, self.max_change);
        let error = x - self.target_smoothed;
        self.integral += error * self.dtime;

        let u = -kp * error - kd * v - ki * self.integral;
        if self.u_bound < 0.0 {
            return u;
        }
        let bounded = u.clamp(-self.u_bound, self.u_bound);
        if bounded != u && ki != 0.0 {
            self.integral += (u - bounded) / ki;
        }
        bounded
    }
}

/// The controller variant driving one axis, chosen from configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AxisController {
    Pid(PidController),
    Pd(PdController),
    SmoothedBounded(SmoothedBoundedPid),
}

impl AxisController {
    pub fn control(&mut self, x: f64, v: f64, target: f64) -> f64 {
        match self {
            AxisController::Pid(c) => c.control(x, v, target),
            AxisController::Pd(c) => c.control(x, v, target),
            AxisController::SmoothedBounded(c) => c.control(x, v, target),
        }
    }

    pub fn reset_integral(&mut self) {
        match self {
            AxisController::Pid(c) => c.reset_integral(),
            AxisController::Pd(_) => {}
            AxisController::SmoothedBounded(c) => c.reset_integral(),
        }
    }

    pub fn reset_integral_at(&mut self, x: f64, v: f64, u: f64) -> Result<(), ControlError> {
        match self {
            AxisController::Pid(c) => c.reset_integral_at(x, v, u),
            AxisController::Pd(_) => Ok(()),
            AxisController::SmoothedBounded(c) => c.reset_integral_at(x, v, u),
        }
    }

    /// Control period, `None` for the PD variant which does not integrate.
    pub fn dtime(&self) -> Option<f64> {
        match self {
            AxisController::Pid(c) => Some(c.dtime()),
            AxisController::Pd(_) => None,
            AxisController::SmoothedBounded(c) => Some(c.dtime()),
        }
    }

    /// Gains as a three-term set; `ki` is zero for the PD variant.
    pub fn gains(&self) -> PidGains {
        match self {
            AxisController::Pid(c) => c.gains(),
            AxisController::Pd(c) => PidGains {
                kp: c.gains().kp,
                ki: 0.0,
                kd: c.gains().kd,
            },
            AxisController::SmoothedBounded(c) => c.gains(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pole_placement_constructor() {
        let pid = PidController::with_poles(1000.0, 0.02, Poles::Complex { a: 5.0, b: 2.0, c: 2.0 }).unwrap();
        assert_relative_eq!(pid.gains().kd, 0.009, epsilon = 1e-12);
        assert_relative_eq!(pid.gains().kp, 0.028, epsilon = 1e-12);
        assert_relative_eq!(pid.gains().ki, 0.04, epsilon = 1e-12);
        assert_eq!(pid, PidController::new(1000.0, 0.02).unwrap());
    }

    #[test]
    fn test_control_law_uses_raw_measurement() {
        let mut pid = PidController::manual(0.5, PidGains { kp: 2.0, ki: 1.0, kd: 3.0 });
        // integral = (1 - 4)·0.5 = -1.5, u = -2 - 6 + 1.5
        assert_relative_eq!(pid.control(1.0, 2.0, 4.0), -6.5);
        assert_relative_eq!(pid.integral(), -1.5);
        // Target only changes the integral increment.
        let mut other = PidController::manual(0.5, PidGains { kp: 2.0, ki: 0.0, kd: 3.0 });
        assert_relative_eq!(other.control(1.0, 2.0, 4.0), other.control(1.0, 2.0, -100.0));
    }

    #[test]
    fn test_reset_integral_at_reproduces_output() {
        let mut pid = PidController::with_poles(350.0, 0.02, Poles::Real { a: 2.0, b: 1.0, c: 1.0 }).unwrap();
        let (x, v, u) = (120.0, -15.0, 42.0);
        pid.reset_integral_at(x, v, u).unwrap();
        assert_relative_eq!(pid.control(x, v, x), u, epsilon = 1e-9);

        pid.reset_integral();
        assert_eq!(pid.integral(), 0.0);
    }

    #[test]
    fn test_reset_integral_at_zero_ki() {
        let mut pid = PidController::manual(0.02, PidGains { kp: 1.0, ki: 0.0, kd: 1.0 });
        pid.control(1.0, 0.0, 0.0);
        let before = pid.integral();
        assert_eq!(pid.reset_integral_at(1.0, 0.0, 5.0), Err(ControlError::ZeroIntegralGain));
        assert_eq!(pid.integral(), before);
    }

    #[test]
    fn test_pd_control() {
        let pd = PdController::with_poles(2.0, Poles::Complex { a: 0.0, b: 2.0, c: 2.0 }).unwrap();
        assert_relative_eq!(pd.gains().kd, 2.0);
        assert_relative_eq!(pd.gains().kp, 4.0);
        assert_relative_eq!(pd.control(3.0, 1.0, 1.0), -4.0 * 2.0 - 2.0);

        let mut axis = AxisController::Pd(pd);
        assert_eq!(axis.reset_integral_at(1.0, 1.0, 1.0), Ok(()));
        assert_eq!(axis.gains().ki, 0.0);
    }

    #[test]
    fn test_target_slew_limit() {
        let mut pid = SmoothedBoundedPid::manual(0.02, PidGains { kp: 1.0, ki: 1.0, kd: 0.0 }).bounded(1.0e9, 20.0);
        for step in 1..=5 {
            pid.control(0.0, 0.0, 1000.0);
            assert_relative_eq!(pid.target_smoothed(), 20.0 * step as f64);
        }
        pid.reset_smoothed_target(990.0);
        pid.control(0.0, 0.0, 1000.0);
        assert_relative_eq!(pid.target_smoothed(), 1000.0);
        pid.reset_integral();
        assert_eq!(pid.target_smoothed(), 0.0);
        assert_eq!(pid.integral(), 0.0);
    }

    #[test]
    fn test_unbounded_when_bound_not_set() {
        let mut pid = SmoothedBoundedPid::manual(1.0, PidGains { kp: 10.0, ki: 0.0, kd: 0.0 });
        assert_relative_eq!(pid.control(100.0, 0.0, 0.0), -1000.0);
    }

    #[test]
    fn test_output_never_exceeds_bound() {
        let mut pid = SmoothedBoundedPid::with_poles(50.0, 0.02, Poles::Complex { a: 5.0, b: 2.0, c: 2.0 })
            .unwrap()
            .bounded(-30.0, 5.0);
        assert_eq!(pid.u_bound(), 30.0);
        let mut seed = 12345_u64;
        for _ in 0..2000 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let x = ((seed >> 11) as f64 / (1u64 << 53) as f64 - 0.5) * 1.0e5;
            let v = ((seed >> 7) % 2001) as f64 - 1000.0;
            let target = ((seed >> 3) % 4001) as f64 - 2000.0;
            let u = pid.control(x, v, target);
            assert!(u.abs() <= 30.0, "output {} exceeds bound", u);
        }
    }

    #[test]
    fn test_anti_windup_backs_off_integral() {
        let gains = PidGains { kp: 0.0, ki: 2.0, kd: 0.0 };
        let mut pid = SmoothedBoundedPid::manual(1.0, gains).bounded(10.0, 1.0e6);
        // integral = 100, u = -200, clamped to -10, integral corrected to 5
        let u = pid.control(100.0, 0.0, 0.0);
        assert_relative_eq!(u, -10.0);
        assert_relative_eq!(pid.integral(), 5.0);
        // Release: measurement back on target, the integral has not wound up.
        let u = pid.control(0.0, 0.0, 0.0);
        assert_relative_eq!(u, -10.0);
    }

    #[test]
    fn test_smoothed_reset_integral_at_target() {
        let mut pid = SmoothedBoundedPid::with_poles(100.0, 0.02, Poles::Real { a: 1.0, b: 2.0, c: 3.0 }).unwrap();
        pid.reset_smoothed_target(50.0);
        pid.reset_integral_at(60.0, 3.0, -7.0).unwrap();
        assert_relative_eq!(pid.control(60.0, 3.0, 50.0), -7.0 - pid.gains().ki * 10.0 * 0.02, epsilon = 1e-9);
    }

    #[test]
    fn test_axis_controller_dispatch() {
        let mut axis = AxisController::Pid(PidController::manual(1.0, PidGains { kp: 1.0, ki: 1.0, kd: 1.0 }));
        assert_relative_eq!(axis.control(1.0, 1.0, 0.0), -3.0);
        axis.reset_integral();
        assert_relative_eq!(axis.control(1.0, 1.0, 1.0), -2.0);
    }
}
