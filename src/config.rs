use serde::{Deserialize, Serialize};

use crate::coefficients::PhysicalConstants;
use crate::error::ControlError;
use crate::poles::{PdGains, PidGains, Poles};

/// How the per-axis controller gains are obtained.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoleMode {
    /// Gains are taken verbatim from `kp`, `ki`, `kd`
    Manual,
    /// Three real poles `-a, -b, -c`
    #[default]
    Real,
    /// One real pole `-a` and the pair `-b ± ci`
    Complex,
}

impl PoleMode {
    /// Maps the numeric selector used by operator terminals
    /// (0 manual, 1 real, 2 complex).
    pub fn from_index(index: i32) -> Result<Self, ControlError> {
        match index {
            0 => Ok(PoleMode::Manual),
            1 => Ok(PoleMode::Real),
            2 => Ok(PoleMode::Complex),
            other => Err(ControlError::InvalidPoleMode(other)),
        }
    }

    pub fn index(&self) -> i32 {
        match self {
            PoleMode::Manual => 0,
            PoleMode::Real => 1,
            PoleMode::Complex => 2,
        }
    }
}

/// Tuning of one axis: pole locations for pole placement and gains for
/// manual mode. Only the set selected by [`PoleMode`] is used.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisTuning {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl Default for AxisTuning {
    fn default() -> Self {
        Self::attitude()
    }
}

impl AxisTuning {
    /// Altitude axis defaults
    pub fn altitude() -> Self {
        Self {
            a: 2.0,
            b: 1.0,
            c: 1.0,
            kp: 1.29,
            ki: 0.97,
            kd: 0.376,
        }
    }

    /// Roll and pitch defaults
    pub fn attitude() -> Self {
        Self {
            a: 2.0,
            b: 1.0,
            c: 1.0,
            kp: 0.10,
            ki: 0.103,
            kd: 0.0165,
        }
    }

    /// Yaw defaults
    pub fn heading() -> Self {
        Self {
            a: 1.0,
            b: 0.5,
            c: 0.5,
            kp: 0.3,
            ki: 0.58,
            kd: 0.07,
        }
    }

    /// Pole locations for the given mode, `None` for manual gains.
    pub fn poles(&self, mode: PoleMode) -> Option<Poles> {
        let (a, b, c) = (self.a, self.b, self.c);
        match mode {
            PoleMode::Manual => None,
            PoleMode::Real => Some(Poles::Real { a, b, c }),
            PoleMode::Complex => Some(Poles::Complex { a, b, c }),
        }
    }

    pub fn pid_gains(&self) -> PidGains {
        PidGains {
            kp: self.kp,
            ki: self.ki,
            kd: self.kd,
        }
    }

    pub fn pd_gains(&self) -> PdGains {
        PdGains {
            kp: self.kp,
            kd: self.kd,
        }
    }

    fn apply(&mut self, update: &AxisTuningUpdate) {
        set(&mut self.a, update.a);
        set(&mut self.b, update.b);
        set(&mut self.c, update.c);
        set(&mut self.kp, update.kp);
        set(&mut self.ki, update.ki);
        set(&mut self.kd, update.kd);
    }
}

/// Complete control configuration.
///
/// Angles are in milliradians, heights in millimeters and motor values in
/// raw motor signal units, matching the sensor and command packets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Control period [s]
    pub controller_period: f64,
    /// Motor signal sum that balances the vehicle's weight
    pub gravity: f64,
    /// Gravitational acceleration [m/s²]
    pub gravitational_acceleration: f64,
    /// Effective lever arm for roll [m]
    pub effective_x_length: f64,
    /// Effective lever arm for pitch [m]
    pub effective_y_length: f64,
    /// Effective lever arm for yaw torque [m]
    pub effective_z_length: f64,

    pub use_pd_controller: bool,
    pub pole_mode: PoleMode,
    pub use_smoothed_pid_controller: bool,
    /// Output limit of the smoothed controller, negative disables it
    pub u_bound: f64,
    /// Largest target step per cycle of the smoothed controller
    pub pid_controller_max_change: f64,

    pub z: AxisTuning,
    pub roll: AxisTuning,
    pub pitch: AxisTuning,
    pub yaw: AxisTuning,

    /// Estimate altitude and climb rate with an integral observer
    pub use_state_observer: bool,
    pub observer_z: Poles,

    /// Roll or pitch beyond this forces a shutdown [mrad]
    pub shutdown_angle: f64,
    pub tolerance_z: f64,
    pub tolerance_roll: f64,
    pub tolerance_pitch: f64,
    pub tolerance_yaw: f64,

    /// Run the motor test sequence while on the ground
    pub test_mode: bool,
    pub control_yaw: bool,
    /// Drive the altitude axis directly from the commanded height
    pub thrust_z_control: bool,

    pub motor_test_min: i16,
    pub motor_test_max: i16,
    pub motor_test_step: i16,
    pub motor_revving_up: i16,
    pub motor_revving_down: i16,

    /// Horizontal distance from the sonar to the center of the frame [mm]
    pub sonar_distance_from_center_mm: f64,
    pub angle_factor: f64,
    pub angular_rate_factor: f64,
    pub accel_factor: f64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        let physical = PhysicalConstants::default();
        Self {
            controller_period: 0.020,
            gravity: physical.gravity,
            gravitational_acceleration: physical.gravitational_acceleration,
            effective_x_length: physical.effective_x_length,
            effective_y_length: physical.effective_y_length,
            effective_z_length: physical.effective_z_length,
            use_pd_controller: false,
            pole_mode: PoleMode::Real,
            use_smoothed_pid_controller: true,
            u_bound: 1000.0,
            pid_controller_max_change: 20.0,
            z: AxisTuning::altitude(),
            roll: AxisTuning::attitude(),
            pitch: AxisTuning::attitude(),
            yaw: AxisTuning::heading(),
            use_state_observer: false,
            observer_z: Poles::Real { a: 2.0, b: 1.0, c: 1.0 },
            shutdown_angle: 500.0,
            tolerance_z: 10.0,
            tolerance_roll: 26.0,
            tolerance_pitch: 26.0,
            tolerance_yaw: 26.0,
            test_mode: false,
            control_yaw: true,
            thrust_z_control: false,
            motor_test_min: 150,
            motor_test_max: 200,
            motor_test_step: 1,
            motor_revving_up: 8,
            motor_revving_down: 4,
            sonar_distance_from_center_mm: 130.0,
            angle_factor: 1.0,
            angular_rate_factor: 1.0,
            accel_factor: 1.0,
        }
    }
}

impl ControlConfig {
    pub fn physical_constants(&self) -> PhysicalConstants {
        PhysicalConstants {
            gravity: self.gravity,
            gravitational_acceleration: self.gravitational_acceleration,
            effective_x_length: self.effective_x_length,
            effective_y_length: self.effective_y_length,
            effective_z_length: self.effective_z_length,
        }
    }

    /// Checks the values no controller can be built from.
    pub fn validate(&self) -> Result<(), ControlError> {
        positive("controller_period", self.controller_period)?;
        positive("gravity", self.gravity)?;
        positive("gravitational_acceleration", self.gravitational_acceleration)?;
        positive("effective_x_length", self.effective_x_length)?;
        positive("effective_y_length", self.effective_y_length)?;
        positive("effective_z_length", self.effective_z_length)?;

        finite("u_bound", self.u_bound)?;
        finite("pid_controller_max_change", self.pid_controller_max_change)?;
        finite("shutdown_angle", self.shutdown_angle)?;
        finite("sonar_distance_from_center_mm", self.sonar_distance_from_center_mm)?;
        for (name, tolerance) in [
            ("tolerance_z", self.tolerance_z),
            ("tolerance_roll", self.tolerance_roll),
            ("tolerance_pitch", self.tolerance_pitch),
            ("tolerance_yaw", self.tolerance_yaw),
        ] {
            if !tolerance.is_finite() || tolerance < 0.0 {
                return Err(ControlError::InvalidConfig(format!("{} must be non-negative, got {}", name, tolerance)));
            }
        }
        for (name, factor) in [
            ("angle_factor", self.angle_factor),
            ("angular_rate_factor", self.angular_rate_factor),
            ("accel_factor", self.accel_factor),
        ] {
            if !factor.is_finite() || factor == 0.0 {
                return Err(ControlError::InvalidConfig(format!("{} must be finite and non-zero, got {}", name, factor)));
            }
        }
        for (name, tuning) in [("z", &self.z), ("roll", &self.roll), ("pitch", &self.pitch), ("yaw", &self.yaw)] {
            let values = [tuning.a, tuning.b, tuning.c, tuning.kp, tuning.ki, tuning.kd];
            if values.iter().any(|v| !v.is_finite()) {
                return Err(ControlError::InvalidConfig(format!("{} tuning contains a non-finite value", name)));
            }
        }

        if self.motor_test_min < 0 || self.motor_test_min > self.motor_test_max {
            return Err(ControlError::InvalidConfig(format!(
                "motor test range [{}, {}] is empty or negative",
                self.motor_test_min, self.motor_test_max
            )));
        }
        if self.motor_test_step < 0 || self.motor_revving_up < 0 || self.motor_revving_down < 0 {
            return Err(ControlError::InvalidConfig(
                "motor steps must be non-negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Applies every field set in `update`, leaving the others unchanged.
    pub fn apply(&mut self, update: &ConfigUpdate) {
        set(&mut self.controller_period, update.controller_period);
        set(&mut self.gravity, update.gravity);
        set(&mut self.gravitational_acceleration, update.gravitational_acceleration);
        set(&mut self.effective_x_length, update.effective_x_length);
        set(&mut self.effective_y_length, update.effective_y_length);
        set(&mut self.effective_z_length, update.effective_z_length);
        set(&mut self.use_pd_controller, update.use_pd_controller);
        set(&mut self.pole_mode, update.pole_mode);
        set(&mut self.use_smoothed_pid_controller, update.use_smoothed_pid_controller);
        set(&mut self.u_bound, update.u_bound);
        set(&mut self.pid_controller_max_change, update.pid_controller_max_change);
        self.z.apply(&update.z);
        self.roll.apply(&update.roll);
        self.pitch.apply(&update.pitch);
        self.yaw.apply(&update.yaw);
        set(&mut self.shutdown_angle, update.shutdown_angle);
        set(&mut self.tolerance_z, update.tolerance_z);
        set(&mut self.tolerance_roll, update.tolerance_roll);
        set(&mut self.tolerance_pitch, update.tolerance_pitch);
        set(&mut self.tolerance_yaw, update.tolerance_yaw);
        set(&mut self.test_mode, update.test_mode);
        set(&mut self.control_yaw, update.control_yaw);
        set(&mut self.thrust_z_control, update.thrust_z_control);
        set(&mut self.motor_test_min, update.motor_test_min);
        set(&mut self.motor_test_max, update.motor_test_max);
        set(&mut self.motor_test_step, update.motor_test_step);
        set(&mut self.motor_revving_up, update.motor_revving_up);
        set(&mut self.motor_revving_down, update.motor_revving_down);
        set(&mut self.sonar_distance_from_center_mm, update.sonar_distance_from_center_mm);
    }
}

/// Per-axis part of a [`ConfigUpdate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisTuningUpdate {
    pub a: Option<f64>,
    pub b: Option<f64>,
    pub c: Option<f64>,
    pub kp: Option<f64>,
    pub ki: Option<f64>,
    pub kd: Option<f64>,
}

impl AxisTuningUpdate {
    /// True when any pole location is supplied.
    pub fn touches_poles(&self) -> bool {
        self.a.is_some() || self.b.is_some() || self.c.is_some()
    }

    /// True when any manual gain is supplied.
    pub fn touches_gains(&self) -> bool {
        self.kp.is_some() || self.ki.is_some() || self.kd.is_some()
    }
}

/// Incremental runtime reconfiguration. Unset fields keep their current
/// value.
///
/// The sensor scaling factors are fixed at construction and cannot be
/// changed through an update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigUpdate {
    pub controller_period: Option<f64>,
    pub gravity: Option<f64>,
    pub gravitational_acceleration: Option<f64>,
    pub effective_x_length: Option<f64>,
    pub effective_y_length: Option<f64>,
    pub effective_z_length: Option<f64>,
    pub use_pd_controller: Option<bool>,
    pub pole_mode: Option<PoleMode>,
    pub use_smoothed_pid_controller: Option<bool>,
    pub u_bound: Option<f64>,
    pub pid_controller_max_change: Option<f64>,
    pub z: AxisTuningUpdate,
    pub roll: AxisTuningUpdate,
    pub pitch: AxisTuningUpdate,
    pub yaw: AxisTuningUpdate,
    pub shutdown_angle: Option<f64>,
    pub tolerance_z: Option<f64>,
    pub tolerance_roll: Option<f64>,
    pub tolerance_pitch: Option<f64>,
    pub tolerance_yaw: Option<f64>,
    pub test_mode: Option<bool>,
    pub control_yaw: Option<bool>,
    pub thrust_z_control: Option<bool>,
    pub motor_test_min: Option<i16>,
    pub motor_test_max: Option<i16>,
    pub motor_test_step: Option<i16>,
    pub motor_revving_up: Option<i16>,
    pub motor_revving_down: Option<i16>,
    pub sonar_distance_from_center_mm: Option<f64>,
}

fn set<T: Copy>(field: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *field = v;
    }
}

fn positive(name: &str, value: f64) -> Result<(), ControlError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ControlError::InvalidConfig(format!("{} must be positive, got {}", name, value)))
    }
}

fn finite(name: &str, value: f64) -> Result<(), ControlError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ControlError::InvalidConfig(format!("{} must be finite, got {}", name, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ControlConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pole_mode, PoleMode::Real);
        assert_eq!(config.yaw, AxisTuning::heading());
        assert_eq!(config.physical_constants(), PhysicalConstants::default());
    }

    #[test]
    fn test_pole_mode_index() {
        assert_eq!(PoleMode::from_index(0), Ok(PoleMode::Manual));
        assert_eq!(PoleMode::from_index(2), Ok(PoleMode::Complex));
        assert_eq!(PoleMode::from_index(3), Err(ControlError::InvalidPoleMode(3)));
        for mode in [PoleMode::Manual, PoleMode::Real, PoleMode::Complex] {
            assert_eq!(PoleMode::from_index(mode.index()), Ok(mode));
        }
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ControlConfig::default();
        config.controller_period = 0.0;
        assert!(matches!(config.validate(), Err(ControlError::InvalidConfig(_))));

        let mut config = ControlConfig::default();
        config.motor_test_min = 300;
        assert!(config.validate().is_err());

        let mut config = ControlConfig::default();
        config.roll.b = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = ControlConfig::default();
        config.effective_z_length = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_incremental_update() {
        let mut config = ControlConfig::default();
        let update = ConfigUpdate {
            gravity: Some(1400.0),
            roll: AxisTuningUpdate {
                b: Some(3.0),
                ..Default::default()
            },
            ..Default::default()
        };
        config.apply(&update);
        assert_eq!(config.gravity, 1400.0);
        assert_eq!(config.roll.b, 3.0);
        assert_eq!(config.roll.a, 2.0);
        assert_eq!(config.pitch, AxisTuning::attitude());
        assert!(update.roll.touches_poles());
        assert!(!update.roll.touches_gains());
        assert!(!update.z.touches_poles());
    }

    #[test]
    fn test_tuning_poles() {
        let tuning = AxisTuning::heading();
        assert_eq!(tuning.poles(PoleMode::Manual), None);
        assert_eq!(
            tuning.poles(PoleMode::Complex),
            Some(Poles::Complex { a: 1.0, b: 0.5, c: 0.5 })
        );
        assert_eq!(tuning.pid_gains().ki, 0.58);
    }
}
