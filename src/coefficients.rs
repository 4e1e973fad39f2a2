use serde::{Deserialize, Serialize};

/// Physical inputs from which the plant coefficients are derived.
///
/// # Fields
///
/// * `gravity` - Total motor signal needed to hover (overcome gravity)
/// * `gravitational_acceleration` - Gravitational acceleration (m/s²)
/// * `effective_x_length`, `effective_y_length` - Effective lever arms for roll and pitch (m)
/// * `effective_z_length` - Effective lever arm for yaw torque (m)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicalConstants {
    pub gravity: f64,
    pub gravitational_acceleration: f64,
    pub effective_x_length: f64,
    pub effective_y_length: f64,
    pub effective_z_length: f64,
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self {
            gravity: 1360.0,
            gravitational_acceleration: 9.8,
            effective_x_length: 0.0320,
            effective_y_length: 0.0320,
            effective_z_length: 0.906,
        }
    }
}

/// Plant coefficients consumed by the pole-placement controllers, one per
/// axis, in milli-units of acceleration per unit of motor signal.
///
/// `coefficient_z = g·1000 / gravity`, and each attitude coefficient is
/// `coefficient_z` divided by that axis's effective length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DerivedCoefficients {
    constants: PhysicalConstants,
    pub coefficient_z: f64,
    pub coefficient_roll: f64,
    pub coefficient_pitch: f64,
    pub coefficient_yaw: f64,
}

impl DerivedCoefficients {
    pub fn new(constants: PhysicalConstants) -> Self {
        let mut derived = Self {
            constants,
            coefficient_z: 0.0,
            coefficient_roll: 0.0,
            coefficient_pitch: 0.0,
            coefficient_yaw: 0.0,
        };
        derived.compute();
        derived
    }

    pub fn constants(&self) -> &PhysicalConstants {
        &self.constants
    }

    /// Replaces the physical inputs and recomputes every coefficient.
    pub fn modify(&mut self, constants: PhysicalConstants) {
        self.constants = constants;
        self.compute();
    }

    fn compute(&mut self) {
        let c = &self.constants;
        self.coefficient_z = c.gravitational_acceleration * 1000.0 / c.gravity;
        self.coefficient_roll = self.coefficient_z / c.effective_x_length;
        self.coefficient_pitch = self.coefficient_z / c.effective_y_length;
        self.coefficient_yaw = self.coefficient_z / c.effective_z_length;
    }
}
