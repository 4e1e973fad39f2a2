use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// One inertial and altitude sample, already scaled to engineering values:
/// angles in milliradians, rates in milliradians per second, heights in
/// millimeters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub droll: f64,
    pub dpitch: f64,
    pub dyaw: f64,
    pub ddx: f64,
    pub ddy: f64,
    pub ddz: f64,
    pub z: f64,
    pub dz: f64,
}

/// Attitude and height the vehicle should hold this cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationTarget {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub z: f64,
}

/// Commands for the four motors of a plus-configured quadrotor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorSignals {
    pub front: i16,
    pub right: i16,
    pub rear: i16,
    pub left: i16,
}

impl MotorSignals {
    pub fn new(front: i16, right: i16, rear: i16, left: i16) -> Self {
        Self { front, right, rear, left }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// Per-axis contributions reported alongside the motor signals.
///
/// While flying these are the controller outputs and the change in total
/// thrust. During the motor test they carry the step being applied to each
/// motor (front in `roll`, right in `pitch`, rear in `z`, left in `yaw`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorOffsets {
    pub roll: i16,
    pub pitch: i16,
    pub yaw: i16,
    pub z: i16,
}

impl MotorOffsets {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Flight mode of the vehicle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AltitudeMode {
    #[default]
    Ground,
    Flying,
    Shutdown,
}

impl AltitudeMode {
    /// Wire code shown to the ground station.
    pub fn code(&self) -> u8 {
        match self {
            AltitudeMode::Ground => 0x00,
            AltitudeMode::Flying => 0x01,
            AltitudeMode::Shutdown => 0x02,
        }
    }
}

impl fmt::Display for AltitudeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AltitudeMode::Ground => "ground",
            AltitudeMode::Flying => "flying",
            AltitudeMode::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

/// Axes whose measurement is outside tolerance of the target.
///
/// Purely informational; nothing in the control path reads it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControlState(u8);

impl ControlState {
    pub const ADJUSTING_ROLL: ControlState = ControlState(0x01);
    pub const ADJUSTING_PITCH: ControlState = ControlState(0x02);
    pub const ADJUSTING_YAW: ControlState = ControlState(0x04);
    pub const ADJUSTING_Z: ControlState = ControlState(0x08);

    pub fn empty() -> Self {
        ControlState(0)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn contains(&self, other: ControlState) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, other: ControlState) {
        self.0 |= other.0;
    }
}

impl BitOr for ControlState {
    type Output = ControlState;

    fn bitor(self, rhs: ControlState) -> ControlState {
        ControlState(self.0 | rhs.0)
    }
}

/// Last per-axis controller outputs, `z` including gravity and tilt
/// compensation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ThrustComponents {
    pub u_roll: f64,
    pub u_pitch: f64,
    pub u_yaw: f64,
    pub u_z: f64,
}

/// Status bundle sent back to the operator terminal each cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportToGround {
    pub sensor: SensorSnapshot,
    pub motor_signals: MotorSignals,
    pub motor_offsets: MotorOffsets,
    pub altitude_mode: AltitudeMode,
    pub control_state: ControlState,
}
