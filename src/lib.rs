//! Attitude and altitude control core for a quadrotor.
//!
//! Per-axis controllers with gains obtained by pole placement, state
//! observers that reconstruct velocity from noisy position readings, a
//! winding-number angle unwrapper, and the [`ControlCycle`] that mixes the
//! per-axis outputs into four motor commands while tracking the flight mode.
//!
//! Angles are in milliradians and heights in millimeters throughout, as
//! delivered by the sensor packets.

pub mod angle;
pub mod coefficients;
pub mod config;
pub mod control;
pub mod error;
pub mod observer;
pub mod pid;
pub mod poles;
pub mod types;

pub use angle::AngleUnwrapper;
pub use coefficients::{DerivedCoefficients, PhysicalConstants};
pub use config::{AxisTuning, AxisTuningUpdate, ConfigUpdate, ControlConfig, PoleMode};
pub use control::{mix_motor_commands, Axis, ControlCycle};
pub use error::ControlError;
pub use observer::{StateObserver, StateObserverWithIntegral};
pub use pid::{AxisController, PdController, PidController, SmoothedBoundedPid};
pub use poles::{PdGains, PidGains, Poles};
pub use types::{
    AltitudeMode, ControlState, MotorOffsets, MotorSignals, NavigationTarget, ReportToGround,
    SensorSnapshot, ThrustComponents,
};
