use thiserror::Error;

/// Errors raised while building or retuning controllers.
///
/// Mode transitions and saturation are ordinary state, never errors. These
/// variants cover configuration that cannot produce a working controller and
/// the one numeric degeneracy the control laws can hit (a zero integral gain
/// during an integral back-solve).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    #[error("Invalid pole placement mode index: {0}")]
    InvalidPoleMode(i32),
    #[error("Plant coefficient must be finite and non-zero, got {0}")]
    DegenerateCoefficient(f64),
    #[error("Integral gain is zero, cannot back-solve the integral state")]
    ZeroIntegralGain,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
