use std::f64::consts::PI;

/// Half a turn in milliradians, the unit attitude angles arrive in.
pub const MILLI_PI: f64 = 1000.0 * PI;

/// Removes the ±π discontinuity from a bounded angle signal.
///
/// The unwrapper tracks how many full turns the raw signal has made (the
/// winding number) and reports a continuous angle relative to the first
/// sample it saw. By default it works in milliradians; use
/// [`AngleUnwrapper::with_half_turn`] for other units.
///
/// # Example
///
/// let mut yaw = AngleUnwrapper::new(3000.0);
/// assert_eq!(yaw.continuous_angle(), 0.0);
/// // Crossing +π to -π keeps the output continuous.
/// let next = yaw.update(-3000.0);
/// assert!(next > 0.0);
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AngleUnwrapper {
    winding_number: i64,
    /// Last continuous angle, before the initial offset is removed
    old_angle: f64,
    /// Normalized first sample, subtracted from every output
    initial_angle: f64,
    half_turn: f64,
}

impl AngleUnwrapper {
    /// Creates an unwrapper for milliradian input whose first reported
    /// continuous angle is exactly zero.
    pub fn new(initial: f64) -> Self {
        Self::with_half_turn(initial, MILLI_PI)
    }

    /// Creates an unwrapper for a unit in which half a turn is `half_turn`
    /// (π for radians, 180 for degrees).
    pub fn with_half_turn(initial: f64, half_turn: f64) -> Self {
        let start = normalize_with(initial, half_turn);
        Self {
            winding_number: 0,
            old_angle: start,
            initial_angle: start,
            half_turn,
        }
    }

    /// Folds `angle` into `(-half_turn, half_turn]`.
    pub fn normalize(&self, angle: f64) -> f64 {
        normalize_with(angle, self.half_turn)
    }

    /// Feeds one raw sample and returns the continuous angle relative to the
    /// initial sample.
    pub fn update(&mut self, raw: f64) -> f64 {
        self.advance(raw);
        self.continuous_angle()
    }

    /// Feeds one raw sample and returns the relative angle folded back into
    /// `(-half_turn, half_turn]`.
    pub fn update_modulo(&mut self, raw: f64) -> f64 {
        self.advance(raw);
        self.modulo_angle()
    }

    pub fn continuous_angle(&self) -> f64 {
        self.old_angle - self.initial_angle
    }

    pub fn modulo_angle(&self) -> f64 {
        self.normalize(self.old_angle - self.initial_angle)
    }

    pub fn initial_angle(&self) -> f64 {
        self.initial_angle
    }

    pub fn winding_number(&self) -> i64 {
        self.winding_number
    }

    fn advance(&mut self, raw: f64) {
        let full_turn = 2.0 * self.half_turn;
        let wrapped = self.normalize(raw);
        let mut output = wrapped + full_turn * self.winding_number as f64;
        if (output - self.old_angle).abs() > self.half_turn {
            // The raw signal may have wrapped more than once since the last sample.
            self.winding_number -= ((output - self.old_angle) / full_turn).round() as i64;
            output = wrapped + full_turn * self.winding_number as f64;
        }
        self.old_angle = output;
    }
}

/// Folds `angle` into `(-MILLI_PI, MILLI_PI]`.
pub fn normalize(angle: f64) -> f64 {
    normalize_with(angle, MILLI_PI)
}

fn normalize_with(angle: f64, half_turn: f64) -> f64 {
    if !angle.is_finite() || (angle > -half_turn && angle <= half_turn) {
        return angle;
    }
    let folded = (angle + half_turn).rem_euclid(2.0 * half_turn) - half_turn;
    if folded <= -half_turn {
        half_turn
    } else {
        folded
    }
}
