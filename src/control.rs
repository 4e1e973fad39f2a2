use log::{debug, info, warn};
use nalgebra::{Matrix4, Vector4};

use crate::angle::AngleUnwrapper;
use crate::coefficients::DerivedCoefficients;
use crate::config::{AxisTuning, AxisTuningUpdate, ConfigUpdate, ControlConfig, PoleMode};
use crate::error::ControlError;
use crate::observer::StateObserverWithIntegral;
use crate::pid::{AxisController, PdController, PidController, SmoothedBoundedPid};
use crate::types::{
    AltitudeMode, ControlState, MotorOffsets, MotorSignals, NavigationTarget, ReportToGround,
    SensorSnapshot, ThrustComponents,
};

/// One of the four controlled axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    Roll,
    Pitch,
    Yaw,
    Z,
}

/// Running estimate of the altitude reading while the vehicle sits on the
/// ground.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct GroundCalibration {
    offset_z: f64,
    total_z: f64,
    samples: u64,
    computed: bool,
}

/// Attitude and altitude control cycle for a plus-configured quadrotor.
///
/// The cycle owns one controller per axis and turns each sensor snapshot
/// and navigation target into four motor commands while tracking the flight
/// mode. The surrounding loop calls, once per control period:
///
/// 1. `set_sensor_data` and `set_navigation` with the latest inputs
/// 2. `perform_sensor_scaling`, `perform_sonar_compensation` and
///    `perform_sensor_adjustments`
/// 3. `compute_new_altitude_mode`
/// 4. depending on the mode: `perform_ground_actions`,
///    `compute_actuator_data` or `perform_shutdown`
///
/// [`ControlCycle::run_cycle`] performs this sequence in one call.
///
/// # Flight Modes
///
/// Ground → Flying when the commanded height is positive
/// Flying → Flying (no automatic landing detection)
/// Shutdown → Ground when both measured and commanded height are at or below zero
/// any → Shutdown on an explicit shutdown request or when roll or pitch exceed `shutdown_angle`
///
/// None of the state is internally synchronized; drive a cycle from one
/// thread or behind one lock.
#[derive(Clone, Debug)]
pub struct ControlCycle {
    config: ControlConfig,
    coefficients: DerivedCoefficients,

    roll: AxisController,
    pitch: AxisController,
    yaw: AxisController,
    z: AxisController,
    z_observer: Option<StateObserverWithIntegral>,

    sensor: SensorSnapshot,
    new_navigation: NavigationTarget,
    old_navigation: NavigationTarget,
    motor_signals: MotorSignals,
    motor_offsets: MotorOffsets,
    control_state: ControlState,
    altitude_mode: AltitudeMode,

    u_roll: f64,
    u_pitch: f64,
    u_yaw: f64,
    /// Total thrust command of this cycle, gravity and tilt compensated
    u_z_new: f64,
    u_z_old: f64,
    /// Raw altitude controller output behind `u_z_new`
    u_z_control: f64,
    airborne: bool,

    ground: GroundCalibration,
    yaw_unwrapper: Option<AngleUnwrapper>,
}

impl ControlCycle {
    /// Creates a control cycle from a complete configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Every tunable of the cycle; see [`ControlConfig::default`] for the stock values
    ///
    /// # Returns
    ///
    /// A cycle in ground mode with all controller state cleared, or an error
    /// when the configuration cannot produce working controllers. No
    /// partially built cycle is ever returned.
    ///
    /// # Example
    ///
    /// let mut cycle = ControlCycle::new(ControlConfig::default())?;
    /// let motors = cycle.run_cycle(sensor, target, false);
    pub fn new(config: ControlConfig) -> Result<Self, ControlError> {
        config.validate()?;
        let coefficients = DerivedCoefficients::new(config.physical_constants());
        let roll = build_axis_controller(&config, coefficients.coefficient_roll, &config.roll)?;
        let pitch = build_axis_controller(&config, coefficients.coefficient_pitch, &config.pitch)?;
        let yaw = build_axis_controller(&config, coefficients.coefficient_yaw, &config.yaw)?;
        let z = build_axis_controller(&config, coefficients.coefficient_z, &config.z)?;
        let z_observer = config.use_state_observer.then(|| {
            StateObserverWithIntegral::with_poles(
                coefficients.coefficient_z,
                config.controller_period,
                config.observer_z,
            )
        });

        debug!(
            "control cycle built: coefficients z={:.4} roll={:.4} pitch={:.4} yaw={:.4}",
            coefficients.coefficient_z,
            coefficients.coefficient_roll,
            coefficients.coefficient_pitch,
            coefficients.coefficient_yaw
        );

        Ok(Self {
            config,
            coefficients,
            roll,
            pitch,
            yaw,
            z,
            z_observer,
            sensor: SensorSnapshot::default(),
            new_navigation: NavigationTarget::default(),
            old_navigation: NavigationTarget::default(),
            motor_signals: MotorSignals::default(),
            motor_offsets: MotorOffsets::default(),
            control_state: ControlState::empty(),
            altitude_mode: AltitudeMode::Ground,
            u_roll: 0.0,
            u_pitch: 0.0,
            u_yaw: 0.0,
            u_z_new: 0.0,
            u_z_old: 0.0,
            u_z_control: 0.0,
            airborne: false,
            ground: GroundCalibration::default(),
            yaw_unwrapper: None,
        })
    }

    /// Runs one full control period and returns the motor commands.
    ///
    /// # Arguments
    ///
    /// * `sensor` - Raw sensor snapshot of this period
    /// * `target` - Navigation target of this period
    /// * `shutdown` - Explicit shutdown request from the operator
    pub fn run_cycle(
        &mut self,
        sensor: SensorSnapshot,
        target: NavigationTarget,
        shutdown: bool,
    ) -> MotorSignals {
        self.set_sensor_data(sensor);
        self.set_navigation(target);
        self.perform_sensor_scaling();
        self.perform_sonar_compensation();
        self.perform_sensor_adjustments();
        match self.compute_new_altitude_mode(shutdown) {
            AltitudeMode::Ground => self.perform_ground_actions(),
            AltitudeMode::Flying => self.compute_actuator_data(),
            AltitudeMode::Shutdown => self.perform_shutdown(),
        }
        self.motor_signals
    }

    /// Advances the flight mode and returns the new mode.
    ///
    /// The shutdown check runs first, so a shutdown request or an excessive
    /// tilt wins over every other transition.
    pub fn compute_new_altitude_mode(&mut self, shutdown: bool) -> AltitudeMode {
        let limit = self.config.shutdown_angle;
        let next = if shutdown || self.sensor.roll.abs() > limit || self.sensor.pitch.abs() > limit {
            AltitudeMode::Shutdown
        } else {
            match self.altitude_mode {
                AltitudeMode::Ground if self.new_navigation.z > 0.0 => AltitudeMode::Flying,
                AltitudeMode::Shutdown if self.sensor.z <= 0.0 && self.new_navigation.z <= 0.0 => {
                    AltitudeMode::Ground
                }
                // TODO: leave Flying once touchdown can be detected from the height readings
                mode => mode,
            }
        };
        if next != self.altitude_mode {
            info!("altitude mode {} -> {}", self.altitude_mode, next);
            if next == AltitudeMode::Shutdown && !shutdown {
                warn!(
                    "tilt cutout: roll={:.0} pitch={:.0} limit={:.0}",
                    self.sensor.roll, self.sensor.pitch, limit
                );
            }
        }
        self.altitude_mode = next;
        next
    }

    /// Computes the motor commands for one flying period.
    ///
    /// Before liftoff the thrust is ramped open loop by `motor_revving_up`
    /// per period. Liftoff is declared once the measured height is positive
    /// or the ramp exceeds `gravity`; at that instant the altitude
    /// controller's integral is seeded so it continues from the ramp output
    /// without a step. Afterwards every axis runs its controller, and the
    /// altitude output is gravity compensated and divided by
    /// `cos(roll)·cos(pitch)`.
    ///
    /// Also refreshes the motor offsets and the control state bitmask.
    pub fn compute_actuator_data(&mut self) {
        let gravity = self.config.gravity;
        if !self.config.thrust_z_control {
            if self.airborne {
                self.update_controllers();
            } else {
                self.u_z_new = self.u_z_old + f64::from(self.config.motor_revving_up);
                if self.sensor.z > 0.0 || self.u_z_new > gravity {
                    self.lift_off(self.u_z_new - gravity);
                }
            }
        } else {
            let direct = self.new_navigation.z * 2.0;
            if direct > gravity {
                self.update_controllers();
            }
            self.u_z_new = direct;
        }
        if !self.config.control_yaw {
            self.u_yaw = 0.0;
        }

        let motors = mix_motor_commands(self.u_z_new, self.u_roll, self.u_pitch, self.u_yaw);
        self.motor_signals = MotorSignals::new(
            to_signal(motors[0]),
            to_signal(motors[1]),
            to_signal(motors[2]),
            to_signal(motors[3]),
        );
        // Offsets truncate toward zero.
        self.motor_offsets = MotorOffsets {
            roll: self.u_roll as i16,
            pitch: self.u_pitch as i16,
            yaw: self.u_yaw as i16,
            z: (self.u_z_new - self.u_z_old) as i16,
        };
        self.u_z_old = self.u_z_new;
        self.control_state = self.tracking_state();
    }

    /// Ground handling: runs the motor test sequence in test mode, otherwise
    /// spins the motors down. Clears all controller state either way.
    pub fn perform_ground_actions(&mut self) {
        if self.config.test_mode {
            self.test_motors();
        } else {
            self.rev_down();
        }
        self.reset_controller();
        self.control_state = ControlState::empty();
    }

    /// Emergency stop: motors off and every piece of flight state cleared,
    /// including the ground calibration and the yaw reference.
    pub fn perform_shutdown(&mut self) {
        self.motor_signals.reset();
        self.motor_offsets.reset();
        self.sensor = SensorSnapshot::default();
        self.reset_controller();
        self.ground = GroundCalibration::default();
        self.yaw_unwrapper = None;
        self.control_state = ControlState::empty();
        self.old_navigation = NavigationTarget::default();
        self.new_navigation = NavigationTarget::default();
    }

    /// Removes the ground offset from the height reading and unwraps yaw.
    ///
    /// While on the ground the offset is the running mean of all height
    /// readings; it freezes on the first period spent in any other mode and
    /// is recomputed only after a shutdown. The first snapshot after
    /// construction or shutdown defines yaw zero.
    pub fn perform_sensor_adjustments(&mut self) {
        if self.altitude_mode == AltitudeMode::Ground {
            if !self.ground.computed {
                self.ground.total_z += self.sensor.z;
                self.ground.samples += 1;
                self.ground.offset_z = self.ground.total_z / self.ground.samples as f64;
            }
        } else if !self.ground.computed {
            self.ground.computed = true;
            info!(
                "ground height offset {:.1} from {} samples",
                self.ground.offset_z, self.ground.samples
            );
        }
        self.sensor.z -= self.ground.offset_z;

        self.sensor.yaw = match self.yaw_unwrapper.as_mut() {
            Some(unwrapper) => unwrapper.update(self.sensor.yaw),
            None => {
                let unwrapper = AngleUnwrapper::new(self.sensor.yaw);
                self.yaw_unwrapper = Some(unwrapper);
                unwrapper.continuous_angle()
            }
        };
    }

    /// Converts raw gyro and accelerometer units to engineering units.
    pub fn perform_sensor_scaling(&mut self) {
        let c = &self.config;
        self.sensor.roll *= c.angle_factor;
        self.sensor.pitch *= c.angle_factor;
        self.sensor.droll *= c.angular_rate_factor;
        self.sensor.dpitch *= c.angular_rate_factor;
        self.sensor.ddx *= c.accel_factor;
        self.sensor.ddy *= c.accel_factor;
        self.sensor.ddz *= c.accel_factor;
    }

    /// Inverse of [`perform_sensor_scaling`](Self::perform_sensor_scaling).
    pub fn reverse_sensor_scaling(&self, sensor: &SensorSnapshot) -> SensorSnapshot {
        let c = &self.config;
        SensorSnapshot {
            roll: sensor.roll / c.angle_factor,
            pitch: sensor.pitch / c.angle_factor,
            droll: sensor.droll / c.angular_rate_factor,
            dpitch: sensor.dpitch / c.angular_rate_factor,
            ddx: sensor.ddx / c.accel_factor,
            ddy: sensor.ddy / c.accel_factor,
            ddz: sensor.ddz / c.accel_factor,
            ..*sensor
        }
    }

    /// Corrects the sonar height for the sensor sitting off center: pitching
    /// moves the sonar vertically by `distance·sin(pitch)`.
    pub fn perform_sonar_compensation(&mut self) {
        self.sensor.z += self.config.sonar_distance_from_center_mm * (self.sensor.pitch / 1000.0).sin();
    }

    /// Applies an incremental configuration change.
    ///
    /// Unset fields keep their value. Changing the controller kind, the pole
    /// mode or the smoothed switch is not supported in flight: those fields
    /// are ignored with a warning. Controllers whose plant coefficient,
    /// period or tuning changed are rebuilt and seeded from the current
    /// measurement and their last output so the motors do not jump.
    ///
    /// # Errors
    ///
    /// Returns an error, leaving the cycle untouched, when the resulting
    /// configuration is invalid or a controller cannot be built from it.
    pub fn modify_properties(&mut self, update: &ConfigUpdate) -> Result<(), ControlError> {
        let current = &self.config;
        let mut next = current.clone();
        next.apply(update);
        if next.use_pd_controller != current.use_pd_controller {
            warn!("use_pd_controller cannot be changed at runtime, keeping {}", current.use_pd_controller);
            next.use_pd_controller = current.use_pd_controller;
        }
        if next.pole_mode != current.pole_mode {
            warn!("pole_mode cannot be changed at runtime, keeping {:?}", current.pole_mode);
            next.pole_mode = current.pole_mode;
        }
        if next.use_smoothed_pid_controller != current.use_smoothed_pid_controller {
            warn!(
                "use_smoothed_pid_controller cannot be changed at runtime, keeping {}",
                current.use_smoothed_pid_controller
            );
            next.use_smoothed_pid_controller = current.use_smoothed_pid_controller;
        }
        next.validate()?;

        let mut coefficients = self.coefficients;
        coefficients.modify(next.physical_constants());
        let period_changed = next.controller_period != current.controller_period;
        let old = self.coefficients;

        let sensor = self.sensor;
        let roll = self.retune(
            &next,
            Axis::Roll,
            (coefficients.coefficient_roll, old.coefficient_roll),
            &update.roll,
            period_changed,
            (sensor.roll, sensor.droll, self.u_roll),
        )?;
        let pitch = self.retune(
            &next,
            Axis::Pitch,
            (coefficients.coefficient_pitch, old.coefficient_pitch),
            &update.pitch,
            period_changed,
            (sensor.pitch, sensor.dpitch, self.u_pitch),
        )?;
        let yaw = self.retune(
            &next,
            Axis::Yaw,
            (coefficients.coefficient_yaw, old.coefficient_yaw),
            &update.yaw,
            period_changed,
            (sensor.yaw, sensor.dyaw, self.u_yaw),
        )?;
        let (z_position, z_velocity) = self.altitude_estimate();
        let z = self.retune(
            &next,
            Axis::Z,
            (coefficients.coefficient_z, old.coefficient_z),
            &update.z,
            period_changed,
            (z_position, z_velocity, self.u_z_control),
        )?;

        self.roll = roll;
        self.pitch = pitch;
        self.yaw = yaw;
        self.z = z;
        for controller in [&mut self.roll, &mut self.pitch, &mut self.yaw, &mut self.z] {
            if let AxisController::SmoothedBounded(pid) = controller {
                apply_bounds(pid, &next);
            }
        }

        if let Some(observer) = self.z_observer.as_mut() {
            if period_changed {
                let estimate = observer.estimate();
                let integral = observer.integral();
                let mut rebuilt = StateObserverWithIntegral::with_poles(
                    coefficients.coefficient_z,
                    next.controller_period,
                    next.observer_z,
                );
                rebuilt.set_initial_values(estimate[0], estimate[1], integral);
                *observer = rebuilt;
            } else {
                observer.set_coeff(coefficients.coefficient_z);
            }
        }

        self.coefficients = coefficients;
        self.config = next;
        Ok(())
    }

    /// Clears operator-driven state after the terminal link drops.
    pub fn terminal_disconnected(&mut self) {
        self.config.test_mode = false;
        self.new_navigation = NavigationTarget::default();
        self.old_navigation = NavigationTarget::default();
    }

    pub fn set_test_mode(&mut self, test_mode: bool) {
        self.config.test_mode = test_mode;
    }

    pub fn set_sensor_data(&mut self, sensor: SensorSnapshot) {
        self.sensor = sensor;
    }

    /// Stores a new navigation target, keeping the previous one.
    pub fn set_navigation(&mut self, target: NavigationTarget) {
        self.old_navigation = self.new_navigation;
        self.new_navigation = target;
    }

    pub fn set_motor_signals(&mut self, signals: MotorSignals) {
        self.motor_signals = signals;
    }

    pub fn set_altitude_mode(&mut self, mode: AltitudeMode) {
        self.altitude_mode = mode;
    }

    pub fn sensor_data(&self) -> &SensorSnapshot {
        &self.sensor
    }

    pub fn new_navigation(&self) -> &NavigationTarget {
        &self.new_navigation
    }

    pub fn old_navigation(&self) -> &NavigationTarget {
        &self.old_navigation
    }

    pub fn motor_signals(&self) -> MotorSignals {
        self.motor_signals
    }

    pub fn motor_offsets(&self) -> MotorOffsets {
        self.motor_offsets
    }

    pub fn control_state(&self) -> ControlState {
        self.control_state
    }

    pub fn altitude_mode(&self) -> AltitudeMode {
        self.altitude_mode
    }

    pub fn is_airborne(&self) -> bool {
        self.airborne
    }

    pub fn ground_offset(&self) -> f64 {
        self.ground.offset_z
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn coefficients(&self) -> &DerivedCoefficients {
        &self.coefficients
    }

    pub fn controller(&self, axis: Axis) -> &AxisController {
        match axis {
            Axis::Roll => &self.roll,
            Axis::Pitch => &self.pitch,
            Axis::Yaw => &self.yaw,
            Axis::Z => &self.z,
        }
    }

    pub fn z_observer(&self) -> Option<&StateObserverWithIntegral> {
        self.z_observer.as_ref()
    }

    pub fn thrust_components(&self) -> ThrustComponents {
        ThrustComponents {
            u_roll: self.u_roll,
            u_pitch: self.u_pitch,
            u_yaw: self.u_yaw,
            u_z: self.u_z_new,
        }
    }

    pub fn report_to_ground(&self) -> ReportToGround {
        ReportToGround {
            sensor: self.sensor,
            motor_signals: self.motor_signals,
            motor_offsets: self.motor_offsets,
            altitude_mode: self.altitude_mode,
            control_state: self.control_state,
        }
    }

    fn update_controllers(&mut self) {
        let s = self.sensor;
        let nav = self.new_navigation;
        self.u_roll = self.roll.control(s.roll, s.droll, nav.roll);
        self.u_pitch = self.pitch.control(s.pitch, s.dpitch, nav.pitch);
        self.u_yaw = self.yaw.control(s.yaw, s.dyaw, nav.yaw);

        let (z, dz) = self.observe_altitude();
        self.u_z_control = self.z.control(z, dz, nav.z);
        let tilt = (s.roll / 1000.0).cos() * (s.pitch / 1000.0).cos();
        self.u_z_new = (self.u_z_control + self.config.gravity) / tilt;
    }

    /// Height and climb rate fed to the altitude controller. With the
    /// observer enabled this advances it by one period.
    fn observe_altitude(&mut self) -> (f64, f64) {
        match self.z_observer.as_mut() {
            Some(observer) => {
                let estimate = observer.update(self.sensor.z, self.u_z_control);
                (estimate[0], estimate[1])
            }
            None => (self.sensor.z, self.sensor.dz),
        }
    }

    fn altitude_estimate(&self) -> (f64, f64) {
        match self.z_observer.as_ref() {
            Some(observer) => {
                let estimate = observer.estimate();
                (estimate[0], estimate[1])
            }
            None => (self.sensor.z, self.sensor.dz),
        }
    }

    fn lift_off(&mut self, u: f64) {
        self.airborne = true;
        self.u_z_control = u;
        info!("liftoff at z={:.1} with thrust {:.1}", self.sensor.z, self.u_z_new);
        if let Some(observer) = self.z_observer.as_mut() {
            observer.set_initial_values(self.sensor.z, self.sensor.dz, 0.0);
        }
        if let Err(err) = self.z.reset_integral_at(self.sensor.z, self.sensor.dz, u) {
            warn!("altitude controller seeding failed ({}), starting from a cleared integral", err);
            self.z.reset_integral();
        }
    }

    /// Returns the controller to use for `axis` under `next`: a rebuilt one
    /// when its coefficient, period or tuning changed, else the current one.
    fn retune(
        &self,
        next: &ControlConfig,
        axis: Axis,
        (coeff, old_coeff): (f64, f64),
        update: &AxisTuningUpdate,
        period_changed: bool,
        (x, v, u): (f64, f64, f64),
    ) -> Result<AxisController, ControlError> {
        let current = self.controller(axis);
        let tuning_changed = match next.pole_mode {
            PoleMode::Manual => update.touches_gains(),
            PoleMode::Real | PoleMode::Complex => coeff != old_coeff || update.touches_poles(),
        };
        if !tuning_changed && !period_changed {
            return Ok(*current);
        }

        let mut rebuilt = build_axis_controller(next, coeff, tuning(next, axis))?;
        if let (AxisController::SmoothedBounded(new), AxisController::SmoothedBounded(old)) =
            (&mut rebuilt, current)
        {
            new.reset_smoothed_target(old.target_smoothed());
        }
        if let Err(err) = rebuilt.reset_integral_at(x, v, u) {
            warn!("{:?} controller rebuilt without seeding: {}", axis, err);
        }
        debug!("{:?} controller rebuilt with gains {:?}", axis, rebuilt.gains());
        Ok(rebuilt)
    }

    fn reset_controller(&mut self) {
        self.roll.reset_integral();
        self.pitch.reset_integral();
        self.yaw.reset_integral();
        self.z.reset_integral();
        if let Some(observer) = self.z_observer.as_mut() {
            observer.set_initial_values(0.0, 0.0, 0.0);
        }
        self.u_roll = 0.0;
        self.u_pitch = 0.0;
        self.u_yaw = 0.0;
        self.u_z_new = 0.0;
        self.u_z_old = 0.0;
        self.u_z_control = 0.0;
        self.airborne = false;
    }

    fn tracking_state(&self) -> ControlState {
        let nav = &self.new_navigation;
        let s = &self.sensor;
        let c = &self.config;
        let mut state = ControlState::empty();
        if (nav.roll - s.roll).abs() > c.tolerance_roll {
            state.insert(ControlState::ADJUSTING_ROLL);
        }
        if (nav.pitch - s.pitch).abs() > c.tolerance_pitch {
            state.insert(ControlState::ADJUSTING_PITCH);
        }
        if (nav.yaw - s.yaw).abs() > c.tolerance_yaw {
            state.insert(ControlState::ADJUSTING_YAW);
        }
        if (nav.z - s.z).abs() > c.tolerance_z {
            state.insert(ControlState::ADJUSTING_Z);
        }
        state
    }

    /// Lowers every running motor by `motor_revving_down`; once none is above
    /// the step, all motors are switched off.
    fn rev_down(&mut self) {
        let step = self.config.motor_revving_down;
        let signals = &mut self.motor_signals;
        let mut revving_down = false;
        for motor in [&mut signals.front, &mut signals.right, &mut signals.rear, &mut signals.left] {
            if *motor > step {
                *motor -= step;
                revving_down = true;
            }
        }
        if revving_down {
            self.motor_offsets = MotorOffsets {
                z: step.saturating_neg(),
                ..MotorOffsets::default()
            };
        } else {
            self.motor_signals.reset();
            self.motor_offsets.reset();
        }
    }

    /// One step of the motor test: the active motor ramps up past
    /// `motor_test_max`, back down below `motor_test_min`, then hands over
    /// to the next motor in the order front, right, rear, left.
    ///
    /// The offset field paired with the active motor holds its current step.
    fn test_motors(&mut self) {
        let min = self.config.motor_test_min;
        let max = self.config.motor_test_max;
        let step = self.config.motor_test_step;
        let s = &mut self.motor_signals;
        let o = &mut self.motor_offsets;

        if s.front > 0 {
            if s.front > max {
                o.roll = -step;
            } else if s.front < min {
                s.front = 0;
                s.right = min;
                o.roll = 0;
                o.pitch = step;
            }
            s.front = s.front.saturating_add(o.roll);
        } else if s.right > 0 {
            if s.right > max {
                o.pitch = -step;
            } else if s.right < min {
                s.right = 0;
                s.rear = min;
                o.pitch = 0;
                o.z = step;
            }
            s.right = s.right.saturating_add(o.pitch);
        } else if s.rear > 0 {
            if s.rear > max {
                o.z = -step;
            } else if s.rear < min {
                s.rear = 0;
                s.left = min;
                o.z = 0;
                o.yaw = step;
            }
            s.rear = s.rear.saturating_add(o.z);
        } else if s.left > 0 {
            if s.left > max {
                o.yaw = -step;
            } else if s.left < min {
                s.left = 0;
                s.front = min;
                o.yaw = 0;
                o.roll = step;
            }
            s.left = s.left.saturating_add(o.yaw);
        } else {
            s.front = min;
            o.roll = step;
        }
    }
}

/// Distributes the per-axis outputs over the four motors of a
/// plus-configured frame.
///
/// # Motor Configuration
///
/// ```text
///            front
///              |
///     left ----+---- right
///              |
///            rear
/// ```
///
/// Front and rear spin opposite to left and right, so yaw is produced by
/// shifting thrust between the two pairs.
///
/// # Arguments
///
/// * `u_z` - Total thrust, shared equally
/// * `u_roll` - Roll output, differential between left and right
/// * `u_pitch` - Pitch output, differential between front and rear
/// * `u_yaw` - Yaw output, differential between the front/rear and left/right pairs
///
/// # Returns
///
/// Motor commands [front, right, rear, left]
pub fn mix_motor_commands(u_z: f64, u_roll: f64, u_pitch: f64, u_yaw: f64) -> Vector4<f64> {
    #[rustfmt::skip]
    let mixer = Matrix4::new(
        0.25,  0.0,  0.5,  0.25,  // front
        0.25, -0.5,  0.0, -0.25,  // right
        0.25,  0.0, -0.5,  0.25,  // rear
        0.25,  0.5,  0.0, -0.25,  // left
    );
    mixer * Vector4::new(u_z, u_roll, u_pitch, u_yaw)
}

/// Rounds half up and saturates into the motor signal range.
fn to_signal(value: f64) -> i16 {
    (value + 0.5).floor() as i16
}

fn tuning(config: &ControlConfig, axis: Axis) -> &AxisTuning {
    match axis {
        Axis::Roll => &config.roll,
        Axis::Pitch => &config.pitch,
        Axis::Yaw => &config.yaw,
        Axis::Z => &config.z,
    }
}

/// Builds the controller variant selected by `config` for one axis.
fn build_axis_controller(
    config: &ControlConfig,
    coeff: f64,
    tuning: &AxisTuning,
) -> Result<AxisController, ControlError> {
    let period = config.controller_period;
    let poles = tuning.poles(config.pole_mode);

    if config.use_pd_controller {
        let pd = match poles {
            Some(poles) => PdController::with_poles(coeff, poles)?,
            None => PdController::manual(tuning.pd_gains()),
        };
        return Ok(AxisController::Pd(pd));
    }
    if config.use_smoothed_pid_controller {
        let mut pid = match poles {
            Some(poles) => SmoothedBoundedPid::with_poles(coeff, period, poles)?,
            None => SmoothedBoundedPid::manual(period, tuning.pid_gains()),
        };
        apply_bounds(&mut pid, config);
        return Ok(AxisController::SmoothedBounded(pid));
    }
    let pid = match poles {
        Some(poles) => PidController::with_poles(coeff, period, poles)?,
        None => PidController::manual(period, tuning.pid_gains()),
    };
    Ok(AxisController::Pid(pid))
}

fn apply_bounds(pid: &mut SmoothedBoundedPid, config: &ControlConfig) {
    pid.set_max_change(config.pid_controller_max_change);
    if config.u_bound < 0.0 {
        pid.clear_u_bound();
    } else {
        pid.set_u_bound(config.u_bound);
    }
}
