use quadcontrol::angle::normalize;
use quadcontrol::{
    AltitudeMode, ControlConfig, ControlCycle, DerivedCoefficients, MotorSignals, NavigationTarget,
    PidController, Poles, SensorSnapshot, StateObserver,
};

const PERIOD: f64 = 0.02;
const TOLERANCE: f64 = 1e-8;

/// Double integrator `Dx = v`, `Dv = coeff·u` with `u` held over one period.
struct DoubleIntegrator {
    coeff: f64,
    u: f64,
}

impl fast_ode::DifferentialEquation<2> for DoubleIntegrator {
    fn ode_dot_y(&self, _t: f64, y: &fast_ode::Coord<2>) -> (fast_ode::Coord<2>, bool) {
        (fast_ode::Coord([y.0[1], self.coeff * self.u]), true)
    }
}

/// Rigid quadrotor in a plus configuration driven by raw motor signals.
///
/// State: `[z, dz, roll, droll, pitch, dpitch, yaw, dyaw]` in millimeters and
/// milliradians. The vehicle rests on the ground until the vertical thrust
/// exceeds its weight.
struct Airframe {
    coefficients: DerivedCoefficients,
    gravity: f64,
    motors: MotorSignals,
}

impl fast_ode::DifferentialEquation<8> for Airframe {
    fn ode_dot_y(&self, _t: f64, y: &fast_ode::Coord<8>) -> (fast_ode::Coord<8>, bool) {
        let [z, dz, roll, droll, pitch, dpitch, _yaw, dyaw] = y.0;
        let m = self.motors;
        let total = f64::from(m.front) + f64::from(m.right) + f64::from(m.rear) + f64::from(m.left);
        let tilt = (roll / 1000.0).cos() * (pitch / 1000.0).cos();
        let ddz = self.coefficients.coefficient_z * (total * tilt - self.gravity);
        if z <= 0.0 && ddz <= 0.0 {
            return (fast_ode::Coord([0.0; 8]), true);
        }

        let ddroll = self.coefficients.coefficient_roll * f64::from(m.left - m.right);
        let ddpitch = self.coefficients.coefficient_pitch * f64::from(m.front - m.rear);
        let ddyaw =
            self.coefficients.coefficient_yaw * f64::from(m.front + m.rear - m.left - m.right);
        (
            fast_ode::Coord([dz, ddz, droll, ddroll, dpitch, ddpitch, dyaw, ddyaw]),
            true,
        )
    }
}

fn integrate<const N: usize, T: fast_ode::DifferentialEquation<N>>(
    ode: &T,
    t: f64,
    y: [f64; N],
) -> [f64; N] {
    match fast_ode::solve_ivp(
        ode,
        (t, t + PERIOD),
        fast_ode::Coord(y),
        |_, _| true,
        TOLERANCE,
        TOLERANCE * 10.0,
    ) {
        fast_ode::IvpResult::FinalTimeReached(c) => c.0,
        _ => panic!("integration failed at t={}", t),
    }
}

#[test]
fn test_pid_drives_double_integrator_to_target() {
    let coeff = 50.0;
    let poles = Poles::Real { a: 3.0, b: 2.0, c: 1.0 };
    let mut pid = PidController::with_poles(coeff, PERIOD, poles).unwrap();
    let mut plant = DoubleIntegrator { coeff, u: 0.0 };
    let mut y = [0.0, 0.0];
    for step in 0..1000 {
        plant.u = pid.control(y[0], y[1], 200.0);
        y = integrate(&plant, step as f64 * PERIOD, y);
    }
    assert!((y[0] - 200.0).abs() < 0.5, "position {}", y[0]);
    assert!(y[1].abs() < 0.5, "velocity {}", y[1]);
}

#[test]
fn test_observer_recovers_velocity_of_driven_plant() {
    let coeff = 50.0;
    let mut observer = StateObserver::new(coeff, PERIOD);
    let mut plant = DoubleIntegrator { coeff, u: 0.0 };
    let mut y = [10.0, 0.0];
    for step in 0..500 {
        // A slow square wave input keeps the plant moving.
        plant.u = if (step / 100) % 2 == 0 { 0.4 } else { -0.4 };
        observer.update(y[0], plant.u);
        y = integrate(&plant, step as f64 * PERIOD, y);
    }
    // The measurement is held over each period, so the estimate trails the
    // moving plant slightly.
    let estimate = observer.estimate();
    assert!((y[1] - 40.0).abs() < 1e-3);
    assert!((estimate[0] - y[0]).abs() < 1.0, "{} vs {}", estimate[0], y[0]);
    assert!((estimate[1] - y[1]).abs() < 1.0, "{} vs {}", estimate[1], y[1]);
}

#[test]
fn test_cycle_takes_off_and_holds_attitude_and_height() {
    let config = ControlConfig::default();
    let coefficients = DerivedCoefficients::new(config.physical_constants());
    let sonar_offset = config.sonar_distance_from_center_mm;
    let gravity = config.gravity;
    let mut cycle = ControlCycle::new(config).unwrap();

    let target = NavigationTarget {
        roll: 100.0,
        pitch: -50.0,
        yaw: 300.0,
        z: 500.0,
    };
    let mut plant = Airframe {
        coefficients,
        gravity,
        motors: MotorSignals::default(),
    };
    let mut y = [0.0; 8];
    let mut peak = 0.0_f64;
    let mut settled = Vec::new();

    for step in 0..1500 {
        let [z, dz, roll, droll, pitch, dpitch, yaw, dyaw] = y;
        let sensor = SensorSnapshot {
            roll,
            pitch,
            yaw: normalize(yaw),
            droll,
            dpitch,
            dyaw,
            // The sonar sits off center and sees the height shifted by pitch.
            z: z - sonar_offset * (pitch / 1000.0).sin(),
            dz,
            ..SensorSnapshot::default()
        };
        plant.motors = cycle.run_cycle(sensor, target, false);
        assert_ne!(cycle.altitude_mode(), AltitudeMode::Shutdown, "cutout at step {}", step);

        y = integrate(&plant, step as f64 * PERIOD, y);
        if y[0] < 0.0 {
            y[0] = 0.0;
            y[1] = y[1].max(0.0);
        }
        peak = peak.max(y[0]);
        if step >= 1400 {
            settled.push(y);
        }
    }

    assert!(cycle.is_airborne());
    assert!(peak < 800.0, "overshoot to {}", peak);
    for y in settled {
        assert!((y[0] - 500.0).abs() < 5.0, "height {}", y[0]);
        assert!((y[2] - 100.0).abs() < 5.0, "roll {}", y[2]);
        assert!((y[4] + 50.0).abs() < 5.0, "pitch {}", y[4]);
        assert!((y[6] - 300.0).abs() < 5.0, "yaw {}", y[6]);
    }
}

#[test]
fn test_cycle_shutdown_and_return_to_ground() {
    let mut cycle = ControlCycle::new(ControlConfig::default()).unwrap();
    let hover = NavigationTarget {
        z: 300.0,
        ..NavigationTarget::default()
    };
    for _ in 0..200 {
        cycle.run_cycle(SensorSnapshot::default(), hover, false);
    }
    assert!(cycle.is_airborne());
    assert!(!cycle.motor_signals().is_zero());

    let motors = cycle.run_cycle(SensorSnapshot::default(), hover, true);
    assert!(motors.is_zero());
    assert_eq!(cycle.altitude_mode(), AltitudeMode::Shutdown);

    // Still commanded up: the vehicle stays shut down.
    cycle.run_cycle(SensorSnapshot::default(), hover, false);
    assert_eq!(cycle.altitude_mode(), AltitudeMode::Shutdown);

    cycle.run_cycle(SensorSnapshot::default(), NavigationTarget::default(), false);
    assert_eq!(cycle.altitude_mode(), AltitudeMode::Ground);
    assert!(!cycle.is_airborne());
}
