use quadcontrol::{ControlConfig, ControlCycle, DerivedCoefficients, NavigationTarget, SensorSnapshot};

/// Vertical axis of the vehicle: `Dz = v`, `Dv = coeff·(thrust - gravity)`,
/// resting on the ground while the thrust is below its weight.
struct Altitude {
    coefficient_z: f64,
    gravity: f64,
    thrust: f64,
}

impl fast_ode::DifferentialEquation<2> for Altitude {
    fn ode_dot_y(&self, _t: f64, y: &fast_ode::Coord<2>) -> (fast_ode::Coord<2>, bool) {
        let acceleration = self.coefficient_z * (self.thrust - self.gravity);
        if y.0[0] <= 0.0 && acceleration <= 0.0 {
            return (fast_ode::Coord([0.0, 0.0]), true);
        }
        (fast_ode::Coord([y.0[1], acceleration]), true)
    }
}

// Example usage
fn main() {
    println!("Hovering at 500 mm with the default configuration");

    let config = ControlConfig::default();
    let dt = config.controller_period;
    let coefficients = DerivedCoefficients::new(config.physical_constants());
    let mut plant = Altitude {
        coefficient_z: coefficients.coefficient_z,
        gravity: config.gravity,
        thrust: 0.0,
    };
    let mut cycle = match ControlCycle::new(config) {
        Ok(cycle) => cycle,
        Err(e) => {
            println!("Invalid configuration: {}", e);
            return;
        }
    };

    let target = NavigationTarget {
        z: 500.0,
        ..NavigationTarget::default()
    };
    let simulation_span = 20.0; // 20 seconds
    let mut current_time = 0.0;
    let mut y = [0.0, 0.0];

    while current_time < simulation_span {
        let sensor = SensorSnapshot {
            z: y[0],
            dz: y[1],
            ..SensorSnapshot::default()
        };
        let motors = cycle.run_cycle(sensor, target, false);
        plant.thrust = f64::from(motors.front)
            + f64::from(motors.right)
            + f64::from(motors.rear)
            + f64::from(motors.left);

        let res = fast_ode::solve_ivp(
            &plant,
            (current_time, current_time + dt),
            fast_ode::Coord(y),
            |_, _| true,
            1e-8,
            1e-7,
        );
        match res {
            fast_ode::IvpResult::FinalTimeReached(c) => {
                y = c.0;
                if y[0] < 0.0 {
                    y = [0.0, y[1].max(0.0)];
                }
            }
            _ => {
                println!("Simulation failed at t={:.2}", current_time);
                return;
            }
        }

        current_time += dt;
        let step = (current_time / dt).round() as u64;
        if step % 50 == 0 {
            println!(
                "t={:5.2}s mode={:8} z={:7.1}mm dz={:7.1}mm/s motors=({}, {}, {}, {})",
                current_time,
                cycle.altitude_mode(),
                y[0],
                y[1],
                motors.front,
                motors.right,
                motors.rear,
                motors.left
            );
        }
    }

    let report = cycle.report_to_ground();
    println!("Final report: {:?}", report);
}
