use quadcontrol::angle::{normalize, AngleUnwrapper, MILLI_PI};

// Example usage
fn main() {
    // A vehicle yawing steadily at 1.5 rad/s, seen through a compass that
    // reports headings folded into (-π, π].
    let rate = 1500.0; // mrad/s
    let dt = 0.1;
    let start = 2800.0;

    let mut unwrapper = AngleUnwrapper::new(normalize(start));
    for step in 1..=60 {
        let heading = start + rate * dt * step as f64;
        let raw = normalize(heading);
        let continuous = unwrapper.update(raw);
        if step % 5 == 0 {
            println!(
                "t={:4.1}s raw={:8.1} continuous={:8.1} turns={} folded={:8.1}",
                step as f64 * dt,
                raw,
                continuous,
                unwrapper.winding_number(),
                unwrapper.modulo_angle()
            );
        }
    }

    let turned = unwrapper.continuous_angle() / (2.0 * MILLI_PI);
    println!("Turned {:.3} revolutions in total", turned);

    // Degrees work the same way with a different half turn.
    let mut compass = AngleUnwrapper::with_half_turn(170.0, 180.0);
    for raw in [-175.0, -160.0, 178.0, 150.0] {
        println!("compass {:7.1} -> {:7.1}", raw, compass.update(raw));
    }
}
