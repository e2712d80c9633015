use std::env;
use std::error::Error;
use std::fs;
use std::thread;

use tracing::info;
use tracing_subscriber::EnvFilter;

use device_event_log::{
    emit_ejection, emit_system_snapshot, lprintf, manager, Body, DeviceLog, EventEmitter,
    FlushFlags, LogConfig, SinkSpec,
};

const SYSTEMS: usize = 8;
const BODIES_PER_SYSTEM: usize = 3;
const STEPS: usize = 200;
const SNAPSHOT_EVERY: usize = 50;
const DT: f64 = 0.01;
const COLLISION_RADIUS: f64 = 0.05;
const EJECTION_RADIUS: f64 = 50.0;

/// Runs a toy ensemble of few-body systems, one worker thread per system,
/// logging through the default event log.
///
/// Usage: `device_event_log [config-file]`. Without a configuration file the
/// log echoes to the console.
fn main() -> Result<(), Box<dyn Error>> {
    let (diagnostics, _guard) = tracing_appender::non_blocking(std::io::stderr());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(diagnostics)
        .init();

    let config = match env::args().nth(1) {
        Some(path) => LogConfig::parse(&fs::read_to_string(path)?)?,
        None => LogConfig {
            writer: SinkSpec::Console,
            ..LogConfig::default()
        },
    };
    manager::init(&config)?;

    let mut systems: Vec<Vec<Body>> = (0..SYSTEMS).map(initial_system).collect();
    for round in 0..STEPS / SNAPSHOT_EVERY {
        manager::with_default_log(|log| {
            log.device_scope(|device| integrate_round(device, &mut systems, round))
        })?;
        manager::flush(FlushFlags::IF_FULL)?;
    }

    manager::with_default_log(|log| -> std::io::Result<()> {
        let host = log.host_for_write()?;
        lprintf!(host, 0, "integrated %d systems for %d steps\n", SYSTEMS as i32, STEPS as i32);
        Ok(())
    })?;
    manager::flush(FlushFlags::MEMORY)?;
    manager::shutdown()?;
    info!("done");
    Ok(())
}

fn initial_system(system: usize) -> Vec<Body> {
    (0..BODIES_PER_SYSTEM)
        .map(|index| {
            let radius = index as f64 * (1.0 + system as f64 * 0.1);
            let speed = if index == 0 { 0.0 } else { 1.0 / radius.sqrt() };
            Body {
                system: system as i32,
                index: index as i32,
                mass: if index == 0 { 1.0 } else { 1e-3 },
                position: [radius, 0.0, 0.0],
                velocity: [0.0, speed * (1.0 + system as f64 * 0.05), 0.0],
                ..Body::default()
            }
        })
        .collect()
}

fn integrate_round(device: &DeviceLog, systems: &mut [Vec<Body>], round: usize) {
    thread::scope(|scope| {
        for (system, bodies) in systems.iter_mut().enumerate() {
            scope.spawn(move || {
                let thread_id = system as u32;
                for step in 0..SNAPSHOT_EVERY {
                    let time = (round * SNAPSHOT_EVERY + step) as f64 * DT;
                    advance(bodies, time);
                    if let Some((a, b)) = first_close_pair(bodies) {
                        lprintf!(
                            device,
                            thread_id,
                            "Collision detected in system %d between %d and %d at t=%g",
                            system as i32,
                            a as i32,
                            b as i32,
                            time
                        );
                    }
                    for body in bodies.iter_mut().filter(|b| b.flags == 0) {
                        if body.position.iter().map(|x| x * x).sum::<f64>()
                            > EJECTION_RADIUS * EJECTION_RADIUS
                        {
                            body.flags = 1;
                            emit_ejection(device, thread_id, time, system as i32, body);
                        }
                    }
                }
                let time = ((round + 1) * SNAPSHOT_EVERY) as f64 * DT;
                emit_system_snapshot(device, thread_id, time, system as i32, 0, bodies);
                device.emit_snapshot(bodies);
            });
        }
    });
}

/// One leapfrog step around the central body.
fn advance(bodies: &mut [Body], time: f64) {
    let (star, planets) = match bodies.split_first_mut() {
        Some(split) => split,
        None => return,
    };
    for planet in planets.iter_mut() {
        let r2 = planet.distance_squared(star).max(1e-12);
        let scale = -star.mass / (r2 * r2.sqrt());
        for axis in 0..3 {
            let accel = scale * (planet.position[axis] - star.position[axis]);
            planet.velocity[axis] += accel * DT;
            planet.position[axis] += planet.velocity[axis] * DT;
        }
        planet.time = time;
    }
    star.time = time;
}

fn first_close_pair(bodies: &[Body]) -> Option<(usize, usize)> {
    for a in 0..bodies.len() {
        for b in a + 1..bodies.len() {
            if bodies[a].distance_squared(&bodies[b]) < COLLISION_RADIUS * COLLISION_RADIUS {
                return Some((a, b));
            }
        }
    }
    None
}
