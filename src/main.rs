//! Runs a crowd scenario headless and logs a summary
//!
//! Usage: `crowd_steer [scenario.ron|scenario.json]`. Without an argument the
//! built-in crossing scenario is used.

use crowd_steer::prelude::*;

fn run() -> Result<(), ScenarioError> {
    let scenario = match std::env::args().nth(1) {
        Some(path) => Scenario::load(path)?,
        None => Scenario::crossing(),
    };

    let mut sim = CrowdSim::from_scenario(&scenario)?;
    let mut mutual = 0usize;
    let mut reached = 0usize;

    for _ in 0..scenario.steps {
        sim.step();
        for event in sim.events().iter() {
            match event {
                SteeringEvent::MutualAvoidance { .. } => mutual += 1,
                SteeringEvent::TargetReached { .. } => reached += 1,
                _ => log::debug!("{event:?}"),
            }
        }
    }

    for (id, frame) in sim.frames() {
        log::info!(
            "agent {}: position ({:.2}, {:.2}) speed {:.2}",
            id.0,
            frame.position.x,
            frame.position.z,
            frame.speed
        );
    }
    log::info!(
        "'{}' ran {} steps ({:.1}s): {} mutual avoidances, {} waypoints reached",
        scenario.name,
        scenario.steps,
        sim.elapsed(),
        mutual,
        reached
    );
    log::info!("{}", sim.debug().step_stats.format_stats());
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("Simulation error: {e}");
        std::process::exit(1);
    }
}
