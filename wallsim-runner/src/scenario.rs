use log::info;
use wallsim_config::{CollisionConfig, Config, ParticleBatch};
use wallsim_core::SchedulerError;
use wallsim_simulation::{CollisionMode, Simulation};

pub fn collision_mode(config: CollisionConfig) -> CollisionMode {
    match config {
        CollisionConfig::Point => CollisionMode::Point,
        CollisionConfig::Swept { samples } => CollisionMode::Swept { samples },
    }
}

/// Build the initial simulation state described by a validated config.
pub fn build_simulation(config: &Config, worker_count: usize) -> Result<Simulation, SchedulerError> {
    let mut sim = Simulation::with_collision_mode(
        config.arena.width,
        config.arena.height,
        worker_count,
        collision_mode(config.collision),
    )?;

    for wall in &config.walls {
        sim.add_wall(wall.x1, wall.y1, wall.x2, wall.y2);
    }

    for batch in &config.particles {
        add_batch(&mut sim, batch);
    }

    info!(
        "Scenario: {}x{} arena, {} walls, {} particles, {} workers",
        config.arena.width,
        config.arena.height,
        sim.walls().len(),
        sim.particles().len(),
        sim.worker_count()
    );
    Ok(sim)
}

fn add_batch(sim: &mut Simulation, batch: &ParticleBatch) {
    match *batch {
        ParticleBatch::Single { x, y, angle, speed, radius } => sim.add_particle(x, y, angle, speed, radius),
        ParticleBatch::Line { count, from, to, angle, speed, radius } => {
            sim.add_particle_line(count, (from[0], from[1]), (to[0], to[1]), angle, speed, radius)
        }
        ParticleBatch::Fan { count, origin, start_angle, end_angle, speed, radius } => {
            sim.add_particle_fan(count, (origin[0], origin[1]), start_angle, end_angle, speed, radius)
        }
        ParticleBatch::SpeedSweep { count, origin, angle, start_speed, end_speed, radius } => {
            sim.add_particle_speed_sweep(count, (origin[0], origin[1]), angle, start_speed, end_speed, radius)
        }
        ParticleBatch::Random { count, min_speed, max_speed, radius, seed } => {
            sim.add_random_particles(count, (min_speed, max_speed), radius, seed)
        }
    }
}
