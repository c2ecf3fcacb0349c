//! The simulation aggregate: particles, walls, arena and the worker pool.

use glam::DVec2;
use log::{debug, trace};
use wallsim_core::{SchedulerError, WorkerPool};

use crate::arena::ArenaBounds;
use crate::collision::CollisionMode;
use crate::particle::Particle;
use crate::spawn;
use crate::wall::Wall;

/// Owns all simulation state and advances it one frame at a time.
///
/// Particles and walls may only be added between frames; `advance_frame`
/// takes `&mut self`, so this is enforced by the borrow checker.
pub struct Simulation {
    particles: Vec<Particle>,
    walls: Vec<Wall>,
    bounds: ArenaBounds,
    collision: CollisionMode,
    pool: WorkerPool,
    frames: u64,
    elapsed: f64,
}

impl Simulation {
    /// Create an empty simulation using the point collision test.
    /// `worker_count == 0` uses one worker per available CPU.
    pub fn new(width: f64, height: f64, worker_count: usize) -> Result<Self, SchedulerError> {
        Self::with_collision_mode(width, height, worker_count, CollisionMode::default())
    }

    pub fn with_collision_mode(
        width: f64,
        height: f64,
        worker_count: usize,
        collision: CollisionMode,
    ) -> Result<Self, SchedulerError> {
        let pool = WorkerPool::new(worker_count)?;
        debug!(
            "Created {}x{} simulation with {} workers ({:?} collisions)",
            width,
            height,
            pool.worker_count(),
            collision
        );
        Ok(Self {
            particles: Vec::new(),
            walls: Vec::new(),
            bounds: ArenaBounds::new(width, height),
            collision,
            pool,
            frames: 0,
            elapsed: 0.0,
        })
    }

    /// Add one particle from a heading in degrees and a speed.
    pub fn add_particle(&mut self, x: f64, y: f64, angle_degrees: f64, speed: f64, radius: f64) {
        self.push_particle(Particle::from_heading(x, y, angle_degrees, speed, radius));
    }

    pub fn push_particle(&mut self, particle: Particle) {
        self.particles.push(particle);
    }

    pub fn extend_particles<I: IntoIterator<Item = Particle>>(&mut self, particles: I) {
        self.particles.extend(particles);
    }

    /// Add a wall. The caller guarantees distinct endpoints inside the arena.
    pub fn add_wall(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        self.push_wall(Wall::from_coords(x1, y1, x2, y2));
    }

    pub fn push_wall(&mut self, wall: Wall) {
        self.walls.push(wall);
    }

    /// See [`spawn::line`].
    pub fn add_particle_line(
        &mut self,
        count: usize,
        from: (f64, f64),
        to: (f64, f64),
        angle_degrees: f64,
        speed: f64,
        radius: f64,
    ) {
        let batch = spawn::line(count, DVec2::from(from), DVec2::from(to), angle_degrees, speed, radius);
        self.extend_particles(batch);
    }

    /// See [`spawn::fan`].
    pub fn add_particle_fan(
        &mut self,
        count: usize,
        origin: (f64, f64),
        start_angle: f64,
        end_angle: f64,
        speed: f64,
        radius: f64,
    ) {
        let batch = spawn::fan(count, DVec2::from(origin), start_angle, end_angle, speed, radius);
        self.extend_particles(batch);
    }

    /// See [`spawn::speed_sweep`].
    pub fn add_particle_speed_sweep(
        &mut self,
        count: usize,
        origin: (f64, f64),
        angle_degrees: f64,
        start_speed: f64,
        end_speed: f64,
        radius: f64,
    ) {
        let batch = spawn::speed_sweep(count, DVec2::from(origin), angle_degrees, start_speed, end_speed, radius);
        self.extend_particles(batch);
    }

    /// See [`spawn::random`].
    pub fn add_random_particles(&mut self, count: usize, speed: (f64, f64), radius: f64, seed: u64) {
        let batch = spawn::random(count, &self.bounds, speed, radius, seed);
        self.extend_particles(batch);
    }

    /// Advance every particle by `dt` across the worker pool.
    ///
    /// Returns once all particles have been updated, so the state read
    /// afterwards is a complete frame.
    pub fn advance_frame(&mut self, dt: f64) -> Result<(), SchedulerError> {
        let walls = self.walls.as_slice();
        let bounds = self.bounds;
        let mode = self.collision;

        self.pool
            .for_each_mut(&mut self.particles, |particle| {
                particle.update(dt, &bounds, walls, mode)
            })?;

        self.finish_frame(dt);
        Ok(())
    }

    /// Same update as [`advance_frame`](Self::advance_frame), on the calling thread.
    pub fn advance_frame_serial(&mut self, dt: f64) {
        for particle in &mut self.particles {
            particle.update(dt, &self.bounds, &self.walls, self.collision);
        }
        self.finish_frame(dt);
    }

    fn finish_frame(&mut self, dt: f64) {
        self.frames += 1;
        self.elapsed += dt;
        trace!("Frame {} complete ({} particles)", self.frames, self.particles.len());
    }

    /// Particle state. Only meaningful between frames.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    pub fn bounds(&self) -> ArenaBounds {
        self.bounds
    }

    pub fn collision_mode(&self) -> CollisionMode {
        self.collision
    }

    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    /// Frames completed so far.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Total simulated time, the sum of every completed frame's `dt`.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Stop the worker pool. Later calls to `advance_frame` fail with
    /// [`SchedulerError::ShutDown`]. Dropping the simulation does this too.
    pub fn shutdown(&mut self) {
        self.pool.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_simulation_advances() {
        let mut sim = Simulation::new(100.0, 100.0, 2).unwrap();
        sim.advance_frame(0.016).unwrap();
        assert_eq!(sim.frame_count(), 1);
        assert!(sim.particles().is_empty());
    }

    #[test]
    fn add_operations_append() {
        let mut sim = Simulation::new(1280.0, 720.0, 1).unwrap();
        sim.add_particle(640.0, 360.0, 45.0, 100.0, 10.0);
        sim.add_wall(100.0, 100.0, 300.0, 100.0);
        sim.add_particle_line(3, (10.0, 10.0), (30.0, 10.0), 0.0, 100.0, 5.0);
        sim.add_particle_fan(4, (640.0, 360.0), 0.0, 90.0, 100.0, 5.0);
        sim.add_particle_speed_sweep(2, (400.0, 400.0), 225.0, 10.0, 20.0, 5.0);
        sim.add_random_particles(5, (1.0, 2.0), 3.0, 9);

        assert_eq!(sim.particles().len(), 1 + 3 + 4 + 2 + 5);
        assert_eq!(sim.walls().len(), 1);
        assert_eq!(sim.walls()[0].endpoints(), (100.0, 100.0, 300.0, 100.0));
    }

    #[test]
    fn parallel_and_serial_frames_agree() {
        let build = |workers| {
            let mut sim = Simulation::new(400.0, 300.0, workers).unwrap();
            sim.add_wall(200.0, 0.0, 200.0, 200.0);
            sim.add_wall(50.0, 250.0, 350.0, 280.0);
            sim.add_random_particles(300, (20.0, 200.0), 3.0, 7);
            sim
        };
        let mut parallel = build(4);
        let mut serial = build(1);

        for _ in 0..120 {
            parallel.advance_frame(1.0 / 60.0).unwrap();
            serial.advance_frame_serial(1.0 / 60.0);
        }

        assert_eq!(parallel.particles(), serial.particles());
        assert!((parallel.elapsed() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn advance_after_shutdown_is_an_error() {
        let mut sim = Simulation::new(100.0, 100.0, 2).unwrap();
        sim.add_particle(50.0, 50.0, 0.0, 10.0, 1.0);
        sim.shutdown();
        let before = sim.particles().to_vec();

        assert!(matches!(sim.advance_frame(0.1), Err(SchedulerError::ShutDown)));
        assert_eq!(sim.particles(), before.as_slice());
        assert_eq!(sim.frame_count(), 0);
    }
}
