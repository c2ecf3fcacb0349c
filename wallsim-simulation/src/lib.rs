//! Wall-bounded particle simulation: walls, particles, the collision
//! detector and the `Simulation` that drives them across a worker pool.

pub mod arena;
pub mod collision;
pub mod particle;
pub mod simulation;
pub mod spawn;
pub mod wall;

pub use glam::DVec2;

pub use arena::ArenaBounds;
pub use collision::{collides, collides_swept, segment_point_distance, CollisionMode};
pub use particle::Particle;
pub use simulation::Simulation;
pub use wall::Wall;
pub use wallsim_core::SchedulerError;
