//! Engine infrastructure for the wall-bounded particle simulation:
//! vector geometry and the per-frame worker pool.

pub mod geometry;
pub mod scheduler;

pub use geometry::{Point2, Vector2};
pub use scheduler::{SchedulerError, WorkerPool};
