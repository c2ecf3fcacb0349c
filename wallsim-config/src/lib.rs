use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use std::{fs, io};
use thiserror::Error;

// --- Error Type ---
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),

    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid config: {0}")]
    Validation(String),
}

// --- Enums for Choices ---

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum CollisionConfig {
    #[default]
    Point,
    Swept {
        #[serde(default = "default_samples")]
        samples: u32,
    },
}

fn default_samples() -> u32 { 10 }

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Binary,
    #[default]
    None,
}

/// Scenario file formats, picked by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(ConfigFormat::Json),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(ConfigFormat::Toml),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

// --- Configuration Sections ---

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct ArenaConfig {
    pub width: f64,
    pub height: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct WallConfig {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// One entry of the `particles` list. Angles are in degrees.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParticleBatch {
    Single {
        x: f64,
        y: f64,
        angle: f64,
        speed: f64,
        radius: f64,
    },
    Line {
        count: usize,
        from: [f64; 2],
        to: [f64; 2],
        angle: f64,
        speed: f64,
        radius: f64,
    },
    Fan {
        count: usize,
        origin: [f64; 2],
        start_angle: f64,
        end_angle: f64,
        speed: f64,
        radius: f64,
    },
    SpeedSweep {
        count: usize,
        origin: [f64; 2],
        angle: f64,
        start_speed: f64,
        end_speed: f64,
        radius: f64,
    },
    Random {
        count: usize,
        min_speed: f64,
        max_speed: f64,
        radius: f64,
        #[serde(default)]
        seed: u64,
    },
}

impl ParticleBatch {
    /// Number of particles this entry spawns.
    pub fn count(&self) -> usize {
        match *self {
            ParticleBatch::Single { .. } => 1,
            ParticleBatch::Line { count, .. }
            | ParticleBatch::Fan { count, .. }
            | ParticleBatch::SpeedSweep { count, .. }
            | ParticleBatch::Random { count, .. } => count,
        }
    }

    pub fn radius(&self) -> f64 {
        match *self {
            ParticleBatch::Single { radius, .. }
            | ParticleBatch::Line { radius, .. }
            | ParticleBatch::Fan { radius, .. }
            | ParticleBatch::SpeedSweep { radius, .. }
            | ParticleBatch::Random { radius, .. } => radius,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    /// Emit every n-th frame.
    #[serde(default = "default_every")]
    pub every: u32,
}

fn default_every() -> u32 { 1 }

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            every: default_every(),
        }
    }
}

// --- Top-Level Config Struct ---

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub framerate: u32,
    /// Simulated seconds per frame. Defaults to `1 / framerate`.
    #[serde(default)]
    pub dt: Option<f64>,
    /// Stop after this many frames. Runs until interrupted when absent.
    #[serde(default)]
    pub frames: Option<u64>,
    /// Worker threads. Absent or 0 uses every available CPU.
    #[serde(default)]
    pub workers: Option<usize>,
    pub arena: ArenaConfig,
    #[serde(default)]
    pub collision: CollisionConfig,
    #[serde(default)]
    pub walls: Vec<WallConfig>,
    #[serde(default)]
    pub particles: Vec<ParticleBatch>,
    #[serde(default)]
    pub output: OutputConfig,
}

// --- Helper Methods ---

impl Config {
    pub fn time_step(&self) -> f64 {
        self.dt.unwrap_or(1.0 / f64::from(self.framerate))
    }

    /// Wall-clock budget for one frame at the configured framerate.
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.framerate))
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or(0)
    }

    pub fn total_particles(&self) -> usize {
        self.particles.iter().map(ParticleBatch::count).sum()
    }
}

// --- Loading Functions ---

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let format = ConfigFormat::from_path(path)?;
    let content = fs::read_to_string(path)?;
    parse_config(&content, format)
}

/// Parse and validate a scenario held in memory.
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<Config, ConfigError> {
    let config: Config = match format {
        ConfigFormat::Json => serde_json::from_str(content)?,
        ConfigFormat::Toml => toml::from_str(content)?,
    };
    validate(&config)?;
    Ok(config)
}

fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), ConfigError> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError::Validation(message()))
    }
}

/// Reject scenarios the simulation would accept but misbehave on.
///
/// The engine itself trusts its inputs, so every range check on user data
/// lives here.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    ensure(config.framerate > 0, || "framerate cannot be zero".to_string())?;
    if let Some(dt) = config.dt {
        ensure(dt.is_finite() && dt > 0.0, || format!("dt must be positive, got {}", dt))?;
    }

    let ArenaConfig { width, height } = config.arena;
    ensure(width.is_finite() && width > 0.0 && height.is_finite() && height > 0.0, || {
        format!("arena must have positive size, got {}x{}", width, height)
    })?;

    if let CollisionConfig::Swept { samples } = config.collision {
        ensure(samples >= 1, || "swept collision needs at least one sample".to_string())?;
    }

    let inside = |x: f64, y: f64| x.is_finite() && y.is_finite() && (0.0..=width).contains(&x) && (0.0..=height).contains(&y);

    for (i, wall) in config.walls.iter().enumerate() {
        ensure(inside(wall.x1, wall.y1) && inside(wall.x2, wall.y2), || {
            format!("wall {} has an endpoint outside the arena", i)
        })?;
        ensure(wall.x1 != wall.x2 || wall.y1 != wall.y2, || {
            format!("wall {} has zero length", i)
        })?;
    }

    for (i, batch) in config.particles.iter().enumerate() {
        validate_batch(i, batch, width, height, &inside)?;
    }

    ensure(config.output.every > 0, || "output.every cannot be zero".to_string())?;
    Ok(())
}

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

fn validate_batch(
    index: usize,
    batch: &ParticleBatch,
    width: f64,
    height: f64,
    inside: &dyn Fn(f64, f64) -> bool,
) -> Result<(), ConfigError> {
    ensure(batch.count() > 0, || format!("particle batch {} is empty", index))?;

    let radius = batch.radius();
    ensure(radius.is_finite() && radius > 0.0, || {
        format!("particle batch {} needs a positive radius, got {}", index, radius)
    })?;
    ensure(2.0 * radius <= width && 2.0 * radius <= height, || {
        format!("particle batch {} radius {} does not fit in the arena", index, radius)
    })?;

    let origin_inside = |[x, y]: [f64; 2]| inside(x, y);

    let ok = match *batch {
        ParticleBatch::Single { x, y, angle, speed, .. } => inside(x, y) && all_finite(&[angle, speed]),
        ParticleBatch::Line { from, to, angle, speed, .. } => {
            origin_inside(from) && origin_inside(to) && all_finite(&[angle, speed])
        }
        ParticleBatch::Fan { origin, start_angle, end_angle, speed, .. } => {
            origin_inside(origin) && all_finite(&[start_angle, end_angle, speed])
        }
        ParticleBatch::SpeedSweep { origin, angle, start_speed, end_speed, .. } => {
            origin_inside(origin) && all_finite(&[angle, start_speed, end_speed])
        }
        ParticleBatch::Random { min_speed, max_speed, .. } => {
            ensure(all_finite(&[min_speed, max_speed]) && min_speed >= 0.0 && min_speed <= max_speed, || {
                format!(
                    "particle batch {} needs 0 <= min_speed <= max_speed, got {}..{}",
                    index, min_speed, max_speed
                )
            })?;
            true
        }
    };
    ensure(ok, || {
        format!("particle batch {} has a non-finite value or an origin outside the arena", index)
    })
}
