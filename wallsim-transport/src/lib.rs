use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use thiserror::Error;
use wallsim_simulation::{Particle, Simulation, Wall};

// --- Error Type ---
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("binary serialization failed: {0}")]
    Binary(#[from] bincode::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("frame of {0} bytes does not fit a u32 length prefix")]
    FrameTooLarge(usize),
}

// --- Snapshot ---

/// What a renderer needs to draw one particle.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ParticleView {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

impl From<&Particle> for ParticleView {
    fn from(particle: &Particle) -> Self {
        ParticleView {
            x: particle.x(),
            y: particle.y(),
            radius: particle.radius,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct WallView {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl From<&Wall> for WallView {
    fn from(wall: &Wall) -> Self {
        let (x1, y1, x2, y2) = wall.endpoints();
        WallView { x1, y1, x2, y2 }
    }
}

/// Read-back of one completed frame.
///
/// Walls never move, so they are only attached when asked for, normally on
/// the first frame a consumer sees.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FrameSnapshot {
    pub frame: u64,
    pub time: f64,
    pub particles: Vec<ParticleView>,
    pub walls: Option<Vec<WallView>>,
}

impl FrameSnapshot {
    pub fn capture(simulation: &Simulation, include_walls: bool) -> Self {
        FrameSnapshot {
            frame: simulation.frame_count(),
            time: simulation.elapsed(),
            particles: simulation.particles().iter().map(ParticleView::from).collect(),
            walls: include_walls.then(|| simulation.walls().iter().map(WallView::from).collect()),
        }
    }
}

// --- Traits ---

/// How consecutive frames are delimited on a byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// One frame per line. Only valid for payloads without raw newlines.
    Lines,
    /// Each frame preceded by its length as a little-endian `u32`.
    LengthPrefixed,
}

/// Turns a snapshot into bytes.
pub trait Serializer: Send + Sync {
    fn serialize(&self, snapshot: &FrameSnapshot) -> Result<Vec<u8>, TransportError>;

    /// Framing a stream sender should use for this encoding.
    fn framing(&self) -> Framing;
}

/// Sends serialized frames to a destination.
pub trait Sender {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;

    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

// --- Serializers ---

/// One JSON object per frame.
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, snapshot: &FrameSnapshot) -> Result<Vec<u8>, TransportError> {
        Ok(serde_json::to_vec(snapshot)?)
    }

    fn framing(&self) -> Framing {
        Framing::Lines
    }
}

/// Compact bincode encoding of the same snapshot.
pub struct BinarySerializer;

impl Serializer for BinarySerializer {
    fn serialize(&self, snapshot: &FrameSnapshot) -> Result<Vec<u8>, TransportError> {
        Ok(bincode::serialize(snapshot)?)
    }

    fn framing(&self) -> Framing {
        Framing::LengthPrefixed
    }
}

// --- Senders ---

/// Writes framed data to any byte stream, flushing after every frame.
pub struct StreamSender<W: Write> {
    writer: W,
    framing: Framing,
}

/// Sends frames to standard output.
pub type StdioSender = StreamSender<io::Stdout>;

impl StreamSender<io::Stdout> {
    pub fn stdout(framing: Framing) -> Self {
        StreamSender::new(io::stdout(), framing)
    }
}

impl<W: Write> StreamSender<W> {
    pub fn new(writer: W, framing: Framing) -> Self {
        StreamSender { writer, framing }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Sender for StreamSender<W> {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        match self.framing {
            Framing::Lines => {
                self.writer.write_all(data)?;
                self.writer.write_all(b"\n")?;
            }
            Framing::LengthPrefixed => {
                let len = u32::try_from(data.len()).map_err(|_| TransportError::FrameTooLarge(data.len()))?;
                self.writer.write_all(&len.to_le_bytes())?;
                self.writer.write_all(data)?;
            }
        }
        self.writer.flush()?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Discards everything. Used for headless benchmarking.
#[derive(Debug, Default)]
pub struct NullSender {
    frames: u64,
    bytes: u64,
}

impl NullSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl Sender for NullSender {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.frames += 1;
        self.bytes += data.len() as u64;
        Ok(())
    }
}
