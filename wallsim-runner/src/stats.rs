use hdrhistogram::{CreationError, Histogram};
use std::fmt;
use std::time::Duration;

// One minute, in microseconds.
const MAX_TRACKED_US: u64 = 60_000_000;

/// Engine time per frame, in microseconds.
pub struct FrameStats {
    histogram: Histogram<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSummary {
    pub frames: u64,
    pub mean_us: f64,
    pub p50_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

impl FrameStats {
    pub fn new() -> Result<Self, CreationError> {
        Ok(FrameStats {
            histogram: Histogram::new_with_bounds(1, MAX_TRACKED_US, 3)?,
        })
    }

    pub fn record(&mut self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.histogram.saturating_record(micros.max(1));
    }

    pub fn summary(&self) -> Option<FrameSummary> {
        if self.histogram.len() == 0 {
            return None;
        }
        Some(FrameSummary {
            frames: self.histogram.len(),
            mean_us: self.histogram.mean(),
            p50_us: self.histogram.value_at_quantile(0.5),
            p99_us: self.histogram.value_at_quantile(0.99),
            max_us: self.histogram.max(),
        })
    }
}

impl fmt::Display for FrameSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames, mean {:.1}us, p50 {}us, p99 {}us, max {}us",
            self.frames, self.mean_us, self.p50_us, self.p99_us, self.max_us
        )
    }
}
