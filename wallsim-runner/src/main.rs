mod scenario;
mod stats;

use clap::Parser;
use crossbeam_channel::{bounded, Receiver};
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::process;
use std::time::{Duration, Instant};
use thiserror::Error;
use wallsim_config::{load_config, ConfigError, OutputConfig, OutputFormat};
use wallsim_core::SchedulerError;
use wallsim_simulation::Simulation;
use wallsim_transport::{
    BinarySerializer, FrameSnapshot, JsonSerializer, NullSender, Sender, Serializer, StdioSender, TransportError,
};

use crate::stats::FrameStats;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the scenario file (.json or .toml)
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Stop after this many frames, overriding the scenario
    #[arg(short, long)]
    frames: Option<u64>,

    /// Worker threads, overriding the scenario (0 = one per CPU)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Run frames back to back instead of pacing to the framerate
    #[arg(long)]
    unpaced: bool,

    /// Serialize frames as configured but discard them instead of writing to stdout
    #[arg(long)]
    discard: bool,
}

#[derive(Debug, Error)]
enum RunnerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("worker pool failed: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("frame output failed: {0}")]
    Transport(#[from] TransportError),

    #[error("failed to install Ctrl+C handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("failed to set up frame statistics: {0}")]
    Stats(#[from] hdrhistogram::CreationError),
}

/// Snapshot pipeline for the configured output format.
struct Output {
    serializer: Box<dyn Serializer>,
    sender: Box<dyn Sender>,
    every: u64,
    walls_sent: bool,
}

impl Output {
    fn create(config: &OutputConfig, discard: bool) -> Option<Self> {
        let serializer: Box<dyn Serializer> = match config.format {
            OutputFormat::Json => Box::new(JsonSerializer),
            OutputFormat::Binary => Box::new(BinarySerializer),
            OutputFormat::None => return None,
        };
        let sender: Box<dyn Sender> = if discard {
            Box::new(NullSender::new())
        } else {
            Box::new(StdioSender::stdout(serializer.framing()))
        };
        Some(Output {
            serializer,
            sender,
            every: u64::from(config.every),
            walls_sent: false,
        })
    }

    fn emit(&mut self, simulation: &Simulation) -> Result<(), TransportError> {
        if simulation.frame_count() % self.every != 0 {
            return Ok(());
        }
        let snapshot = FrameSnapshot::capture(simulation, !self.walls_sent);
        let data = self.serializer.serialize(&snapshot)?;
        self.sender.send(&data)?;
        self.walls_sent = true;
        Ok(())
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        error!("{}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), RunnerError> {
    let config = load_config(&args.config)?;
    info!("Using configuration from {}", args.config.display());

    let frame_limit = args.frames.or(config.frames);
    let workers = args.workers.unwrap_or_else(|| config.worker_count());
    let dt = config.time_step();
    let frame_duration = config.frame_duration();

    let mut simulation = scenario::build_simulation(&config, workers)?;
    let mut output = Output::create(&config.output, args.discard);
    let mut stats = FrameStats::new()?;

    let (shutdown_tx, shutdown_rx) = bounded(1);
    ctrlc::set_handler(move || {
        // A pending signal is already enough.
        let _ = shutdown_tx.try_send(());
    })?;

    info!(
        "Running at {} FPS (dt = {}s){}",
        config.framerate,
        dt,
        frame_limit.map(|n| format!(" for {} frames", n)).unwrap_or_default()
    );

    if let Some(output) = output.as_mut() {
        output.emit(&simulation)?;
    }

    run_loop(
        &mut simulation,
        &mut output,
        &mut stats,
        &shutdown_rx,
        LoopSettings {
            dt,
            frame_duration,
            frame_limit,
            paced: !args.unpaced,
        },
    )?;

    if let Some(output) = output.as_mut() {
        output.sender.flush()?;
    }

    match stats.summary() {
        Some(summary) => info!("Frame times: {}", summary),
        None => info!("No frames were run"),
    }
    info!("Simulated {:.3}s", simulation.elapsed());
    Ok(())
}

struct LoopSettings {
    dt: f64,
    frame_duration: Duration,
    frame_limit: Option<u64>,
    paced: bool,
}

fn run_loop(
    simulation: &mut Simulation,
    output: &mut Option<Output>,
    stats: &mut FrameStats,
    shutdown: &Receiver<()>,
    settings: LoopSettings,
) -> Result<(), RunnerError> {
    loop {
        if settings.frame_limit.is_some_and(|limit| simulation.frame_count() >= limit) {
            info!("Reached frame limit");
            return Ok(());
        }
        if shutdown.try_recv().is_ok() {
            info!("Shutdown requested, stopping after frame {}", simulation.frame_count());
            return Ok(());
        }

        let frame_start = Instant::now();
        simulation.advance_frame(settings.dt)?;
        stats.record(frame_start.elapsed());

        if let Some(output) = output.as_mut() {
            output.emit(simulation)?;
        }

        let frame = simulation.frame_count();
        if frame % 100 == 0 {
            debug!("Frame {} (t = {:.3}s)", frame, simulation.elapsed());
        }

        if !settings.paced {
            continue;
        }

        // Check for frame lag before sleeping
        let elapsed = frame_start.elapsed();
        if elapsed > settings.frame_duration {
            warn!(
                "Frame lag detected! target {}ms, actual {}ms, lag {}ms",
                settings.frame_duration.as_millis(),
                elapsed.as_millis(),
                (elapsed - settings.frame_duration).as_millis()
            );
        } else {
            spin_sleep::sleep(settings.frame_duration - elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wallsim_transport::{Framing, StreamSender};

    struct Shared(std::rc::Rc<std::cell::RefCell<Vec<u8>>>);

    impl std::io::Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn loop_honours_frame_limit_and_output_interval() {
        let mut sim = Simulation::new(100.0, 100.0, 2).unwrap();
        sim.add_wall(50.0, 10.0, 50.0, 90.0);
        sim.add_particle(20.0, 50.0, 0.0, 30.0, 2.0);

        let buffer = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut output = Some(Output {
            serializer: Box::new(JsonSerializer),
            sender: Box::new(StreamSender::new(Shared(buffer.clone()), Framing::Lines)),
            every: 5,
            walls_sent: false,
        });
        let mut stats = FrameStats::new().unwrap();
        let (_tx, rx) = bounded(1);

        run_loop(
            &mut sim,
            &mut output,
            &mut stats,
            &rx,
            LoopSettings {
                dt: 0.1,
                frame_duration: Duration::from_millis(1),
                frame_limit: Some(20),
                paced: false,
            },
        )
        .unwrap();

        assert_eq!(sim.frame_count(), 20);
        assert_eq!(stats.summary().unwrap().frames, 20);

        let text = String::from_utf8(buffer.borrow().clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with(r#"{"frame":5,"#));
        assert!(!lines[0].ends_with(r#""walls":null}"#));
        assert!(lines[3].starts_with(r#"{"frame":20,"#));
        assert!(lines[3].ends_with(r#""walls":null}"#));
    }

    #[test]
    fn zero_frame_limit_runs_nothing() {
        let mut sim = Simulation::new(100.0, 100.0, 1).unwrap();
        sim.add_particle(50.0, 50.0, 0.0, 10.0, 1.0);
        let mut stats = FrameStats::new().unwrap();
        let (_tx, rx) = bounded(1);

        run_loop(
            &mut sim,
            &mut None,
            &mut stats,
            &rx,
            LoopSettings {
                dt: 0.1,
                frame_duration: Duration::from_millis(1),
                frame_limit: Some(0),
                paced: false,
            },
        )
        .unwrap();

        assert_eq!(sim.frame_count(), 0);
        assert!(stats.summary().is_none());
    }

    #[test]
    fn pending_shutdown_stops_before_first_frame() {
        let mut sim = Simulation::new(100.0, 100.0, 1).unwrap();
        let mut stats = FrameStats::new().unwrap();
        let (tx, rx) = bounded(1);
        tx.send(()).unwrap();

        run_loop(
            &mut sim,
            &mut None,
            &mut stats,
            &rx,
            LoopSettings {
                dt: 0.1,
                frame_duration: Duration::from_millis(1),
                frame_limit: None,
                paced: true,
            },
        )
        .unwrap();

        assert_eq!(sim.frame_count(), 0);
        assert!(stats.summary().is_none());
    }

    #[test]
    fn output_none_builds_no_pipeline() {
        let config = OutputConfig { format: OutputFormat::None, every: 1 };
        assert!(Output::create(&config, false).is_none());
        let config = OutputConfig { format: OutputFormat::Binary, every: 3 };
        assert!(Output::create(&config, true).is_some());
    }
}
