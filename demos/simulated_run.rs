//! Simulated platform run
//!
//! Drives the whole pipeline against simulated sensors: the calibration
//! sequence (all three triggers are fired up front), then the fast and slow
//! ticks for a fixed duration. Obstacle points are logged, or posted to the
//! collecting server with `--post`.
//!
//! The simulated board is mounted upright: body y points up and the range
//! sensor looks along body z.
//!
//! Run with: `RUST_LOG=info cargo run --example simulated_run -- --seconds 5`

use std::error::Error;
use std::f64::consts::PI;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use inertial_mapper::{
    HttpReporter, Indicator, InertialSensor, MagneticSensor, ObstaclePoint, RangeSensor,
    ReportError, Reporter, SensorError, SensorSuite, Trigger, config, run_platform,
};
use log::{debug, info};
use nalgebra::Vector3;
use rand::prelude::*;
use rand_pcg::Pcg64;

#[derive(Parser, Debug)]
struct Args {
    /// Platform configuration file (TOML); defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seconds of steady-state operation after calibration
    #[arg(long, default_value = "10.0")]
    seconds: f64,

    /// Samples per calibration step, overriding the configuration
    #[arg(long, default_value = "50")]
    calibration_samples: usize,

    /// Post points to the configured server instead of logging them
    #[arg(long, default_value_t = false)]
    post: bool,

    /// Seed for the sensor noise
    #[arg(long, default_value = "42")]
    seed: u64,
}

/// Stationary IMU with white noise, in mg and mdps
struct SimulatedImu {
    rng: Pcg64,
}

impl InertialSensor for SimulatedImu {
    fn read_acceleration(&mut self) -> Result<Vector3<f64>, SensorError> {
        Ok(Vector3::new(
            self.rng.random_range(-4.0..4.0),
            1000.0 + self.rng.random_range(-4.0..4.0),
            self.rng.random_range(-4.0..4.0),
        ))
    }

    fn read_angular_rate(&mut self) -> Result<Vector3<f64>, SensorError> {
        Ok(Vector3::new(
            350.0 + self.rng.random_range(-50.0..50.0),
            -120.0 + self.rng.random_range(-50.0..50.0),
            80.0 + self.rng.random_range(-50.0..50.0),
        ))
    }
}

/// Magnetometer that is swept through every heading first, then held still
struct SimulatedMagnetometer {
    hard_iron: Vector3<f64>,
    sweep_samples: usize,
    reads: usize,
}

impl MagneticSensor for SimulatedMagnetometer {
    fn read_magnetic_field(&mut self) -> Result<Vector3<f64>, SensorError> {
        let field = if self.reads < self.sweep_samples {
            let t = self.reads as f64 / self.sweep_samples as f64;
            let azimuth = t * 8.0 * PI;
            let elevation = (t * 2.0 - 1.0) * PI / 2.0;
            Vector3::new(
                elevation.cos() * azimuth.cos(),
                elevation.sin(),
                elevation.cos() * azimuth.sin(),
            ) * 450.0
        } else {
            // North along body x, dipping below the horizon
            Vector3::new(300.0, -330.0, 0.0)
        };
        self.reads += 1;
        Ok(field + self.hard_iron)
    }
}

/// Range to a wall that drifts in and out of reach
struct SimulatedRange {
    start: Instant,
}

impl RangeSensor for SimulatedRange {
    fn read_range_mm(&mut self) -> Result<u16, SensorError> {
        let t = self.start.elapsed().as_secs_f64();
        let distance = 1200.0 + 1000.0 * (t * 0.7).sin();
        // Out of reach reads as no surface
        if distance > 2000.0 {
            return Ok(0);
        }
        Ok(distance as u16)
    }
}

struct LogIndicator {
    on: bool,
}

impl Indicator for LogIndicator {
    fn set(&mut self, on: bool) {
        if on != self.on {
            debug!("Indicator {}", if on { "on" } else { "off" });
        }
        self.on = on;
    }

    fn is_on(&self) -> bool {
        self.on
    }
}

enum DemoReporter {
    Log,
    Http(HttpReporter),
}

impl Reporter for DemoReporter {
    fn report(&mut self, batch: &[ObstaclePoint]) -> Result<(), ReportError> {
        match self {
            DemoReporter::Log => {
                for point in batch {
                    info!(
                        "obstacle ({:.1}, {:.1}) seen from ({:.1}, {:.1})",
                        point.point.x, point.point.y, point.position.x, point.position.y
                    );
                }
                Ok(())
            }
            DemoReporter::Http(reporter) => reporter.report(batch),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => config::load(path)?,
        None => Default::default(),
    };
    config.calibration.sample_count = args.calibration_samples;

    let reporter = if args.post {
        let reporter = HttpReporter::new(&config.reporter)?;
        info!("Posting points to {}", reporter.url());
        DemoReporter::Http(reporter)
    } else {
        DemoReporter::Log
    };

    let rng = Pcg64::seed_from_u64(args.seed);
    let sensors = SensorSuite::new(
        SimulatedImu { rng },
        SimulatedMagnetometer {
            hard_iron: Vector3::new(-35.0, 120.0, 48.0),
            sweep_samples: config.calibration.sample_count,
            reads: 0,
        },
        SimulatedRange {
            start: Instant::now(),
        },
    );

    let (handle, trigger) = Trigger::channel();
    for _ in 0..3 {
        handle.fire()?;
    }

    let seconds = args.seconds;
    run_platform(
        &config,
        sensors,
        LogIndicator { on: false },
        trigger,
        reporter,
        async move { tokio::time::sleep(Duration::from_secs_f64(seconds)).await },
    )?;

    Ok(())
}
