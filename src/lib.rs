//! Inertial Mapper - sensor fusion and 2-D obstacle mapping for a small ground platform
//!
//! The engine fuses gyroscope, accelerometer and magnetometer readings into a
//! quaternion attitude, dead-reckons position with zero-velocity updates
//! (ZUPT), and projects single-point range readings into absolute obstacle
//! coordinates that are streamed to a collecting server.
//!
//! # Features
//!
//! - Quaternion complementary filter with fractional tilt and heading corrections
//! - Variance-gated ZUPT that hard-resets velocity whenever the platform is at rest
//! - Magnetometer hard-iron calibration from min/max extents
//! - Trigger-driven calibration sequence (magnetometer, then accelerometer and gyroscope)
//! - Fast and slow ticks on one cooperative scheduler, so core state is never locked
//! - Batched point reporting on a dedicated worker thread
//!
//! # Quick Start
//!
//! ```rust
//! use nalgebra::{Vector2, Vector3};
//! use inertial_mapper::{AttitudeEstimator, MapperSettings, SpatialMapper};
//!
//! let mut attitude = AttitudeEstimator::new();
//!
//! // Board mounted upright: body y is up, the range beam looks along body z.
//! // Angular rate in rad/s, specific force in g, calibrated magnetic field
//! let gyroscope = Vector3::new(0.01, 0.0, 0.02);
//! let accelerometer = Vector3::new(0.0, 1.0, 0.0);
//! let magnetometer = Vector3::new(0.4, -0.3, 0.0);
//!
//! attitude.update(gyroscope, accelerometer, magnetometer, 0.022);
//! let (roll, pitch, yaw) = attitude.quaternion().euler_angles();
//! # let _ = (roll, pitch, yaw);
//!
//! // Project a 20 cm range reading taken at the origin
//! let mapper = SpatialMapper::new(MapperSettings::default());
//! let obstacle = mapper
//!     .map(magnetometer, accelerometer, 20.0, Vector2::zeros())
//!     .unwrap()
//!     .unwrap();
//! assert!((obstacle.point.x + 20.0).abs() < 1e-9);
//! ```
//!
//! Sensors and the indicator plug in through the traits in [`sensors`]; the
//! whole pipeline is run by [`scheduler::run_platform`].

mod ahrs;
pub mod calibration;
pub mod config;
mod error;
pub mod magnetometer;
pub mod mapper;
mod math;
mod motion;
pub mod navigation;
pub mod orchestrator;
pub mod reporter;
pub mod scheduler;
pub mod sensors;
mod types;

// Re-export all public types and functions
pub use ahrs::AttitudeEstimator;
pub use calibration::{CalibrationData, average_bias, calibrate_inertial};
pub use error::{Axis, CalibrationError, FusionError};
pub use magnetometer::MagnetometerCalibration;
pub use mapper::{ObstaclePoint, SpatialMapper};
pub use math::{DEG_TO_RAD, QuaternionExt, RAD_TO_DEG, Vector2Ext, Vector3Ext};
pub use motion::MotionDetector;
pub use navigation::{InertialNavigator, NavigationState, PositionIntegrator};
pub use orchestrator::{CalibrationOrchestrator, CalibrationStep, Dispatch};
pub use reporter::{HttpReporter, PointSink, ReportError, Reporter, spawn_reporter};
pub use scheduler::{SteadyState, Trigger, TriggerHandle, run_platform};
pub use sensors::{Indicator, InertialSensor, MagneticSensor, RangeSensor, SensorError, SensorSuite};
pub use types::*;
