//! Settings and diagnostic types for the fusion and mapping engine

use core::time::Duration;

use nalgebra::Vector3;
use serde::Deserialize;

/// Conversion factors from raw sensor counts to physical units
///
/// # Example
/// ```
/// use inertial_mapper::SensorScale;
///
/// let scale = SensorScale {
///     accel_g_per_lsb: 0.000_061,   // ±2 g range at 16 bit
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SensorScale {
    /// Accelerometer sensitivity in g per count (typically 0.001, i.e. mg)
    pub accel_g_per_lsb: f64,
    /// Gyroscope sensitivity in rad/s per count (typically mdps converted to rad/s)
    pub gyro_rad_per_lsb: f64,
    /// Gravity in m/s², used to turn normalized specific force into acceleration
    pub gravity: f64,
    /// Map units per metre of dead-reckoned position (100 = centimetres)
    pub map_units_per_meter: f64,
    /// Millimetres per map unit for the range sensor (10 = centimetres)
    ///
    /// Range readings are truncated to whole map units, so anything under one
    /// unit collapses to the zero sentinel.
    pub range_mm_per_unit: u16,
}

impl SensorScale {
    /// Accelerometer counts to g
    pub fn acceleration(&self, raw: Vector3<f64>) -> Vector3<f64> {
        raw * self.accel_g_per_lsb
    }

    /// Gyroscope counts to rad/s
    pub fn angular_rate(&self, raw: Vector3<f64>) -> Vector3<f64> {
        raw * self.gyro_rad_per_lsb
    }

    /// Range in millimetres to whole map units
    pub fn range(&self, raw_mm: u16) -> f64 {
        f64::from(raw_mm / self.range_mm_per_unit.max(1))
    }
}

impl Default for SensorScale {
    fn default() -> Self {
        Self {
            accel_g_per_lsb: 0.001,
            gyro_rad_per_lsb: core::f64::consts::PI / 180_000.0,
            gravity: 9.8,
            map_units_per_meter: 100.0,
            range_mm_per_unit: 10,
        }
    }
}

/// Attitude estimator settings
///
/// The gains set the fraction of the measured tilt/heading error removed on
/// each update. Smaller gains reject more noise but converge more slowly.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct AttitudeSettings {
    /// Fraction of the gravity (tilt) error corrected per update
    pub tilt_gain: f64,
    /// Fraction of the magnetic heading error corrected per update
    pub yaw_gain: f64,
    /// Projected magnitudes below this are treated as degenerate and the
    /// correction for that update is skipped
    pub degenerate_epsilon: f64,
}

impl Default for AttitudeSettings {
    fn default() -> Self {
        Self {
            tilt_gain: 0.05,
            yaw_gain: 0.05,
            degenerate_epsilon: 1e-9,
        }
    }
}

/// Zero-velocity detector settings
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct MotionSettings {
    /// Number of samples in the sliding window
    pub window: usize,
    /// Variance of squared specific-force magnitude ((m/s²)⁴) below which
    /// the platform is considered stationary
    pub variance_threshold: f64,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            window: 8,
            variance_threshold: 300.0,
        }
    }
}

/// Which body-frame vectors define north and up for spatial mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisSource {
    /// Calibrated magnetic field and specific force as read on the mapping tick
    #[default]
    Measured,
    /// World north and up of the current attitude estimate
    Estimated,
}

/// Spatial mapper settings
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct MapperSettings {
    /// Range sensor beam direction in the body frame
    pub beam_direction: Vector3<f64>,
    pub axis_source: AxisSource,
}

impl Default for MapperSettings {
    fn default() -> Self {
        Self {
            beam_direction: Vector3::z(),
            axis_source: AxisSource::Measured,
        }
    }
}

/// Calibration sequencing settings
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct CalibrationSettings {
    /// Samples collected per calibration step
    pub sample_count: usize,
    /// Interval between samples in milliseconds
    pub sample_interval_ms: u64,
    /// Indicator toggles once the inertial step completes
    pub flash_toggles: u32,
    /// Interval between indicator toggles in milliseconds
    pub flash_interval_ms: u64,
}

impl CalibrationSettings {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn flash_interval(&self) -> Duration {
        Duration::from_millis(self.flash_interval_ms)
    }
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            sample_count: 500,
            sample_interval_ms: 20,
            flash_toggles: 11,
            flash_interval_ms: 200,
        }
    }
}

/// Periodic task rates
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Attitude/motion/position update period in milliseconds
    pub fast_period_ms: u64,
    /// Spatial mapping period in milliseconds
    pub slow_period_ms: u64,
}

impl SchedulerSettings {
    /// Never shorter than 1 ms
    pub fn fast_period(&self) -> Duration {
        Duration::from_millis(self.fast_period_ms.max(1))
    }

    /// Never shorter than 1 ms
    pub fn slow_period(&self) -> Duration {
        Duration::from_millis(self.slow_period_ms.max(1))
    }

    /// Fast period in seconds, the integration step of the navigator
    pub fn fast_delta_time(&self) -> f64 {
        self.fast_period().as_secs_f64()
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            fast_period_ms: 22,
            slow_period_ms: 80,
        }
    }
}

/// Point reporter settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReporterSettings {
    pub host: String,
    pub port: u16,
    pub endpoint: String,
    /// Identifies this platform to the collecting server
    pub board_id: String,
    /// Points per report
    pub batch_size: usize,
    /// Points that may queue before the producer blocks
    pub channel_capacity: usize,
    /// Request timeout in milliseconds; `None` leaves requests unbounded
    pub request_timeout_ms: Option<u64>,
}

impl Default for ReporterSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 80,
            endpoint: "/collect".to_string(),
            board_id: "b1".to_string(),
            batch_size: 10,
            channel_capacity: 20,
            request_timeout_ms: None,
        }
    }
}

/// Complete platform configuration
///
/// Every section falls back to its defaults when absent from the file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub sensors: SensorScale,
    pub attitude: AttitudeSettings,
    pub motion: MotionSettings,
    pub mapper: MapperSettings,
    pub calibration: CalibrationSettings,
    pub scheduler: SchedulerSettings,
    pub reporter: ReporterSettings,
}

/// What the last attitude update did
///
/// Diagnostic information only; none of it is fed back into the filter.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CorrectionStates {
    /// Whether the tilt correction was applied
    ///
    /// False when the specific force was zero (free fall) or already aligned
    /// with the up axis.
    pub tilt_applied: bool,
    /// Tilt error before correction in radians
    pub tilt_angle: f64,
    /// Whether the yaw correction was applied
    ///
    /// False when the field had no horizontal component or was already
    /// aligned with north.
    pub yaw_applied: bool,
    /// Heading error before correction in radians
    pub yaw_angle: f64,
}
