//! Seams to the sensor and indicator collaborators
//!
//! Register-level drivers live outside this crate. They hand over raw device
//! counts as `Vector3<f64>` and [`SensorScale`](crate::SensorScale) converts
//! them to physical units.

use nalgebra::Vector3;
use thiserror::Error;

/// A failed sensor transfer.
///
/// Kept distinct from a valid reading so that a failed read is never mistaken
/// for an all-zero sample.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    #[error("bus transfer failed: {0}")]
    Bus(String),

    #[error("{0} has no fresh data")]
    NotReady(&'static str),
}

/// Combined accelerometer and gyroscope
pub trait InertialSensor {
    /// Specific force in raw counts
    fn read_acceleration(&mut self) -> Result<Vector3<f64>, SensorError>;

    /// Angular rate in raw counts
    fn read_angular_rate(&mut self) -> Result<Vector3<f64>, SensorError>;
}

pub trait MagneticSensor {
    /// Magnetic field in raw counts
    fn read_magnetic_field(&mut self) -> Result<Vector3<f64>, SensorError>;
}

/// Single-point time-of-flight range sensor
pub trait RangeSensor {
    /// Distance in millimetres; 0 means no surface in range
    fn read_range_mm(&mut self) -> Result<u16, SensorError>;
}

/// On/off indicator, usually an LED
pub trait Indicator {
    fn set(&mut self, on: bool);

    fn is_on(&self) -> bool;

    fn toggle(&mut self) {
        let on = self.is_on();
        self.set(!on);
    }
}

/// The sensors polled by the steady-state tasks
pub struct SensorSuite<I, M, R> {
    pub inertial: I,
    pub magnetic: M,
    pub range: R,
}

impl<I, M, R> SensorSuite<I, M, R>
where
    I: InertialSensor,
    M: MagneticSensor,
    R: RangeSensor,
{
    pub fn new(inertial: I, magnetic: M, range: R) -> Self {
        Self {
            inertial,
            magnetic,
            range,
        }
    }
}
