//! Hard-iron magnetometer calibration
//!
//! Derives a per-axis offset and scale from readings taken while the platform
//! is turned through as many headings as possible. The offset recentres each
//! axis on the midpoint of its observed range and the scale stretches every
//! axis to the mean half-range, so a full rotation traces a sphere of equal
//! radius on all axes.

use nalgebra::Vector3;

use crate::error::{Axis, CalibrationError};

/// Minimum number of readings needed to observe any range at all
pub const MIN_SAMPLES: usize = 2;

/// Per-axis magnetometer correction
///
/// Immutable once computed; applied to every reading for the rest of the
/// session.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use inertial_mapper::MagnetometerCalibration;
///
/// let readings = [
///     Vector3::new(110.0, -40.0, 25.0),
///     Vector3::new(-90.0, 160.0, -175.0),
/// ];
/// let calibration = MagnetometerCalibration::from_samples(&readings).unwrap();
///
/// assert_eq!(calibration.offset(), Vector3::new(10.0, 60.0, -75.0));
/// let adjusted = calibration.adjust(Vector3::new(110.0, 60.0, -75.0));
/// assert_eq!(adjusted, Vector3::new(100.0, 0.0, 0.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MagnetometerCalibration {
    offset: Vector3<f64>,
    scale: Vector3<f64>,
}

impl MagnetometerCalibration {
    /// Build a calibration from an explicit offset and scale
    pub fn new(offset: Vector3<f64>, scale: Vector3<f64>) -> Self {
        Self { offset, scale }
    }

    /// Identity correction: zero offset and unit scale
    pub fn identity() -> Self {
        Self::new(Vector3::zeros(), Vector3::repeat(1.0))
    }

    /// Compute the correction from a batch of raw readings
    ///
    /// Fails if fewer than [`MIN_SAMPLES`] readings are given, or if any axis
    /// shows no spread at all, since its scale would be undefined.
    pub fn from_samples(samples: &[Vector3<f64>]) -> Result<Self, CalibrationError> {
        if samples.len() < MIN_SAMPLES {
            return Err(CalibrationError::InsufficientSamples {
                required: MIN_SAMPLES,
                collected: samples.len(),
            });
        }

        let (min, max) = samples.iter().fold(
            (Vector3::repeat(f64::INFINITY), Vector3::repeat(f64::NEG_INFINITY)),
            |(min, max), sample| (min.inf(sample), max.sup(sample)),
        );

        let offset = (max + min) / 2.0;
        let half_range = (max - min) / 2.0;

        for (index, axis) in [Axis::X, Axis::Y, Axis::Z].into_iter().enumerate() {
            if half_range[index] <= 0.0 || !half_range[index].is_finite() {
                return Err(CalibrationError::ZeroRange { axis });
            }
        }

        let mean_half_range = half_range.sum() / 3.0;
        let scale = half_range.map(|delta| mean_half_range / delta);

        Ok(Self { offset, scale })
    }

    /// Apply the correction to a raw reading: `(raw - offset) * scale` per axis
    pub fn adjust(&self, raw: Vector3<f64>) -> Vector3<f64> {
        (raw - self.offset).component_mul(&self.scale)
    }

    /// Hard-iron offset per axis
    pub fn offset(&self) -> Vector3<f64> {
        self.offset
    }

    /// Scale factor per axis
    pub fn scale(&self) -> Vector3<f64> {
        self.scale
    }
}

impl Default for MagnetometerCalibration {
    fn default() -> Self {
        Self::identity()
    }
}
