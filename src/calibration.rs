//! Session calibration data and inertial bias handling

use nalgebra::Vector3;

use crate::error::CalibrationError;
use crate::magnetometer::MagnetometerCalibration;

/// Everything the steady-state tasks need from calibration
///
/// Produced once by the calibration orchestrator and then only read, so it
/// is handed around by value and never shared mutably.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationData {
    magnetometer: MagnetometerCalibration,
    gyro_bias: Vector3<f64>,
    accel_bias: Vector3<f64>,
}

impl CalibrationData {
    /// # Arguments
    /// * `magnetometer` - Hard-iron correction
    /// * `gyro_bias` - Mean at-rest angular rate in rad/s
    /// * `accel_bias` - Mean at-rest specific force in g
    pub fn new(
        magnetometer: MagnetometerCalibration,
        gyro_bias: Vector3<f64>,
        accel_bias: Vector3<f64>,
    ) -> Self {
        Self {
            magnetometer,
            gyro_bias,
            accel_bias,
        }
    }

    pub fn magnetometer(&self) -> &MagnetometerCalibration {
        &self.magnetometer
    }

    pub fn gyro_bias(&self) -> Vector3<f64> {
        self.gyro_bias
    }

    pub fn accel_bias(&self) -> Vector3<f64> {
        self.accel_bias
    }
}

/// Average a batch of at-rest readings into a bias vector
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use inertial_mapper::calibration::average_bias;
///
/// let samples = [Vector3::new(1.0, 2.0, 3.0), Vector3::new(3.0, 2.0, 1.0)];
/// assert_eq!(average_bias(&samples).unwrap(), Vector3::new(2.0, 2.0, 2.0));
/// ```
pub fn average_bias(samples: &[Vector3<f64>]) -> Result<Vector3<f64>, CalibrationError> {
    if samples.is_empty() {
        return Err(CalibrationError::InsufficientSamples {
            required: 1,
            collected: 0,
        });
    }

    let sum = samples.iter().fold(Vector3::zeros(), |acc, sample| acc + sample);
    Ok(sum / samples.len() as f64)
}

/// Scale a raw inertial reading into physical units and remove its bias
///
/// Order: `uncalibrated * sensitivity - bias`
pub fn calibrate_inertial(
    uncalibrated: Vector3<f64>,
    sensitivity: f64,
    bias: Vector3<f64>,
) -> Vector3<f64> {
    uncalibrated * sensitivity - bias
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_average_bias() {
        let samples = [
            Vector3::new(0.01, -0.02, 1.01),
            Vector3::new(0.03, 0.00, 0.99),
            Vector3::new(0.02, -0.01, 1.00),
        ];
        let bias = average_bias(&samples).unwrap();
        assert_relative_eq!(bias, Vector3::new(0.02, -0.01, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_average_bias_requires_samples() {
        assert_eq!(
            average_bias(&[]),
            Err(CalibrationError::InsufficientSamples {
                required: 1,
                collected: 0
            })
        );
    }

    #[test]
    fn test_inertial_calibration() {
        // 1000 mg counts at 0.001 g/count, minus a 0.1 g bias
        let raw = Vector3::new(1000.0, 0.0, -500.0);
        let bias = Vector3::new(0.1, 0.0, 0.0);

        let calibrated = calibrate_inertial(raw, 0.001, bias);
        assert_relative_eq!(calibrated, Vector3::new(0.9, 0.0, -0.5), epsilon = 1e-12);
    }
}
