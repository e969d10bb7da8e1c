//! Mathematical utilities and nalgebra extensions for the fusion engine

use nalgebra::{Quaternion, UnitQuaternion, Vector2, Vector3};

use crate::error::FusionError;

/// Mathematical constants
pub const DEG_TO_RAD: f64 = core::f64::consts::PI / 180.0;
pub const RAD_TO_DEG: f64 = 180.0 / core::f64::consts::PI;

/// Extension trait for Vector3 operations
pub trait Vector3Ext {
    /// Normalize the vector, failing on an exact zero magnitude
    fn try_unit(&self) -> Result<Vector3<f64>, FusionError>;

    /// Convert radians to degrees
    fn rad_to_deg(&self) -> Vector3<f64>;
}

impl Vector3Ext for Vector3<f64> {
    fn try_unit(&self) -> Result<Vector3<f64>, FusionError> {
        let magnitude = self.magnitude();
        if magnitude == 0.0 || !magnitude.is_finite() {
            return Err(FusionError::DegenerateVector);
        }
        Ok(*self / magnitude)
    }

    fn rad_to_deg(&self) -> Vector3<f64> {
        *self * RAD_TO_DEG
    }
}

/// Extension trait for Vector2 operations
pub trait Vector2Ext {
    /// Normalize the vector, failing on an exact zero magnitude
    fn try_unit(&self) -> Result<Vector2<f64>, FusionError>;
}

impl Vector2Ext for Vector2<f64> {
    fn try_unit(&self) -> Result<Vector2<f64>, FusionError> {
        let magnitude = self.magnitude();
        if magnitude == 0.0 || !magnitude.is_finite() {
            return Err(FusionError::DegenerateVector);
        }
        Ok(*self / magnitude)
    }
}

/// Extension trait for UnitQuaternion operations
pub trait QuaternionExt {
    /// Convert quaternion to Euler angles (roll, pitch, yaw) in radians.
    ///
    /// Diagnostic only: the decomposition is lossy near gimbal lock.
    fn to_euler(&self) -> Vector3<f64>;

    /// Convert quaternion to Euler angles in degrees
    fn to_euler_degrees(&self) -> Vector3<f64>;

    /// Small rotation accumulated over `delta_time` at `angular_velocity`
    /// (rad/s), built from the half-angle vector with a unit scalar part.
    fn small_rotation(angular_velocity: Vector3<f64>, delta_time: f64) -> UnitQuaternion<f64>;
}

impl QuaternionExt for UnitQuaternion<f64> {
    fn to_euler(&self) -> Vector3<f64> {
        let (roll, pitch, yaw) = self.euler_angles();
        Vector3::new(roll, pitch, yaw)
    }

    fn to_euler_degrees(&self) -> Vector3<f64> {
        self.to_euler().rad_to_deg()
    }

    fn small_rotation(angular_velocity: Vector3<f64>, delta_time: f64) -> UnitQuaternion<f64> {
        let half_angle = angular_velocity * (0.5 * delta_time);
        // w = 1 keeps the norm strictly positive, so normalizing is always safe
        UnitQuaternion::new_normalize(Quaternion::from_parts(1.0, half_angle))
    }
}
