//! Quaternion attitude estimator
//!
//! Three-stage complementary filter: the gyroscope is integrated into the
//! orientation, then a fraction of the tilt error against gravity and of the
//! heading error against magnetic north is removed each update.

use std::f64::consts::PI;

use log::debug;
use nalgebra::{Unit, UnitQuaternion, Vector3};

use crate::math::{QuaternionExt, Vector3Ext};
use crate::types::{AttitudeSettings, CorrectionStates};

/// Attitude estimator
///
/// Holds the body-to-world orientation. World axes: x is magnetic north and
/// z is up (the direction of the at-rest specific force).
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use inertial_mapper::AttitudeEstimator;
///
/// let mut attitude = AttitudeEstimator::new();
///
/// let angular_velocity = Vector3::new(0.0, 0.0, 0.1); // rad/s
/// let specific_force = Vector3::new(0.0, 0.0, 1.0);   // g
/// let magnetic_field = Vector3::new(0.4, 0.0, -0.3);  // calibrated
///
/// attitude.update(angular_velocity, specific_force, magnetic_field, 0.022);
///
/// let q = attitude.quaternion();
/// assert!((q.as_ref().norm() - 1.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct AttitudeEstimator {
    settings: AttitudeSettings,
    quaternion: UnitQuaternion<f64>,
    states: CorrectionStates,
}

impl AttitudeEstimator {
    /// Create an estimator with default settings at the identity orientation
    pub fn new() -> Self {
        Self::with_settings(AttitudeSettings::default())
    }

    pub fn with_settings(settings: AttitudeSettings) -> Self {
        Self {
            settings,
            quaternion: UnitQuaternion::identity(),
            states: CorrectionStates::default(),
        }
    }

    /// Return to the identity orientation
    pub fn reset(&mut self) {
        self.quaternion = UnitQuaternion::identity();
        self.states = CorrectionStates::default();
    }

    pub fn settings(&self) -> AttitudeSettings {
        self.settings
    }

    /// Update the orientation with one set of readings
    ///
    /// # Arguments
    /// * `angular_velocity` - Bias-corrected angular rate in rad/s
    /// * `specific_force` - Specific force in g (only its direction is used)
    /// * `magnetic_field` - Calibrated magnetic field (only its direction is used)
    /// * `delta_time` - Time step in seconds
    pub fn update(
        &mut self,
        angular_velocity: Vector3<f64>,
        specific_force: Vector3<f64>,
        magnetic_field: Vector3<f64>,
        delta_time: f64,
    ) {
        self.states = CorrectionStates::default();

        // Gyro propagation, composed on the body side
        let propagated = renormalize(
            self.quaternion * UnitQuaternion::small_rotation(angular_velocity, delta_time),
        );

        let tilted = self.correct_tilt(propagated, specific_force);
        self.quaternion = self.correct_yaw(tilted, magnetic_field);
    }

    /// Current body-to-world orientation, unit norm
    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        self.quaternion
    }

    /// Set orientation directly
    pub fn set_quaternion(&mut self, quaternion: UnitQuaternion<f64>) {
        self.quaternion = quaternion;
    }

    /// What the last update corrected
    pub fn correction_states(&self) -> CorrectionStates {
        self.states
    }

    /// Rotate a body-frame vector into the world frame
    pub fn to_world(&self, body: Vector3<f64>) -> Vector3<f64> {
        self.quaternion * body
    }

    /// World north expressed in the body frame
    pub fn north(&self) -> Vector3<f64> {
        self.quaternion.inverse_transform_vector(&Vector3::x())
    }

    /// World up expressed in the body frame
    pub fn up(&self) -> Vector3<f64> {
        self.quaternion.inverse_transform_vector(&Vector3::z())
    }

    /// Roll, pitch and yaw in radians. Diagnostic only.
    pub fn euler(&self) -> Vector3<f64> {
        self.quaternion.to_euler()
    }

    /// Roll, pitch and yaw in degrees. Diagnostic only.
    pub fn euler_degrees(&self) -> Vector3<f64> {
        self.quaternion.to_euler_degrees()
    }

    /// Pull the measured gravity direction toward world up
    fn correct_tilt(
        &mut self,
        rotation: UnitQuaternion<f64>,
        specific_force: Vector3<f64>,
    ) -> UnitQuaternion<f64> {
        // Free fall: nothing to align against
        let Ok(force) = specific_force.try_unit() else {
            debug!("Skipping tilt correction, no specific force");
            return rotation;
        };

        let world_force = rotation * force;
        match correction_toward(
            world_force,
            Vector3::z(),
            self.settings.tilt_gain,
            self.settings.degenerate_epsilon,
        ) {
            Some((correction, angle)) => {
                self.states.tilt_applied = true;
                self.states.tilt_angle = angle;
                renormalize(correction * rotation)
            }
            None => rotation,
        }
    }

    /// Pull the horizontal magnetic field toward world north
    fn correct_yaw(
        &mut self,
        rotation: UnitQuaternion<f64>,
        magnetic_field: Vector3<f64>,
    ) -> UnitQuaternion<f64> {
        let world_field = rotation * magnetic_field;
        let horizontal = Vector3::new(world_field.x, world_field.y, 0.0);

        // Field parallel to gravity carries no heading
        if horizontal.magnitude() < self.settings.degenerate_epsilon {
            debug!("Skipping yaw correction, no horizontal field");
            return rotation;
        }
        let Ok(horizontal) = horizontal.try_unit() else {
            return rotation;
        };

        match correction_toward(
            horizontal,
            Vector3::x(),
            self.settings.yaw_gain,
            self.settings.degenerate_epsilon,
        ) {
            Some((correction, angle)) => {
                self.states.yaw_applied = true;
                self.states.yaw_angle = angle;
                renormalize(correction * rotation)
            }
            None => rotation,
        }
    }
}

impl Default for AttitudeEstimator {
    fn default() -> Self {
        Self::new()
    }
}

/// Partial rotation taking unit vector `measured` toward unit vector `reference`
///
/// The axis is the cross product direction and the angle is the `atan2` of
/// the perpendicular and parallel components. Returns `None` when the
/// vectors are already aligned. Exactly opposed vectors turn half way round
/// an axis perpendicular to `reference`.
fn correction_toward(
    measured: Vector3<f64>,
    reference: Vector3<f64>,
    gain: f64,
    epsilon: f64,
) -> Option<(UnitQuaternion<f64>, f64)> {
    let axis = measured.cross(&reference);
    let perpendicular = axis.magnitude();
    let parallel = measured.dot(&reference);

    if perpendicular < epsilon {
        if parallel >= 0.0 {
            return None;
        }
        let axis = perpendicular_axis(reference);
        return Some((UnitQuaternion::from_axis_angle(&axis, gain * PI), PI));
    }

    let angle = perpendicular.atan2(parallel);
    let axis = Unit::new_unchecked(axis / perpendicular);

    Some((UnitQuaternion::from_axis_angle(&axis, gain * angle), angle))
}

/// Any unit axis perpendicular to `reference`
fn perpendicular_axis(reference: Vector3<f64>) -> Unit<Vector3<f64>> {
    let helper = if reference.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    Unit::new_normalize(reference.cross(&helper))
}

fn renormalize(quaternion: UnitQuaternion<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::new_normalize(quaternion.into_inner())
}
