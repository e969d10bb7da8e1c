//! Dead reckoning: attitude, ZUPT gating and position integration

use log::debug;
use nalgebra::Vector3;

use crate::ahrs::AttitudeEstimator;
use crate::calibration::CalibrationData;
use crate::motion::MotionDetector;
use crate::types::{AttitudeSettings, MotionSettings};

/// Velocity and position integrator
///
/// Velocity is hard-reset to zero whenever the platform is stationary; that
/// reset is what cancels accumulated drift. Position is never bounded.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionIntegrator {
    gravity: f64,
    velocity: Vector3<f64>,
    position: Vector3<f64>,
}

impl PositionIntegrator {
    /// # Arguments
    /// * `gravity` - Gravity in m/s², converts g to physical acceleration
    pub fn new(gravity: f64) -> Self {
        Self {
            gravity,
            velocity: Vector3::zeros(),
            position: Vector3::zeros(),
        }
    }

    /// Advance one step
    ///
    /// # Arguments
    /// * `world_force` - Bias-removed specific force in the world frame, in g
    /// * `stationary` - ZUPT decision for this step
    /// * `delta_time` - Time step in seconds
    pub fn step(&mut self, world_force: Vector3<f64>, stationary: bool, delta_time: f64) {
        if stationary {
            self.velocity = Vector3::zeros();
        } else {
            let acceleration = world_force * self.gravity;
            self.velocity += acceleration * delta_time;
        }
        self.position += self.velocity * delta_time;
    }

    /// Velocity in m/s
    pub fn velocity(&self) -> Vector3<f64> {
        self.velocity
    }

    /// Position in metres from the start point
    pub fn position(&self) -> Vector3<f64> {
        self.position
    }
}

/// Snapshot of the navigation state after a fast tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigationState {
    pub stationary: bool,
    pub velocity: Vector3<f64>,
    pub position: Vector3<f64>,
}

/// Fast-tick dead reckoning pipeline
///
/// Owns the attitude estimator, the ZUPT detector and the integrator, and
/// is the only thing that mutates them.
#[derive(Debug, Clone)]
pub struct InertialNavigator {
    attitude: AttitudeEstimator,
    motion: MotionDetector,
    integrator: PositionIntegrator,
    /// Mean at-rest specific force in g, in the body frame
    accel_bias: Vector3<f64>,
    gravity: f64,
    delta_time: f64,
}

impl InertialNavigator {
    /// # Arguments
    /// * `calibration` - Completed session calibration
    /// * `gravity` - Gravity in m/s²
    /// * `delta_time` - Fast tick period in seconds
    pub fn new(
        calibration: &CalibrationData,
        attitude: AttitudeSettings,
        motion: MotionSettings,
        gravity: f64,
        delta_time: f64,
    ) -> Self {
        Self {
            attitude: AttitudeEstimator::with_settings(attitude),
            motion: MotionDetector::new(motion),
            integrator: PositionIntegrator::new(gravity),
            accel_bias: calibration.accel_bias(),
            gravity,
            delta_time,
        }
    }

    /// Run one fast tick
    ///
    /// # Arguments
    /// * `angular_velocity` - Bias-corrected angular rate in rad/s
    /// * `specific_force` - Specific force in g
    /// * `magnetic_field` - Calibrated magnetic field
    pub fn update(
        &mut self,
        angular_velocity: Vector3<f64>,
        specific_force: Vector3<f64>,
        magnetic_field: Vector3<f64>,
    ) -> NavigationState {
        self.motion.push(specific_force * self.gravity);

        self.attitude
            .update(angular_velocity, specific_force, magnetic_field, self.delta_time);

        // Bias is gravity in the calibration mounting; it lives in the body frame
        let world_force = self.attitude.to_world(specific_force - self.accel_bias);
        let stationary = self.motion.is_stationary();
        self.integrator.step(world_force, stationary, self.delta_time);

        debug!(
            "euler={:?} variance={:?} stationary={} position={:?}",
            self.attitude.euler_degrees().as_slice(),
            self.motion.variance(),
            stationary,
            self.integrator.position().as_slice()
        );

        self.state()
    }

    pub fn state(&self) -> NavigationState {
        NavigationState {
            stationary: self.motion.is_stationary(),
            velocity: self.integrator.velocity(),
            position: self.integrator.position(),
        }
    }

    pub fn attitude(&self) -> &AttitudeEstimator {
        &self.attitude
    }

    pub fn motion(&self) -> &MotionDetector {
        &self.motion
    }

    /// Position in metres from the start point
    pub fn position(&self) -> Vector3<f64> {
        self.integrator.position()
    }

    pub fn velocity(&self) -> Vector3<f64> {
        self.integrator.velocity()
    }
}
