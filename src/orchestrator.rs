//! Three-step calibration sequence driven by an external trigger
//!
//! Each trigger runs the current step to completion and advances:
//!
//! 1. `Magnetometer`: collect field samples while the platform is rotated,
//!    derive the hard-iron correction.
//! 2. `AccelGyro`: collect at-rest inertial samples, average them into the
//!    accelerometer and gyroscope biases, then flash the indicator.
//! 3. `Done`: turn the indicator off and tell the dispatcher to stop.
//!
//! Partial results stay private; [`CalibrationOrchestrator::calibration`]
//! only yields a value once every step has succeeded.

use log::{debug, info, warn};
use nalgebra::Vector3;

use crate::calibration::{average_bias, CalibrationData};
use crate::error::{CalibrationError, FusionError};
use crate::magnetometer::MagnetometerCalibration;
use crate::sensors::{Indicator, InertialSensor, MagneticSensor};
use crate::types::{CalibrationSettings, SensorScale};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationStep {
    Magnetometer,
    AccelGyro,
    Done,
}

/// What the dispatcher should do after a trigger was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Wait for the next trigger
    Continue,
    /// Calibration finished, leave the dispatch loop
    Stop,
}

#[derive(Debug, Clone)]
pub struct CalibrationOrchestrator {
    settings: CalibrationSettings,
    scale: SensorScale,
    step: CalibrationStep,
    magnetometer: Option<MagnetometerCalibration>,
    /// (gyro bias in rad/s, accel bias in g)
    inertial: Option<(Vector3<f64>, Vector3<f64>)>,
}

impl CalibrationOrchestrator {
    pub fn new(settings: CalibrationSettings, scale: SensorScale) -> Self {
        Self {
            settings,
            scale,
            step: CalibrationStep::Magnetometer,
            magnetometer: None,
            inertial: None,
        }
    }

    pub fn step(&self) -> CalibrationStep {
        self.step
    }

    /// Completed calibration, available once the `Done` step is reached
    pub fn calibration(&self) -> Option<CalibrationData> {
        if self.step != CalibrationStep::Done {
            return None;
        }
        let magnetometer = self.magnetometer?;
        let (gyro_bias, accel_bias) = self.inertial?;
        Some(CalibrationData::new(magnetometer, gyro_bias, accel_bias))
    }

    /// Run the current step in response to one trigger
    ///
    /// A failed step keeps the orchestrator where it was, so the next trigger
    /// retries it. Steps never regress.
    pub async fn handle_trigger<I, M, L>(
        &mut self,
        imu: &mut I,
        magnetometer: &mut M,
        indicator: &mut L,
    ) -> Result<Dispatch, FusionError>
    where
        I: InertialSensor,
        M: MagneticSensor,
        L: Indicator,
    {
        match self.step {
            CalibrationStep::Magnetometer => {
                info!("Calibrating magnetometer, rotate the platform through every heading");
                indicator.set(true);
                let result = self.calibrate_magnetometer(magnetometer).await;
                indicator.set(false);

                let calibration = result?;
                info!(
                    "Magnetometer offset {:?}, scale {:?}",
                    calibration.offset().as_slice(),
                    calibration.scale().as_slice()
                );
                self.magnetometer = Some(calibration);
                self.step = CalibrationStep::AccelGyro;
                Ok(Dispatch::Continue)
            }
            CalibrationStep::AccelGyro => {
                info!("Calibrating accelerometer and gyroscope, keep the platform still");
                indicator.set(true);
                let result = self.calibrate_inertial(imu).await;
                indicator.set(false);

                let (gyro_bias, accel_bias) = result?;
                info!(
                    "Gyro bias {:?} rad/s, accel bias {:?} g",
                    gyro_bias.as_slice(),
                    accel_bias.as_slice()
                );
                self.inertial = Some((gyro_bias, accel_bias));
                self.step = CalibrationStep::Done;

                for _ in 0..self.settings.flash_toggles {
                    indicator.toggle();
                    tokio::time::sleep(self.settings.flash_interval()).await;
                }
                Ok(Dispatch::Continue)
            }
            CalibrationStep::Done => {
                indicator.set(false);
                info!("Calibration complete");
                Ok(Dispatch::Stop)
            }
        }
    }

    async fn calibrate_magnetometer<M: MagneticSensor>(
        &self,
        magnetometer: &mut M,
    ) -> Result<MagnetometerCalibration, CalibrationError> {
        let mut samples = Vec::with_capacity(self.settings.sample_count);

        for _ in 0..self.settings.sample_count {
            match magnetometer.read_magnetic_field() {
                Ok(field) => samples.push(field),
                Err(e) => warn!("Skipping magnetometer sample: {}", e),
            }
            tokio::time::sleep(self.settings.sample_interval()).await;
        }

        debug!("Collected {} magnetometer samples", samples.len());
        MagnetometerCalibration::from_samples(&samples)
    }

    async fn calibrate_inertial<I: InertialSensor>(
        &self,
        imu: &mut I,
    ) -> Result<(Vector3<f64>, Vector3<f64>), CalibrationError> {
        let mut rates = Vec::with_capacity(self.settings.sample_count);
        let mut forces = Vec::with_capacity(self.settings.sample_count);

        for _ in 0..self.settings.sample_count {
            // A sample is only kept when both halves were read
            match (imu.read_angular_rate(), imu.read_acceleration()) {
                (Ok(rate), Ok(force)) => {
                    rates.push(self.scale.angular_rate(rate));
                    forces.push(self.scale.acceleration(force));
                }
                (Err(e), _) | (_, Err(e)) => warn!("Skipping inertial sample: {}", e),
            }
            tokio::time::sleep(self.settings.sample_interval()).await;
        }

        debug!("Collected {} inertial samples", rates.len());
        Ok((average_bias(&rates)?, average_bias(&forces)?))
    }
}
