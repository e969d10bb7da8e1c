//! Cooperative scheduling of calibration and the steady-state ticks
//!
//! Everything here runs on one current-thread tokio runtime. Calibration
//! waits on the trigger and runs each step to completion. Steady state then
//! drives the fast and slow ticks from a single `select!` loop, so the two
//! never interleave and the navigation state needs no locking. The only
//! other thread is the reporter worker.

use std::future::Future;

use log::{error, info, warn};
use nalgebra::{Vector2, Vector3};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::calibration::{calibrate_inertial, CalibrationData};
use crate::error::FusionError;
use crate::mapper::{ObstaclePoint, SpatialMapper};
use crate::navigation::{InertialNavigator, NavigationState};
use crate::orchestrator::{CalibrationOrchestrator, Dispatch};
use crate::reporter::{spawn_reporter, PointSink, Reporter};
use crate::sensors::{Indicator, InertialSensor, MagneticSensor, RangeSensor, SensorSuite};
use crate::types::{AxisSource, PlatformConfig, SchedulerSettings, SensorScale};

/// Receiving end of the edge-triggered calibration signal
#[derive(Debug)]
pub struct Trigger {
    receiver: mpsc::UnboundedReceiver<()>,
}

/// Fires the calibration trigger; safe to call from any thread
#[derive(Debug, Clone)]
pub struct TriggerHandle {
    sender: mpsc::UnboundedSender<()>,
}

impl Trigger {
    pub fn channel() -> (TriggerHandle, Trigger) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (TriggerHandle { sender }, Trigger { receiver })
    }

    /// Wait for the next edge; `None` once every handle has been dropped
    pub async fn wait(&mut self) -> Option<()> {
        self.receiver.recv().await
    }
}

impl TriggerHandle {
    pub fn fire(&self) -> Result<(), FusionError> {
        self.sender.send(()).map_err(|_| FusionError::TriggerClosed)
    }
}

/// Dispatch triggers to the orchestrator until calibration completes
///
/// A failed step is logged and waits for the next trigger to retry.
pub async fn run_calibration<I, M, L>(
    mut orchestrator: CalibrationOrchestrator,
    trigger: &mut Trigger,
    imu: &mut I,
    magnetometer: &mut M,
    indicator: &mut L,
) -> Result<CalibrationData, FusionError>
where
    I: InertialSensor,
    M: MagneticSensor,
    L: Indicator,
{
    info!("Waiting for the calibration trigger");

    loop {
        if trigger.wait().await.is_none() {
            return Err(FusionError::TriggerClosed);
        }

        match orchestrator.handle_trigger(imu, magnetometer, indicator).await {
            Ok(Dispatch::Continue) => info!("Calibration step is now {:?}", orchestrator.step()),
            Ok(Dispatch::Stop) => break,
            Err(FusionError::Calibration(e)) => {
                error!("{:?} calibration failed, trigger again to retry: {}", orchestrator.step(), e)
            }
            Err(e) => return Err(e),
        }
    }

    orchestrator
        .calibration()
        .ok_or(FusionError::IncompleteCalibration)
}

/// State owned by the steady-state loop
pub struct SteadyState<I, M, R> {
    sensors: SensorSuite<I, M, R>,
    calibration: CalibrationData,
    scale: SensorScale,
    navigator: InertialNavigator,
    mapper: SpatialMapper,
    sink: PointSink,
}

impl<I, M, R> SteadyState<I, M, R>
where
    I: InertialSensor,
    M: MagneticSensor,
    R: RangeSensor,
{
    pub fn new(
        sensors: SensorSuite<I, M, R>,
        calibration: CalibrationData,
        config: &PlatformConfig,
        sink: PointSink,
    ) -> Self {
        let navigator = InertialNavigator::new(
            &calibration,
            config.attitude,
            config.motion,
            config.sensors.gravity,
            config.scheduler.fast_delta_time(),
        );

        Self {
            sensors,
            calibration,
            scale: config.sensors,
            navigator,
            mapper: SpatialMapper::new(config.mapper),
            sink,
        }
    }

    /// Attitude, ZUPT and position update
    ///
    /// Returns `None` when a sensor read failed and the tick was skipped.
    pub fn fast_tick(&mut self) -> Option<NavigationState> {
        let (rate, force, field) = match self.read_inertial() {
            Ok(readings) => readings,
            Err(e) => {
                warn!("Skipping fast tick: {}", e);
                return None;
            }
        };

        let angular_velocity = calibrate_inertial(
            rate,
            self.scale.gyro_rad_per_lsb,
            self.calibration.gyro_bias(),
        );
        let specific_force = self.scale.acceleration(force);
        let magnetic_field = self.calibration.magnetometer().adjust(field);

        Some(
            self.navigator
                .update(angular_velocity, specific_force, magnetic_field),
        )
    }

    /// Range read, projection and hand-off of one obstacle point
    ///
    /// Returns the point that was queued, if any. Only a closed reporter is
    /// an error.
    pub fn slow_tick(&mut self) -> Result<Option<ObstaclePoint>, FusionError> {
        let distance = match self.sensors.range.read_range_mm() {
            Ok(mm) => self.scale.range(mm),
            Err(e) => {
                warn!("Skipping mapping tick: {}", e);
                return Ok(None);
            }
        };
        if distance == 0.0 {
            return Ok(None);
        }

        let (north, up) = match self.mapping_axes() {
            Ok(axes) => axes,
            Err(e) => {
                warn!("Skipping mapping tick: {}", e);
                return Ok(None);
            }
        };

        let position = self.navigator.position() * self.scale.map_units_per_meter;
        let position = Vector2::new(position.x, position.y);

        match self.mapper.map(north, up, distance, position) {
            Ok(Some(point)) => {
                self.sink.push(point)?;
                Ok(Some(point))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                warn!("No obstacle point this tick: {}", e);
                Ok(None)
            }
        }
    }

    pub fn sensors(&self) -> &SensorSuite<I, M, R> {
        &self.sensors
    }

    pub fn navigator(&self) -> &InertialNavigator {
        &self.navigator
    }

    pub fn calibration(&self) -> &CalibrationData {
        &self.calibration
    }

    fn read_inertial(&mut self) -> Result<(Vector3<f64>, Vector3<f64>, Vector3<f64>), FusionError> {
        let force = self.sensors.inertial.read_acceleration()?;
        let rate = self.sensors.inertial.read_angular_rate()?;
        let field = self.sensors.magnetic.read_magnetic_field()?;
        Ok((rate, force, field))
    }

    /// Body-frame (north, up) for the projection
    fn mapping_axes(&mut self) -> Result<(Vector3<f64>, Vector3<f64>), FusionError> {
        match self.mapper.settings().axis_source {
            AxisSource::Measured => {
                let force = self.sensors.inertial.read_acceleration()?;
                let field = self.sensors.magnetic.read_magnetic_field()?;
                Ok((self.calibration.magnetometer().adjust(field), force))
            }
            AxisSource::Estimated => {
                let attitude = self.navigator.attitude();
                Ok((attitude.north(), attitude.up()))
            }
        }
    }
}

/// Drive the fast and slow ticks until `shutdown` resolves
///
/// Both ticks share this task, so one always runs to completion before the
/// other starts. A tick that falls behind is skipped rather than bursted.
pub async fn run_steady_state<I, M, R, S>(
    state: &mut SteadyState<I, M, R>,
    settings: SchedulerSettings,
    shutdown: S,
) -> Result<(), FusionError>
where
    I: InertialSensor,
    M: MagneticSensor,
    R: RangeSensor,
    S: Future<Output = ()>,
{
    let mut fast = tokio::time::interval(settings.fast_period());
    fast.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut slow = tokio::time::interval(settings.slow_period());
    slow.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tokio::pin!(shutdown);

    info!(
        "Steady state running, fast tick {:?}, slow tick {:?}",
        settings.fast_period(),
        settings.slow_period()
    );

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutdown requested");
                return Ok(());
            }
            _ = fast.tick() => {
                state.fast_tick();
            }
            _ = slow.tick() => {
                state.slow_tick()?;
            }
        }
    }
}

/// Calibrate, then map until `shutdown` resolves
///
/// Builds a current-thread runtime and the reporter worker. The worker is
/// joined after the pending points have been flushed. Must not be called from
/// inside another runtime.
pub fn run_platform<I, M, R, L, P, S>(
    config: &PlatformConfig,
    sensors: SensorSuite<I, M, R>,
    mut indicator: L,
    mut trigger: Trigger,
    reporter: P,
    shutdown: S,
) -> Result<(), FusionError>
where
    I: InertialSensor,
    M: MagneticSensor,
    R: RangeSensor,
    L: Indicator,
    P: Reporter,
    S: Future<Output = ()>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    let (sink, worker) = spawn_reporter(reporter, &config.reporter)?;

    let result = runtime.block_on(async move {
        let mut sensors = sensors;
        let orchestrator = CalibrationOrchestrator::new(config.calibration, config.sensors);
        let calibration = run_calibration(
            orchestrator,
            &mut trigger,
            &mut sensors.inertial,
            &mut sensors.magnetic,
            &mut indicator,
        )
        .await?;

        let mut state = SteadyState::new(sensors, calibration, config, sink);
        run_steady_state(&mut state, config.scheduler, shutdown).await
    });

    if worker.join().is_err() {
        error!("Reporter worker panicked");
    }
    result
}
