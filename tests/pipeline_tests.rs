use std::sync::{Arc, Mutex};
use std::time::Duration;

use approx::assert_relative_eq;
use inertial_mapper::scheduler::{run_calibration, run_steady_state};
use inertial_mapper::{
    CalibrationData, CalibrationOrchestrator, FusionError, Indicator, InertialSensor,
    MagneticSensor, MagnetometerCalibration, ObstaclePoint, PlatformConfig, RangeSensor,
    ReportError, Reporter, SensorError, SensorSuite, SteadyState, Trigger, run_platform,
    spawn_reporter,
};
use inertial_mapper::{AxisSource, CalibrationSettings, SensorScale};
use nalgebra::{Vector2, Vector3};

/// At rest with body y pointing up
#[derive(Default)]
struct MockImu {
    fail: bool,
    rate_reads: usize,
}

impl InertialSensor for MockImu {
    fn read_acceleration(&mut self) -> Result<Vector3<f64>, SensorError> {
        if self.fail {
            return Err(SensorError::Bus("nack".to_string()));
        }
        Ok(Vector3::new(0.0, 1000.0, 0.0))
    }

    fn read_angular_rate(&mut self) -> Result<Vector3<f64>, SensorError> {
        if self.fail {
            return Err(SensorError::Bus("nack".to_string()));
        }
        self.rate_reads += 1;
        Ok(Vector3::new(0.0, 0.0, 0.0))
    }
}

/// Sweeps a sphere of radius 400 centred on (30, -60, 90), then settles on
/// a field along body x once the sweep is done
struct MockMagnetometer {
    stuck_reads: usize,
    tick: usize,
}

fn hard_iron() -> Vector3<f64> {
    Vector3::new(30.0, -60.0, 90.0)
}

impl MockMagnetometer {
    fn new() -> Self {
        Self {
            stuck_reads: 0,
            tick: 0,
        }
    }
}

impl MagneticSensor for MockMagnetometer {
    fn read_magnetic_field(&mut self) -> Result<Vector3<f64>, SensorError> {
        if self.stuck_reads > 0 {
            self.stuck_reads -= 1;
            return Ok(Vector3::new(1.0, 1.0, 1.0));
        }

        let direction = match self.tick {
            0 => Vector3::x(),
            1 => -Vector3::x(),
            2 => Vector3::y(),
            3 => -Vector3::y(),
            4 => Vector3::z(),
            5 => -Vector3::z(),
            _ => Vector3::x(),
        };
        self.tick += 1;
        Ok(direction * 400.0 + hard_iron())
    }
}

struct MockRange {
    millimetres: Result<u16, SensorError>,
    reads: usize,
}

impl MockRange {
    fn new(millimetres: u16) -> Self {
        Self {
            millimetres: Ok(millimetres),
            reads: 0,
        }
    }
}

impl RangeSensor for MockRange {
    fn read_range_mm(&mut self) -> Result<u16, SensorError> {
        self.reads += 1;
        self.millimetres.clone()
    }
}

#[derive(Default)]
struct MockLed {
    on: bool,
}

impl Indicator for MockLed {
    fn set(&mut self, on: bool) {
        self.on = on;
    }

    fn is_on(&self) -> bool {
        self.on
    }
}

#[derive(Clone, Default)]
struct Recorder {
    points: Arc<Mutex<Vec<ObstaclePoint>>>,
}

impl Reporter for Recorder {
    fn report(&mut self, batch: &[ObstaclePoint]) -> Result<(), ReportError> {
        self.points.lock().unwrap().extend_from_slice(batch);
        Ok(())
    }
}

fn quick_calibration() -> CalibrationSettings {
    CalibrationSettings {
        sample_count: 6,
        sample_interval_ms: 1,
        flash_toggles: 3,
        flash_interval_ms: 1,
    }
}

fn rest_calibration() -> CalibrationData {
    CalibrationData::new(
        MagnetometerCalibration::new(hard_iron(), Vector3::new(1.0, 1.0, 1.0)),
        Vector3::zeros(),
        Vector3::new(0.0, 1.0, 0.0),
    )
}

fn suite(range_mm: u16) -> SensorSuite<MockImu, MockMagnetometer, MockRange> {
    let mut magnetometer = MockMagnetometer::new();
    // Skip the sweep, report a steady field
    magnetometer.tick = 6;
    SensorSuite::new(MockImu::default(), magnetometer, MockRange::new(range_mm))
}

#[tokio::test(start_paused = true)]
async fn test_three_triggers_complete_calibration() {
    let (handle, mut trigger) = Trigger::channel();
    for _ in 0..4 {
        handle.fire().unwrap();
    }

    let mut imu = MockImu::default();
    let mut magnetometer = MockMagnetometer::new();
    let mut led = MockLed::default();

    let calibration = run_calibration(
        CalibrationOrchestrator::new(quick_calibration(), SensorScale::default()),
        &mut trigger,
        &mut imu,
        &mut magnetometer,
        &mut led,
    )
    .await
    .unwrap();

    assert_relative_eq!(
        calibration.magnetometer().offset(),
        hard_iron(),
        epsilon = 1e-12
    );
    assert_relative_eq!(calibration.accel_bias(), Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
    assert_eq!(calibration.gyro_bias(), Vector3::zeros());
    assert!(!led.is_on());

    // Dispatch stopped after the third trigger; the fourth is still queued
    assert_eq!(trigger.wait().await, Some(()));
}

#[tokio::test(start_paused = true)]
async fn test_failed_step_needs_another_trigger() {
    let (handle, mut trigger) = Trigger::channel();
    for _ in 0..4 {
        handle.fire().unwrap();
    }
    drop(handle);

    let mut magnetometer = MockMagnetometer::new();
    magnetometer.stuck_reads = quick_calibration().sample_count;

    let result = run_calibration(
        CalibrationOrchestrator::new(quick_calibration(), SensorScale::default()),
        &mut trigger,
        &mut MockImu::default(),
        &mut magnetometer,
        &mut MockLed::default(),
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(trigger.wait().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_closed_trigger_aborts_calibration() {
    let (handle, mut trigger) = Trigger::channel();
    handle.fire().unwrap();
    drop(handle);

    let result = run_calibration(
        CalibrationOrchestrator::new(quick_calibration(), SensorScale::default()),
        &mut trigger,
        &mut MockImu::default(),
        &mut MockMagnetometer::new(),
        &mut MockLed::default(),
    )
    .await;

    assert!(matches!(result, Err(FusionError::TriggerClosed)));
}

#[test]
fn test_slow_tick_emits_projected_point() {
    let recorder = Recorder::default();
    let config = PlatformConfig::default();
    let (sink, worker) = spawn_reporter(recorder.clone(), &config.reporter).unwrap();

    let mut state = SteadyState::new(suite(205), rest_calibration(), &config, sink);

    let navigation = state.fast_tick().unwrap();
    assert!(navigation.stationary);

    // up = body y, north = body x, beam along body z points west
    let point = state.slow_tick().unwrap().unwrap();
    assert_relative_eq!(point.point, Vector2::new(-20.0, 0.0), epsilon = 1e-9);
    assert_eq!(point.position, Vector2::zeros());

    drop(state);
    worker.join().unwrap();
    assert_eq!(*recorder.points.lock().unwrap(), vec![point]);
}

#[test]
fn test_estimated_axes_agree_with_measured_once_converged() {
    let recorder = Recorder::default();
    let mut config = PlatformConfig::default();
    config.mapper.axis_source = AxisSource::Estimated;
    let (sink, worker) = spawn_reporter(recorder.clone(), &config.reporter).unwrap();

    let mut state = SteadyState::new(suite(205), rest_calibration(), &config, sink);
    for _ in 0..400 {
        state.fast_tick().unwrap();
    }

    let point = state.slow_tick().unwrap().unwrap();
    assert_relative_eq!(point.point, Vector2::new(-20.0, 0.0), epsilon = 1e-3);

    drop(state);
    worker.join().unwrap();
}

#[test]
fn test_no_surface_and_failed_reads_skip_ticks() {
    let recorder = Recorder::default();
    let config = PlatformConfig::default();
    let (sink, worker) = spawn_reporter(recorder.clone(), &config.reporter).unwrap();

    // Under one centimetre truncates to the sentinel
    let mut sensors = suite(9);
    sensors.inertial.fail = true;
    let mut state = SteadyState::new(sensors, rest_calibration(), &config, sink);

    let before = state.navigator().attitude().quaternion();
    assert!(state.fast_tick().is_none());
    assert_eq!(state.navigator().attitude().quaternion(), before);
    assert!(state.navigator().motion().is_empty());

    assert!(state.slow_tick().unwrap().is_none());

    drop(state);
    worker.join().unwrap();
    assert!(recorder.points.lock().unwrap().is_empty());
}

#[test]
fn test_failed_range_read_skips_mapping() {
    let recorder = Recorder::default();
    let config = PlatformConfig::default();
    let (sink, worker) = spawn_reporter(recorder.clone(), &config.reporter).unwrap();

    let mut sensors = suite(205);
    sensors.range.millimetres = Err(SensorError::NotReady("range"));
    let mut state = SteadyState::new(sensors, rest_calibration(), &config, sink);

    assert!(state.slow_tick().unwrap().is_none());

    drop(state);
    worker.join().unwrap();
    assert!(recorder.points.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_ticks_run_at_configured_rates() {
    let recorder = Recorder::default();
    let config = PlatformConfig::default();
    let (sink, worker) = spawn_reporter(recorder.clone(), &config.reporter).unwrap();
    let mut state = SteadyState::new(suite(205), rest_calibration(), &config, sink);

    run_steady_state(
        &mut state,
        config.scheduler,
        tokio::time::sleep(Duration::from_millis(800)),
    )
    .await
    .unwrap();

    // Fast ticks at 0, 22, .. 792 ms; slow ticks at 0, 80, .. 720 ms
    let fast_ticks = state.sensors().inertial.rate_reads;
    let slow_ticks = state.sensors().range.reads;
    assert!((36..=38).contains(&fast_ticks), "fast ticks: {}", fast_ticks);
    assert!((10..=11).contains(&slow_ticks), "slow ticks: {}", slow_ticks);

    drop(state);
    worker.join().unwrap();

    let points = recorder.points.lock().unwrap();
    assert_eq!(points.len(), slow_ticks);
    for point in points.iter() {
        assert_relative_eq!(point.point, Vector2::new(-20.0, 0.0), epsilon = 1e-6);
    }
}

#[test]
fn test_platform_runs_calibration_then_mapping() {
    let recorder = Recorder::default();
    let config = PlatformConfig {
        calibration: quick_calibration(),
        ..Default::default()
    };

    let (handle, trigger) = Trigger::channel();
    for _ in 0..3 {
        handle.fire().unwrap();
    }

    let sensors = SensorSuite::new(MockImu::default(), MockMagnetometer::new(), MockRange::new(205));

    run_platform(
        &config,
        sensors,
        MockLed::default(),
        trigger,
        recorder.clone(),
        async { tokio::time::sleep(Duration::from_millis(400)).await },
    )
    .unwrap();

    let points = recorder.points.lock().unwrap();
    assert!(!points.is_empty());
    for point in points.iter() {
        assert_relative_eq!(point.point, Vector2::new(-20.0, 0.0), epsilon = 1e-6);
        assert_eq!(point.position, Vector2::zeros());
    }
}
