//! Error types for the fusion and mapping engine

use thiserror::Error;

use crate::sensors::SensorError;

/// Sensor axis, used to report which axis a calibration failed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl core::fmt::Display for Axis {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        };
        f.write_str(name)
    }
}

/// Reasons a calibration step can fail.
///
/// A failed step leaves the orchestrator on the same step, so the next
/// trigger repeats it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalibrationError {
    /// The magnetometer never saw any spread on this axis, so no scale can
    /// be derived for it.
    #[error("magnetometer {axis} axis has zero dynamic range; rotate through more headings")]
    ZeroRange { axis: Axis },

    #[error("not enough valid samples: {collected} collected, {required} required")]
    InsufficientSamples { required: usize, collected: usize },
}

/// Top level error for the engine
#[derive(Debug, Error)]
pub enum FusionError {
    /// A zero-magnitude vector was normalized
    #[error("cannot normalize a zero-magnitude vector")]
    DegenerateVector,

    #[error("calibration failed: {0}")]
    Calibration(#[from] CalibrationError),

    #[error("sensor read failed: {0}")]
    SensorRead(#[from] SensorError),

    #[error("the calibration trigger closed before calibration completed")]
    TriggerClosed,

    #[error("calibration stopped before every step completed")]
    IncompleteCalibration,

    #[error("the reporter worker is no longer accepting points")]
    ReporterClosed,

    #[error("could not start a runtime or worker thread: {0}")]
    Runtime(#[from] std::io::Error),
}
