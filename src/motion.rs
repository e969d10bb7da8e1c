//! Zero-velocity (ZUPT) motion detection
//!
//! At rest the accelerometer still jitters, but the spread of its readings
//! stays small; real motion shows up as high-variance bursts. Gating on the
//! variance of recent squared magnitudes, rather than on their mean, keeps a
//! constant bias from being read as motion.

use std::collections::VecDeque;

use nalgebra::Vector3;

use crate::types::MotionSettings;

/// Sliding-window stationary detector
#[derive(Debug, Clone)]
pub struct MotionDetector {
    settings: MotionSettings,
    /// Squared specific-force magnitudes, oldest first
    window: VecDeque<f64>,
}

impl MotionDetector {
    /// # Example
    /// ```
    /// use nalgebra::Vector3;
    /// use inertial_mapper::{MotionDetector, MotionSettings};
    ///
    /// let mut motion = MotionDetector::new(MotionSettings::default());
    /// for _ in 0..8 {
    ///     motion.push(Vector3::new(0.0, 0.0, 9.8));
    /// }
    /// assert!(motion.variance().unwrap() < 1e-9);
    /// assert!(motion.is_stationary());
    /// ```
    pub fn new(settings: MotionSettings) -> Self {
        let capacity = settings.window.max(1);
        Self {
            settings: MotionSettings {
                window: capacity,
                ..settings
            },
            window: VecDeque::with_capacity(capacity),
        }
    }

    /// Add a specific-force sample in m/s², evicting the oldest once full
    pub fn push(&mut self, specific_force: Vector3<f64>) {
        if self.window.len() == self.settings.window {
            self.window.pop_front();
        }
        self.window.push_back(specific_force.magnitude_squared());
    }

    /// Population variance of the squared magnitudes in the window
    ///
    /// `None` until the window has filled.
    pub fn variance(&self) -> Option<f64> {
        if !self.is_full() {
            return None;
        }

        let count = self.window.len() as f64;
        let mean = self.window.iter().sum::<f64>() / count;
        let variance = self
            .window
            .iter()
            .map(|sample| (sample - mean).powi(2))
            .sum::<f64>()
            / count;

        Some(variance)
    }

    /// Whether the platform should be treated as not moving
    ///
    /// Until the window has filled there is no evidence of motion, so the
    /// platform is held stationary.
    pub fn is_stationary(&self) -> bool {
        self.variance()
            .is_none_or(|variance| variance < self.settings.variance_threshold)
    }

    pub fn is_full(&self) -> bool {
        self.window.len() == self.settings.window
    }

    /// Number of samples currently held
    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Drop every sample
    pub fn reset(&mut self) {
        self.window.clear();
    }

    pub fn settings(&self) -> MotionSettings {
        self.settings
    }
}

impl Default for MotionDetector {
    fn default() -> Self {
        Self::new(MotionSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_variance_undefined_until_full() {
        let mut motion = MotionDetector::default();
        for _ in 0..7 {
            motion.push(Vector3::new(0.0, 0.0, 9.8));
            assert_eq!(motion.variance(), None);
            assert!(motion.is_stationary());
        }

        motion.push(Vector3::new(0.0, 0.0, 9.8));
        assert!(motion.is_full());
        assert!(motion.variance().is_some());
    }

    #[test]
    fn test_population_variance() {
        let mut motion = MotionDetector::new(MotionSettings {
            window: 4,
            variance_threshold: 300.0,
        });

        // Squared magnitudes 1, 4, 9, 16: mean 7.5, variance 32.25
        for magnitude in [1.0, 2.0, 3.0, 4.0] {
            motion.push(Vector3::new(magnitude, 0.0, 0.0));
        }
        assert_relative_eq!(motion.variance().unwrap(), 32.25, epsilon = 1e-12);
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut motion = MotionDetector::new(MotionSettings {
            window: 2,
            variance_threshold: 300.0,
        });

        motion.push(Vector3::new(100.0, 0.0, 0.0));
        motion.push(Vector3::new(1.0, 0.0, 0.0));
        motion.push(Vector3::new(1.0, 0.0, 0.0));

        assert_eq!(motion.len(), 2);
        assert_eq!(motion.variance(), Some(0.0));
    }

    #[test]
    fn test_jitter_is_stationary_and_bursts_are_motion() {
        let mut motion = MotionDetector::default();

        // Resting jitter around 1 g
        for i in 0..8 {
            let jitter = if i % 2 == 0 { 0.05 } else { -0.05 };
            motion.push(Vector3::new(jitter, 0.0, 9.8 + jitter));
        }
        assert!(motion.is_stationary());

        // A shove along x
        for force in [0.0, 6.0, 12.0, 3.0] {
            motion.push(Vector3::new(force, 0.0, 9.8));
        }
        assert!(!motion.is_stationary());
    }

    #[test]
    fn test_constant_bias_is_not_motion() {
        let mut motion = MotionDetector::default();
        for _ in 0..8 {
            motion.push(Vector3::new(3.0, -2.0, 11.5));
        }
        assert_relative_eq!(motion.variance().unwrap(), 0.0, epsilon = 1e-9);
        assert!(motion.is_stationary());
    }

    #[test]
    fn test_reset() {
        let mut motion = MotionDetector::default();
        for _ in 0..8 {
            motion.push(Vector3::new(0.0, 0.0, 9.8));
        }
        motion.reset();
        assert!(motion.is_empty());
        assert_eq!(motion.variance(), None);
    }
}
