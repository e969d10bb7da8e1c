//! Projection of a single range reading into an absolute 2-D obstacle point

use nalgebra::{Vector2, Vector3};
use crate::error::FusionError;
use crate::math::{Vector2Ext, Vector3Ext};
use crate::types::MapperSettings;

/// An observed obstacle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObstaclePoint {
    /// Absolute obstacle coordinate (east, north) in map units
    pub point: Vector2<f64>,
    /// Platform position at observation time in map units
    pub position: Vector2<f64>,
}

/// Range-to-map projection
///
/// Each reading is projected on its own; there is no smoothing across
/// samples.
#[derive(Debug, Clone, Copy)]
pub struct SpatialMapper {
    settings: MapperSettings,
}

impl SpatialMapper {
    pub fn new(settings: MapperSettings) -> Self {
        Self { settings }
    }

    /// Project one range reading
    ///
    /// The beam direction is projected onto the horizontal east/north plane
    /// (`east = up × north`), scaled by the distance and offset by the
    /// platform position.
    ///
    /// # Arguments
    /// * `north` - Body-frame vector pointing north (e.g. calibrated field)
    /// * `up` - Body-frame vector pointing up (e.g. specific force)
    /// * `distance` - Range in map units; 0 means no surface
    /// * `position` - Platform position in map units
    ///
    /// # Returns
    /// `Ok(None)` for the no-surface sentinel. Fails with
    /// [`FusionError::DegenerateVector`] if `north` or `up` is zero or the beam
    /// has no horizontal component.
    ///
    /// # Example
    /// ```
    /// use nalgebra::{Vector2, Vector3};
    /// use inertial_mapper::{MapperSettings, SpatialMapper};
    ///
    /// let mapper = SpatialMapper::new(MapperSettings::default());
    /// let obstacle = mapper
    ///     .map(Vector3::x(), Vector3::y(), 20.0, Vector2::zeros())
    ///     .unwrap()
    ///     .unwrap();
    /// assert_eq!(obstacle.point, Vector2::new(-20.0, 0.0));
    /// ```
    pub fn map(
        &self,
        north: Vector3<f64>,
        up: Vector3<f64>,
        distance: f64,
        position: Vector2<f64>,
    ) -> Result<Option<ObstaclePoint>, FusionError> {
        if distance == 0.0 {
            return Ok(None);
        }

        let direction = self.beam_direction(north, up)?;
        let point = direction * distance + position;

        Ok(Some(ObstaclePoint { point, position }))
    }

    /// Unit (east, north) direction of the beam
    pub fn beam_direction(
        &self,
        north: Vector3<f64>,
        up: Vector3<f64>,
    ) -> Result<Vector2<f64>, FusionError> {
        let north = north.try_unit()?;
        let up = up.try_unit()?;
        let east = up.cross(&north);

        let beam = self.settings.beam_direction;
        Vector2::new(beam.dot(&east), beam.dot(&north)).try_unit()
    }

    pub fn settings(&self) -> MapperSettings {
        self.settings
    }
}

impl Default for SpatialMapper {
    fn default() -> Self {
        Self::new(MapperSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_reference_projection() {
        let mapper = SpatialMapper::default();

        // east = up x north = (0, 0, -1); beam (0, 0, 1) projects to (-1, 0)
        let direction = mapper.beam_direction(Vector3::x(), Vector3::y()).unwrap();
        assert_relative_eq!(direction, Vector2::new(-1.0, 0.0), epsilon = 1e-12);

        let obstacle = mapper
            .map(Vector3::x(), Vector3::y(), 20.0, Vector2::zeros())
            .unwrap()
            .unwrap();
        assert_relative_eq!(obstacle.point, Vector2::new(-20.0, 0.0), epsilon = 1e-12);
        assert_eq!(obstacle.position, Vector2::zeros());
    }

    #[test]
    fn test_point_is_offset_by_position() {
        let mapper = SpatialMapper::default();
        let position = Vector2::new(150.0, -30.0);

        let obstacle = mapper
            .map(Vector3::new(0.0, 0.0, 2.0), Vector3::new(-3.0, 0.0, 0.0), 40.0, position)
            .unwrap()
            .unwrap();

        // north = z, up = -x, east = (-x) x z = y; beam along z is due north
        assert_relative_eq!(obstacle.point, Vector2::new(150.0, 10.0), epsilon = 1e-12);
        assert_eq!(obstacle.position, position);
    }

    #[test]
    fn test_inputs_need_not_be_unit() {
        let mapper = SpatialMapper::default();
        let small = mapper.beam_direction(Vector3::new(0.3, 0.0, 0.3), Vector3::y()).unwrap();
        let large = mapper.beam_direction(Vector3::new(300.0, 0.0, 300.0), Vector3::y() * 9.8).unwrap();
        assert_relative_eq!(small, large, epsilon = 1e-12);
        assert_relative_eq!(small.magnitude(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_distance_is_no_surface() {
        let mapper = SpatialMapper::default();
        // Even degenerate axes are never looked at for the sentinel
        let result = mapper.map(Vector3::zeros(), Vector3::zeros(), 0.0, Vector2::new(1.0, 1.0));
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn test_degenerate_inputs() {
        let mapper = SpatialMapper::default();

        assert!(matches!(
            mapper.map(Vector3::zeros(), Vector3::y(), 10.0, Vector2::zeros()),
            Err(FusionError::DegenerateVector)
        ));
        assert!(matches!(
            mapper.map(Vector3::x(), Vector3::zeros(), 10.0, Vector2::zeros()),
            Err(FusionError::DegenerateVector)
        ));

        // Beam pointing straight up has no horizontal component
        assert!(matches!(
            mapper.map(Vector3::x(), Vector3::z(), 10.0, Vector2::zeros()),
            Err(FusionError::DegenerateVector)
        ));
    }
}
