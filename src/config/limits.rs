//! Travel range configuration.

use serde::Deserialize;

use super::units::Degrees;

/// Absolute travel range of an axis in degrees.
///
/// Targets outside this range are rejected by the position controller before
/// any safety limit is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TravelRange {
    /// Minimum reachable position in degrees.
    #[serde(rename = "min_degrees")]
    pub min: Degrees,

    /// Maximum reachable position in degrees.
    #[serde(rename = "max_degrees")]
    pub max: Degrees,
}

impl TravelRange {
    /// Create a new travel range.
    pub fn new(min: Degrees, max: Degrees) -> Self {
        Self { min, max }
    }

    /// Check if the range is valid (min < max).
    pub fn is_valid(&self) -> bool {
        self.min.0 < self.max.0
    }

    /// Check if a position is within the range (inclusive).
    pub fn contains(&self, position: Degrees) -> bool {
        position.0 >= self.min.0 && position.0 <= self.max.0
    }

    /// Clamp a position into the range.
    pub fn clamp(&self, position: Degrees) -> Degrees {
        Degrees(position.0.clamp(self.min.0, self.max.0))
    }

    /// Width of the range in degrees.
    pub fn span(&self) -> f32 {
        self.max.0 - self.min.0
    }
}

impl Default for TravelRange {
    fn default() -> Self {
        Self {
            min: Degrees(-360.0),
            max: Degrees(360.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_travel_contains() {
        let range = TravelRange::new(Degrees(-180.0), Degrees(180.0));

        assert!(range.contains(Degrees(0.0)));
        assert!(range.contains(Degrees(180.0)));
        assert!(range.contains(Degrees(-180.0)));
        assert!(!range.contains(Degrees(181.0)));
        assert!(!range.contains(Degrees(-181.0)));
    }

    #[test]
    fn test_travel_clamp() {
        let range = TravelRange::new(Degrees(-90.0), Degrees(90.0));

        assert_eq!(range.clamp(Degrees(45.0)), Degrees(45.0));
        assert_eq!(range.clamp(Degrees(-180.0)), Degrees(-90.0));
        assert_eq!(range.clamp(Degrees(180.0)), Degrees(90.0));
        assert!((range.span() - 180.0).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_range() {
        let range = TravelRange::new(Degrees(10.0), Degrees(-10.0));
        assert!(!range.is_valid());
    }
}
