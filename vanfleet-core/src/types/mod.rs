//! Domain types
//!
//! This module defines the entities the fleet backend stores and the value
//! types they share. Entities carry their ownership links as plain ids; no
//! entity holds a reference to another, so every hop of an ownership chain
//! is an explicit lookup.

use serde::{Deserialize, Serialize};

pub mod billing;
pub mod fleet;
pub mod roles;
pub mod student;
pub mod trip;
pub mod user;

pub use billing::*;
pub use fleet::*;
pub use roles::*;
pub use student::*;
pub use trip::*;
pub use user::*;

/// A geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude, valid in `[-90, 90]`
    pub lat: f64,
    /// Longitude, valid in `[-180, 180]`
    pub lng: f64,
}

impl GeoPoint {
    /// Create a new coordinate without validating it.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Whether both components are inside their valid ranges.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_point_bounds() {
        assert!(GeoPoint::new(-90.0, 180.0).is_valid());
        assert!(GeoPoint::new(-23.55, -46.63).is_valid());
        assert!(!GeoPoint::new(90.5, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, -180.01).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }
}
