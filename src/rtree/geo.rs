//! Bounding-box geometry and Haversine distance for the R-Tree (C4).

use crate::errors::{Result, StoreError};
use crate::value::Value;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// An axis-aligned box over latitude/longitude; all four edges inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BBox {
    #[must_use]
    pub fn point(lat: f64, lng: f64) -> Self {
        Self { min_lat: lat, max_lat: lat, min_lng: lng, max_lng: lng }
    }

    #[must_use]
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            min_lat: self.min_lat.min(other.min_lat),
            max_lat: self.max_lat.max(other.max_lat),
            min_lng: self.min_lng.min(other.min_lng),
            max_lng: self.max_lng.max(other.max_lng),
        }
    }

    #[must_use]
    pub fn area(&self) -> f64 {
        (self.max_lat - self.min_lat) * (self.max_lng - self.min_lng)
    }

    #[must_use]
    pub fn enlargement(&self, other: &BBox) -> f64 {
        self.union(other).area() - self.area()
    }

    #[must_use]
    pub fn intersects(&self, other: &BBox) -> bool {
        self.min_lat <= other.max_lat
            && self.max_lat >= other.min_lat
            && self.min_lng <= other.max_lng
            && self.max_lng >= other.min_lng
    }

    #[must_use]
    pub fn contains_point(&self, lat: f64, lng: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lng >= self.min_lng && lng <= self.max_lng
    }

    #[must_use]
    pub fn world() -> Self {
        Self { min_lat: -90.0, max_lat: 90.0, min_lng: -180.0, max_lng: 180.0 }
    }

    #[must_use]
    pub fn to_value(self) -> Value {
        Value::object([
            ("minLat".to_string(), Value::Float(self.min_lat)),
            ("maxLat".to_string(), Value::Float(self.max_lat)),
            ("minLng".to_string(), Value::Float(self.min_lng)),
            ("maxLng".to_string(), Value::Float(self.max_lng)),
        ])
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let bad = || StoreError::Malformed(0, "not a bbox".into());
        let f = |k: &str| -> Result<f64> {
            match value.get(k) {
                Some(Value::Float(f)) => Ok(*f),
                _ => Err(bad()),
            }
        };
        Ok(Self { min_lat: f("minLat")?, max_lat: f("maxLat")?, min_lng: f("minLng")?, max_lng: f("maxLng")? })
    }
}

/// Great-circle distance in kilometers between two points, per the
/// Haversine formula on a sphere of radius 6371 km.
#[must_use]
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (lat1r, lat2r) = (lat1.to_radians(), lat2.to_radians());
    let dlat = (lat2 - lat1).to_radians();
    let dlng = (lng2 - lng1).to_radians();
    let a = (dlat / 2.0).sin().powi(2) + lat1r.cos() * lat2r.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

/// Box enclosing a radius-km circle around `(lat, lng)`, via the
/// `latΔ = r/111`, `lngΔ = r / (111·cos(lat))` approximation.
#[must_use]
pub fn radius_bbox(lat: f64, lng: f64, radius_km: f64) -> BBox {
    let lat = lat.clamp(-90.0, 90.0);
    let lng = lng.clamp(-180.0, 180.0);
    let lat_delta = radius_km / 111.0;
    let cos_lat = lat.to_radians().cos();
    let lng_delta = if cos_lat.abs() < 1e-12 { 180.0 } else { radius_km / (111.0 * cos_lat.abs()) };
    BBox {
        min_lat: (lat - lat_delta).max(-90.0),
        max_lat: (lat + lat_delta).min(90.0),
        min_lng: (lng - lng_delta).max(-180.0),
        max_lng: (lng + lng_delta).min(180.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_and_area() {
        let a = BBox::point(0.0, 0.0);
        let b = BBox::point(1.0, 1.0);
        let u = a.union(&b);
        assert_eq!(u, BBox { min_lat: 0.0, max_lat: 1.0, min_lng: 0.0, max_lng: 1.0 });
        assert_eq!(u.area(), 1.0);
    }

    #[test]
    fn haversine_zero_for_same_point() {
        assert!(haversine_km(40.0, -74.0, 40.0, -74.0) < 1e-9);
    }

    #[test]
    fn haversine_nyc_jersey_city_under_25km() {
        let d = haversine_km(40.7128, -74.0060, 40.7282, -74.1502);
        assert!(d < 25.0, "distance was {d}");
    }
}
