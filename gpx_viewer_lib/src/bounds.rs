use geo_types::{Coord, Rect};
use serde::{Deserialize, Serialize};

/// Axis aligned lon/lat envelope. `x` is longitude and `y` is latitude throughout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl Bounds {
    /// Degenerate envelope covering a single point.
    pub fn from_point(point: Coord<f64>) -> Self {
        Self {
            min_lon: point.x,
            min_lat: point.y,
            max_lon: point.x,
            max_lat: point.y,
        }
    }

    pub fn extend(&mut self, point: Coord<f64>) {
        self.min_lon = self.min_lon.min(point.x);
        self.min_lat = self.min_lat.min(point.y);
        self.max_lon = self.max_lon.max(point.x);
        self.max_lat = self.max_lat.max(point.y);
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min_lon: self.min_lon.min(other.min_lon),
            min_lat: self.min_lat.min(other.min_lat),
            max_lon: self.max_lon.max(other.max_lon),
            max_lat: self.max_lat.max(other.max_lat),
        }
    }

    pub fn contains(&self, point: Coord<f64>) -> bool {
        (self.min_lon..=self.max_lon).contains(&point.x) && (self.min_lat..=self.max_lat).contains(&point.y)
    }

    pub fn center(&self) -> Coord<f64> {
        Coord {
            x: (self.min_lon + self.max_lon) / 2.,
            y: (self.min_lat + self.max_lat) / 2.,
        }
    }

    /// GeoJSON bbox order: `[west, south, east, north]`.
    pub fn to_bbox(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }

    /// False if any edge is NaN/infinite or the envelope is inverted.
    pub fn is_well_formed(&self) -> bool {
        self.to_bbox().iter().all(|v| v.is_finite()) && self.min_lon <= self.max_lon && self.min_lat <= self.max_lat
    }

    pub fn approx_eq(&self, other: &Bounds, epsilon: f64) -> bool {
        self.to_bbox()
            .iter()
            .zip(other.to_bbox().iter())
            .all(|(a, b)| (a - b).abs() <= epsilon)
    }
}

impl From<Rect<f64>> for Bounds {
    fn from(rect: Rect<f64>) -> Self {
        Self {
            min_lon: rect.min().x,
            min_lat: rect.min().y,
            max_lon: rect.max().x,
            max_lat: rect.max().y,
        }
    }
}
