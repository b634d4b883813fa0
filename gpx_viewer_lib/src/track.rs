use std::fmt;

use geo_types::LineString;
use serde::{Deserialize, Serialize};

use crate::color::Color;

const LAYER_PREFIX: &str = "track-";

/// Session unique track id. Handed out by a monotonic counter, independent of position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub u64);

impl TrackId {
    pub fn layer_id(&self) -> String {
        format!("{LAYER_PREFIX}{}", self.0)
    }

    pub fn from_layer_id(layer_id: &str) -> Option<Self> {
        layer_id.strip_prefix(LAYER_PREFIX)?.parse().ok().map(Self)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One ingested GPX track. Everything but the color is fixed at creation.
/// Only serialized outwards; it is rebuilt from a [`TrackRecord`], never read back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    id: TrackId,
    name: String,
    geometry: LineString<f64>,
    distance_km: f64,
    color: Color,
}

impl Track {
    pub fn new(id: TrackId, name: String, geometry: LineString<f64>, distance_km: f64, color: Color) -> Self {
        Self {
            id,
            name,
            geometry,
            distance_km,
            color,
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry(&self) -> &LineString<f64> {
        &self.geometry
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }

    pub fn color(&self) -> &Color {
        &self.color
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn layer_id(&self) -> String {
        self.id.layer_id()
    }

    pub fn record(&self) -> TrackRecord {
        TrackRecord {
            id: self.id,
            name: self.name.clone(),
            geometry: self.geometry.clone(),
        }
    }

    pub fn layer_descriptor(&self) -> LayerDescriptor {
        LayerDescriptor {
            id: self.id,
            color: self.color.clone(),
            geometry: self.geometry.clone(),
        }
    }
}

/// Persisted form of a track. Distance is left out since it is derived from the geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub id: TrackId,
    pub name: String,
    pub geometry: LineString<f64>,
}

/// Everything needed to rebuild a map layer for a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    pub id: TrackId,
    pub color: Color,
    pub geometry: LineString<f64>,
}

/// Compact view of a track for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSummary {
    pub id: TrackId,
    pub name: String,
    pub distance_km: f64,
    pub color: Color,
    pub points: usize,
}

impl From<&Track> for TrackSummary {
    fn from(track: &Track) -> Self {
        Self {
            id: track.id,
            name: track.name.clone(),
            distance_km: track.distance_km,
            color: track.color.clone(),
            points: track.geometry.0.len(),
        }
    }
}
