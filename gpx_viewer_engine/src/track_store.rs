use std::collections::HashSet;

use geo::LineString;
use gpx_viewer_lib::{
    color::Color,
    track::{LayerDescriptor, Track, TrackId, TrackRecord},
};

use crate::metrics;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("no track with id {0}")]
    NotFound(TrackId),
    #[error("track geometry must contain at least one point")]
    EmptyGeometry,
}

/// Owns the ordered track collection. Each color lives on its track, so the
/// colors and tracks can never disagree in length.
#[derive(Debug, Clone)]
pub struct TrackStore {
    tracks: Vec<Track>,
    next_id: u64,
    default_color: Color,
}

impl TrackStore {
    pub fn new(default_color: Color) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 0,
            default_color,
        }
    }

    /// Appends a track and returns its id. Distance is computed here, once.
    pub fn add(&mut self, geometry: LineString<f64>, name: String, color: Option<Color>) -> Result<TrackId, StoreError> {
        if geometry.0.is_empty() {
            return Err(StoreError::EmptyGeometry);
        }

        let id = TrackId(self.next_id);
        self.next_id += 1;

        let distance_km = metrics::distance_km(&geometry.0);
        let color = color.unwrap_or_else(|| self.default_color.clone());
        self.tracks.push(Track::new(id, name, geometry, distance_km, color));

        Ok(id)
    }

    pub fn update_color(&mut self, id: TrackId, color: Color) -> Result<(), StoreError> {
        let track = self.tracks.iter_mut()
            .find(|track| track.id() == id)
            .ok_or(StoreError::NotFound(id))?;
        track.set_color(color);
        Ok(())
    }

    /// Drops every track. Ids keep counting so a layer id is never reused.
    pub fn reset(&mut self) {
        self.tracks.clear();
    }

    /// Replaces the collection with rehydrated records. Records with no points
    /// or an already seen id are skipped. Missing colors fall back to the default.
    pub fn restore(&mut self, records: Vec<TrackRecord>, colors: Vec<Color>) {
        self.tracks.clear();

        let mut seen = HashSet::new();
        let mut colors = colors.into_iter();
        for record in records {
            let color = colors.next().unwrap_or_else(|| self.default_color.clone());
            if record.geometry.0.is_empty() || !seen.insert(record.id) {
                tracing::warn!("Skipping unusable persisted track {}", record.id);
                continue;
            }
            let distance_km = metrics::distance_km(&record.geometry.0);
            self.tracks.push(Track::new(record.id, record.name, record.geometry, distance_km, color));
        }

        self.next_id = self.next_id.max(self.tracks.iter().map(|track| track.id().0 + 1).max().unwrap_or(0));
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|track| track.id() == id)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn colors(&self) -> Vec<Color> {
        self.tracks.iter().map(|track| track.color().clone()).collect()
    }

    pub fn records(&self) -> Vec<TrackRecord> {
        self.tracks.iter().map(Track::record).collect()
    }

    pub fn layer_descriptors(&self) -> Vec<LayerDescriptor> {
        self.tracks.iter().map(Track::layer_descriptor).collect()
    }

    pub fn default_color(&self) -> &Color {
        &self.default_color
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
