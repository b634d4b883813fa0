use serde::{Deserialize, Serialize};

use crate::{
    bounds::Bounds,
    color::Color,
    track::{LayerDescriptor, TrackRecord},
};

/// UI toggles that outlive a page load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiSettings {
    pub sidebar_open: bool,
    pub map_style: Option<String>,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            sidebar_open: true,
            map_style: None,
        }
    }
}

/// Serializable mirror of the viewer state. Each field is stored under its own key,
/// so a snapshot read back may be partial.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub tracks: Vec<TrackRecord>,
    pub colors: Vec<Color>,
    pub layers: Vec<LayerDescriptor>,
    pub bounds: Option<Bounds>,
    pub settings: UiSettings,
}

impl PersistedSnapshot {
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty() && self.layers.is_empty()
    }
}
