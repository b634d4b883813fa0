use std::{collections::HashMap, sync::Arc};

use gpx_viewer_lib::{
    bounds::Bounds,
    color::Color,
    snapshot::{PersistedSnapshot, UiSettings},
    track::{LayerDescriptor, TrackRecord},
};
use serde::{de::DeserializeOwned, Serialize};

use super::{constants::*, KeyValueStore, PersistenceError};

/// Mirrors viewer state into a [`KeyValueStore`], one JSON value per key.
///
/// Saving is best effort: a failing key is logged and skipped. Loading fails
/// open, anything that cannot be read back is treated as absent.
#[derive(Clone)]
pub struct PersistenceAdapter {
    store: Arc<dyn KeyValueStore>,
}

impl PersistenceAdapter {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Writes every key of the snapshot. Returns how many writes were dropped.
    pub async fn save(&self, snapshot: &PersistedSnapshot) -> usize {
        let mut failed = 0;
        failed += self.write(TRACKS_KEY, &snapshot.tracks).await as usize;
        failed += self.write(COLORS_KEY, &snapshot.colors).await as usize;
        failed += self.write(LAYERS_KEY, &snapshot.layers).await as usize;
        failed += self.write(BOUNDS_KEY, &snapshot.bounds).await as usize;
        failed += self.write(SETTINGS_KEY, &snapshot.settings).await as usize;
        failed
    }

    pub async fn save_settings(&self, settings: &UiSettings) -> usize {
        self.write(SETTINGS_KEY, settings).await as usize
    }

    pub async fn load(&self) -> PersistedSnapshot {
        PersistedSnapshot {
            tracks: self.read::<Vec<TrackRecord>>(TRACKS_KEY).await.unwrap_or_default(),
            colors: self.read::<Vec<Color>>(COLORS_KEY).await.unwrap_or_default(),
            layers: self.read::<Vec<LayerDescriptor>>(LAYERS_KEY).await.unwrap_or_default(),
            bounds: self.read::<Option<Bounds>>(BOUNDS_KEY).await.flatten().filter(Bounds::is_well_formed),
            settings: self.read::<UiSettings>(SETTINGS_KEY).await.unwrap_or_default(),
        }
    }

    pub async fn clear(&self) -> Result<(), PersistenceError> {
        self.store.clear().await.inspect_err(|err| tracing::error!("Failed to clear persisted state: {err}"))
    }

    /// True if the write was dropped.
    async fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let result = match serde_json::to_string(value) {
            Ok(json) => self.store.set(key, &json).await,
            Err(err) => Err(PersistenceError::Serialize { key: key.to_string(), message: err.to_string() }),
        };

        match result {
            Ok(()) => false,
            Err(err) => {
                tracing::warn!("Dropping write of {key}: {err}");
                true
            }
        }
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!("Treating {key} as absent: {err}");
                return None;
            }
        };

        serde_json::from_str(&raw)
            .map_err(|err| PersistenceError::Deserialize { key: key.to_string(), message: err.to_string() })
            .inspect_err(|err| tracing::warn!("Treating {key} as absent: {err}"))
            .ok()
    }
}

/// Picks a color for every record: the layer descriptor with the same id, then
/// the `colors` key by position when it lines up with the records, then `default`.
pub fn resolve_colors(snapshot: &PersistedSnapshot, records: &[TrackRecord], default: &Color) -> Vec<Color> {
    let layer_colors: HashMap<_, _> = snapshot.layers.iter()
        .map(|layer| (layer.id, &layer.color))
        .collect();
    let positional = (snapshot.colors.len() == records.len()).then_some(&snapshot.colors);

    records.iter()
        .enumerate()
        .map(|(i, record)| {
            layer_colors.get(&record.id)
                .map(|color| (*color).clone())
                .or_else(|| positional.map(|colors| colors[i].clone()))
                .unwrap_or_else(|| default.clone())
        })
        .collect()
}

/// Tracks are authoritative. If they are missing but layer descriptors survived,
/// the descriptors are enough to rebuild unnamed tracks.
pub fn resolve_records(snapshot: &PersistedSnapshot) -> Vec<TrackRecord> {
    if !snapshot.tracks.is_empty() || snapshot.layers.is_empty() {
        return snapshot.tracks.clone();
    }

    tracing::warn!("Persisted tracks missing, rebuilding {} tracks from layer descriptors", snapshot.layers.len());
    snapshot.layers.iter()
        .map(|layer| TrackRecord {
            id: layer.id,
            name: format!("Track {}", layer.id),
            geometry: layer.geometry.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use async_trait::async_trait;
    use geo::LineString;
    use gpx_viewer_lib::track::TrackId;

    /// Rejects writes to one key.
    struct FailingKey {
        inner: MemoryStore,
        key: &'static str,
    }

    #[async_trait]
    impl KeyValueStore for FailingKey {
        async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
            if key == self.key {
                return Err(PersistenceError::Database("disk full".into()));
            }
            self.inner.set(key, value).await
        }

        async fn clear(&self) -> Result<(), PersistenceError> {
            self.inner.clear().await
        }
    }

    fn record(id: u64, name: &str, points: Vec<(f64, f64)>) -> TrackRecord {
        TrackRecord { id: TrackId(id), name: name.into(), geometry: LineString::from(points) }
    }

    fn sample() -> PersistedSnapshot {
        let tracks = vec![
            record(0, "14/08/2023 - MorningRun", vec![(0., 0.), (0., 0.001)]),
            record(3, "Commute", vec![(10.2, 56.1), (10.3, 56.2), (10.4, 56.15)]),
        ];
        let colors: Vec<Color> = vec!["#000000".parse().unwrap(), "#ff00ff".parse().unwrap()];
        let layers = tracks.iter().zip(&colors)
            .map(|(t, c)| LayerDescriptor { id: t.id, color: c.clone(), geometry: t.geometry.clone() })
            .collect();

        PersistedSnapshot {
            tracks,
            colors,
            layers,
            bounds: Some(Bounds { min_lon: 0., min_lat: 0., max_lon: 10.4, max_lat: 56.2 }),
            settings: UiSettings { sidebar_open: false, map_style: Some("satellite".into()) },
        }
    }

    #[tokio::test]
    async fn round_trip() {
        let adapter = PersistenceAdapter::new(Arc::new(MemoryStore::new()));
        let snapshot = sample();

        assert_eq!(adapter.save(&snapshot).await, 0);
        assert_eq!(adapter.load().await, snapshot);
    }

    #[tokio::test]
    async fn empty_store_loads_empty() {
        let adapter = PersistenceAdapter::new(Arc::new(MemoryStore::new()));
        let loaded = adapter.load().await;
        assert!(loaded.is_empty());
        assert_eq!(loaded.settings, UiSettings::default());
    }

    #[tokio::test]
    async fn corrupt_values_are_absent() {
        let store = MemoryStore::new();
        let adapter = PersistenceAdapter::new(Arc::new(store.clone()));
        adapter.save(&sample()).await;

        store.set(TRACKS_KEY, "{not json").await.unwrap();
        store.set(BOUNDS_KEY, r#"{"min_lon":5,"min_lat":0,"max_lon":1,"max_lat":1}"#).await.unwrap();
        store.set(SETTINGS_KEY, "42").await.unwrap();

        let loaded = adapter.load().await;
        assert!(loaded.tracks.is_empty());
        assert_eq!(loaded.bounds, None);
        assert_eq!(loaded.settings, UiSettings::default());
        // Untouched keys still load
        assert_eq!(loaded.colors.len(), 2);
    }

    #[tokio::test]
    async fn failing_key_does_not_stop_other_writes() {
        let inner = MemoryStore::new();
        let adapter = PersistenceAdapter::new(Arc::new(FailingKey { inner: inner.clone(), key: COLORS_KEY }));

        assert_eq!(adapter.save(&sample()).await, 1);

        let loaded = PersistenceAdapter::new(Arc::new(inner)).load().await;
        assert_eq!(loaded.tracks.len(), 2);
        assert!(loaded.colors.is_empty());
        // Colors come back through the layer descriptors
        assert_eq!(resolve_colors(&loaded, &loaded.tracks, &Color::black()), sample().colors);
    }

    #[tokio::test]
    async fn clear_wipes_everything() {
        let store = MemoryStore::new();
        let adapter = PersistenceAdapter::new(Arc::new(store.clone()));
        adapter.save(&sample()).await;
        assert!(!store.is_empty().await);

        adapter.clear().await.unwrap();
        assert!(store.is_empty().await);
        assert!(adapter.load().await.is_empty());
    }

    #[test]
    fn colors_fall_back_to_default() {
        let mut snapshot = sample();
        snapshot.colors.pop();
        snapshot.layers.clear();

        let colors = resolve_colors(&snapshot, &snapshot.tracks, &"#123456".parse().unwrap());
        assert_eq!(colors, vec!["#123456".parse::<Color>().unwrap(), "#123456".parse().unwrap()]);
    }

    #[test]
    fn layer_color_wins_over_stale_colors() {
        let mut snapshot = sample();
        // Colors write of the last save was dropped, layers carry the update
        snapshot.layers[1].color = "#00ffff".parse().unwrap();

        let colors = resolve_colors(&snapshot, &snapshot.tracks, &Color::black());
        assert_eq!(colors, vec![Color::black(), "#00ffff".parse().unwrap()]);
    }

    #[test]
    fn positional_colors_fill_missing_layers() {
        let mut snapshot = sample();
        snapshot.layers.truncate(1);

        let colors = resolve_colors(&snapshot, &snapshot.tracks, &"#123456".parse().unwrap());
        assert_eq!(colors, sample().colors);
    }

    #[test]
    fn records_rebuilt_from_layers() {
        let mut snapshot = sample();
        snapshot.tracks.clear();

        let records = resolve_records(&snapshot);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, TrackId(3));
        assert_eq!(records[1].name, "Track 3");
        assert_eq!(records[1].geometry, sample().tracks[1].geometry);

        snapshot.colors.clear();
        assert_eq!(resolve_colors(&snapshot, &records, &Color::black()), sample().colors);
    }
}
