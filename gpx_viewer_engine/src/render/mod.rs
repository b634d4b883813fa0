use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use geo::Coord;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue, Value};
use gpx_viewer_lib::{bounds::Bounds, color::Color, track::{Track, TrackId}};
use serde::Serialize;

use crate::{config::ViewerConfig, metrics};

mod canvas;

pub use canvas::*;

pub const LINE_COLOR: &str = "line-color";
pub const LINE_WIDTH: &str = "line-width";

/// A track feature found under a map click.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerFeature {
    pub layer_id: String,
    pub name: String,
    pub distance_km: f64,
    pub popup: String,
}

/// The map renderer as seen by the engine.
pub trait Renderer: Send {
    /// Creates the layer, or replaces it if the id is already known.
    fn add_line_layer(&mut self, layer_id: &str, data: &FeatureCollection, color: &Color, width: f64);

    fn set_paint_property(&mut self, layer_id: &str, property: &str, value: &JsonValue);

    fn remove_layer(&mut self, layer_id: &str);

    /// `bbox` in GeoJSON order, `[west, south, east, north]`.
    fn fit_bounds(&mut self, bbox: [f64; 4], padding: u32);

    fn query_features_at(&self, point: Coord<f64>, layer_ids: &[String]) -> Vec<LayerFeature>;
}

fn lock<R>(mutex: &Mutex<R>) -> MutexGuard<'_, R> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Lets a caller keep a handle on the renderer it gave to a session.
impl<R: Renderer> Renderer for Arc<Mutex<R>> {
    fn add_line_layer(&mut self, layer_id: &str, data: &FeatureCollection, color: &Color, width: f64) {
        lock(self).add_line_layer(layer_id, data, color, width)
    }

    fn set_paint_property(&mut self, layer_id: &str, property: &str, value: &JsonValue) {
        lock(self).set_paint_property(layer_id, property, value)
    }

    fn remove_layer(&mut self, layer_id: &str) {
        lock(self).remove_layer(layer_id)
    }

    fn fit_bounds(&mut self, bbox: [f64; 4], padding: u32) {
        lock(self).fit_bounds(bbox, padding)
    }

    fn query_features_at(&self, point: Coord<f64>, layer_ids: &[String]) -> Vec<LayerFeature> {
        lock(self).query_features_at(point, layer_ids)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    AddLineLayer {
        layer_id: String,
        data: FeatureCollection,
        color: Color,
        width: f64,
    },
    SetPaintProperty {
        layer_id: String,
        property: String,
        value: JsonValue,
    },
    RemoveLayer {
        layer_id: String,
    },
    FitBounds {
        bbox: [f64; 4],
        padding: u32,
    },
}

impl RenderCommand {
    fn apply(self, renderer: &mut dyn Renderer) {
        match self {
            RenderCommand::AddLineLayer { layer_id, data, color, width } => renderer.add_line_layer(&layer_id, &data, &color, width),
            RenderCommand::SetPaintProperty { layer_id, property, value } => renderer.set_paint_property(&layer_id, &property, &value),
            RenderCommand::RemoveLayer { layer_id } => renderer.remove_layer(&layer_id),
            RenderCommand::FitBounds { bbox, padding } => renderer.fit_bounds(bbox, padding),
        }
    }
}

/// Projects track state onto a [`Renderer`].
///
/// The renderer is not usable until it reports that it has loaded. Until then
/// every command is queued in arrival order, and replayed exactly once when
/// [`RenderSync::mark_loaded`] is first called. The gate never closes again.
pub struct RenderSync {
    renderer: Box<dyn Renderer>,
    loaded: bool,
    pending: VecDeque<RenderCommand>,
    layer_ids: Vec<String>,
    line_width: f64,
    fit_padding: u32,
}

impl RenderSync {
    pub fn new(renderer: Box<dyn Renderer>, config: &ViewerConfig) -> Self {
        Self {
            renderer,
            loaded: false,
            pending: VecDeque::new(),
            layer_ids: Vec::new(),
            line_width: config.line_width,
            fit_padding: config.fit_padding,
        }
    }

    pub fn apply_track(&mut self, track: &Track) {
        let layer_id = track.layer_id();
        if !self.layer_ids.contains(&layer_id) {
            self.layer_ids.push(layer_id.clone());
        }

        self.dispatch(RenderCommand::AddLineLayer {
            layer_id,
            data: track_feature_collection(track),
            color: track.color().clone(),
            width: self.line_width,
        });
    }

    pub fn apply_color(&mut self, id: TrackId, color: &Color) {
        self.dispatch(RenderCommand::SetPaintProperty {
            layer_id: id.layer_id(),
            property: LINE_COLOR.to_string(),
            value: JsonValue::from(color.as_str()),
        });
    }

    /// Does nothing for an empty envelope.
    pub fn fit_bounds(&mut self, bounds: Option<Bounds>) {
        if let Some(bounds) = bounds {
            self.dispatch(RenderCommand::FitBounds {
                bbox: bounds.to_bbox(),
                padding: self.fit_padding,
            });
        }
    }

    /// Removes every layer this sync has created.
    pub fn clear_layers(&mut self) {
        for layer_id in std::mem::take(&mut self.layer_ids) {
            self.dispatch(RenderCommand::RemoveLayer { layer_id });
        }
    }

    pub fn mark_loaded(&mut self) {
        if self.loaded {
            return;
        }
        self.loaded = true;

        if !self.pending.is_empty() {
            tracing::info!("Renderer loaded, replaying {} queued commands", self.pending.len());
        }
        while let Some(command) = self.pending.pop_front() {
            command.apply(self.renderer.as_mut());
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn layer_ids(&self) -> &[String] {
        &self.layer_ids
    }

    /// Features under `point` across all known layers. Empty until loaded.
    pub fn query_at(&self, point: Coord<f64>) -> Vec<LayerFeature> {
        if !self.loaded {
            return Vec::new();
        }
        self.renderer.query_features_at(point, &self.layer_ids)
    }

    fn dispatch(&mut self, command: RenderCommand) {
        if self.loaded {
            tracing::debug!("Render command {:?}", CommandKind::from(&command));
            command.apply(self.renderer.as_mut());
        } else {
            self.pending.push_back(command);
        }
    }
}

// Keeps debug logging free of full geometries
#[derive(Debug)]
#[allow(dead_code)]
enum CommandKind<'a> {
    AddLineLayer(&'a str),
    SetPaintProperty(&'a str, &'a str),
    RemoveLayer(&'a str),
    FitBounds([f64; 4]),
}

impl<'a> From<&'a RenderCommand> for CommandKind<'a> {
    fn from(command: &'a RenderCommand) -> Self {
        match command {
            RenderCommand::AddLineLayer { layer_id, .. } => CommandKind::AddLineLayer(layer_id),
            RenderCommand::SetPaintProperty { layer_id, property, .. } => CommandKind::SetPaintProperty(layer_id, property),
            RenderCommand::RemoveLayer { layer_id } => CommandKind::RemoveLayer(layer_id),
            RenderCommand::FitBounds { bbox, .. } => CommandKind::FitBounds(*bbox),
        }
    }
}

/// Layer payload for a track: one LineString feature carrying the metadata a
/// click query reports back.
pub fn track_feature_collection(track: &Track) -> FeatureCollection {
    let line = track.geometry().0.iter().map(|c| vec![c.x, c.y]).collect();

    let mut properties = JsonObject::new();
    properties.insert("track_id".into(), JsonValue::from(track.id().0));
    properties.insert("name".into(), JsonValue::from(track.name()));
    properties.insert("distance_km".into(), JsonValue::from(track.distance_km()));
    properties.insert("popup".into(), JsonValue::from(metrics::popup_text(track.name(), track.distance_km())));

    FeatureCollection {
        bbox: None,
        features: vec![Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::LineString(line))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }],
        foreign_members: None,
    }
}
