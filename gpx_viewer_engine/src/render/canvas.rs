use geo::Coord;
use geojson::{FeatureCollection, JsonObject, JsonValue, Value};
use gpx_viewer_lib::color::Color;
use serde::Serialize;

use super::{LayerFeature, Renderer, LINE_COLOR, LINE_WIDTH};
use crate::{config::ViewerConfig, metrics::{self, EARTH_RADIUS_M}};

#[derive(Debug, Clone, PartialEq)]
pub struct CanvasLayer {
    pub id: String,
    pub data: FeatureCollection,
    pub paint: JsonObject,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub center: [f64; 2],
    pub zoom: f64,
    /// Set once the view has been fitted to a bbox.
    pub fitted: Option<[f64; 4]>,
    pub padding: u32,
}

/// In-memory map: keeps layers in stacking order and the current view, and can
/// export itself as GeoJSON for a web client to draw.
#[derive(Debug, Clone)]
pub struct LayerCanvas {
    layers: Vec<CanvasLayer>,
    viewport: Viewport,
    tolerance_m: f64,
}

impl LayerCanvas {
    pub fn create(center: Coord<f64>, zoom: f64) -> Self {
        Self {
            layers: Vec::new(),
            viewport: Viewport {
                center: [center.x, center.y],
                zoom,
                fitted: None,
                padding: 0,
            },
            tolerance_m: 50.,
        }
    }

    pub fn from_config(config: &ViewerConfig) -> Self {
        Self::create(config.initial_center, config.initial_zoom).with_tolerance(config.query_tolerance_m)
    }

    pub fn with_tolerance(mut self, tolerance_m: f64) -> Self {
        self.tolerance_m = tolerance_m;
        self
    }

    pub fn layers(&self) -> &[CanvasLayer] {
        &self.layers
    }

    pub fn layer(&self, id: &str) -> Option<&CanvasLayer> {
        self.layers.iter().find(|layer| layer.id == id)
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Every layer's features, in stacking order, with the layer id and paint
    /// properties merged into each feature's properties.
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let features = self.layers.iter()
            .flat_map(|layer| layer.data.features.iter().map(move |feature| {
                let mut feature = feature.clone();
                let properties = feature.properties.get_or_insert_with(JsonObject::new);
                properties.insert("layer_id".into(), JsonValue::from(layer.id.clone()));
                for (key, value) in &layer.paint {
                    properties.insert(key.clone(), value.clone());
                }
                feature
            }))
            .collect();

        FeatureCollection {
            bbox: self.viewport.fitted.map(|bbox| bbox.to_vec()),
            features,
            foreign_members: None,
        }
    }
}

impl Renderer for LayerCanvas {
    fn add_line_layer(&mut self, layer_id: &str, data: &FeatureCollection, color: &Color, width: f64) {
        let mut paint = JsonObject::new();
        paint.insert(LINE_COLOR.into(), JsonValue::from(color.as_str()));
        paint.insert(LINE_WIDTH.into(), JsonValue::from(width));

        let layer = CanvasLayer {
            id: layer_id.to_string(),
            data: data.clone(),
            paint,
        };

        match self.layers.iter_mut().find(|existing| existing.id == layer_id) {
            Some(existing) => *existing = layer,
            None => self.layers.push(layer),
        }
    }

    fn set_paint_property(&mut self, layer_id: &str, property: &str, value: &JsonValue) {
        match self.layers.iter_mut().find(|layer| layer.id == layer_id) {
            Some(layer) => {
                layer.paint.insert(property.to_string(), value.clone());
            }
            None => tracing::warn!("Paint property {property} for unknown layer {layer_id}"),
        }
    }

    fn remove_layer(&mut self, layer_id: &str) {
        self.layers.retain(|layer| layer.id != layer_id);
    }

    fn fit_bounds(&mut self, bbox: [f64; 4], padding: u32) {
        self.viewport.center = [(bbox[0] + bbox[2]) / 2., (bbox[1] + bbox[3]) / 2.];
        self.viewport.fitted = Some(bbox);
        self.viewport.padding = padding;
    }

    fn query_features_at(&self, point: Coord<f64>, layer_ids: &[String]) -> Vec<LayerFeature> {
        self.layers.iter()
            .filter(|layer| layer_ids.contains(&layer.id))
            .flat_map(|layer| layer.data.features.iter().map(move |feature| (layer, feature)))
            .filter(|(_, feature)| {
                let Some(Value::LineString(line)) = feature.geometry.as_ref().map(|geometry| &geometry.value) else {
                    return false;
                };
                let coords: Vec<Coord<f64>> = line.iter()
                    .filter(|position| position.len() >= 2)
                    .map(|position| Coord { x: position[0], y: position[1] })
                    .collect();
                distance_to_line(point, &coords).is_some_and(|d| d <= self.tolerance_m)
            })
            .map(|(layer, feature)| {
                let properties = feature.properties.as_ref();
                let name = properties
                    .and_then(|p| p.get("name"))
                    .and_then(JsonValue::as_str)
                    .unwrap_or_default()
                    .to_string();
                let distance_km = properties
                    .and_then(|p| p.get("distance_km"))
                    .and_then(JsonValue::as_f64)
                    .unwrap_or_default();

                LayerFeature {
                    layer_id: layer.id.clone(),
                    popup: metrics::popup_text(&name, distance_km),
                    name,
                    distance_km,
                }
            })
            .collect()
    }
}

/// Shortest distance in meters from `point` to the polyline, on a local
/// equirectangular projection around `point`. None for an empty line.
fn distance_to_line(point: Coord<f64>, line: &[Coord<f64>]) -> Option<f64> {
    let meters_per_degree = EARTH_RADIUS_M * std::f64::consts::PI / 180.;
    let lon_scale = point.y.to_radians().cos() * meters_per_degree;
    let project = |c: &Coord<f64>| ((c.x - point.x) * lon_scale, (c.y - point.y) * meters_per_degree);

    match line {
        [] => None,
        [only] => {
            let (x, y) = project(only);
            Some(x.hypot(y))
        }
        _ => line.windows(2)
            .map(|pair| {
                let (ax, ay) = project(&pair[0]);
                let (bx, by) = project(&pair[1]);
                let (dx, dy) = (bx - ax, by - ay);
                let length_sq = dx * dx + dy * dy;
                let t = if length_sq == 0. { 0. } else { (-(ax * dx + ay * dy) / length_sq).clamp(0., 1.) };
                (ax + t * dx).hypot(ay + t * dy)
            })
            .reduce(f64::min),
    }
}
