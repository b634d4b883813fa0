use std::{sync::Arc, time::Instant};

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{Request, StatusCode},
    middleware::{from_fn, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use geo_types::Coord;
use geojson::FeatureCollection;
use gpx_viewer_engine::{
    ingest::SkippedFile, render::LayerFeature, track_store::StoreError, BatchReport, GpxSource, SessionError,
};
use gpx_viewer_lib::{
    bounds::Bounds,
    color::{Color, InvalidColor},
    snapshot::UiSettings,
    track::{TrackId, TrackSummary},
};
use serde::Deserialize;

use crate::server_state::ServerState;

/// Upper bound for one upload request. Long recorded rides run to tens of MB.
pub const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/tracks", get(get_tracks).post(post_tracks).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)))
        .route("/tracks/{track_id}/color", put(put_track_color))
        .route("/reset", post(post_reset))
        .route("/bounds", get(get_bounds))
        .route("/layers", get(get_layers))
        .route("/query", get(get_query))
        .route("/settings", get(get_settings))
        .route("/settings/sidebar", put(put_sidebar))
        .route("/settings/map_style", put(put_map_style))
        .with_state(state)
        .layer(from_fn(log_request))
}

#[derive(Debug)]
pub enum ApiError {
    Session(SessionError),
    InvalidColor(InvalidColor),
    BadRequest(String),
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        ApiError::Session(err)
    }
}

impl From<InvalidColor> for ApiError {
    fn from(err: InvalidColor) -> Self {
        ApiError::InvalidColor(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Session(SessionError::Store(StoreError::NotFound(_))) => StatusCode::NOT_FOUND,
            ApiError::Session(SessionError::Store(StoreError::EmptyGeometry)) => StatusCode::BAD_REQUEST,
            ApiError::Session(SessionError::Closed) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InvalidColor(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        let message = match self {
            ApiError::Session(err) => err.to_string(),
            ApiError::InvalidColor(err) => err.to_string(),
            ApiError::BadRequest(message) => message,
        };

        if status.is_server_error() {
            tracing::error!("{message}");
        }
        (status, message).into_response()
    }
}

async fn log_request(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;
    tracing::debug!("{method} {path} -> {} in {:?}", response.status(), start.elapsed());
    response
}

async fn get_tracks(State(state): State<Arc<ServerState>>) -> Result<Json<Vec<TrackSummary>>, ApiError> {
    Ok(Json(state.session.tracks().await?))
}

/// One multipart part per GPX file. A part that cannot be read is reported as
/// skipped, the rest of the batch is still ingested.
async fn post_tracks(State(state): State<Arc<ServerState>>, mut multipart: Multipart) -> Result<Json<BatchReport>, ApiError> {
    let mut sources = Vec::new();
    let mut unreadable = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                tracing::warn!("Upload ended early: {err}");
                unreadable.push(SkippedFile { file_name: "upload".to_string(), reason: err.to_string() });
                break;
            }
        };

        let file_name = field.file_name()
            .or(field.name())
            .unwrap_or("upload.gpx")
            .to_string();
        match field.text().await {
            Ok(text) => sources.push(GpxSource::Text { file_name, text }),
            Err(err) => {
                tracing::warn!("Skipping {file_name}: {err}");
                unreadable.push(SkippedFile { file_name, reason: err.to_string() });
            }
        }
    }

    if sources.is_empty() && unreadable.is_empty() {
        return Err(ApiError::BadRequest("no files uploaded".to_string()));
    }

    let mut report = if sources.is_empty() {
        BatchReport::default()
    } else {
        state.session.ingest(sources).await
    };
    report.skipped.extend(unreadable);
    Ok(Json(report))
}

#[derive(Deserialize)]
struct ColorUpdate {
    color: String,
}

async fn put_track_color(
    State(state): State<Arc<ServerState>>,
    Path(track_id): Path<u64>,
    Json(update): Json<ColorUpdate>,
) -> Result<StatusCode, ApiError> {
    let color: Color = update.color.parse()?;
    state.session.update_color(TrackId(track_id), color).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn post_reset(State(state): State<Arc<ServerState>>) -> Result<StatusCode, ApiError> {
    state.session.reset().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_bounds(State(state): State<Arc<ServerState>>) -> Result<Json<Option<Bounds>>, ApiError> {
    Ok(Json(state.session.bounds().await?))
}

async fn get_layers(State(state): State<Arc<ServerState>>) -> Json<FeatureCollection> {
    Json(state.canvas().to_feature_collection())
}

#[derive(Deserialize)]
struct QueryPoint {
    lon: f64,
    lat: f64,
}

async fn get_query(
    State(state): State<Arc<ServerState>>,
    Query(point): Query<QueryPoint>,
) -> Result<Json<Vec<LayerFeature>>, ApiError> {
    let point = Coord { x: point.lon, y: point.lat };
    Ok(Json(state.session.query_at(point).await?))
}

async fn get_settings(State(state): State<Arc<ServerState>>) -> Result<Json<UiSettings>, ApiError> {
    Ok(Json(state.session.settings().await?))
}

#[derive(Deserialize)]
struct SidebarUpdate {
    open: bool,
}

async fn put_sidebar(
    State(state): State<Arc<ServerState>>,
    Json(update): Json<SidebarUpdate>,
) -> Result<Json<UiSettings>, ApiError> {
    Ok(Json(state.session.set_sidebar_open(update.open).await?))
}

#[derive(Deserialize)]
struct MapStyleUpdate {
    style: Option<String>,
}

async fn put_map_style(
    State(state): State<Arc<ServerState>>,
    Json(update): Json<MapStyleUpdate>,
) -> Result<Json<UiSettings>, ApiError> {
    Ok(Json(state.session.set_map_style(update.style).await?))
}
