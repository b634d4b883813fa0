use std::sync::Arc;

use futures::future::join_all;
use geo::Coord;
use gpx_viewer_lib::{
    bounds::Bounds,
    color::Color,
    snapshot::{PersistedSnapshot, UiSettings},
    track::{Track, TrackId, TrackSummary},
};
use tokio::sync::{mpsc, oneshot};

use crate::{
    bounds::BoundsAggregator,
    config::ViewerConfig,
    gpx_util::ParsedTrack,
    ingest::{self, BatchReport, GpxSource, IngestError},
    persistence::{resolve_colors, resolve_records, KeyValueStore, PersistenceAdapter},
    render::{LayerFeature, RenderSync, Renderer},
    track_store::{StoreError, TrackStore},
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("viewer session is closed")]
    Closed,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Everything a viewer session owns. Only the session task ever holds it, so
/// every mutation below runs to completion before the next one starts.
pub struct ViewerState {
    config: ViewerConfig,
    store: TrackStore,
    bounds: BoundsAggregator,
    persistence: PersistenceAdapter,
    render: RenderSync,
    settings: UiSettings,
}

impl ViewerState {
    /// Rehydrates from `store` and queues the restored layers on the renderer.
    pub async fn open(config: ViewerConfig, store: Arc<dyn KeyValueStore>, renderer: Box<dyn Renderer>) -> Self {
        let persistence = PersistenceAdapter::new(store);
        let render = RenderSync::new(renderer, &config);

        let mut state = Self {
            store: TrackStore::new(config.default_color.clone()),
            bounds: BoundsAggregator::new(),
            persistence,
            render,
            settings: UiSettings::default(),
            config,
        };
        state.rehydrate().await;
        state
    }

    async fn rehydrate(&mut self) {
        let persisted = self.persistence.load().await;

        let records = resolve_records(&persisted);
        let colors = resolve_colors(&persisted, &records, self.store.default_color());
        self.store.restore(records, colors);
        self.bounds.full_recompute(self.store.tracks());
        self.settings = persisted.settings.clone();

        for track in self.store.tracks() {
            self.render.apply_track(track);
        }
        self.render.fit_bounds(self.bounds.bounds());

        if !self.store.is_empty() {
            tracing::info!("Rehydrated {} tracks", self.store.len());
        }

        // Write back whatever had to be repaired
        let snapshot = self.snapshot();
        if snapshot != persisted {
            tracing::warn!("Persisted state was incomplete, saving reconciled state");
            self.persistence.save(&snapshot).await;
        }
    }

    /// Commits one parsed file: store, bounds, persistence, then the renderer.
    pub async fn ingest(&mut self, parsed: ParsedTrack) -> Result<TrackId, StoreError> {
        let ParsedTrack { name, geometry } = parsed;
        let points = geometry.0.clone();

        let id = self.store.add(geometry, name, None)?;
        self.bounds.extend_all(points);
        let snapshot = self.snapshot();
        self.persistence.save(&snapshot).await;

        if let Some(track) = self.store.get(id) {
            tracing::info!("Ingested track {id} '{}' ({:.2} km)", track.name(), track.distance_km());
            self.render.apply_track(track);
        }
        self.render.fit_bounds(self.bounds.bounds());

        Ok(id)
    }

    pub async fn update_color(&mut self, id: TrackId, color: Color) -> Result<(), StoreError> {
        self.store.update_color(id, color.clone())
            .inspect_err(|err| tracing::error!("Failed to update color: {err}"))?;

        let snapshot = self.snapshot();
        self.persistence.save(&snapshot).await;
        self.render.apply_color(id, &color);
        Ok(())
    }

    /// Drops every track and wipes persisted state. UI settings survive.
    pub async fn reset(&mut self) {
        self.render.clear_layers();
        self.store.reset();
        self.bounds.full_recompute(self.store.tracks());

        if self.persistence.clear().await.is_err() {
            let snapshot = self.snapshot();
            self.persistence.save(&snapshot).await;
        } else {
            self.persistence.save_settings(&self.settings).await;
        }
        tracing::info!("Viewer reset");
    }

    pub fn renderer_loaded(&mut self) {
        self.render.mark_loaded();
    }

    pub fn snapshot(&self) -> PersistedSnapshot {
        PersistedSnapshot {
            tracks: self.store.records(),
            colors: self.store.colors(),
            layers: self.store.layer_descriptors(),
            bounds: self.bounds.bounds(),
            settings: self.settings.clone(),
        }
    }

    pub fn tracks(&self) -> &[Track] {
        self.store.tracks()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds.bounds()
    }

    pub fn query_at(&self, point: Coord<f64>) -> Vec<LayerFeature> {
        self.render.query_at(point)
    }

    pub fn settings(&self) -> &UiSettings {
        &self.settings
    }

    pub async fn set_sidebar_open(&mut self, open: bool) -> UiSettings {
        self.settings.sidebar_open = open;
        self.persistence.save_settings(&self.settings).await;
        self.settings.clone()
    }

    pub async fn set_map_style(&mut self, style: Option<String>) -> UiSettings {
        self.settings.map_style = style;
        self.persistence.save_settings(&self.settings).await;
        self.settings.clone()
    }

    /// Moves the state onto its own task and returns the handle to reach it.
    pub fn start(self) -> SessionHandle {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        tokio::spawn(run(self, rx));
        SessionHandle { tx }
    }
}

enum Command {
    Ingest { parsed: ParsedTrack, reply: oneshot::Sender<Result<TrackId, StoreError>> },
    UpdateColor { id: TrackId, color: Color, reply: oneshot::Sender<Result<(), StoreError>> },
    Reset { reply: oneshot::Sender<()> },
    RendererLoaded { reply: oneshot::Sender<()> },
    Tracks { reply: oneshot::Sender<Vec<TrackSummary>> },
    Bounds { reply: oneshot::Sender<Option<Bounds>> },
    QueryAt { point: Coord<f64>, reply: oneshot::Sender<Vec<LayerFeature>> },
    Snapshot { reply: oneshot::Sender<PersistedSnapshot> },
    Settings { reply: oneshot::Sender<UiSettings> },
    SetSidebarOpen { open: bool, reply: oneshot::Sender<UiSettings> },
    SetMapStyle { style: Option<String>, reply: oneshot::Sender<UiSettings> },
    Shutdown { reply: oneshot::Sender<()> },
}

async fn run(mut state: ViewerState, mut commands: mpsc::Receiver<Command>) {
    tracing::debug!("Viewer session started");

    // A dropped reply receiver only means the caller stopped waiting
    while let Some(command) = commands.recv().await {
        match command {
            Command::Ingest { parsed, reply } => {
                let _ = reply.send(state.ingest(parsed).await);
            }
            Command::UpdateColor { id, color, reply } => {
                let _ = reply.send(state.update_color(id, color).await);
            }
            Command::Reset { reply } => {
                state.reset().await;
                let _ = reply.send(());
            }
            Command::RendererLoaded { reply } => {
                state.renderer_loaded();
                let _ = reply.send(());
            }
            Command::Tracks { reply } => {
                let _ = reply.send(state.tracks().iter().map(TrackSummary::from).collect());
            }
            Command::Bounds { reply } => {
                let _ = reply.send(state.bounds());
            }
            Command::QueryAt { point, reply } => {
                let _ = reply.send(state.query_at(point));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(state.snapshot());
            }
            Command::Settings { reply } => {
                let _ = reply.send(state.settings().clone());
            }
            Command::SetSidebarOpen { open, reply } => {
                let _ = reply.send(state.set_sidebar_open(open).await);
            }
            Command::SetMapStyle { style, reply } => {
                let _ = reply.send(state.set_map_style(style).await);
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(());
                break;
            }
        }
    }

    tracing::info!("Viewer session stopped");
}

/// Cloneable handle to a running session. All calls are serialized by the
/// session task in the order they arrive.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
}

impl SessionHandle {
    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.tx.send(command(reply)).await.map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)
    }

    /// Reads and parses every file on its own task, committing each one as it
    /// completes. The report lists files in selection order.
    pub async fn ingest(&self, sources: Vec<GpxSource>) -> BatchReport {
        let sources = ingest::expand_selection(sources);
        let file_names: Vec<String> = sources.iter().map(GpxSource::file_name).collect();

        let tasks = sources.into_iter().map(|source| {
            let session = self.clone();
            tokio::spawn(async move {
                match ingest::load_source(&source).await {
                    Ok(parsed) => session.commit(parsed).await,
                    Err(err) => Err(err),
                }
            })
        });

        let mut report = BatchReport::default();
        for (file_name, joined) in file_names.into_iter().zip(join_all(tasks).await) {
            let result = joined.unwrap_or_else(|err| Err(IngestError::Read(format!("ingest task failed: {err}"))));
            report.record(file_name, result);
        }

        tracing::info!("Ingested {} of {} files", report.ingested.len(), report.ingested.len() + report.skipped.len());
        report
    }

    async fn commit(&self, parsed: ParsedTrack) -> Result<TrackId, IngestError> {
        self.request(|reply| Command::Ingest { parsed, reply }).await
            .map_err(|_| IngestError::SessionClosed)?
            .map_err(IngestError::from)
    }

    pub async fn update_color(&self, id: TrackId, color: Color) -> Result<(), SessionError> {
        Ok(self.request(|reply| Command::UpdateColor { id, color, reply }).await??)
    }

    pub async fn reset(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Reset { reply }).await
    }

    /// The renderer's one-shot load signal. Later calls do nothing.
    pub async fn renderer_loaded(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::RendererLoaded { reply }).await
    }

    pub async fn tracks(&self) -> Result<Vec<TrackSummary>, SessionError> {
        self.request(|reply| Command::Tracks { reply }).await
    }

    pub async fn bounds(&self) -> Result<Option<Bounds>, SessionError> {
        self.request(|reply| Command::Bounds { reply }).await
    }

    pub async fn query_at(&self, point: Coord<f64>) -> Result<Vec<LayerFeature>, SessionError> {
        self.request(|reply| Command::QueryAt { point, reply }).await
    }

    pub async fn snapshot(&self) -> Result<PersistedSnapshot, SessionError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub async fn settings(&self) -> Result<UiSettings, SessionError> {
        self.request(|reply| Command::Settings { reply }).await
    }

    pub async fn set_sidebar_open(&self, open: bool) -> Result<UiSettings, SessionError> {
        self.request(|reply| Command::SetSidebarOpen { open, reply }).await
    }

    pub async fn set_map_style(&self, style: Option<String>) -> Result<UiSettings, SessionError> {
        self.request(|reply| Command::SetMapStyle { style, reply }).await
    }

    /// Stops the session task once every earlier command has been handled.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }
}
