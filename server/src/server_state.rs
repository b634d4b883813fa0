use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gpx_viewer_engine::{persistence::KeyValueStore, render::LayerCanvas, SessionError, SessionHandle, ViewerConfig, ViewerState};

pub struct ServerState {
    pub session: SessionHandle,
    // Shared with the session, which draws into it
    pub canvas: Arc<Mutex<LayerCanvas>>,
}

impl ServerState {
    /// Opens a session on `store` drawing into a fresh canvas. The canvas is
    /// ready immediately, so the session is told the renderer has loaded.
    pub async fn start(config: ViewerConfig, store: Arc<dyn KeyValueStore>) -> Result<Self, SessionError> {
        let canvas = Arc::new(Mutex::new(LayerCanvas::from_config(&config)));
        let session = ViewerState::open(config, store, Box::new(canvas.clone())).await.start();
        session.renderer_loaded().await?;

        Ok(Self { session, canvas })
    }

    pub fn canvas(&self) -> MutexGuard<'_, LayerCanvas> {
        self.canvas.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
