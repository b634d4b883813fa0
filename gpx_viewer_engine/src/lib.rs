use std::path::PathBuf;

use const_format::concatcp;

pub mod bounds;
pub mod config;
pub mod gpx_util;
pub mod ingest;
pub mod metrics;
pub mod persistence;
pub mod render;
pub mod session;
pub mod track_store;

#[cfg(test)]
pub(crate) mod test_util;

pub use config::ViewerConfig;
pub use ingest::{BatchReport, GpxSource};
pub use session::{SessionError, SessionHandle, ViewerState};

pub const DATA_DIR: &str = "data/";
pub const DATABASE_PATH: &str = concatcp!(DATA_DIR, "gpx_viewer.db");

/// `DATABASE_PATH` under the project root, or under the working directory if
/// no project root can be found.
pub fn default_database_path() -> PathBuf {
    project_root::get_project_root()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(DATABASE_PATH)
}
