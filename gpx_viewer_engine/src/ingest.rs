use std::path::PathBuf;

use gpx_viewer_lib::track::TrackId;
use serde::Serialize;

use crate::{
    gpx_util::{self, ParseError, ParsedTrack},
    track_store::StoreError,
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IngestError {
    #[error("failed to read file: {0}")]
    Read(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("session is closed")]
    SessionClosed,
}

/// One user-selected GPX file.
#[derive(Debug, Clone, PartialEq)]
pub enum GpxSource {
    Path(PathBuf),
    Text { file_name: String, text: String },
}

impl GpxSource {
    pub fn text(file_name: impl Into<String>, text: impl Into<String>) -> Self {
        GpxSource::Text { file_name: file_name.into(), text: text.into() }
    }

    pub fn file_name(&self) -> String {
        match self {
            GpxSource::Path(path) => path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            GpxSource::Text { file_name, .. } => file_name.clone(),
        }
    }

    pub async fn read(&self) -> Result<String, IngestError> {
        match self {
            GpxSource::Path(path) => tokio::fs::read_to_string(path).await
                .map_err(|err| IngestError::Read(format!("{}: {err}", path.display()))),
            GpxSource::Text { text, .. } => Ok(text.clone()),
        }
    }
}

/// A selection of exactly one file is ingested as two independent tracks.
pub fn expand_selection(mut sources: Vec<GpxSource>) -> Vec<GpxSource> {
    if let [only] = sources.as_slice() {
        let duplicate = only.clone();
        sources.push(duplicate);
    }
    sources
}

/// Reads and parses one file. Runs outside the session, so it never touches state.
pub async fn load_source(source: &GpxSource) -> Result<ParsedTrack, IngestError> {
    let text = source.read().await?;
    Ok(gpx_util::parse_gpx(&text)?)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestedFile {
    pub file_name: String,
    pub track_id: TrackId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFile {
    pub file_name: String,
    pub reason: String,
}

/// Per-file outcome of one ingestion batch, in selection order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub ingested: Vec<IngestedFile>,
    pub skipped: Vec<SkippedFile>,
}

impl BatchReport {
    pub fn record(&mut self, file_name: String, result: Result<TrackId, IngestError>) {
        match result {
            Ok(track_id) => self.ingested.push(IngestedFile { file_name, track_id }),
            Err(err) => {
                tracing::warn!("Skipping {file_name}: {err}");
                self.skipped.push(SkippedFile { file_name, reason: err.to_string() });
            }
        }
    }

    pub fn track_ids(&self) -> Vec<TrackId> {
        self.ingested.iter().map(|file| file.track_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util;

    #[test]
    fn single_file_is_duplicated() {
        let expanded = expand_selection(vec![GpxSource::text("a.gpx", "x")]);
        assert_eq!(expanded, vec![GpxSource::text("a.gpx", "x"), GpxSource::text("a.gpx", "x")]);

        let two = vec![GpxSource::text("a.gpx", "x"), GpxSource::text("b.gpx", "y")];
        assert_eq!(expand_selection(two.clone()), two);
        assert!(expand_selection(Vec::new()).is_empty());
    }

    #[test]
    fn file_name_from_path() {
        assert_eq!(GpxSource::Path(PathBuf::from("data/gpx/run.gpx")).file_name(), "run.gpx");
        assert_eq!(GpxSource::text("upload.gpx", "").file_name(), "upload.gpx");
    }

    #[tokio::test]
    async fn load_text_source() {
        let parsed = load_source(&GpxSource::text("run.gpx", test_util::morning_run())).await.unwrap();
        assert_eq!(parsed.name, "14/08/2023 - MorningRun");
        assert_eq!(parsed.geometry.0.len(), 3);
    }

    #[tokio::test]
    async fn load_path_source() {
        let path = std::env::temp_dir().join(format!("gpx_viewer_ingest_{}.gpx", std::process::id()));
        tokio::fs::write(&path, test_util::gpx_document("Commute", &[(10.2, 56.1), (10.3, 56.2)])).await.unwrap();

        let parsed = load_source(&GpxSource::Path(path.clone())).await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        assert_eq!(parsed.name, "Commute");
    }

    #[tokio::test]
    async fn load_errors() {
        let missing = load_source(&GpxSource::Path(PathBuf::from("/definitely/not/here.gpx"))).await;
        assert!(matches!(missing, Err(IngestError::Read(_))));

        let malformed = load_source(&GpxSource::text("bad.gpx", test_util::MALFORMED)).await;
        assert!(matches!(malformed, Err(IngestError::Parse(ParseError::Malformed(_)))));
    }

    #[test]
    fn report_keeps_outcomes_apart() {
        let mut report = BatchReport::default();
        report.record("a.gpx".into(), Ok(TrackId(0)));
        report.record("b.gpx".into(), Err(IngestError::Parse(ParseError::MissingTrack)));

        assert_eq!(report.track_ids(), vec![TrackId(0)]);
        assert_eq!(report.skipped, vec![SkippedFile {
            file_name: "b.gpx".into(),
            reason: "GPX document contains no track".into(),
        }]);
    }
}
