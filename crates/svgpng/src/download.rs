//! Saving finished artifacts.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::batch::BatchSession;
use crate::entry::EntryId;
use crate::error::{DownloadError, SinkError};

/// Destination for converted files.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Stores `bytes` under (a variant of) `filename` and returns the name
    /// actually used.
    async fn save(&self, filename: &str, bytes: &[u8]) -> Result<String, SinkError>;
}

/// Writes artifacts into a directory, never overwriting existing files:
/// `logo.png` becomes `logo (1).png` when taken.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn unique_path(&self, filename: &str) -> PathBuf {
        let candidate = self.dir.join(filename);
        if !path_exists(&candidate).await {
            return candidate;
        }

        let (stem, ext) = match filename.rfind('.') {
            Some(idx) if idx > 0 => (&filename[..idx], &filename[idx..]),
            _ => (filename, ""),
        };
        let mut n = 1;
        loop {
            let candidate = self.dir.join(format!("{} ({}){}", stem, n, ext));
            if !path_exists(&candidate).await {
                return candidate;
            }
            n += 1;
        }
    }
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

fn validate_filename(filename: &str) -> Result<(), SinkError> {
    let invalid = filename.is_empty()
        || filename == "."
        || filename == ".."
        || filename.contains(['/', '\\', '\0']);
    if invalid {
        return Err(SinkError::InvalidFilename(filename.to_string()));
    }
    Ok(())
}

#[async_trait]
impl ArtifactSink for DirectorySink {
    async fn save(&self, filename: &str, bytes: &[u8]) -> Result<String, SinkError> {
        validate_filename(filename)?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| SinkError::CreateDirectory {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.unique_path(filename).await;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| SinkError::WriteFile {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), bytes = bytes.len(), "artifact saved");
        Ok(path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| filename.to_string()))
    }
}

/// Keeps saved artifacts in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    saved: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything saved so far, in save order.
    pub fn saved(&self) -> Vec<(String, Vec<u8>)> {
        self.saved
            .lock()
            .map(|saved| saved.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ArtifactSink for MemorySink {
    async fn save(&self, filename: &str, bytes: &[u8]) -> Result<String, SinkError> {
        validate_filename(filename)?;
        if let Ok(mut saved) = self.saved.lock() {
            saved.push((filename.to_string(), bytes.to_vec()));
        }
        Ok(filename.to_string())
    }
}

/// Saves one finished entry and marks it downloaded.
pub async fn download(
    session: &BatchSession,
    sink: &dyn ArtifactSink,
    id: EntryId,
) -> Result<String, DownloadError> {
    let (filename, bytes) = session.artifact_for_download(id)?;
    let saved_as = sink.save(&filename, &bytes).await?;
    session.mark_downloaded(id);
    Ok(saved_as)
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadSummary {
    /// `false` when another batch download was already running.
    pub started: bool,
    pub saved: Vec<String>,
    pub failed: usize,
}

struct DownloadGuard<'a>(&'a BatchSession);

impl Drop for DownloadGuard<'_> {
    fn drop(&mut self) {
        self.0.finish_download();
    }
}

/// Saves every finished, not yet downloaded entry, waiting `delay` between
/// consecutive saves. Only one batch download runs at a time.
pub async fn download_all(
    session: &BatchSession,
    sink: &dyn ArtifactSink,
    delay: Duration,
) -> DownloadSummary {
    if !session.try_begin_download() {
        debug!("download already in progress");
        return DownloadSummary::default();
    }
    let _guard = DownloadGuard(session);

    let ids = session.downloadable_ids();
    let mut summary = DownloadSummary {
        started: true,
        ..DownloadSummary::default()
    };

    for (i, id) in ids.into_iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match download(session, sink, id).await {
            Ok(name) => summary.saved.push(name),
            Err(e) => {
                warn!(entry_id = %id, error = %e, "download failed");
                summary.failed += 1;
            }
        }
    }

    info!("Saved {} files ({} failed)", summary.saved.len(), summary.failed);
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Converter;
    use crate::entry::{EntryStatus, FileEntry};
    use crate::raster::ResvgRasterizer;
    use crate::source::{MemoryFile, SourceFile};
    use std::sync::Arc;
    use tempfile::TempDir;

    const SVG: &[u8] = br#"<svg viewBox="0 0 4 4"><rect width="4" height="4"/></svg>"#;

    async fn converted_session(names: &[&str]) -> (BatchSession, Vec<EntryId>) {
        let session = BatchSession::new(10);
        let ids = names
            .iter()
            .map(|name| {
                let file: Arc<dyn SourceFile> = Arc::new(MemoryFile::new(*name, SVG.to_vec()));
                session.insert(FileEntry::new(file, "svg", "png")).unwrap()
            })
            .collect();
        Converter::new(Arc::new(ResvgRasterizer::new(session.store().clone())))
            .convert_all(&session)
            .await;
        (session, ids)
    }

    #[tokio::test]
    async fn test_download_marks_entry() {
        let (session, ids) = converted_session(&["logo.svg"]).await;
        let sink = MemorySink::new();

        let name = download(&session, &sink, ids[0]).await.unwrap();

        assert_eq!(name, "logo.png");
        assert!(session.entry(ids[0]).unwrap().downloaded);
        let saved = sink.saved();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].1.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[tokio::test]
    async fn test_download_requires_done() {
        let session = BatchSession::new(10);
        let file: Arc<dyn SourceFile> = Arc::new(MemoryFile::new("a.svg", SVG.to_vec()));
        let id = session.insert(FileEntry::new(file, "svg", "png")).unwrap();

        let err = download(&session, &MemorySink::new(), id).await.unwrap_err();
        assert!(matches!(err, DownloadError::NotReady(_)));
        assert_eq!(session.status(id), Some(EntryStatus::Pending));
    }

    #[tokio::test]
    async fn test_download_all_skips_downloaded() {
        let (session, ids) = converted_session(&["a.svg", "b.svg", "c.svg"]).await;
        let sink = MemorySink::new();
        download(&session, &sink, ids[1]).await.unwrap();

        let summary = download_all(&session, &sink, Duration::from_millis(1)).await;

        assert!(summary.started);
        assert_eq!(summary.saved, vec!["a.png", "c.png"]);
        assert_eq!(session.counts().downloadable, 0);
        assert!(!session.is_downloading());
    }

    #[tokio::test]
    async fn test_directory_sink_never_overwrites() {
        let temp = TempDir::new().unwrap();
        let sink = DirectorySink::new(temp.path().join("out"));

        assert_eq!(sink.save("logo.png", b"1").await.unwrap(), "logo.png");
        assert_eq!(sink.save("logo.png", b"2").await.unwrap(), "logo (1).png");
        assert_eq!(sink.save("logo.png", b"3").await.unwrap(), "logo (2).png");

        let first = std::fs::read(temp.path().join("out/logo.png")).unwrap();
        assert_eq!(first, b"1");
    }

    #[tokio::test]
    async fn test_directory_sink_rejects_paths() {
        let temp = TempDir::new().unwrap();
        let sink = DirectorySink::new(temp.path());
        assert!(matches!(
            sink.save("../escape.png", b"x").await,
            Err(SinkError::InvalidFilename(_))
        ));
        assert!(sink.save("", b"x").await.is_err());
    }
}
