//! Test harness for isolated conversion sessions.
//!
//! The `TestHarness` owns temp input/output directories, a session wired to an
//! event recorder, and a converter using the real `resvg` rasterizer.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;

use svgpng::download::DownloadSummary;
use svgpng::{
    add_files, download_all, BatchSession, BatchSummary, Config, Converter, DirectorySink,
    DiskFile, EntryId, EntrySnapshot, IntakeReport, MemoryFile, ObjectStore, ResvgRasterizer,
    SessionEvent, SessionEventKind, SessionObserver, SourceFile,
};

/// Records every session event for later assertions.
#[derive(Default)]
pub struct EventRecorder {
    events: Mutex<Vec<SessionEvent>>,
}

impl SessionObserver for EventRecorder {
    fn on_event(&self, event: &SessionEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

impl EventRecorder {
    pub fn kinds(&self) -> Vec<SessionEventKind> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.kind.clone())
            .collect()
    }
}

/// Test harness providing an isolated session for integration tests.
pub struct TestHarness {
    temp_dir: TempDir,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub config: Config,
    pub store: ObjectStore,
    pub session: BatchSession,
    pub converter: Converter,
    pub events: Arc<EventRecorder>,
}

impl TestHarness {
    /// Create a harness with default configuration.
    pub fn new() -> Self {
        Self::with_config(crate::common::ConfigBuilder::new().build())
    }

    pub fn with_config(config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let input_dir = temp_dir.path().join("input");
        let output_dir = temp_dir.path().join("output");
        std::fs::create_dir_all(&input_dir).expect("Failed to create input dir");

        let store = ObjectStore::new();
        let events = Arc::new(EventRecorder::default());
        let session = BatchSession::from_config(
            &config,
            store.clone(),
            Arc::clone(&events) as Arc<dyn SessionObserver>,
        );
        let rasterizer = ResvgRasterizer::from_config(&config, store.clone());
        let converter = Converter::from_config(&config, Arc::new(rasterizer));

        Self {
            temp_dir,
            input_dir,
            output_dir,
            config,
            store,
            session,
            converter,
            events,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write a file into the input directory.
    pub fn write_input(&self, filename: &str, content: &[u8]) -> PathBuf {
        let path = self.input_dir.join(filename);
        std::fs::write(&path, content).expect("Failed to write input file");
        path
    }

    /// Write a file into the input directory and open it as a source.
    pub async fn disk_file(&self, filename: &str, content: &[u8]) -> Arc<dyn SourceFile> {
        let path = self.write_input(filename, content);
        Arc::new(DiskFile::open(path).await.expect("Failed to open input file"))
    }

    pub fn memory_file(filename: &str, content: &[u8]) -> Arc<dyn SourceFile> {
        Arc::new(MemoryFile::new(filename, content.to_vec()))
    }

    pub async fn add(&self, files: Vec<Arc<dyn SourceFile>>) -> IntakeReport {
        add_files(&self.session, &self.converter, &self.config, files).await
    }

    pub async fn convert_all(&self) -> BatchSummary {
        self.converter.convert_all(&self.session).await
    }

    pub async fn download_all(&self) -> DownloadSummary {
        let sink = DirectorySink::new(&self.output_dir);
        download_all(
            &self.session,
            &sink,
            Duration::from_millis(self.config.download_delay_ms),
        )
        .await
    }

    pub fn entry(&self, id: EntryId) -> EntrySnapshot {
        self.session.entry(id).expect("entry should exist")
    }

    /// Dimensions of a PNG written to the output directory.
    pub fn output_dimensions(&self, filename: &str) -> (u32, u32) {
        use image::GenericImageView;
        let bytes = std::fs::read(self.output_dir.join(filename)).expect("Failed to read output");
        image::load_from_memory(&bytes)
            .expect("output should be a valid image")
            .dimensions()
    }
}
