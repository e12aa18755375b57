use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::Config;
use crate::entry::{EntryId, OutputArtifact};
use crate::error::ConvertError;
use crate::events::SessionEventKind;
use crate::raster::{self, Rasterizer, RasterImage, PNG_MIME};
use crate::report::ErrorReporter;
use crate::source::SourceFile;
use crate::svg::fill_missing_dimensions;

use super::session::BatchSession;

/// Outcome counts of one `convert_all` invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    /// `false` when the call was refused because a run was already active
    /// or nothing was pending.
    pub started: bool,
    /// Pending entries captured when the run began.
    pub total: usize,
    pub converted: usize,
    pub failed: usize,
    /// Visited or left behind without a result (cancelled or removed).
    pub skipped: usize,
    pub cancelled: bool,
}

impl BatchSummary {
    pub fn skipped_run() -> Self {
        Self::default()
    }
}

enum EntryOutcome {
    Converted,
    Failed,
    Skipped,
}

/// Drives entries through conversion, one at a time.
pub struct Converter {
    rasterizer: Arc<dyn Rasterizer>,
    scale: f64,
    thumbnail_size: u32,
    reporter: Option<Arc<ErrorReporter>>,
}

impl Converter {
    pub fn new(rasterizer: Arc<dyn Rasterizer>) -> Self {
        Self {
            rasterizer,
            scale: 2.0,
            thumbnail_size: 200,
            reporter: None,
        }
    }

    pub fn from_config(config: &Config, rasterizer: Arc<dyn Rasterizer>) -> Self {
        let reporter = Arc::new(ErrorReporter::new(&config.diagnostics));
        Self {
            rasterizer,
            scale: config.scale,
            thumbnail_size: config.thumbnail_size,
            reporter: reporter.is_enabled().then_some(reporter),
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_thumbnail_size(mut self, edge: u32) -> Self {
        self.thumbnail_size = edge;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<ErrorReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn thumbnail_size(&self) -> u32 {
        self.thumbnail_size
    }

    /// Renders and attaches the preview for `id`. The entry stays usable
    /// for conversion when this fails.
    pub async fn generate_thumbnail(
        &self,
        session: &BatchSession,
        id: EntryId,
    ) -> Result<(), ConvertError> {
        let Some(file) = session.file(id) else {
            return Ok(());
        };
        let markup = read_markup(file.as_ref()).await?;
        let (image, natural) =
            raster::thumbnail(self.rasterizer.as_ref(), &markup, self.thumbnail_size).await?;

        let url = session.store().create_url(image.data.into(), PNG_MIME);
        if !session.set_thumbnail(id, url, natural) {
            debug!(entry_id = %id, "entry removed before its thumbnail was ready");
        }
        Ok(())
    }

    /// Converts every entry that is `pending` right now, in collection order.
    ///
    /// Returns immediately with [`BatchSummary::skipped_run`] if a run is
    /// already active. Cancellation is checked before each entry starts;
    /// removal also after its source is read and after rasterization.
    pub async fn convert_all(&self, session: &BatchSession) -> BatchSummary {
        if !session.try_begin_run() {
            debug!("batch already running, ignoring request");
            return BatchSummary::skipped_run();
        }

        let pending = session.pending_ids();
        if pending.is_empty() {
            session.finish_run();
            return BatchSummary::skipped_run();
        }

        let mut summary = BatchSummary {
            started: true,
            total: pending.len(),
            ..BatchSummary::default()
        };
        info!("Converting {} entries", pending.len());
        session.emit(SessionEventKind::BatchStarted {
            pending: pending.len(),
        });

        for id in pending {
            if session.is_cancel_requested() {
                summary.cancelled = true;
                break;
            }
            match self.convert_entry(session, id).await {
                EntryOutcome::Converted => summary.converted += 1,
                EntryOutcome::Failed => summary.failed += 1,
                EntryOutcome::Skipped => {}
            }
        }

        summary.cancelled |= session.is_cancel_requested();
        summary.skipped = summary.total - summary.converted - summary.failed;
        session.finish_run();

        info!(
            "Batch finished: {} converted, {} failed, {} skipped",
            summary.converted, summary.failed, summary.skipped
        );
        session.emit(SessionEventKind::BatchFinished { summary });
        summary
    }

    async fn convert_entry(&self, session: &BatchSession, id: EntryId) -> EntryOutcome {
        let Some(file) = session.begin_entry(id) else {
            debug!(entry_id = %id, "entry no longer pending, skipping");
            return EntryOutcome::Skipped;
        };

        let span = info_span!("convert", entry_id = %id, name = file.name());
        let outcome = self.run_entry(session, id, file).instrument(span).await;
        session.clear_current(id);
        outcome
    }

    async fn run_entry(
        &self,
        session: &BatchSession,
        id: EntryId,
        file: Arc<dyn SourceFile>,
    ) -> EntryOutcome {
        let markup = match read_markup(file.as_ref()).await {
            Ok(markup) => markup,
            Err(e) => return self.record_failure(session, id, file.as_ref(), e),
        };
        if abandoned(session, id) {
            return EntryOutcome::Skipped;
        }

        let result = raster::convert_full(self.rasterizer.as_ref(), &markup, self.scale).await;
        if abandoned(session, id) {
            return EntryOutcome::Skipped;
        }

        match result {
            Ok(image) => record_success(session, id, image),
            Err(e) => self.record_failure(session, id, file.as_ref(), e.into()),
        }
    }

    fn record_failure(
        &self,
        session: &BatchSession,
        id: EntryId,
        file: &dyn SourceFile,
        error: ConvertError,
    ) -> EntryOutcome {
        if abandoned(session, id) {
            return EntryOutcome::Skipped;
        }

        let message = error.to_string();
        warn!(error = %message, "conversion failed");
        if let Some(reporter) = &self.reporter {
            reporter.spawn_report(
                message.clone(),
                serde_json::json!({
                    "op": "convert",
                    "format": crate::util::file_extension(file.name()),
                    "fileSize": file.size(),
                }),
            );
        }

        if session.fail_entry(id, message) {
            EntryOutcome::Failed
        } else {
            EntryOutcome::Skipped
        }
    }
}

fn record_success(session: &BatchSession, id: EntryId, image: RasterImage) -> EntryOutcome {
    let bytes: Arc<[u8]> = image.data.into();
    let artifact = OutputArtifact {
        url: session.store().create_url(Arc::clone(&bytes), PNG_MIME),
        bytes,
        size: image.size,
    };

    if session.complete_entry(id, artifact) {
        debug!(size = %image.size, "converted");
        EntryOutcome::Converted
    } else {
        EntryOutcome::Skipped
    }
}

/// Removed while in flight. `clear_all` also lands here since it drops every
/// entry; a plain cancel request lets the in-flight entry finish.
fn abandoned(session: &BatchSession, id: EntryId) -> bool {
    if !session.contains(id) {
        debug!(entry_id = %id, "entry removed, discarding");
        true
    } else {
        false
    }
}

async fn read_markup(file: &dyn SourceFile) -> Result<String, ConvertError> {
    let text = file.read_text().await.map_err(|source| ConvertError::Read {
        name: file.name().to_string(),
        source,
    })?;
    Ok(fill_missing_dimensions(&text))
}
