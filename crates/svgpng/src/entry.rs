//! Per-file lifecycle: `pending → converting → done | error`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classify::{classify, ErrorCategory};
use crate::error::TransitionError;
use crate::handle::ObjectUrl;
use crate::raster::PixelSize;
use crate::source::SourceFile;
use crate::svg::Dimensions;
use crate::util::base_name;

/// Opaque identifier of an entry, unique for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for EntryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Converting,
    Done,
    Error,
}

impl EntryStatus {
    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: EntryStatus) -> bool {
        matches!(
            (self, next),
            (EntryStatus::Pending, EntryStatus::Converting)
                | (EntryStatus::Converting, EntryStatus::Done)
                | (EntryStatus::Converting, EntryStatus::Error)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, EntryStatus::Done | EntryStatus::Error)
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryStatus::Pending => write!(f, "pending"),
            EntryStatus::Converting => write!(f, "converting"),
            EntryStatus::Done => write!(f, "done"),
            EntryStatus::Error => write!(f, "error"),
        }
    }
}

/// Converted output owned by a `done` entry.
#[derive(Debug)]
pub struct OutputArtifact {
    pub bytes: Arc<[u8]>,
    pub url: ObjectUrl,
    pub size: PixelSize,
}

/// One uploaded file tracked through conversion.
#[derive(Debug)]
pub struct FileEntry {
    id: EntryId,
    file: Arc<dyn SourceFile>,
    name: String,
    input_format: String,
    output_format: String,
    status: EntryStatus,
    progress: u8,
    thumbnail: Option<ObjectUrl>,
    natural_size: Option<Dimensions>,
    output: Option<OutputArtifact>,
    error: Option<String>,
    downloaded: bool,
    added_at: DateTime<Utc>,
}

impl FileEntry {
    /// Creates a `pending` entry. `input_format` is stored uppercased.
    pub fn new(file: Arc<dyn SourceFile>, input_format: &str, output_format: &str) -> Self {
        let name = base_name(file.name()).to_string();
        Self {
            id: EntryId::new(),
            file,
            name,
            input_format: input_format.to_uppercase(),
            output_format: output_format.to_string(),
            status: EntryStatus::Pending,
            progress: 0,
            thumbnail: None,
            natural_size: None,
            output: None,
            error: None,
            downloaded: false,
            added_at: Utc::now(),
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn file(&self) -> &Arc<dyn SourceFile> {
        &self.file
    }

    /// Display base name, without the original extension.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_format(&self) -> &str {
        &self.input_format
    }

    pub fn output_format(&self) -> &str {
        &self.output_format
    }

    pub fn status(&self) -> EntryStatus {
        self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn thumbnail(&self) -> Option<&ObjectUrl> {
        self.thumbnail.as_ref()
    }

    pub fn natural_size(&self) -> Option<Dimensions> {
        self.natural_size
    }

    pub fn output(&self) -> Option<&OutputArtifact> {
        self.output.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn error_category(&self) -> Option<ErrorCategory> {
        (self.status == EntryStatus::Error).then(|| classify(self.error.as_deref()))
    }

    pub fn is_downloaded(&self) -> bool {
        self.downloaded
    }

    /// Finished and not saved yet.
    pub fn is_downloadable(&self) -> bool {
        self.status == EntryStatus::Done && self.output.is_some() && !self.downloaded
    }

    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }

    /// `<basename>.<output format>`
    pub fn suggested_filename(&self) -> String {
        format!("{}.{}", self.name, self.output_format)
    }

    /// Base name with the detected input format as extension, for display.
    pub fn display_name(&self) -> String {
        format!("{}.{}", self.name, self.input_format.to_lowercase())
    }

    fn transition(&mut self, to: EntryStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(TransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// `pending → converting`
    pub fn start_converting(&mut self) -> Result<(), TransitionError> {
        self.transition(EntryStatus::Converting)?;
        self.progress = 0;
        Ok(())
    }

    /// `converting → done`. The artifact is dropped (and its handle released)
    /// if the transition is refused.
    pub fn complete(&mut self, artifact: OutputArtifact) -> Result<(), TransitionError> {
        self.transition(EntryStatus::Done)?;
        self.output = Some(artifact);
        self.progress = 100;
        self.downloaded = false;
        self.error = None;
        Ok(())
    }

    /// `converting → error`, keeping the raw message for classification.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(EntryStatus::Error)?;
        self.error = Some(message.into());
        self.progress = 0;
        Ok(())
    }

    /// Attaches a preview, releasing any previous one.
    pub fn set_thumbnail(&mut self, url: ObjectUrl, natural_size: Dimensions) {
        if let Some(mut old) = self.thumbnail.replace(url) {
            old.release();
        }
        self.natural_size = Some(natural_size);
    }

    pub fn mark_downloaded(&mut self) {
        self.downloaded = true;
    }

    /// Releases the thumbnail and output handles. Safe to call repeatedly.
    pub fn release_handles(&mut self) {
        if let Some(thumbnail) = self.thumbnail.as_mut() {
            thumbnail.release();
        }
        if let Some(output) = self.output.as_mut() {
            output.url.release();
        }
    }

    pub fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            id: self.id,
            name: self.name.clone(),
            input_format: self.input_format.clone(),
            output_format: self.output_format.clone(),
            status: self.status,
            progress: self.progress,
            size: self.file.size(),
            natural_size: self.natural_size,
            output_size: self.output.as_ref().map(|o| o.size),
            output_bytes: self.output.as_ref().map(|o| o.bytes.len()),
            thumbnail_url: self
                .thumbnail
                .as_ref()
                .filter(|u| !u.is_released())
                .map(|u| u.as_str().to_string()),
            output_url: self
                .output
                .as_ref()
                .filter(|o| !o.url.is_released())
                .map(|o| o.url.as_str().to_string()),
            error: self.error.clone(),
            error_category: self.error_category(),
            downloaded: self.downloaded,
            added_at: self.added_at,
        }
    }
}

/// Serializable read-only view of an entry, handed to observers and the CLI.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySnapshot {
    pub id: EntryId,
    pub name: String,
    pub input_format: String,
    pub output_format: String,
    pub status: EntryStatus,
    pub progress: u8,
    /// Source size in bytes.
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub natural_size: Option<Dimensions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_size: Option<PixelSize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
    pub downloaded: bool,
    pub added_at: DateTime<Utc>,
}

impl EntrySnapshot {
    pub fn suggested_filename(&self) -> String {
        format!("{}.{}", self.name, self.output_format)
    }

    pub fn display_name(&self) -> String {
        format!("{}.{}", self.name, self.input_format.to_lowercase())
    }
}
