//! Admission of user-supplied files into a session.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::batch::{BatchSession, Converter};
use crate::config::Config;
use crate::entry::{EntryId, FileEntry};
use crate::sniff::{sniff, DetectedFormat};
use crate::source::SourceFile;
use crate::util::file_extension;

/// Why a file was not admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum RejectReason {
    UnsupportedFormat { format: String },
    TooLarge { size: u64, max: u64 },
    SessionFull,
}

#[derive(Debug, Clone, Serialize)]
pub struct Rejection {
    pub name: String,
    #[serde(flatten)]
    pub reason: RejectReason,
}

/// What happened to a batch of candidate files. Rejections are never
/// surfaced as errors; this is for logging and hosts that want to know.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeReport {
    pub added: Vec<EntryId>,
    pub rejected: Vec<Rejection>,
    /// Candidates cut off because the session had no room for them.
    pub truncated: usize,
    pub thumbnail_failures: usize,
}

/// Picks the format token an upload is treated as.
///
/// A recognized content signature decides on its own, so PNG bytes named
/// `.svg` are refused. Only when sniffing is inconclusive does the claimed
/// extension count.
pub fn resolve_format(
    detected: DetectedFormat,
    filename: &str,
    config: &Config,
) -> Result<String, RejectReason> {
    let format = if detected.is_known() {
        detected.as_str().to_string()
    } else {
        file_extension(filename)
    };

    if config.accepts(&format) {
        Ok(format)
    } else {
        Err(RejectReason::UnsupportedFormat { format })
    }
}

/// Validates `files` and appends the accepted ones to `session`, rendering a
/// thumbnail for each.
///
/// The candidate list is first cut to the session's remaining capacity; then
/// every file is sniffed and checked against the accepted formats and the size
/// limit. Thumbnail failures are logged and leave the entry without preview.
pub async fn add_files(
    session: &BatchSession,
    converter: &Converter,
    config: &Config,
    files: Vec<Arc<dyn SourceFile>>,
) -> IntakeReport {
    let mut report = IntakeReport::default();

    let remaining = session.remaining_capacity();
    let mut files = files;
    if files.len() > remaining {
        report.truncated = files.len() - remaining;
        files.truncate(remaining);
        debug!("Session has room for {} files, ignoring {}", remaining, report.truncated);
    }

    for file in files {
        let name = file.name().to_string();

        let detected = sniff(file.as_ref()).await;
        let format = match resolve_format(detected, &name, config) {
            Ok(format) => format,
            Err(reason) => {
                debug!(file = %name, %detected, "rejected: unsupported format");
                report.rejected.push(Rejection { name, reason });
                continue;
            }
        };

        if file.size() > config.max_size {
            debug!(file = %name, size = file.size(), "rejected: too large");
            report.rejected.push(Rejection {
                name,
                reason: RejectReason::TooLarge {
                    size: file.size(),
                    max: config.max_size,
                },
            });
            continue;
        }

        let entry = FileEntry::new(file, &format, &config.output_format);
        let Some(id) = session.insert(entry) else {
            report.rejected.push(Rejection {
                name,
                reason: RejectReason::SessionFull,
            });
            continue;
        };
        report.added.push(id);

        if let Err(e) = converter.generate_thumbnail(session, id).await {
            warn!(file = %name, error = %e, "thumbnail generation failed");
            report.thumbnail_failures += 1;
        }
    }

    report
}
