use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info};
use serde::Serialize;

use crate::config::Config;
use crate::entry::{EntryId, EntrySnapshot, EntryStatus, FileEntry, OutputArtifact};
use crate::error::DownloadError;
use crate::events::{NoopObserver, SessionEvent, SessionEventKind, SessionObserver};
use crate::handle::{ObjectStore, ObjectUrl};
use crate::source::SourceFile;
use crate::svg::Dimensions;

/// Cloneable cancellation flag shared between a session and its callers.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Aggregate entry counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCounts {
    pub total: usize,
    pub pending: usize,
    pub converting: usize,
    pub done: usize,
    pub error: usize,
    /// Done and not saved yet.
    pub downloadable: usize,
}

/// The ordered entry collection plus the flags of the single active batch.
///
/// All methods take `&self`; the collection lock is never held while an
/// observer runs or across an `.await`.
pub struct BatchSession {
    entries: Mutex<Vec<FileEntry>>,
    max_files: usize,
    store: ObjectStore,
    observer: Arc<dyn SessionObserver>,
    converting: AtomicBool,
    downloading: AtomicBool,
    cancel: CancelHandle,
    current: Mutex<Option<EntryId>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BatchSession {
    pub fn new(max_files: usize) -> Self {
        Self::with_observer(max_files, ObjectStore::new(), Arc::new(NoopObserver))
    }

    pub fn with_observer(
        max_files: usize,
        store: ObjectStore,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            max_files,
            store,
            observer,
            converting: AtomicBool::new(false),
            downloading: AtomicBool::new(false),
            cancel: CancelHandle::default(),
            current: Mutex::new(None),
        }
    }

    pub fn from_config(
        config: &Config,
        store: ObjectStore,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        Self::with_observer(config.max_files, store, observer)
    }

    /// Registry that owns every thumbnail and output handle of this session.
    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remaining_capacity(&self) -> usize {
        self.max_files.saturating_sub(self.len())
    }

    /// Snapshots of every entry, in collection order.
    pub fn snapshot(&self) -> Vec<EntrySnapshot> {
        lock(&self.entries).iter().map(FileEntry::snapshot).collect()
    }

    pub fn entry(&self, id: EntryId) -> Option<EntrySnapshot> {
        self.with_entry(id, |e| e.snapshot())
    }

    pub fn status(&self, id: EntryId) -> Option<EntryStatus> {
        self.with_entry(id, |e| e.status())
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.with_entry(id, |_| ()).is_some()
    }

    pub fn file(&self, id: EntryId) -> Option<Arc<dyn SourceFile>> {
        self.with_entry(id, |e| Arc::clone(e.file()))
    }

    pub fn ids(&self) -> Vec<EntryId> {
        lock(&self.entries).iter().map(FileEntry::id).collect()
    }

    pub fn pending_ids(&self) -> Vec<EntryId> {
        self.ids_where(|e| e.status() == EntryStatus::Pending)
    }

    pub fn downloadable_ids(&self) -> Vec<EntryId> {
        self.ids_where(FileEntry::is_downloadable)
    }

    pub fn counts(&self) -> SessionCounts {
        let entries = lock(&self.entries);
        let mut counts = SessionCounts {
            total: entries.len(),
            ..SessionCounts::default()
        };
        for entry in entries.iter() {
            match entry.status() {
                EntryStatus::Pending => counts.pending += 1,
                EntryStatus::Converting => counts.converting += 1,
                EntryStatus::Done => counts.done += 1,
                EntryStatus::Error => counts.error += 1,
            }
            if entry.is_downloadable() {
                counts.downloadable += 1;
            }
        }
        counts
    }

    pub fn is_converting(&self) -> bool {
        self.converting.load(Ordering::SeqCst)
    }

    pub fn is_downloading(&self) -> bool {
        self.downloading.load(Ordering::SeqCst)
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Entry currently mid-conversion, if any.
    pub fn current(&self) -> Option<EntryId> {
        *lock(&self.current)
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Asks the active run to stop at its next check point. Entries are kept.
    pub fn request_cancel(&self) {
        info!("Cancellation requested");
        self.cancel.cancel();
    }

    /// Appends `entry` unless the session is full, in which case the entry
    /// is dropped and `None` returned.
    pub fn insert(&self, entry: FileEntry) -> Option<EntryId> {
        let (id, snapshot) = {
            let mut entries = lock(&self.entries);
            if entries.len() >= self.max_files {
                debug!("Session full, dropping {}", entry.name());
                return None;
            }
            let id = entry.id();
            let snapshot = entry.snapshot();
            entries.push(entry);
            (id, snapshot)
        };

        self.emit(SessionEventKind::EntryAdded { entry: snapshot });
        self.emit_counts();
        Some(id)
    }

    /// Removes an entry in any state and releases its handles. A conversion
    /// in flight for it is discarded when it resolves.
    pub fn remove(&self, id: EntryId) -> bool {
        let removed = {
            let mut entries = lock(&self.entries);
            entries
                .iter()
                .position(|e| e.id() == id)
                .map(|idx| entries.remove(idx))
        };
        let Some(mut entry) = removed else {
            return false;
        };

        {
            let mut current = lock(&self.current);
            if *current == Some(id) {
                *current = None;
            }
        }
        entry.release_handles();
        debug!("Removed entry {} ({})", id, entry.name());

        self.emit(SessionEventKind::EntryRemoved { id });
        self.emit_counts();
        true
    }

    /// Cancels any active run and removes every entry, releasing all handles.
    /// Returns the number of entries removed.
    pub fn clear_all(&self) -> usize {
        self.cancel.cancel();
        *lock(&self.current) = None;

        let drained: Vec<FileEntry> = std::mem::take(&mut *lock(&self.entries));
        let removed = drained.len();
        for mut entry in drained {
            entry.release_handles();
        }
        info!("Cleared {} entries", removed);

        self.emit(SessionEventKind::Cleared { removed });
        self.emit_counts();
        removed
    }

    /// Attaches a preview to a live entry. Returns `false` (and drops the
    /// handle) when the entry is gone.
    pub fn set_thumbnail(&self, id: EntryId, url: ObjectUrl, natural_size: Dimensions) -> bool {
        let snapshot = self.with_entry_mut(id, |e| {
            e.set_thumbnail(url, natural_size);
            e.snapshot()
        });
        match snapshot {
            Some(entry) => {
                self.emit(SessionEventKind::EntryChanged { entry });
                true
            }
            None => false,
        }
    }

    /// Bytes and filename of a finished entry.
    pub fn artifact_for_download(
        &self,
        id: EntryId,
    ) -> Result<(String, Arc<[u8]>), DownloadError> {
        let found = self.with_entry(id, |e| match e.output() {
            Some(output) if output.url.is_released() => Err(DownloadError::Released(id.to_string())),
            Some(output) => Ok((e.suggested_filename(), Arc::clone(&output.bytes))),
            None => Err(DownloadError::NotReady(id.to_string())),
        });
        found.unwrap_or_else(|| Err(DownloadError::NotReady(id.to_string())))
    }

    pub fn mark_downloaded(&self, id: EntryId) -> bool {
        let snapshot = self.with_entry_mut(id, |e| {
            e.mark_downloaded();
            e.snapshot()
        });
        match snapshot {
            Some(entry) => {
                self.emit(SessionEventKind::EntryChanged { entry });
                self.emit_counts();
                true
            }
            None => false,
        }
    }

    /// `pending → converting` for a live entry; hands back its source file.
    pub(crate) fn begin_entry(&self, id: EntryId) -> Option<Arc<dyn SourceFile>> {
        let started = self.with_entry_mut(id, |e| {
            e.start_converting().ok()?;
            Some((Arc::clone(e.file()), e.snapshot()))
        });
        let (file, snapshot) = started.flatten()?;

        *lock(&self.current) = Some(id);
        self.emit(SessionEventKind::EntryChanged { entry: snapshot });
        Some(file)
    }

    /// `converting → done`. Returns `false` if the entry vanished or left
    /// `converting` meanwhile; the artifact is then dropped.
    pub(crate) fn complete_entry(&self, id: EntryId, artifact: OutputArtifact) -> bool {
        let snapshot = self.with_entry_mut(id, |e| e.complete(artifact).ok().map(|_| e.snapshot()));
        self.finish_transition(snapshot.flatten())
    }

    /// `converting → error` with the raw failure message.
    pub(crate) fn fail_entry(&self, id: EntryId, message: String) -> bool {
        let snapshot = self.with_entry_mut(id, |e| e.fail(message).ok().map(|_| e.snapshot()));
        self.finish_transition(snapshot.flatten())
    }

    pub(crate) fn clear_current(&self, id: EntryId) {
        let mut current = lock(&self.current);
        if *current == Some(id) {
            *current = None;
        }
    }

    /// Claims the single run slot and clears stale cancellation.
    pub(crate) fn try_begin_run(&self) -> bool {
        if self
            .converting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        self.cancel.reset();
        true
    }

    pub(crate) fn finish_run(&self) {
        *lock(&self.current) = None;
        self.cancel.reset();
        self.converting.store(false, Ordering::SeqCst);
    }

    pub(crate) fn try_begin_download(&self) -> bool {
        self.downloading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn finish_download(&self) {
        self.downloading.store(false, Ordering::SeqCst);
    }

    pub(crate) fn emit(&self, kind: SessionEventKind) {
        self.observer.on_event(&SessionEvent::new(kind));
    }

    fn emit_counts(&self) {
        let counts = self.counts();
        self.emit(SessionEventKind::CountsChanged {
            pending: counts.pending,
            downloadable: counts.downloadable,
        });
    }

    fn finish_transition(&self, snapshot: Option<EntrySnapshot>) -> bool {
        match snapshot {
            Some(entry) => {
                self.emit(SessionEventKind::EntryChanged { entry });
                self.emit_counts();
                true
            }
            None => false,
        }
    }

    fn with_entry<R>(&self, id: EntryId, f: impl FnOnce(&FileEntry) -> R) -> Option<R> {
        lock(&self.entries).iter().find(|e| e.id() == id).map(f)
    }

    fn with_entry_mut<R>(&self, id: EntryId, f: impl FnOnce(&mut FileEntry) -> R) -> Option<R> {
        lock(&self.entries).iter_mut().find(|e| e.id() == id).map(f)
    }

    fn ids_where(&self, pred: impl Fn(&FileEntry) -> bool) -> Vec<EntryId> {
        lock(&self.entries)
            .iter()
            .filter(|e| pred(e))
            .map(FileEntry::id)
            .collect()
    }
}

impl std::fmt::Debug for BatchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchSession")
            .field("len", &self.len())
            .field("max_files", &self.max_files)
            .field("converting", &self.is_converting())
            .field("cancel_requested", &self.is_cancel_requested())
            .finish()
    }
}
