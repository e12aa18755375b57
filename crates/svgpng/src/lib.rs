pub mod batch;
pub mod classify;
pub mod config;
pub mod download;
pub mod entry;
pub mod error;
pub mod events;
pub mod handle;
pub mod intake;
pub mod raster;
pub mod report;
pub mod sniff;
pub mod source;
pub mod svg;
pub mod util;

pub use batch::{BatchSession, BatchSummary, CancelHandle, Converter, SessionCounts};
pub use classify::{classify, ErrorCategory};
pub use config::{load_config, load_config_from_str, Config};
pub use download::{download, download_all, ArtifactSink, DirectorySink, MemorySink};
pub use entry::{EntryId, EntrySnapshot, EntryStatus};
pub use error::{
    ConfigError, ConvertError, DownloadError, RasterError, Result, SinkError, SvgpngError,
    TransitionError,
};
pub use events::{SessionBroadcaster, SessionEvent, SessionEventKind, SessionObserver};
pub use handle::{ObjectStore, ObjectUrl};
pub use intake::{add_files, IntakeReport};
pub use raster::{PixelSize, Rasterizer, ResvgRasterizer};
pub use report::ErrorReporter;
pub use sniff::{sniff, DetectedFormat};
pub use source::{DiskFile, MemoryFile, SourceFile};
