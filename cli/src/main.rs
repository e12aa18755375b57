use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use svgpng::{
    add_files, download_all, load_config, sniff, BatchSession, BatchSummary, Config, ConfigError,
    Converter, DetectedFormat, DirectorySink, DiskFile, EntryStatus, ObjectStore,
    ResvgRasterizer, SessionEvent, SessionEventKind, SessionObserver, SourceFile, SvgpngError,
};

#[derive(Debug, Parser)]
#[command(name = "svgpng", version, about = "Convert SVG files to PNG")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Convert SVG files and save the PNGs
    Convert {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Directory the PNG files are written to
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output scale factor, overrides the configuration
        #[arg(long)]
        scale: Option<f64>,

        /// Also write the preview thumbnails into this directory
        #[arg(long)]
        thumbnails: Option<PathBuf>,
    },
    /// Print the detected format of each file
    Sniff {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn init_logging(json: bool) {
    if tracing_log::LogTracer::init().is_err() {
        eprintln!("log bridge already installed");
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(|| fmt::layer().with_target(false)));

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("tracing subscriber already installed");
    }
}

/// Prints entry transitions as they happen.
struct ConsoleObserver;

impl SessionObserver for ConsoleObserver {
    fn on_event(&self, event: &SessionEvent) {
        if let SessionEventKind::EntryChanged { entry } = &event.kind {
            if entry.status == EntryStatus::Converting {
                println!("  converting {}", entry.display_name());
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    info!("svgpng v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Convert {
            files,
            output,
            config,
            scale,
            thumbnails,
        } => {
            let config = match resolve_config(config.as_deref(), scale) {
                Ok(config) => config,
                Err(e) => {
                    error!("{}", e);
                    return ExitCode::FAILURE;
                }
            };
            run_convert(config, files, output, thumbnails).await
        }
        Command::Sniff { files } => {
            let mut ok = true;
            for (path, result) in sniff_paths(&files).await {
                match result {
                    Ok(format) => println!("{}\t{}", format, path.display()),
                    Err(e) => {
                        ok = false;
                        error!("Cannot read {}: {}", path.display(), e);
                    }
                }
            }
            if ok {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn resolve_config(path: Option<&Path>, scale: Option<f64>) -> Result<Config, SvgpngError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    if let Some(scale) = scale {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(ConfigError::Validation {
                message: format!("scale must be a positive number, got {}", scale),
            }
            .into());
        }
        config.scale = scale;
    }
    Ok(config)
}

async fn sniff_paths(paths: &[PathBuf]) -> Vec<(PathBuf, std::io::Result<DetectedFormat>)> {
    let mut results = Vec::with_capacity(paths.len());
    for path in paths {
        let result = match DiskFile::open(path).await {
            Ok(file) => Ok(sniff(&file).await),
            Err(e) => Err(e),
        };
        results.push((path.clone(), result));
    }
    results
}

async fn open_files(paths: &[PathBuf]) -> Vec<Arc<dyn SourceFile>> {
    let mut files: Vec<Arc<dyn SourceFile>> = Vec::with_capacity(paths.len());
    for path in paths {
        match DiskFile::open(path).await {
            Ok(file) => files.push(Arc::new(file)),
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }
    files
}

async fn run_convert(
    config: Config,
    paths: Vec<PathBuf>,
    output: PathBuf,
    thumbnails: Option<PathBuf>,
) -> ExitCode {
    let store = ObjectStore::new();
    let session = BatchSession::from_config(&config, store.clone(), Arc::new(ConsoleObserver));
    let rasterizer = ResvgRasterizer::from_config(&config, store.clone());
    let converter = Converter::from_config(&config, Arc::new(rasterizer));

    let files = open_files(&paths).await;
    let report = add_files(&session, &converter, &config, files).await;
    for rejection in &report.rejected {
        warn!(
            "Rejected {}: {}",
            rejection.name,
            serde_json::to_string(&rejection.reason).unwrap_or_default()
        );
    }
    if report.truncated > 0 {
        warn!(
            "Only {} files fit in one batch, ignored {}",
            config.max_files, report.truncated
        );
    }
    if session.is_empty() {
        error!("No convertible files");
        return ExitCode::FAILURE;
    }

    if let Some(dir) = thumbnails.as_deref() {
        if let Err(e) = write_thumbnails(&session, &store, dir).await {
            warn!("Could not write thumbnails to {}: {}", dir.display(), e);
        }
    }

    let cancel = session.cancel_handle();
    let presses = Arc::new(AtomicUsize::new(0));
    let handler_presses = Arc::clone(&presses);
    let handler = ctrlc::set_handler(move || {
        if handler_presses.fetch_add(1, Ordering::SeqCst) == 0 {
            eprintln!("Cancelling after the current file, press Ctrl-C again to quit");
            cancel.cancel();
        } else {
            std::process::exit(130);
        }
    });
    if let Err(e) = handler {
        warn!("Ctrl-C handler not installed: {}", e);
    }

    let summary = if presses.load(Ordering::SeqCst) > 0 {
        info!("Cancelled before conversion started");
        BatchSummary::skipped_run()
    } else {
        converter.convert_all(&session).await
    };

    for entry in session.snapshot() {
        match entry.status {
            EntryStatus::Done => {
                let size = entry
                    .output_size
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                println!("done     {}  {}", entry.display_name(), size);
            }
            EntryStatus::Error => {
                let message = entry
                    .error_category
                    .map(|c| c.message(&config.errors).to_string())
                    .unwrap_or_default();
                println!("error    {}  {}", entry.display_name(), message);
            }
            status => println!("{:<8} {}", status.to_string(), entry.display_name()),
        }
    }

    let delay = Duration::from_millis(config.download_delay_ms);
    let downloads = download_all(&session, &DirectorySink::new(&output), delay).await;
    for name in &downloads.saved {
        info!("Saved {}", output.join(name).display());
    }

    if summary.failed > 0 || summary.cancelled || downloads.failed > 0 || !report.rejected.is_empty()
    {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn write_thumbnails(
    session: &BatchSession,
    store: &ObjectStore,
    dir: &Path,
) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    for entry in session.snapshot() {
        let Some(bytes) = entry.thumbnail_url.as_deref().and_then(|url| store.resolve(url)) else {
            continue;
        };
        let path = dir.join(format!("{}.thumb.png", entry.name));
        tokio::fs::write(&path, &bytes[..]).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_convert() {
        let cli = Cli::try_parse_from([
            "svgpng", "convert", "a.svg", "b.svg", "-o", "out", "--scale", "3",
        ])
        .unwrap();
        match cli.command {
            Command::Convert {
                files,
                output,
                scale,
                config,
                thumbnails,
            } => {
                assert_eq!(files.len(), 2);
                assert_eq!(output, PathBuf::from("out"));
                assert_eq!(scale, Some(3.0));
                assert!(config.is_none());
                assert!(thumbnails.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_convert_requires_files() {
        assert!(Cli::try_parse_from(["svgpng", "convert"]).is_err());
    }

    #[test]
    fn test_scale_override_is_validated() {
        assert_eq!(resolve_config(None, Some(1.5)).unwrap().scale, 1.5);
        assert!(resolve_config(None, Some(0.0)).is_err());
        assert_eq!(resolve_config(None, None).unwrap().scale, 2.0);
    }

    #[tokio::test]
    async fn test_sniff_paths() {
        let temp = TempDir::new().unwrap();
        let svg = temp.path().join("a.svg");
        let png = temp.path().join("b.bin");
        std::fs::write(&svg, "<svg xmlns=\"http://www.w3.org/2000/svg\"/>").unwrap();
        std::fs::write(&png, [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]).unwrap();

        let results = sniff_paths(&[svg, png, temp.path().join("missing.svg")]).await;

        assert_eq!(results[0].1.as_ref().unwrap(), &DetectedFormat::Svg);
        assert_eq!(results[1].1.as_ref().unwrap(), &DetectedFormat::Png);
        assert!(results[2].1.is_err());
    }
}
