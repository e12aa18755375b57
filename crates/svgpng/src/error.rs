use std::path::PathBuf;
use thiserror::Error;

use crate::entry::EntryStatus;

#[derive(Error, Debug)]
pub enum SvgpngError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),

    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    #[error("Invalid state transition: {0}")]
    Transition(#[from] TransitionError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Failures of the decode → draw → encode pipeline.
///
/// The display strings double as the raw messages fed to the error
/// classifier, so they carry the keywords it looks for.
#[derive(Error, Debug)]
pub enum RasterError {
    #[error("Failed to load SVG: the source image could not be decoded ({0})")]
    Decode(String),

    #[error("Failed to create PNG: encoding failed ({0})")]
    Encode(String),

    #[error("Failed to allocate a {width}x{height} raster: out of memory")]
    Allocate { width: u32, height: u32 },

    #[error("Rasterization task aborted: {0}")]
    Task(String),
}

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Failed to read '{name}': {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Raster(#[from] RasterError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot move entry from {from} to {to}")]
pub struct TransitionError {
    pub from: EntryStatus,
    pub to: EntryStatus,
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid output filename: {0}")]
    InvalidFilename(String),
}

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Entry {0} has no converted output")]
    NotReady(String),

    #[error("Output for entry {0} was already released")]
    Released(String),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

pub type Result<T> = std::result::Result<T, SvgpngError>;
