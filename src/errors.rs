use std::path::PathBuf;
use thiserror::Error;

/// The primary error type for whole-run operations in `swapr`.
///
/// Any of these aborts the run before (or instead of) dispatching work.
/// Failures that concern a single file are reported through [`FileError`]
/// instead and never surface here.
#[derive(Error, Debug)]
pub enum Error {
    /// An error related to file system I/O outside of per-file processing.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The root directory, or a path below it, could not be walked.
    #[error("Scan of {root} failed: {source}")]
    Scan {
        root: PathBuf,
        source: ignore::Error,
    },

    /// Invalid or incomplete configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// An error that occurred while parsing a YAML configuration file.
    #[error("Config parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// An error related to JSON serialization.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An error that occurred while building the Rayon thread pool.
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// The work dispatcher could not hand out or collect work.
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// The tracing subscriber could not be installed.
    #[error("Logging setup failed: {0}")]
    Logging(String),
}

/// A convenient type alias for `Result<T, swapr::errors::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Config(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Config(s.to_string())
    }
}

/// A failure confined to one file. The file is skipped and siblings continue.
#[derive(Error, Debug)]
pub enum FileError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The substituted content could not be written back. The original file
    /// is left untouched because writes go through a temporary file.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl FileError {
    pub fn path(&self) -> &PathBuf {
        match self {
            FileError::Read { path, .. } | FileError::Write { path, .. } => path,
        }
    }
}
