use std::{fmt, io, path::PathBuf};

use reqwest::StatusCode;
use thiserror::Error;

/// The stage of a download session an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Resolution,
    Fetch,
    Assembly,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Phase::Resolution => write!(f, "resolution"),
            Phase::Fetch => write!(f, "fetch"),
            Phase::Assembly => write!(f, "assembly"),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid input url '{url}': {reason}")]
    InvalidInput { url: String, reason: String },

    #[error("could not build http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} returned status {status}")]
    HttpStatus { url: String, status: StatusCode },

    #[error("could not find a media id in the metadata page {url}")]
    Parse { url: String },

    #[error("invalid Content-Type from {url}: want {expected}, got '{got}'")]
    UnexpectedContentType {
        url: String,
        expected: &'static str,
        got: String,
    },

    #[error("{url} did not report a Content-Length")]
    MissingLength { url: String },

    #[error("invalid Content-Length '{value}' from {url}")]
    InvalidLength { url: String, value: String },

    #[error("invalid byte range {start}-{stop} for a resource of {length} bytes")]
    InvalidRange { start: u64, stop: u64, length: u64 },

    #[error("could not read response body from {url}: {source}")]
    Read {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("chunk {index} came back with {received} bytes, expected {expected}")]
    ChunkLength {
        index: u64,
        expected: u64,
        received: u64,
    },

    #[error("chunk {index} failed: {source}")]
    Chunk {
        index: u64,
        #[source]
        source: Box<FetchError>,
    },

    #[error("chunk task did not complete: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("missing chunk {index} at {}: {source}", path.display())]
    MissingChunk {
        index: u64,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not write output file {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("output file already exists: {}", .0.display())]
    OutputExists(PathBuf),

    #[error("assembled {written} bytes but the resource is {expected} bytes")]
    SizeMismatch { expected: u64, written: u64 },
}

impl FetchError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FetchError::Io {
            path: path.into(),
            source,
        }
    }

    /// Which stage of the session failed. Request errors are attributed to
    /// resolution unless they were raised by a chunk worker.
    pub fn phase(&self) -> Phase {
        match self {
            FetchError::InvalidInput { .. }
            | FetchError::Client(_)
            | FetchError::Network { .. }
            | FetchError::HttpStatus { .. }
            | FetchError::Parse { .. }
            | FetchError::UnexpectedContentType { .. }
            | FetchError::MissingLength { .. }
            | FetchError::InvalidLength { .. }
            | FetchError::Read { .. } => Phase::Resolution,
            FetchError::InvalidRange { .. }
            | FetchError::ChunkLength { .. }
            | FetchError::Chunk { .. }
            | FetchError::Task(_)
            | FetchError::Io { .. } => Phase::Fetch,
            FetchError::MissingChunk { .. }
            | FetchError::Output { .. }
            | FetchError::OutputExists(_)
            | FetchError::SizeMismatch { .. } => Phase::Assembly,
        }
    }
}
