use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single remote request (feed, weather, icon or image).
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The server answered with a non-success HTTP status.
    #[error("server responded with HTTP {0}")]
    Status(u16),

    /// The response body could not be interpreted.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Connection, DNS or other transport level failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Outcome of a catalog poll that produced no snapshot.
#[derive(Debug, Error)]
pub enum PollError {
    /// Every attempt failed; carries the error of the final attempt.
    #[error("catalog unavailable after {attempts} attempts")]
    Exhausted {
        attempts: u32,
        #[source]
        last: FetchError,
    },

    /// The feed answered successfully but listed no items.
    #[error("catalog is empty")]
    EmptyCatalog,

    /// Shutdown was requested while waiting to retry.
    #[error("poll cancelled")]
    Cancelled,
}

/// Failure while turning a catalog into a cached image set.
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("failed to download item {index} from {url}")]
    Download {
        index: usize,
        url: String,
        #[source]
        source: FetchError,
    },

    /// Decode, crop/scale or encode of a downloaded item failed.
    #[error("failed to prepare item {index}: {reason:#}")]
    Transform { index: usize, reason: anyhow::Error },

    #[error("cache i/o failed at {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The blocking transform worker panicked or was aborted.
    #[error("transform worker failed: {0}")]
    Worker(String),

    #[error("materialize cancelled")]
    Cancelled,
}

impl MaterializeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
