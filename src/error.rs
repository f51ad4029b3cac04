use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Transport Errors
    #[error("HTTP status {status} from {url}")]
    HttpStatus {
        url: String,
        status: u16,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Malformed body from {url}: {reason}")]
    MalformedBody {
        url: String,
        reason: String,
    },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Archive member not found: {0}")]
    MissingArchiveMember(String),

    #[error("Bulk feed fetch failed for {key}: {reason}")]
    CacheFetchFailed {
        key: String,
        reason: String,
    },

    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    // Resolution Errors
    #[error("Source {source_id} did not answer: {reason}")]
    FetchFailed {
        source_id: String,
        reason: String,
    },

    #[error("Source {source_id} answered but no strategy produced a complete quote")]
    ParseFailed {
        source_id: String,
    },

    // Configuration Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("No quote sources configured")]
    NoSourcesConfigured,

    // Observability Errors
    #[error("Metrics error: {0}")]
    MetricsError(#[from] prometheus::Error),

    // IO Errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    /// True for errors meaning "the source did not answer", as opposed to
    /// "answered with something we could not use".
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            Error::HttpStatus { .. }
                | Error::Transport(_)
                | Error::Timeout(_)
                | Error::MalformedBody { .. }
                | Error::Archive(_)
                | Error::MissingArchiveMember(_)
                | Error::CacheFetchFailed { .. }
                | Error::UnknownEndpoint(_)
                | Error::FetchFailed { .. }
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            Error::HttpStatus {
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
                status: status.as_u16(),
            }
        } else {
            Error::Transport(err.to_string())
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::FileNotFound => Error::MissingArchiveMember(err.to_string()),
            other => Error::Archive(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
