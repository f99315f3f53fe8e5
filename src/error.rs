use std::path::PathBuf;
use thiserror::Error;

/// Failures talking to the video platform, either during search or while
/// fetching a single video's metadata.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetrievalError {
    #[error("platform unreachable: {0}")]
    Unreachable(String),

    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    #[error("search returned no results")]
    NoResults,

    #[error("video unavailable: {0}")]
    Unavailable(String),

    #[error("rate limit or quota exceeded: {0}")]
    RateLimited(String),

    #[error("platform error {status}: {message}")]
    Platform { status: u16, message: String },

    #[error("could not parse platform response: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for RetrievalError {
    fn from(err: serde_json::Error) -> Self {
        RetrievalError::Parse(err.to_string())
    }
}

/// Malformed input, detected before any network call.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("search query must not be empty")]
    EmptyQuery,

    #[error("max videos must be a positive integer, got {0}")]
    NonPositiveMaxVideos(i64),

    #[error("unsupported output format '{0}' (only 'json' is supported)")]
    UnsupportedOutputFormat(String),

    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("the api backend needs an API key (--api-key or YOUTUBE_API_KEY)")]
    MissingApiKey,

    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("invalid resolution '{0}' (use best, worst or a height such as 720)")]
    InvalidResolution(String),

    #[error("invalid file format '{0}'")]
    InvalidFileFormat(String),

    #[error("download limit must be at least 1")]
    ZeroLimit,
}

/// The output document could not be produced or written.
#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot encode results: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("search for '{query}' failed: {source}")]
    Search {
        query: String,
        #[source]
        source: RetrievalError,
    },

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

pub type Result<T> = std::result::Result<T, CrawlError>;

/// Failures of the downloader, either for the whole run (unreadable input)
/// or for a single video.
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a list of video records: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no videos found in {0}")]
    Empty(PathBuf),

    #[error("download of {id} failed: {source}")]
    Fetch {
        id: String,
        #[source]
        source: RetrievalError,
    },

    #[error("cannot create {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Sidecar(#[from] SerializationError),
}
