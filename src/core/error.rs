use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// The service answered but refused the request; body kept verbatim.
    #[error("service rejected {action}: {status} {body}")]
    Rejected {
        action: String,
        status: u16,
        body: String,
    },

    #[error("service transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed service response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Remote `.torrent` download failed or outlived its bounded wait.
    #[error("fetch torrent {url}: {source}")]
    TorrentFetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Error, Debug)]
pub enum TorrentError {
    #[error("invalid torrent: {0}")]
    InvalidTorrent(String),

    #[error("invalid magnet link {magnet}: {reason}")]
    InvalidMagnet { magnet: String, reason: String },
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("no proper query processor found for: {0}")]
    UnresolvableSelector(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("task {task} has no file #{index}")]
    SubFileNotFound { task: String, index: usize },

    #[error("task {0} is not a bt task")]
    NotBtTask(String),

    #[error("invalid selector {selector}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("invalid service configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Torrent(#[from] TorrentError),

    #[error("read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, QueryError>;
