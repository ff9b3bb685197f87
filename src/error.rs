//! Error types for the watcher.
use nix::errno::Errno;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The path already had an entry; the requested mask was merged into it.
    #[error("already watching {}", .0.display())]
    AlreadyWatching(PathBuf),

    #[error("not watching {}", .0.display())]
    NotWatching(PathBuf),

    #[error("no events requested for {}", .0.display())]
    NoEvents(PathBuf),

    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: Errno,
    },

    #[error("failed to subscribe {}: {source}", .path.display())]
    Subscribe {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to unsubscribe {}: {source}", .path.display())]
    Unsubscribe {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Registration state for `path` may no longer match the kernel. The
    /// monitor stops when it hits this.
    #[error("watch state for {} is inconsistent: {source}", .path.display())]
    Inconsistent {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("watcher is closed")]
    Closed,

    #[error("monitor thread panicked")]
    MonitorPanicked,

    #[error("kqueue is not available on this platform")]
    Unsupported,

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid toml config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn inconsistent(path: impl Into<PathBuf>, source: Error) -> Self {
        Error::Inconsistent {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// True when the failure means the path disappeared before it could be
    /// opened.
    pub(crate) fn is_vanished(&self) -> bool {
        matches!(
            self,
            Error::Open {
                source: Errno::ENOENT,
                ..
            }
        )
    }
}
