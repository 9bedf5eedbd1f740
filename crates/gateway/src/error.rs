use std::{io, path::PathBuf};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The control socket could not be bound, reached or written.
    #[error("control socket {}: {source}", path.display())]
    Socket {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Channels(#[from] beholder_channels::Error),

    #[error(transparent)]
    Quotes(#[from] beholder_quotes::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn socket(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Socket {
            path: path.into(),
            source,
        }
    }
}
