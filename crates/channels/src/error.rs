/// Crate-wide result type for channel operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The identifier is empty once markers are stripped.
    #[error("invalid channel name: {input:?}")]
    InvalidChannel { input: String },

    #[error(transparent)]
    Persistence(#[from] beholder_persistence::Error),
}

impl Error {
    #[must_use]
    pub fn invalid_channel(input: impl std::fmt::Display) -> Self {
        Self::InvalidChannel {
            input: input.to_string(),
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(source: sqlx::Error) -> Self {
        Self::Persistence(source.into())
    }
}
