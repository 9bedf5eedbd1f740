pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("quote is empty")]
    Empty,

    #[error("quote is {chars} characters long, the limit is {max}")]
    TooLong { chars: usize, max: usize },

    #[error(transparent)]
    Persistence(#[from] beholder_persistence::Error),
}

impl From<sqlx::Error> for Error {
    fn from(source: sqlx::Error) -> Self {
        Self::Persistence(source.into())
    }
}
