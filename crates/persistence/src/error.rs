use thiserror::Error;

/// Errors raised by the persistence layer.
#[derive(Debug, Error)]
pub enum Error {
    /// The store stayed unreachable for every connection attempt.
    #[error("database unreachable after {attempts} attempt(s): {source}")]
    Connectivity {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },

    /// The stored schema is newer than anything this build knows how to run.
    #[error(
        "schema `{schema}` is at version {stored}, newer than the latest known version {latest}"
    )]
    SchemaMismatch {
        schema: String,
        stored: i64,
        latest: u32,
    },

    /// A statement of a migration step failed; the version marker was left untouched.
    #[error("schema `{schema}` failed to migrate to version {version}: {source}")]
    Migration {
        schema: String,
        version: u32,
        #[source]
        source: sqlx::Error,
    },

    #[error("invalid migration table: {message}")]
    InvalidMigrationTable { message: String },

    #[error("invalid database url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: sqlx::Error,
    },

    /// A single query failed.
    #[error(transparent)]
    Query(#[from] sqlx::Error),
}

impl Error {
    #[must_use]
    pub fn invalid_migration_table(message: impl Into<String>) -> Self {
        Self::InvalidMigrationTable {
            message: message.into(),
        }
    }

    /// Whether the error means the store could not be reached at all.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
