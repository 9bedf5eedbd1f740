//! Relational persistence shared by every beholder store.
//!
//! Stores never open connections themselves: they go through a
//! [`ConnectionProvider`], which retries acquisition and releases the
//! connection when the logical operation ends. Each store owns a
//! [`MigrationTable`] and calls [`ensure_schema`] before its first query.

pub mod connection;
pub mod encoding;
pub mod error;
pub mod schema;

pub use {
    connection::{ConnectionProvider, RetryPolicy, with_transaction},
    encoding::repair_utf8,
    error::{Error, Result},
    schema::{
        MigrationStep, MigrationTable, SchemaReport, apply_migrations, ensure_schema, stored_version,
    },
};

/// Current unix time in seconds, as stored in `created_at`/`updated_at`.
#[must_use]
pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
