//! Connection acquisition with bounded retry, and transaction scoping.

use std::{str::FromStr, time::Duration};

use {
    futures::future::BoxFuture,
    sqlx::{ConnectOptions, Connection, SqliteConnection, sqlite::SqliteConnectOptions},
    tracing::{debug, info, warn},
};

use crate::error::{Error, Result};

/// Default number of connection attempts before giving up.
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 12;

/// Default spacing between connection attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Fixed-delay retry policy for connection acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Never zero.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

/// Hands out one live connection per logical operation.
///
/// Connections are opened on demand and closed as soon as the operation
/// returns, so the bot and the control process never hold the database open
/// between operations.
#[derive(Debug, Clone)]
pub struct ConnectionProvider {
    options: SqliteConnectOptions,
    retry: RetryPolicy,
}

impl ConnectionProvider {
    /// Parse `url` (e.g. `sqlite:/var/lib/beholder/beholder.db`). The database
    /// file is created on first connect if it does not exist yet.
    pub fn new(url: &str, retry: RetryPolicy) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|source| Error::InvalidUrl {
                url: url.to_owned(),
                source,
            })?
            .create_if_missing(true);
        Ok(Self { options, retry })
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Open a connection, retrying with a fixed delay.
    ///
    /// Fails with [`Error::Connectivity`] carrying the last fault once every
    /// attempt has been used.
    pub async fn connect(&self) -> Result<SqliteConnection> {
        let max_attempts = self.retry.max_attempts;
        let mut attempt = 1;
        loop {
            match self.options.connect().await {
                Ok(conn) => {
                    if attempt > 1 {
                        info!(attempt, max_attempts, "connected to database");
                    }
                    return Ok(conn);
                },
                Err(source) if attempt >= max_attempts => {
                    return Err(Error::Connectivity {
                        attempts: attempt,
                        source,
                    });
                },
                Err(error) => {
                    warn!(
                        attempt,
                        max_attempts,
                        error = %error,
                        "database connection failed, retrying"
                    );
                    tokio::time::sleep(self.retry.delay).await;
                    attempt += 1;
                },
            }
        }
    }

    /// Run `f` with a freshly acquired connection.
    ///
    /// The connection is closed once `f` completes, whether it succeeded or
    /// not; if `f` panics the connection is dropped during unwinding.
    pub async fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T>>,
    {
        let mut conn = self.connect().await?;
        let result = f(&mut conn).await;
        if let Err(error) = conn.close().await {
            debug!(error = %error, "closing database connection failed");
        }
        result
    }
}

/// Run `f` inside a transaction on `conn`.
///
/// Commits when `f` succeeds. Any error from `f` rolls the transaction back
/// and is returned unchanged.
pub async fn with_transaction<T, F>(conn: &mut SqliteConnection, f: F) -> Result<T>
where
    F: for<'t> FnOnce(&'t mut SqliteConnection) -> BoxFuture<'t, Result<T>>,
{
    let mut tx = conn.begin().await?;
    match f(&mut *tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        },
        Err(error) => {
            if let Err(rollback) = tx.rollback().await {
                warn!(error = %rollback, "transaction rollback failed");
            }
            Err(error)
        },
    }
}
