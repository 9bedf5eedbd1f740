//! Versioned schemas.
//!
//! Every logical schema (`core`, `quotes`, ...) owns an ordered
//! [`MigrationTable`] and a row in the shared `schema_versions` marker table.
//! [`ensure_schema`] brings a schema from its stored version to the latest
//! version of its table. Each step runs in its own transaction together with
//! the marker update, so a failed step leaves the previous version recorded
//! and the next start resumes from there.

use {
    sqlx::SqliteConnection,
    tracing::{debug, info},
};

use crate::{
    connection::{ConnectionProvider, with_transaction},
    error::{Error, Result},
    unix_now,
};

/// Name of the table holding one version marker per schema.
pub const VERSION_TABLE: &str = "schema_versions";

const CREATE_VERSION_TABLE: &str = "CREATE TABLE schema_versions (
    schema_name TEXT    PRIMARY KEY NOT NULL,
    version     INTEGER NOT NULL CHECK (version >= 0),
    updated_at  INTEGER NOT NULL
)";

/// Statements that take a schema from `version - 1` to `version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStep {
    version: u32,
    statements: Vec<String>,
}

impl MigrationStep {
    pub fn new<I, S>(version: u32, statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            version,
            statements: statements.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    #[must_use]
    pub fn statements(&self) -> &[String] {
        &self.statements
    }
}

/// Ordered, validated list of migration steps for one schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationTable {
    steps: Vec<MigrationStep>,
}

impl MigrationTable {
    /// Versions must start above zero and strictly increase; every step needs
    /// at least one statement.
    pub fn new(steps: Vec<MigrationStep>) -> Result<Self> {
        if steps.is_empty() {
            return Err(Error::invalid_migration_table("no migration steps"));
        }
        let mut previous = 0;
        for step in &steps {
            if step.version <= previous {
                return Err(Error::invalid_migration_table(format!(
                    "version {} does not follow version {previous}",
                    step.version
                )));
            }
            if step.statements.is_empty() {
                return Err(Error::invalid_migration_table(format!(
                    "version {} has no statements",
                    step.version
                )));
            }
            previous = step.version;
        }
        Ok(Self { steps })
    }

    #[must_use]
    pub fn latest_version(&self) -> u32 {
        self.steps.last().map_or(0, MigrationStep::version)
    }

    #[must_use]
    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    /// Steps strictly newer than `version`; all of them when `version` is `None`.
    pub fn steps_after(&self, version: Option<u32>) -> impl Iterator<Item = &MigrationStep> {
        let floor = version.unwrap_or(0);
        self.steps.iter().filter(move |step| step.version > floor)
    }
}

/// Outcome of one [`ensure_schema`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaReport {
    pub schema: String,
    /// Version found in the marker table, `None` for a fresh store.
    pub from: Option<u32>,
    pub to: u32,
    pub statements_applied: usize,
}

impl SchemaReport {
    /// Whether the schema was already current.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.from == Some(self.to)
    }
}

/// Bring `schema` up to the latest version of `table`, on a connection of its
/// own.
pub async fn ensure_schema(
    provider: &ConnectionProvider,
    schema: &str,
    table: &MigrationTable,
) -> Result<SchemaReport> {
    let schema = schema.to_owned();
    let table = table.clone();
    provider
        .with_connection(move |conn| {
            Box::pin(async move { apply_migrations(conn, &schema, &table).await })
        })
        .await
}

/// Bring `schema` up to the latest version of `table` on `conn`.
///
/// A stored version newer than the table fails with
/// [`Error::SchemaMismatch`] and nothing is touched.
pub async fn apply_migrations(
    conn: &mut SqliteConnection,
    schema: &str,
    table: &MigrationTable,
) -> Result<SchemaReport> {
    ensure_version_table(conn).await?;

    let latest = table.latest_version();
    let stored = stored_version(conn, schema).await?;
    let from = match stored {
        Some(version) if version > i64::from(latest) => {
            return Err(Error::SchemaMismatch {
                schema: schema.to_owned(),
                stored: version,
                latest,
            });
        },
        Some(version) => u32::try_from(version).ok(),
        None => None,
    };

    if from == Some(latest) {
        debug!(schema, version = latest, "schema is current");
        return Ok(SchemaReport {
            schema: schema.to_owned(),
            from,
            to: latest,
            statements_applied: 0,
        });
    }

    let mut statements_applied = 0;
    for step in table.steps_after(from) {
        let version = step.version();
        let schema_name = schema.to_owned();
        let step = step.clone();
        statements_applied += with_transaction(conn, move |tx| {
            Box::pin(async move { apply_step(tx, &schema_name, &step).await })
        })
        .await?;
        debug!(schema, version, "migration step applied");
    }

    info!(
        schema,
        from = ?from,
        to = latest,
        statements_applied,
        "schema migrated"
    );
    Ok(SchemaReport {
        schema: schema.to_owned(),
        from,
        to: latest,
        statements_applied,
    })
}

/// Stored version marker of `schema`, `None` when it has never been migrated.
///
/// The marker table must exist; [`ensure_schema`] creates it.
pub async fn stored_version(conn: &mut SqliteConnection, schema: &str) -> Result<Option<i64>> {
    let version = sqlx::query_scalar("SELECT version FROM schema_versions WHERE schema_name = ?")
        .bind(schema)
        .fetch_optional(conn)
        .await?;
    Ok(version)
}

async fn apply_step(
    tx: &mut SqliteConnection,
    schema: &str,
    step: &MigrationStep,
) -> Result<usize> {
    for statement in step.statements() {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .map_err(|source| Error::Migration {
                schema: schema.to_owned(),
                version: step.version,
                source,
            })?;
    }
    sqlx::query(
        "INSERT INTO schema_versions (schema_name, version, updated_at)
         VALUES (?, ?, ?)
         ON CONFLICT(schema_name) DO UPDATE SET
            version    = excluded.version,
            updated_at = excluded.updated_at",
    )
    .bind(schema)
    .bind(i64::from(step.version))
    .bind(unix_now())
    .execute(&mut *tx)
    .await?;
    Ok(step.statements.len())
}

async fn ensure_version_table(conn: &mut SqliteConnection) -> Result<()> {
    let existing: Option<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(VERSION_TABLE)
            .fetch_optional(&mut *conn)
            .await?;
    if existing.is_some() {
        return Ok(());
    }
    create_version_table(conn).await
}

async fn create_version_table(conn: &mut SqliteConnection) -> Result<()> {
    match sqlx::query(CREATE_VERSION_TABLE).execute(conn).await {
        Ok(_) => {
            debug!("created schema version table");
            Ok(())
        },
        // Another process won the race between our check and the create.
        Err(error) if is_already_exists(&error) => Ok(()),
        Err(error) => Err(error.into()),
    }
}

fn is_already_exists(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.message().contains("already exists"))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::connection::RetryPolicy,
        std::time::Duration,
        tempfile::TempDir,
    };

    fn provider(dir: &TempDir) -> ConnectionProvider {
        let url = format!("sqlite:{}", dir.path().join("schema.db").display());
        ConnectionProvider::new(&url, RetryPolicy::new(1, Duration::from_millis(1))).unwrap()
    }

    fn table(steps: &[(u32, &[&str])]) -> MigrationTable {
        MigrationTable::new(
            steps
                .iter()
                .map(|(version, statements)| MigrationStep::new(*version, statements.iter().copied()))
                .collect(),
        )
        .unwrap()
    }

    fn core_v2() -> MigrationTable {
        table(&[
            (1, &["CREATE TABLE a (id INTEGER PRIMARY KEY, name TEXT NOT NULL)"]),
            (2, &[
                "CREATE TABLE b (id INTEGER PRIMARY KEY)",
                "CREATE INDEX b_id ON b (id)",
            ]),
        ])
    }

    async fn version_of(provider: &ConnectionProvider, schema: &'static str) -> Option<i64> {
        provider
            .with_connection(move |conn| Box::pin(stored_version(conn, schema)))
            .await
            .unwrap()
    }

    async fn table_exists(provider: &ConnectionProvider, name: &'static str) -> bool {
        provider
            .with_connection(move |conn| {
                Box::pin(async move {
                    let found: Option<String> = sqlx::query_scalar(
                        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
                    )
                    .bind(name)
                    .fetch_optional(conn)
                    .await?;
                    Ok::<_, Error>(found.is_some())
                })
            })
            .await
            .unwrap()
    }

    async fn exec(provider: &ConnectionProvider, sql: &'static str) {
        provider
            .with_connection(move |conn| {
                Box::pin(async move {
                    sqlx::query(sql).execute(conn).await?;
                    Ok::<_, Error>(())
                })
            })
            .await
            .unwrap();
    }

    #[test]
    fn table_validation() {
        assert!(MigrationTable::new(vec![]).is_err());
        assert!(MigrationTable::new(vec![MigrationStep::new(0, ["SELECT 1"])]).is_err());
        assert!(
            MigrationTable::new(vec![
                MigrationStep::new(2, ["SELECT 1"]),
                MigrationStep::new(2, ["SELECT 1"]),
            ])
            .is_err()
        );
        assert!(MigrationTable::new(vec![MigrationStep::new(1, Vec::<String>::new())]).is_err());

        let valid = core_v2();
        assert_eq!(valid.latest_version(), 2);
        assert_eq!(valid.steps_after(None).count(), 2);
        assert_eq!(valid.steps_after(Some(1)).count(), 1);
        assert_eq!(valid.steps_after(Some(2)).count(), 0);
    }

    #[tokio::test]
    async fn fresh_store_gets_every_step() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(&dir);

        let report = ensure_schema(&provider, "core", &core_v2()).await.unwrap();
        assert_eq!(report.from, None);
        assert_eq!(report.to, 2);
        assert_eq!(report.statements_applied, 3);
        assert!(!report.is_current());
        assert_eq!(version_of(&provider, "core").await, Some(2));
        assert!(table_exists(&provider, "a").await);
        assert!(table_exists(&provider, "b").await);
    }

    #[tokio::test]
    async fn current_store_applies_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(&dir);
        ensure_schema(&provider, "core", &core_v2()).await.unwrap();

        let report = ensure_schema(&provider, "core", &core_v2()).await.unwrap();
        assert!(report.is_current());
        assert_eq!(report.statements_applied, 0);
    }

    #[tokio::test]
    async fn older_store_gets_only_newer_steps() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(&dir);
        let v1 = table(&[(1, &[
            "CREATE TABLE a (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
        ])]);
        ensure_schema(&provider, "core", &v1).await.unwrap();
        exec(&provider, "INSERT INTO a (name) VALUES ('kept')").await;

        let report = ensure_schema(&provider, "core", &core_v2()).await.unwrap();
        assert_eq!(report.from, Some(1));
        assert_eq!(report.statements_applied, 2);
        assert_eq!(version_of(&provider, "core").await, Some(2));

        let rows: i64 = provider
            .with_connection(|conn| {
                Box::pin(async move {
                    Ok::<i64, Error>(
                        sqlx::query_scalar("SELECT COUNT(*) FROM a")
                            .fetch_one(conn)
                            .await?,
                    )
                })
            })
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn newer_store_is_a_mismatch_and_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(&dir);
        ensure_schema(&provider, "core", &core_v2()).await.unwrap();

        let v1 = table(&[(1, &["CREATE TABLE never (id INTEGER)"])]);
        let err = ensure_schema(&provider, "core", &v1).await.unwrap_err();
        assert!(matches!(
            err,
            Error::SchemaMismatch {
                stored: 2,
                latest: 1,
                ..
            }
        ));
        assert_eq!(version_of(&provider, "core").await, Some(2));
        assert!(!table_exists(&provider, "never").await);
    }

    #[tokio::test]
    async fn failed_step_keeps_previous_marker_and_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(&dir);
        let broken = table(&[
            (1, &["CREATE TABLE a (id INTEGER PRIMARY KEY, name TEXT NOT NULL)"]),
            (2, &["CREATE TABLE b (id INTEGER PRIMARY KEY)", "NOT VALID SQL"]),
        ]);

        let err = ensure_schema(&provider, "core", &broken).await.unwrap_err();
        assert!(matches!(err, Error::Migration { version: 2, .. }));
        assert_eq!(version_of(&provider, "core").await, Some(1));
        assert!(table_exists(&provider, "a").await);
        assert!(!table_exists(&provider, "b").await);

        let report = ensure_schema(&provider, "core", &core_v2()).await.unwrap();
        assert_eq!(report.from, Some(1));
        assert_eq!(report.statements_applied, 2);
        assert_eq!(version_of(&provider, "core").await, Some(2));
    }

    #[tokio::test]
    async fn schemas_keep_independent_markers() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(&dir);
        let quotes = table(&[(1, &["CREATE TABLE q (id INTEGER PRIMARY KEY)"])]);

        ensure_schema(&provider, "core", &core_v2()).await.unwrap();
        let report = ensure_schema(&provider, "quotes", &quotes).await.unwrap();
        assert_eq!(report.from, None);

        assert_eq!(version_of(&provider, "core").await, Some(2));
        assert_eq!(version_of(&provider, "quotes").await, Some(1));
        assert_eq!(version_of(&provider, "unknown").await, None);
    }

    #[tokio::test]
    async fn concurrent_marker_table_creation_is_benign() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(&dir);

        provider
            .with_connection(|conn| Box::pin(create_version_table(conn)))
            .await
            .unwrap();
        provider
            .with_connection(|conn| Box::pin(create_version_table(conn)))
            .await
            .unwrap();

        let report = ensure_schema(&provider, "core", &core_v2()).await.unwrap();
        assert_eq!(report.from, None);
    }
}
