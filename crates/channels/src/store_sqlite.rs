//! SQLite-backed channel store and the `core` schema.

use {
    async_trait::async_trait,
    beholder_persistence::{
        ConnectionProvider, MigrationStep, MigrationTable, SchemaReport, ensure_schema, unix_now,
    },
    sqlx::SqliteConnection,
    tracing::debug,
};

use crate::{
    error::Result,
    name::ChannelName,
    store::{ChannelEntry, ChannelSet, ChannelStore},
};

/// Logical schema name holding both channel tables.
pub const CORE_SCHEMA: &str = "core";

/// Migration table of the `core` schema.
pub fn core_migrations() -> Result<MigrationTable> {
    Ok(MigrationTable::new(vec![
        MigrationStep::new(1, [r#"CREATE TABLE membership_channels (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                channel    TEXT    NOT NULL UNIQUE,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )"#]),
        MigrationStep::new(2, [r#"CREATE TABLE watch_channels (
                channel    TEXT    PRIMARY KEY NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )"#]),
    ])?)
}

/// Bring the `core` schema up to date.
pub async fn run_migrations(provider: &ConnectionProvider) -> Result<SchemaReport> {
    Ok(ensure_schema(provider, CORE_SCHEMA, &core_migrations()?).await?)
}

fn table(set: ChannelSet) -> &'static str {
    match set {
        ChannelSet::Membership => "membership_channels",
        ChannelSet::Watch => "watch_channels",
    }
}

fn id_column(set: ChannelSet) -> &'static str {
    match set {
        ChannelSet::Membership => "id",
        ChannelSet::Watch => "rowid",
    }
}

/// Internal row type for sqlx mapping.
#[derive(sqlx::FromRow)]
struct ChannelRow {
    id: i64,
    channel: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<ChannelRow> for ChannelEntry {
    type Error = crate::Error;

    fn try_from(r: ChannelRow) -> Result<Self> {
        Ok(Self {
            id: r.id,
            name: ChannelName::from_input(&r.channel)?,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

async fn fetch_rows(
    conn: &mut SqliteConnection,
    set: ChannelSet,
) -> beholder_persistence::Result<Vec<ChannelRow>> {
    let sql = format!(
        "SELECT {id} AS id, channel, created_at, updated_at FROM {table} ORDER BY {id}",
        id = id_column(set),
        table = table(set),
    );
    Ok(sqlx::query_as::<_, ChannelRow>(&sql).fetch_all(conn).await?)
}

async fn upsert_row(
    conn: &mut SqliteConnection,
    set: ChannelSet,
    channel: String,
) -> beholder_persistence::Result<()> {
    let sql = format!(
        "INSERT INTO {table} (channel, created_at, updated_at)
         VALUES (?, ?, ?)
         ON CONFLICT(channel) DO UPDATE SET updated_at = excluded.updated_at",
        table = table(set),
    );
    let now = unix_now();
    sqlx::query(&sql)
        .bind(&channel)
        .bind(now)
        .bind(now)
        .execute(conn)
        .await?;
    Ok(())
}

async fn delete_row(
    conn: &mut SqliteConnection,
    set: ChannelSet,
    channel: String,
) -> beholder_persistence::Result<bool> {
    let sql = format!("DELETE FROM {table} WHERE channel = ?", table = table(set));
    let result = sqlx::query(&sql).bind(&channel).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

/// SQLite-backed channel store. Every call uses its own connection.
#[derive(Debug, Clone)]
pub struct SqliteChannelStore {
    provider: ConnectionProvider,
}

impl SqliteChannelStore {
    pub fn new(provider: ConnectionProvider) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &ConnectionProvider {
        &self.provider
    }
}

#[async_trait]
impl ChannelStore for SqliteChannelStore {
    async fn list(&self, set: ChannelSet) -> Result<Vec<ChannelEntry>> {
        let rows = self
            .provider
            .with_connection(move |conn| Box::pin(fetch_rows(conn, set)))
            .await?;
        debug!(set = %set, count = rows.len(), "loaded channel set");
        rows.into_iter().map(ChannelEntry::try_from).collect()
    }

    async fn add(&self, set: ChannelSet, name: &ChannelName) -> Result<()> {
        let channel = name.as_str().to_owned();
        self.provider
            .with_connection(move |conn| Box::pin(upsert_row(conn, set, channel)))
            .await?;
        debug!(set = %set, channel = %name, "channel stored");
        Ok(())
    }

    async fn remove(&self, set: ChannelSet, name: &ChannelName) -> Result<bool> {
        let channel = name.as_str().to_owned();
        let removed = self
            .provider
            .with_connection(move |conn| Box::pin(delete_row(conn, set, channel)))
            .await?;
        debug!(set = %set, channel = %name, removed, "channel removed");
        Ok(removed)
    }
}
