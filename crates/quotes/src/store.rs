use {
    beholder_persistence::{
        ConnectionProvider, MigrationStep, MigrationTable, SchemaReport, ensure_schema, repair_utf8,
        unix_now,
    },
    serde::Serialize,
    sqlx::SqliteConnection,
    tracing::{debug, info},
};

use crate::error::{Error, Result};

/// Logical schema name of the quote table.
pub const QUOTES_SCHEMA: &str = "quotes";

/// Longest quote accepted, in characters.
pub const MAX_QUOTE_CHARS: usize = 400;

pub fn quotes_migrations() -> Result<MigrationTable> {
    Ok(MigrationTable::new(vec![MigrationStep::new(1, [
        r#"CREATE TABLE quotes (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            content    TEXT    NOT NULL,
            created_at INTEGER NOT NULL
        )"#,
    ])])?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Quote {
    pub id: i64,
    pub content: String,
    pub created_at: i64,
}

/// SQLite-backed quote store.
#[derive(Debug, Clone)]
pub struct QuoteStore {
    provider: ConnectionProvider,
}

impl QuoteStore {
    pub fn new(provider: ConnectionProvider) -> Self {
        Self { provider }
    }

    /// Bring the `quotes` schema up to date.
    pub async fn prepare(&self) -> Result<SchemaReport> {
        Ok(ensure_schema(&self.provider, QUOTES_SCHEMA, &quotes_migrations()?).await?)
    }

    /// Store a quote, repairing its encoding first. Returns the new id.
    pub async fn add_quote<R>(&self, raw: &R) -> Result<i64>
    where
        R: AsRef<[u8]> + ?Sized,
    {
        let content = repair_utf8(raw.as_ref()).trim().to_owned();
        if content.is_empty() {
            return Err(Error::Empty);
        }
        let chars = content.chars().count();
        if chars > MAX_QUOTE_CHARS {
            return Err(Error::TooLong {
                chars,
                max: MAX_QUOTE_CHARS,
            });
        }
        let id = self
            .provider
            .with_connection(move |conn| Box::pin(insert_quote(conn, content)))
            .await?;
        info!(id, "quote added");
        Ok(id)
    }

    /// One random quote, optionally restricted to those containing `search`.
    pub async fn random_quote(&self, search: Option<&str>) -> Result<Option<Quote>> {
        let pattern = search.map(like_pattern);
        let quote = self
            .provider
            .with_connection(move |conn| Box::pin(fetch_random(conn, pattern)))
            .await?;
        debug!(found = quote.is_some(), search, "random quote lookup");
        Ok(quote)
    }

    pub async fn count(&self) -> Result<i64> {
        Ok(self
            .provider
            .with_connection(|conn| Box::pin(count_quotes(conn)))
            .await?)
    }
}

/// `%term%` with LIKE wildcards in `term` matched literally.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

async fn insert_quote(
    conn: &mut SqliteConnection,
    content: String,
) -> beholder_persistence::Result<i64> {
    let result = sqlx::query("INSERT INTO quotes (content, created_at) VALUES (?, ?)")
        .bind(&content)
        .bind(unix_now())
        .execute(conn)
        .await?;
    Ok(result.last_insert_rowid())
}

async fn fetch_random(
    conn: &mut SqliteConnection,
    pattern: Option<String>,
) -> beholder_persistence::Result<Option<Quote>> {
    let quote = match pattern {
        Some(pattern) => {
            sqlx::query_as::<_, Quote>(
                "SELECT id, content, created_at FROM quotes
                 WHERE content LIKE ? ESCAPE '\\'
                 ORDER BY RANDOM() LIMIT 1",
            )
            .bind(pattern)
            .fetch_optional(conn)
            .await?
        },
        None => {
            sqlx::query_as::<_, Quote>(
                "SELECT id, content, created_at FROM quotes ORDER BY RANDOM() LIMIT 1",
            )
            .fetch_optional(conn)
            .await?
        },
    };
    Ok(quote)
}

async fn count_quotes(conn: &mut SqliteConnection) -> beholder_persistence::Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM quotes")
        .fetch_one(conn)
        .await?)
}
