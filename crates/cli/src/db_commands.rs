use {anyhow::Result, clap::Subcommand};

use {
    beholder_config::BeholderConfig,
    beholder_persistence::{ConnectionProvider, RetryPolicy, SchemaReport},
    beholder_quotes::QuoteStore,
};

#[derive(Subcommand)]
pub enum DbAction {
    /// Bring every schema (core, quotes) up to its latest version.
    Migrate,
    /// Print the database URL and retry policy in use.
    Info,
}

/// Connection provider built from the `[database]` section.
pub fn connection_provider(config: &BeholderConfig) -> Result<ConnectionProvider> {
    let retry = RetryPolicy::new(
        config.database.connect_attempts,
        config.database.retry_delay(),
    );
    Ok(ConnectionProvider::new(&config.database.url, retry)?)
}

/// Migrate all schemas, core first.
pub async fn migrate_all(provider: &ConnectionProvider) -> Result<Vec<SchemaReport>> {
    let core = beholder_channels::run_migrations(provider).await?;
    let quotes = QuoteStore::new(provider.clone()).prepare().await?;
    Ok(vec![core, quotes])
}

pub async fn handle_db(action: DbAction, config: &BeholderConfig) -> Result<()> {
    match action {
        DbAction::Migrate => {
            let provider = connection_provider(config)?;
            for report in migrate_all(&provider).await? {
                println!("{}", describe(&report));
            }
        },
        DbAction::Info => {
            let provider = connection_provider(config)?;
            let retry = provider.retry_policy();
            println!("url:      {}", config.database.url);
            println!(
                "retry:    {} attempt(s), {}s apart",
                retry.max_attempts,
                retry.delay.as_secs()
            );
        },
    }
    Ok(())
}

fn describe(report: &SchemaReport) -> String {
    if report.statements_applied == 0 {
        return format!("{}: up to date at version {}", report.schema, report.to);
    }
    let from = report
        .from
        .map_or_else(|| "empty".to_owned(), |v| format!("version {v}"));
    format!(
        "{}: {from} -> version {} ({} statement(s))",
        report.schema, report.to, report.statements_applied
    )
}
