use {anyhow::Result, clap::Subcommand};

use {beholder_config::BeholderConfig, beholder_quotes::QuoteStore};

use crate::db_commands::connection_provider;

#[derive(Subcommand)]
pub enum QuoteAction {
    /// Store a new quote.
    Add { text: String },
    /// Print a random quote, optionally containing `search`.
    Random { search: Option<String> },
    /// Print how many quotes are stored.
    Count,
}

pub async fn handle_quotes(action: QuoteAction, config: &BeholderConfig, json: bool) -> Result<()> {
    let store = QuoteStore::new(connection_provider(config)?);
    store.prepare().await?;

    match action {
        QuoteAction::Add { text } => {
            let id = store.add_quote(text.as_str()).await?;
            println!("Quote #{id} stored.");
        },
        QuoteAction::Random { search } => {
            let quote = store.random_quote(search.as_deref()).await?;
            match (quote, json) {
                (quote, true) => println!("{}", serde_json::to_string_pretty(&quote)?),
                (Some(quote), false) => println!("#{}: {}", quote.id, quote.content),
                (None, false) => println!("No quote found."),
            }
        },
        QuoteAction::Count => println!("{}", store.count().await?),
    }
    Ok(())
}
