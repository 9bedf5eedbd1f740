use {
    anyhow::Result,
    clap::Subcommand,
    tracing::info,
};

use {
    beholder_channels::{ChannelEntry, ChannelName, ChannelRepository, SqliteChannelStore},
    beholder_config::BeholderConfig,
    beholder_gateway::{ChannelControl, MembershipChange, SignalOutcome, SignalRaiser},
};

use crate::db_commands::connection_provider;

/// Operations on the channels the bot should be joined to.
#[derive(Subcommand)]
pub enum ChannelAction {
    /// List membership channels.
    List,
    /// Add a channel and ask the running bot to join it.
    Add { channel: String },
    /// Remove a channel and ask the running bot to part it.
    Remove { channel: String },
}

/// Operations on the watched channels. The running bot is not signalled.
#[derive(Subcommand)]
pub enum WatchAction {
    List,
    Add { channel: String },
    Remove { channel: String },
}

async fn open(config: &BeholderConfig) -> Result<ChannelControl<SqliteChannelStore>> {
    let provider = connection_provider(config)?;
    beholder_channels::run_migrations(&provider).await?;
    let repository = ChannelRepository::new(SqliteChannelStore::new(provider));
    let raiser = SignalRaiser::new(config.control.socket_path.clone());
    Ok(ChannelControl::new(repository, raiser))
}

pub async fn handle_channels(
    action: ChannelAction,
    config: &BeholderConfig,
    json: bool,
) -> Result<()> {
    let mut control = open(config).await?;
    match action {
        ChannelAction::List => {
            let channels = control.list_membership().await?;
            print_names(&channels, json)?;
        },
        ChannelAction::Add { channel } => {
            let change = control.add_membership(&channel).await?;
            info!(channel = %channel, "membership channel added");
            print_change(&change, json)?;
        },
        ChannelAction::Remove { channel } => {
            let change = control.remove_membership(&channel).await?;
            info!(channel = %channel, "membership channel removed");
            print_change(&change, json)?;
        },
    }
    Ok(())
}

pub async fn handle_watch(action: WatchAction, config: &BeholderConfig, json: bool) -> Result<()> {
    let control = open(config).await?;
    let entries = match action {
        WatchAction::List => control.list_watch().await?,
        WatchAction::Add { channel } => control.add_watch(&channel).await?,
        WatchAction::Remove { channel } => control.remove_watch(&channel).await?,
    };
    print_entries(&entries, json)
}

fn print_names(channels: &[ChannelName], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(channels)?);
    } else if channels.is_empty() {
        println!("No channels.");
    } else {
        for channel in channels {
            println!("{channel}");
        }
    }
    Ok(())
}

fn print_entries(entries: &[ChannelEntry], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
    } else if entries.is_empty() {
        println!("No channels.");
    } else {
        for entry in entries {
            println!("{:>5}  {}", entry.id, entry.name);
        }
    }
    Ok(())
}

fn print_change(change: &MembershipChange, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(change)?);
        return Ok(());
    }
    print_names(&change.channels, false)?;
    match &change.signal {
        SignalOutcome::Delivered => eprintln!("Bot notified."),
        SignalOutcome::NotConfigured => {
            eprintln!("No control socket configured; the bot picks this up on restart.");
        },
        SignalOutcome::Failed(error) => {
            eprintln!("Change saved, but the bot could not be notified: {error}");
        },
    }
    Ok(())
}
