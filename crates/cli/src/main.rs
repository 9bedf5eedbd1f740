mod bot_command;
mod channel_commands;
mod config_commands;
mod db_commands;
mod quote_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "beholder", about = "Beholder, an IRC bot with a shared channel list")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery of ./beholder.toml and the user
    /// config directory).
    #[arg(long, global = true, env = "BEHOLDER_CONFIG")]
    config: Option<PathBuf>,

    /// Print command results as JSON.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot (default when no subcommand is provided).
    Run,
    /// Membership channels: the bot is told to converge after each change.
    Channels {
        #[command(subcommand)]
        action: channel_commands::ChannelAction,
    },
    /// Watched channels.
    Watch {
        #[command(subcommand)]
        action: channel_commands::WatchAction,
    },
    /// Quote database.
    Quotes {
        #[command(subcommand)]
        action: quote_commands::QuoteAction,
    },
    /// Database management.
    Db {
        #[command(subcommand)]
        action: db_commands::DbAction,
    },
    /// Configuration checks.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "beholder starting");

    let explicit = cli.config.as_deref();
    if let Some(Commands::Config { action }) = cli.command {
        return config_commands::handle_config(action, explicit);
    }

    let config = beholder_config::load(explicit)?;
    match cli.command {
        None | Some(Commands::Run) => bot_command::run(config).await,
        Some(Commands::Channels { action }) => {
            channel_commands::handle_channels(action, &config, cli.json).await
        },
        Some(Commands::Watch { action }) => {
            channel_commands::handle_watch(action, &config, cli.json).await
        },
        Some(Commands::Quotes { action }) => {
            quote_commands::handle_quotes(action, &config, cli.json).await
        },
        Some(Commands::Db { action }) => db_commands::handle_db(action, &config).await,
        Some(Commands::Config { .. }) => Ok(()),
    }
}
