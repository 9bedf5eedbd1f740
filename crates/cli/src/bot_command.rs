use {
    anyhow::{Result, bail},
    tokio::sync::mpsc,
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use {
    beholder_channels::{ChannelRepository, SqliteChannelStore},
    beholder_config::BeholderConfig,
    beholder_gateway::{
        BotRuntime, BotSettings, DesiredStateFlag, LoggingSession, SessionEvent, SessionIdentity,
        SignalListener,
    },
    beholder_quotes::QuoteStore,
};

use crate::db_commands::{connection_provider, migrate_all};

/// Session events buffered between the IRC connection and the runtime.
const EVENT_BUFFER: usize = 64;

/// Start the bot and run until Ctrl-C.
pub async fn run(config: BeholderConfig) -> Result<()> {
    let provider = connection_provider(&config)?;
    for report in migrate_all(&provider).await? {
        info!(
            schema = %report.schema,
            version = report.to,
            statements = report.statements_applied,
            "schema ready"
        );
    }

    let mut repository = ChannelRepository::new(SqliteChannelStore::new(provider.clone()));
    let loaded = repository.list_membership().await?.len();
    info!(channels = loaded, "membership loaded");

    let flag = DesiredStateFlag::new();
    let shutdown = CancellationToken::new();

    let listener = match &config.control.socket_path {
        Some(path) => {
            Some(SignalListener::bind(path.clone())?.spawn(flag.clone(), shutdown.clone()))
        },
        None => {
            warn!("no control socket configured, membership changes apply on restart");
            None
        },
    };

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            ctrl_c.cancel();
        }
    });

    let settings = BotSettings {
        admin_nick: config.irc.admin_nick.clone(),
        command_prefix: config.irc.command_prefix.clone(),
        tick_interval: config.reconcile.tick_interval(),
    };
    let session = LoggingSession::new(SessionIdentity {
        nick: config.irc.nick.clone(),
        username: config.irc.username.clone(),
        realname: config.irc.realname.clone(),
        nickserv_password: config.irc.nickserv_password.clone(),
    });
    session.register();
    let runtime = BotRuntime::new(repository, session, flag, settings)
        .with_quotes(QuoteStore::new(provider));

    // The sender stays alive for the whole run; closing it stops the runtime.
    let (events, receiver) = mpsc::channel(EVENT_BUFFER);
    if events.send(SessionEvent::Established).await.is_err() {
        bail!("session event channel closed before start");
    }
    info!(
        nick = %config.irc.nick,
        host = %config.irc.host,
        port = config.irc.port,
        tls = config.irc.tls,
        "session established"
    );

    runtime.run(receiver, shutdown.clone()).await;
    drop(events);

    shutdown.cancel();
    if let Some(handle) = listener {
        handle.await?;
    }
    info!("beholder stopped");
    Ok(())
}
