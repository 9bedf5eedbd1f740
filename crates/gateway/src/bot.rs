//! The bot process event loop.

use std::time::Duration;

use {
    tokio::{sync::mpsc, time::MissedTickBehavior},
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use {
    beholder_channels::{ChannelName, ChannelRepository, ChannelStore},
    beholder_quotes::QuoteStore,
};

use crate::{
    admin::{AdminAction, AdminCommand},
    error::Result,
    reconcile::{ReconcileReport, Reconciler},
    session::{IrcSession, SessionEvent},
    signal::DesiredStateFlag,
};

/// Default spacing of the reconciliation tick.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct BotSettings {
    /// Nick whose private messages are treated as admin commands.
    pub admin_nick: Option<String>,
    /// Prefix of channel commands such as `!quote`.
    pub command_prefix: String,
    pub tick_interval: Duration,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            admin_nick: None,
            command_prefix: "!".into(),
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

/// Owns the repository, the reconciler and the session, and runs them on a
/// single task. Session events and ticks are handled one at a time, so the
/// membership cache and the joined set never need locking.
pub struct BotRuntime<S, I> {
    repository: ChannelRepository<S>,
    session: I,
    reconciler: Reconciler,
    flag: DesiredStateFlag,
    quotes: Option<QuoteStore>,
    settings: BotSettings,
    /// Set when the last pass left channels diverged.
    retry_pending: bool,
}

impl<S: ChannelStore, I: IrcSession> BotRuntime<S, I> {
    pub fn new(
        repository: ChannelRepository<S>,
        session: I,
        flag: DesiredStateFlag,
        settings: BotSettings,
    ) -> Self {
        Self {
            repository,
            session,
            reconciler: Reconciler::new(),
            flag,
            quotes: None,
            settings,
            retry_pending: false,
        }
    }

    #[must_use]
    pub fn with_quotes(mut self, quotes: QuoteStore) -> Self {
        self.quotes = Some(quotes);
        self
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn session(&self) -> &I {
        &self.session
    }

    pub fn flag(&self) -> &DesiredStateFlag {
        &self.flag
    }

    /// Reconcile if the flag was raised since the last tick, or if the
    /// previous pass left failed joins or parts behind.
    ///
    /// A pass that fails on the store raises the flag again so the next tick
    /// retries it. The admin is notified of signalled passes and of retries
    /// that changed something.
    pub async fn tick(&mut self) -> Result<Option<ReconcileReport>> {
        let signalled = self.flag.take();
        if !signalled && !self.retry_pending {
            return Ok(None);
        }
        let report = match self
            .reconciler
            .reconcile(&mut self.repository, &self.session)
            .await
        {
            Ok(report) => report,
            Err(error) => {
                self.flag.raise();
                return Err(error);
            },
        };
        self.retry_pending = !report.failed.is_empty();
        info!(
            joined = report.joined.len(),
            parted = report.parted.len(),
            failed = report.failed.len(),
            retry = !signalled,
            "channel list reconciled"
        );
        if signalled || !report.joined.is_empty() || !report.parted.is_empty() {
            self.notify_admin(&report.summary()).await;
        }
        Ok(Some(report))
    }

    /// Whether the next tick reconciles even without a signal.
    pub fn retry_pending(&self) -> bool {
        self.retry_pending
    }

    pub async fn handle_event(&mut self, event: SessionEvent) -> Result<()> {
        match event {
            SessionEvent::Established => {
                let report = match self
                    .reconciler
                    .session_established(&mut self.repository, &self.session)
                    .await
                {
                    Ok(report) => report,
                    Err(error) => {
                        self.retry_pending = true;
                        return Err(error);
                    },
                };
                self.retry_pending = !report.failed.is_empty();
                info!(
                    joined = report.joined.len(),
                    failed = report.failed.len(),
                    "session established, membership joined"
                );
            },
            SessionEvent::PrivateMessage { from, text } => {
                self.handle_private_message(&from, &text).await?;
            },
            SessionEvent::ChannelMessage {
                channel,
                from,
                text,
            } => {
                self.handle_channel_message(&channel, &from, &text).await?;
            },
        }
        Ok(())
    }

    /// Process ticks and session events until `shutdown` fires or the event
    /// stream closes.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<SessionEvent>,
        shutdown: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(self.settings.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            tick_interval_ms = self.settings.tick_interval.as_millis() as u64,
            "bot runtime started"
        );

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => {
                        if let Err(error) = self.handle_event(event).await {
                            error!(error = %error, "session event handling failed");
                        }
                    },
                    None => {
                        info!("session event stream closed");
                        break;
                    },
                },
                _ = ticker.tick() => {
                    if let Err(error) = self.tick().await {
                        error!(error = %error, "reconciliation failed, retrying next tick");
                    }
                },
            }
        }
        info!("bot runtime stopped");
    }

    async fn handle_private_message(&mut self, from: &str, text: &str) -> Result<()> {
        let is_admin = self
            .settings
            .admin_nick
            .as_deref()
            .is_some_and(|admin| admin.eq_ignore_ascii_case(from));
        if !is_admin {
            debug!(from, "ignoring private message from non-admin");
            return Ok(());
        }
        let Some(command) = AdminCommand::parse(text) else {
            debug!(from, "ignoring unrecognised admin message");
            return Ok(());
        };

        let reply = match command.action {
            AdminAction::Join => {
                self.repository.add_membership(&command.channel).await?;
                format!("Added {} to the channel list", command.channel)
            },
            AdminAction::Leave => {
                self.repository.remove_membership(&command.channel).await?;
                format!("Removed {} from the channel list", command.channel)
            },
            AdminAction::WatchAdd => {
                self.repository.add_watch(&command.channel).await?;
                format!("Now watching {}", command.channel)
            },
            AdminAction::WatchRemove => {
                self.repository.remove_watch(&command.channel).await?;
                format!("No longer watching {}", command.channel)
            },
        };
        if command.action.is_membership() {
            self.flag.raise();
        }
        info!(action = ?command.action, channel = %command.channel, "admin command applied");
        self.notify_admin(&reply).await;
        Ok(())
    }

    async fn handle_channel_message(
        &self,
        channel: &ChannelName,
        from: &str,
        text: &str,
    ) -> Result<()> {
        let Some(command) = text.strip_prefix(self.settings.command_prefix.as_str()) else {
            return Ok(());
        };
        let (name, args) = command.split_once(' ').unwrap_or((command, ""));
        if name != "quote" {
            return Ok(());
        }
        let Some(quotes) = &self.quotes else {
            return Ok(());
        };

        let search = Some(args.trim()).filter(|s| !s.is_empty());
        let reply = match quotes.random_quote(search).await? {
            Some(quote) => quote.content,
            None => "No quote found.".to_owned(),
        };
        debug!(channel = %channel, from, "quote requested");
        if let Err(error) = self.session.send_message(channel.as_str(), &reply).await {
            warn!(channel = %channel, error = %error, "failed to send quote");
        }
        Ok(())
    }

    async fn notify_admin(&self, text: &str) {
        let Some(admin) = self.settings.admin_nick.as_deref() else {
            return;
        };
        if let Err(error) = self.session.send_message(admin, text).await {
            warn!(admin, error = %error, "failed to notify admin");
        }
    }
}
