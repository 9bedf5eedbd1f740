//! Control-process surface: mutate the channel sets and tell the bot.

use {serde::Serialize, tracing::warn};

use beholder_channels::{ChannelEntry, ChannelName, ChannelRepository, ChannelStore};

use crate::{error::Result, signal::SignalRaiser};

/// What happened to the recheck signal after a membership change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum SignalOutcome {
    Delivered,
    /// No bot socket is configured.
    NotConfigured,
    /// The change is persisted; the bot converges on its next signal or restart.
    Failed(String),
}

/// Membership after a change, plus the signal outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipChange {
    pub channels: Vec<ChannelName>,
    pub signal: SignalOutcome,
}

/// Mutates the channel sets on behalf of an operator. Membership changes are
/// followed by a recheck signal to the bot; watch changes are not.
pub struct ChannelControl<S> {
    repository: ChannelRepository<S>,
    raiser: SignalRaiser,
}

impl<S: ChannelStore> ChannelControl<S> {
    pub fn new(repository: ChannelRepository<S>, raiser: SignalRaiser) -> Self {
        Self { repository, raiser }
    }

    pub async fn list_membership(&mut self) -> Result<Vec<ChannelName>> {
        Ok(self
            .repository
            .list_membership()
            .await?
            .values()
            .cloned()
            .collect())
    }

    pub async fn add_membership(&mut self, channel: &str) -> Result<MembershipChange> {
        let channels = self
            .repository
            .add_membership(channel)
            .await?
            .values()
            .cloned()
            .collect();
        Ok(MembershipChange {
            channels,
            signal: self.signal().await,
        })
    }

    pub async fn remove_membership(&mut self, channel: &str) -> Result<MembershipChange> {
        let channels = self
            .repository
            .remove_membership(channel)
            .await?
            .values()
            .cloned()
            .collect();
        Ok(MembershipChange {
            channels,
            signal: self.signal().await,
        })
    }

    pub async fn list_watch(&self) -> Result<Vec<ChannelEntry>> {
        Ok(self.repository.list_watch().await?)
    }

    pub async fn add_watch(&self, channel: &str) -> Result<Vec<ChannelEntry>> {
        Ok(self.repository.add_watch(channel).await?)
    }

    pub async fn remove_watch(&self, channel: &str) -> Result<Vec<ChannelEntry>> {
        Ok(self.repository.remove_watch(channel).await?)
    }

    async fn signal(&self) -> SignalOutcome {
        match self.raiser.raise().await {
            Ok(true) => SignalOutcome::Delivered,
            Ok(false) => SignalOutcome::NotConfigured,
            Err(error) => {
                warn!(error = %error, "bot not notified of membership change");
                SignalOutcome::Failed(error.to_string())
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::signal::{DesiredStateFlag, SignalListener},
        beholder_channels::MemoryChannelStore,
        std::time::Duration,
        tokio_util::sync::CancellationToken,
    };

    fn control(raiser: SignalRaiser) -> ChannelControl<MemoryChannelStore> {
        ChannelControl::new(ChannelRepository::new(MemoryChannelStore::new()), raiser)
    }

    fn names(channels: &[ChannelName]) -> Vec<&str> {
        channels.iter().map(ChannelName::as_str).collect()
    }

    #[tokio::test]
    async fn membership_without_target_reports_not_configured() {
        let mut control = control(SignalRaiser::default());

        let change = control.add_membership("#Foo").await.unwrap();
        assert_eq!(names(&change.channels), ["#foo"]);
        assert_eq!(change.signal, SignalOutcome::NotConfigured);

        let change = control.remove_membership("foo").await.unwrap();
        assert!(change.channels.is_empty());
        assert!(control.list_membership().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreachable_bot_does_not_undo_the_change() {
        let dir = tempfile::tempdir().unwrap();
        let mut control = control(SignalRaiser::new(Some(dir.path().join("gone.sock"))));

        let change = control.add_membership("#a").await.unwrap();
        assert!(matches!(change.signal, SignalOutcome::Failed(_)));
        assert_eq!(names(&control.list_membership().await.unwrap()), ["#a"]);
    }

    #[tokio::test]
    async fn membership_change_signals_bot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.sock");
        let flag = DesiredStateFlag::new();
        let shutdown = CancellationToken::new();
        let handle = SignalListener::bind(&path)
            .unwrap()
            .spawn(flag.clone(), shutdown.clone());
        let mut control = control(SignalRaiser::new(Some(path)));

        let change = control.add_membership("#a").await.unwrap();
        assert_eq!(change.signal, SignalOutcome::Delivered);
        let mut raised = false;
        for _ in 0..200 {
            if flag.is_raised() {
                raised = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(raised);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn watch_changes_do_not_signal() {
        let dir = tempfile::tempdir().unwrap();
        // Pointing at a missing socket: any attempt to signal would warn, but
        // watch operations never try.
        let control = control(SignalRaiser::new(Some(dir.path().join("gone.sock"))));

        let watch = control.add_watch("#W").await.unwrap();
        assert_eq!(watch[0].name.as_str(), "#w");
        assert_eq!(control.list_watch().await.unwrap().len(), 1);
        assert!(control.remove_watch("#w").await.unwrap().is_empty());
    }

    #[test]
    fn outcome_serializes_with_status() {
        assert_eq!(
            serde_json::to_string(&SignalOutcome::Delivered).unwrap(),
            r#"{"status":"delivered"}"#
        );
        assert_eq!(
            serde_json::to_string(&SignalOutcome::Failed("refused".into())).unwrap(),
            r#"{"status":"failed","error":"refused"}"#
        );
    }
}
