//! Converges the channels the bot actually sits in with the persisted
//! membership set.

use std::{collections::BTreeSet, fmt};

use {
    serde::Serialize,
    tracing::{debug, warn},
};

use beholder_channels::{ChannelName, ChannelRepository, ChannelStore};

use crate::{error::Result, session::IrcSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    Idle,
    Reconciling,
}

/// Set differences between desired and joined channels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub to_join: Vec<ChannelName>,
    pub to_part: Vec<ChannelName>,
}

impl Plan {
    #[must_use]
    pub fn between(desired: &BTreeSet<ChannelName>, joined: &BTreeSet<ChannelName>) -> Self {
        Self {
            to_join: desired.difference(joined).cloned().collect(),
            to_part: joined.difference(desired).cloned().collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_join.is_empty() && self.to_part.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelAction {
    Join,
    Part,
}

impl fmt::Display for ChannelAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Join => "join",
            Self::Part => "part",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelFailure {
    pub channel: ChannelName,
    pub action: ChannelAction,
    pub error: String,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub joined: Vec<ChannelName>,
    pub parted: Vec<ChannelName>,
    pub failed: Vec<ChannelFailure>,
}

impl ReconcileReport {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.joined.is_empty() && self.parted.is_empty() && self.failed.is_empty()
    }

    /// One-line human summary, used for admin notices.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Channel list reloaded: {} joined, {} parted, {} failed",
            self.joined.len(),
            self.parted.len(),
            self.failed.len()
        )
    }
}

/// Tracks the channels this session actually joined and drives passes.
///
/// Failed joins stay out of the joined set and failed parts stay in it, so
/// both are retried by the next pass.
#[derive(Debug)]
pub struct Reconciler {
    joined: BTreeSet<ChannelName>,
    state: ReconcileState,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            joined: BTreeSet::new(),
            state: ReconcileState::Idle,
        }
    }

    pub fn joined(&self) -> &BTreeSet<ChannelName> {
        &self.joined
    }

    pub fn state(&self) -> ReconcileState {
        self.state
    }

    /// Refresh the desired set from the store and converge towards it.
    pub async fn reconcile<S, I>(
        &mut self,
        repository: &mut ChannelRepository<S>,
        session: &I,
    ) -> Result<ReconcileReport>
    where
        S: ChannelStore,
        I: IrcSession + ?Sized,
    {
        self.state = ReconcileState::Reconciling;
        let result = self.pass(repository, session).await;
        self.state = ReconcileState::Idle;
        result
    }

    /// A new session starts in no channels: forget the joined set and join
    /// every persisted member.
    pub async fn session_established<S, I>(
        &mut self,
        repository: &mut ChannelRepository<S>,
        session: &I,
    ) -> Result<ReconcileReport>
    where
        S: ChannelStore,
        I: IrcSession + ?Sized,
    {
        self.joined.clear();
        let desired: BTreeSet<ChannelName> = repository
            .refresh_membership()
            .await?
            .values()
            .cloned()
            .collect();
        let plan = Plan::between(&desired, &self.joined);
        self.state = ReconcileState::Reconciling;
        let report = self.apply(plan, session).await;
        self.state = ReconcileState::Idle;
        Ok(report)
    }

    async fn pass<S, I>(
        &mut self,
        repository: &mut ChannelRepository<S>,
        session: &I,
    ) -> Result<ReconcileReport>
    where
        S: ChannelStore,
        I: IrcSession + ?Sized,
    {
        let desired: BTreeSet<ChannelName> = repository
            .refresh_membership()
            .await?
            .values()
            .cloned()
            .collect();
        let plan = Plan::between(&desired, &self.joined);
        if plan.is_empty() {
            debug!(channels = desired.len(), "joined channels already match membership");
        }
        Ok(self.apply(plan, session).await)
    }

    async fn apply<I>(&mut self, plan: Plan, session: &I) -> ReconcileReport
    where
        I: IrcSession + ?Sized,
    {
        let mut report = ReconcileReport::default();

        for channel in plan.to_join {
            match session.join(&channel).await {
                Ok(()) => {
                    self.joined.insert(channel.clone());
                    report.joined.push(channel);
                },
                Err(error) => {
                    warn!(channel = %channel, error = %error, "join failed");
                    report.failed.push(ChannelFailure {
                        channel,
                        action: ChannelAction::Join,
                        error: error.to_string(),
                    });
                },
            }
        }

        for channel in plan.to_part {
            match session.part(&channel).await {
                Ok(()) => {
                    self.joined.remove(&channel);
                    report.parted.push(channel);
                },
                Err(error) => {
                    warn!(channel = %channel, error = %error, "part failed");
                    report.failed.push(ChannelFailure {
                        channel,
                        action: ChannelAction::Part,
                        error: error.to_string(),
                    });
                },
            }
        }

        report
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use beholder_channels::{ChannelSet, MemoryChannelStore};

    use {
        super::*,
        crate::session::recording::{Call, RecordingSession},
    };

    fn name(raw: &str) -> ChannelName {
        ChannelName::from_input(raw).unwrap()
    }

    fn set(names: &[&str]) -> BTreeSet<ChannelName> {
        names.iter().map(|n| name(n)).collect()
    }

    async fn repository_with(names: &[&str]) -> ChannelRepository<MemoryChannelStore> {
        let mut repository = ChannelRepository::new(MemoryChannelStore::new());
        for n in names {
            repository.add_membership(*n).await.unwrap();
        }
        repository
    }

    /// Reconciler whose joined set is exactly `names`.
    async fn joined_to(names: &[&str]) -> Reconciler {
        let mut reconciler = Reconciler::new();
        let mut repository = repository_with(names).await;
        let session = RecordingSession::default();
        reconciler
            .session_established(&mut repository, &session)
            .await
            .unwrap();
        reconciler
    }

    #[test]
    fn plan_is_set_difference() {
        let plan = Plan::between(&set(&["#a", "#b"]), &set(&["#b", "#c"]));
        assert_eq!(plan.to_join, vec![name("#a")]);
        assert_eq!(plan.to_part, vec![name("#c")]);
        assert!(Plan::between(&set(&["#a"]), &set(&["#a"])).is_empty());
    }

    #[tokio::test]
    async fn converges_with_one_join_and_one_part() {
        let mut reconciler = joined_to(&["#b", "#c"]).await;
        let mut repository = repository_with(&["#a", "#b"]).await;
        let session = RecordingSession::default();

        let report = reconciler
            .reconcile(&mut repository, &session)
            .await
            .unwrap();

        assert_eq!(session.calls(), vec![
            Call::Join("#a".into()),
            Call::Part("#c".into())
        ]);
        assert_eq!(report.joined, vec![name("#a")]);
        assert_eq!(report.parted, vec![name("#c")]);
        assert!(report.failed.is_empty());
        assert_eq!(reconciler.joined(), &set(&["#a", "#b"]));
        assert_eq!(reconciler.state(), ReconcileState::Idle);
    }

    #[tokio::test]
    async fn converged_pass_has_no_side_effects() {
        let mut reconciler = joined_to(&["#a"]).await;
        let mut repository = repository_with(&["#a"]).await;
        let session = RecordingSession::default();

        let report = reconciler
            .reconcile(&mut repository, &session)
            .await
            .unwrap();
        assert!(report.is_noop());
        assert!(session.calls().is_empty());
    }

    #[tokio::test]
    async fn reconcile_reads_fresh_membership() {
        let mut reconciler = Reconciler::new();
        let mut repository = repository_with(&[]).await;
        repository.list_membership().await.unwrap();
        repository
            .store()
            .add(ChannelSet::Membership, &name("#late"))
            .await
            .unwrap();
        let session = RecordingSession::default();

        let report = reconciler
            .reconcile(&mut repository, &session)
            .await
            .unwrap();
        assert_eq!(report.joined, vec![name("#late")]);
    }

    #[tokio::test]
    async fn failures_are_isolated_and_retried() {
        let mut reconciler = joined_to(&["#stuck"]).await;
        let mut repository = repository_with(&["#a", "#bad", "#c"]).await;
        let session = RecordingSession::default();
        session.fail_on("#bad");
        session.fail_on("#stuck");

        let report = reconciler
            .reconcile(&mut repository, &session)
            .await
            .unwrap();
        assert_eq!(report.joined, vec![name("#a"), name("#c")]);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.failed[0].action, ChannelAction::Join);
        assert_eq!(report.failed[1].action, ChannelAction::Part);
        assert_eq!(reconciler.joined(), &set(&["#a", "#c", "#stuck"]));
        assert_eq!(reconciler.state(), ReconcileState::Idle);

        session.heal("#bad");
        session.heal("#stuck");
        session.clear();
        let report = reconciler
            .reconcile(&mut repository, &session)
            .await
            .unwrap();
        assert_eq!(session.calls(), vec![
            Call::Join("#bad".into()),
            Call::Part("#stuck".into())
        ]);
        assert!(report.failed.is_empty());
        assert_eq!(reconciler.joined(), &set(&["#a", "#bad", "#c"]));
    }

    #[tokio::test]
    async fn session_established_rejoins_everything() {
        let mut reconciler = joined_to(&["#a", "#b"]).await;
        let mut repository = repository_with(&["#a", "#b"]).await;
        let session = RecordingSession::default();

        let report = reconciler
            .session_established(&mut repository, &session)
            .await
            .unwrap();
        assert_eq!(report.joined, vec![name("#a"), name("#b")]);
        assert_eq!(session.calls(), vec![
            Call::Join("#a".into()),
            Call::Join("#b".into())
        ]);
        assert!(report.parted.is_empty());
    }

    #[tokio::test]
    async fn session_established_reads_persisted_membership() {
        let mut reconciler = Reconciler::new();
        let mut repository = repository_with(&["#a"]).await;
        repository.list_membership().await.unwrap();
        repository
            .store()
            .add(ChannelSet::Membership, &name("#b"))
            .await
            .unwrap();
        let session = RecordingSession::default();

        let report = reconciler
            .session_established(&mut repository, &session)
            .await
            .unwrap();
        assert_eq!(report.joined, vec![name("#a"), name("#b")]);
        assert_eq!(reconciler.joined(), &set(&["#a", "#b"]));
    }

    #[test]
    fn summary_counts_outcomes() {
        let report = ReconcileReport {
            joined: vec![name("#a")],
            parted: vec![],
            failed: vec![ChannelFailure {
                channel: name("#b"),
                action: ChannelAction::Join,
                error: "banned".into(),
            }],
        };
        assert_eq!(
            report.summary(),
            "Channel list reloaded: 1 joined, 0 parted, 1 failed"
        );
    }
}
