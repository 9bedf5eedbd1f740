use tracing::{debug, info};

use crate::{
    cache::{Membership, MembershipCache},
    error::Result,
    name::ChannelName,
    store::{ChannelEntry, ChannelSet, ChannelStore},
};

/// Entry point for every channel-set read and write.
///
/// Identifiers are normalized before use. The membership set is served from a
/// read-through cache that any membership mutation discards; the watch set is
/// always read from the store.
pub struct ChannelRepository<S> {
    store: S,
    cache: MembershipCache,
}

impl<S: ChannelStore> ChannelRepository<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: MembershipCache::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Cached membership, loaded from the store on first use.
    pub async fn list_membership(&mut self) -> Result<&Membership> {
        let membership = match self.cache.take() {
            Some(membership) => membership,
            None => self.load_membership().await?,
        };
        Ok(self.cache.replace(membership))
    }

    /// Reload membership from the store, replacing the cache.
    pub async fn refresh_membership(&mut self) -> Result<&Membership> {
        let membership = self.load_membership().await?;
        Ok(self.cache.replace(membership))
    }

    async fn load_membership(&self) -> Result<Membership> {
        let entries = self.store.list(ChannelSet::Membership).await?;
        let membership: Membership = entries.into_iter().map(|e| (e.id, e.name)).collect();
        debug!(count = membership.len(), "membership loaded");
        Ok(membership)
    }

    pub async fn add_membership<R>(&mut self, channel: &R) -> Result<&Membership>
    where
        R: AsRef<[u8]> + ?Sized,
    {
        let name = ChannelName::from_input(channel)?;
        self.store.add(ChannelSet::Membership, &name).await?;
        self.cache.invalidate();
        info!(channel = %name, "membership channel added");
        self.refresh_membership().await
    }

    pub async fn remove_membership<R>(&mut self, channel: &R) -> Result<&Membership>
    where
        R: AsRef<[u8]> + ?Sized,
    {
        let name = ChannelName::from_input(channel)?;
        let removed = self.store.remove(ChannelSet::Membership, &name).await?;
        self.cache.invalidate();
        info!(channel = %name, removed, "membership channel removed");
        self.refresh_membership().await
    }

    pub async fn list_watch(&self) -> Result<Vec<ChannelEntry>> {
        self.store.list(ChannelSet::Watch).await
    }

    pub async fn add_watch<R>(&self, channel: &R) -> Result<Vec<ChannelEntry>>
    where
        R: AsRef<[u8]> + ?Sized,
    {
        let name = ChannelName::from_input(channel)?;
        self.store.add(ChannelSet::Watch, &name).await?;
        info!(channel = %name, "watch channel added");
        self.list_watch().await
    }

    pub async fn remove_watch<R>(&self, channel: &R) -> Result<Vec<ChannelEntry>>
    where
        R: AsRef<[u8]> + ?Sized,
    {
        let name = ChannelName::from_input(channel)?;
        let removed = self.store.remove(ChannelSet::Watch, &name).await?;
        info!(channel = %name, removed, "watch channel removed");
        self.list_watch().await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{error::Error, store_memory::MemoryChannelStore},
    };

    fn names(membership: &Membership) -> Vec<&str> {
        membership.values().map(ChannelName::as_str).collect()
    }

    #[tokio::test]
    async fn list_membership_loads_once() {
        let mut repo = ChannelRepository::new(MemoryChannelStore::new());
        repo.list_membership().await.unwrap();
        repo.list_membership().await.unwrap();
        repo.list_membership().await.unwrap();
        assert_eq!(repo.store().loads(), 1);
    }

    #[tokio::test]
    async fn add_is_visible_without_manual_refresh() {
        let mut repo = ChannelRepository::new(MemoryChannelStore::new());
        repo.list_membership().await.unwrap();

        assert_eq!(names(repo.add_membership("#Foo").await.unwrap()), ["#foo"]);
        assert_eq!(names(repo.list_membership().await.unwrap()), ["#foo"]);
    }

    #[tokio::test]
    async fn membership_mutations_are_idempotent() {
        let mut repo = ChannelRepository::new(MemoryChannelStore::new());
        repo.add_membership("foo").await.unwrap();
        let after = repo.add_membership("##FOO").await.unwrap();
        assert_eq!(names(after), ["#foo"]);

        repo.remove_membership("#foo").await.unwrap();
        let after = repo.remove_membership("#foo").await.unwrap();
        assert!(after.is_empty());
    }

    #[tokio::test]
    async fn remove_is_visible_without_manual_refresh() {
        let mut repo = ChannelRepository::new(MemoryChannelStore::new());
        repo.add_membership("#a").await.unwrap();
        repo.add_membership("#b").await.unwrap();
        repo.remove_membership("#A").await.unwrap();
        assert_eq!(names(repo.list_membership().await.unwrap()), ["#b"]);
    }

    #[tokio::test]
    async fn refresh_picks_up_external_changes() {
        let mut repo = ChannelRepository::new(MemoryChannelStore::new());
        repo.list_membership().await.unwrap();

        let external = ChannelName::from_input("#external").unwrap();
        repo.store()
            .add(ChannelSet::Membership, &external)
            .await
            .unwrap();
        assert!(repo.list_membership().await.unwrap().is_empty());

        let refreshed = repo.refresh_membership().await.unwrap();
        assert_eq!(names(refreshed), ["#external"]);
    }

    #[tokio::test]
    async fn watch_changes_leave_cache_alone() {
        let mut repo = ChannelRepository::new(MemoryChannelStore::new());
        repo.add_membership("#a").await.unwrap();
        let loads = repo.store().loads();

        let watch = repo.add_watch("#W").await.unwrap();
        assert_eq!(watch.len(), 1);
        assert_eq!(watch[0].name.as_str(), "#w");
        assert!(repo.remove_watch("#w").await.unwrap().is_empty());
        assert!(repo.remove_watch("#w").await.unwrap().is_empty());

        assert_eq!(names(repo.list_membership().await.unwrap()), ["#a"]);
        // Only the watch listings hit the store.
        assert_eq!(repo.store().loads(), loads + 3);
    }

    #[tokio::test]
    async fn empty_identifier_is_rejected() {
        let mut repo = ChannelRepository::new(MemoryChannelStore::new());
        let err = repo.add_membership("##").await.unwrap_err();
        assert!(matches!(err, Error::InvalidChannel { .. }));
        assert!(matches!(
            repo.add_watch("").await.unwrap_err(),
            Error::InvalidChannel { .. }
        ));
    }
}
