use std::collections::BTreeMap;

use crate::name::ChannelName;

/// Desired membership keyed by row id.
pub type Membership = BTreeMap<i64, ChannelName>;

/// Last known membership set, owned by one repository.
///
/// Empty until the first load; any membership mutation invalidates it.
#[derive(Debug, Default)]
pub struct MembershipCache {
    entries: Option<Membership>,
}

impl MembershipCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&Membership> {
        self.entries.as_ref()
    }

    pub fn replace(&mut self, entries: Membership) -> &Membership {
        self.entries.insert(entries)
    }

    /// Move the cached set out, leaving the cache empty.
    pub fn take(&mut self) -> Option<Membership> {
        self.entries.take()
    }

    pub fn invalidate(&mut self) {
        self.entries = None;
    }

    pub fn is_populated(&self) -> bool {
        self.entries.is_some()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_then_invalidate() {
        let mut cache = MembershipCache::new();
        assert!(cache.get().is_none());

        let mut entries = Membership::new();
        entries.insert(1, ChannelName::from_input("#a").unwrap());
        assert_eq!(cache.replace(entries).len(), 1);
        assert!(cache.is_populated());

        assert_eq!(cache.take().map(|m| m.len()), Some(1));
        assert!(!cache.is_populated());

        cache.replace(Membership::new());
        cache.invalidate();
        assert!(cache.get().is_none());
    }
}
