//! In-memory store for testing.

use std::{
    collections::BTreeMap,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use {async_trait::async_trait, beholder_persistence::unix_now};

use crate::{
    error::Result,
    name::ChannelName,
    store::{ChannelEntry, ChannelSet, ChannelStore},
};

#[derive(Default)]
struct Sets {
    next_id: i64,
    membership: BTreeMap<ChannelName, ChannelEntry>,
    watch: BTreeMap<ChannelName, ChannelEntry>,
}

impl Sets {
    fn set_mut(&mut self, set: ChannelSet) -> &mut BTreeMap<ChannelName, ChannelEntry> {
        match set {
            ChannelSet::Membership => &mut self.membership,
            ChannelSet::Watch => &mut self.watch,
        }
    }
}

/// In-memory store backed by `BTreeMap`. No persistence, for tests only.
///
/// Counts `list` calls so callers can assert on cache behaviour.
#[derive(Default)]
pub struct MemoryChannelStore {
    sets: Mutex<Sets>,
    loads: AtomicUsize,
}

impl MemoryChannelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `list` calls served so far.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelStore for MemoryChannelStore {
    async fn list(&self, set: ChannelSet) -> Result<Vec<ChannelEntry>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let mut sets = self.sets.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries: Vec<ChannelEntry> = sets.set_mut(set).values().cloned().collect();
        entries.sort_by_key(|e| e.id);
        Ok(entries)
    }

    async fn add(&self, set: ChannelSet, name: &ChannelName) -> Result<()> {
        let mut sets = self.sets.lock().unwrap_or_else(|e| e.into_inner());
        let now = unix_now();
        if let Some(entry) = sets.set_mut(set).get_mut(name) {
            entry.updated_at = now;
            return Ok(());
        }
        sets.next_id += 1;
        let entry = ChannelEntry {
            id: sets.next_id,
            name: name.clone(),
            created_at: now,
            updated_at: now,
        };
        sets.set_mut(set).insert(name.clone(), entry);
        Ok(())
    }

    async fn remove(&self, set: ChannelSet, name: &ChannelName) -> Result<bool> {
        let mut sets = self.sets.lock().unwrap_or_else(|e| e.into_inner());
        Ok(sets.set_mut(set).remove(name).is_some())
    }
}
