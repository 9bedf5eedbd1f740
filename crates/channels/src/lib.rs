//! Channel sets and their persistence.
//!
//! Two independent sets of IRC channels are stored: the membership set (the
//! channels the bot should sit in) and the watch set (channels whose activity
//! is observed). Names are normalized before they are used as keys, see
//! [`ChannelName`]. [`ChannelRepository`] fronts a [`ChannelStore`] and keeps a
//! read-through cache of the membership set.

pub mod cache;
pub mod error;
pub mod name;
pub mod repository;
pub mod store;
pub mod store_memory;
pub mod store_sqlite;

pub use {
    cache::{Membership, MembershipCache},
    error::{Error, Result},
    name::ChannelName,
    repository::ChannelRepository,
    store::{ChannelEntry, ChannelSet, ChannelStore},
    store_memory::MemoryChannelStore,
    store_sqlite::{CORE_SCHEMA, SqliteChannelStore, core_migrations, run_migrations},
};
