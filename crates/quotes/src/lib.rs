//! Quote storage on its own `quotes` schema, versioned independently of the
//! channel tables.

pub mod error;
pub mod store;

pub use {
    error::{Error, Result},
    store::{MAX_QUOTE_CHARS, QUOTES_SCHEMA, Quote, QuoteStore, quotes_migrations},
};
