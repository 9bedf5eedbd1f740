//! Configuration loading, env substitution, env overrides and validation.
//!
//! Config files: `beholder.toml`, `beholder.yaml`, `beholder.yml` or
//! `beholder.json`, searched in `./` then the user config directory
//! (`~/.config/beholder/` on Linux).
//!
//! `${ENV_VAR}` placeholders are substituted in the raw file, then
//! `BEHOLDER_*` variables override individual fields.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{
        ENV_PREFIX, apply_env_overrides, apply_env_overrides_with, config_dir, discover_and_load,
        load, load_config,
    },
    schema::{BeholderConfig, ControlConfig, DatabaseConfig, IrcConfig, ReconcileConfig},
    validate::{Diagnostic, Severity, ValidationResult},
};
