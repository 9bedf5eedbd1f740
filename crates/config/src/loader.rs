use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{
    env_subst::substitute_env,
    error::{Error, Result},
    schema::BeholderConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "beholder.toml",
    "beholder.yaml",
    "beholder.yml",
    "beholder.json",
];

/// Prefix of environment variables overriding single fields, e.g.
/// `BEHOLDER_DATABASE_URL`.
pub const ENV_PREFIX: &str = "BEHOLDER_";

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<BeholderConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./beholder.{toml,yaml,yml,json}` (project-local)
/// 2. `<user config dir>/beholder.{toml,yaml,yml,json}` (user-global)
///
/// Returns `BeholderConfig::default()` if no config file is found or the file
/// found cannot be loaded.
pub fn discover_and_load() -> BeholderConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    BeholderConfig::default()
}

/// Load `explicit` (errors are fatal) or discover a config file, then apply
/// `BEHOLDER_*` overrides from the process environment and validate.
pub fn load(explicit: Option<&Path>) -> Result<BeholderConfig> {
    let mut config = match explicit {
        Some(path) => load_config(path)?,
        None => discover_and_load(),
    };
    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/beholder/` on Linux).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "beholder").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> Result<BeholderConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "json" => serde_json::from_str(raw).map_err(|e| Error::parse(path, e)),
        _ => Err(Error::UnsupportedFormat {
            extension: ext.to_owned(),
        }),
    }
}

/// Apply `BEHOLDER_*` overrides from the process environment.
pub fn apply_env_overrides(config: &mut BeholderConfig) -> Result<()> {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

/// Apply overrides using a custom lookup, keyed by full variable name.
pub fn apply_env_overrides_with(
    config: &mut BeholderConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    let get = |key: &str| {
        let var = format!("{ENV_PREFIX}{key}");
        lookup(&var).map(|value| (var, value))
    };

    if let Some((_, v)) = get("IRC_NICK") {
        config.irc.nick = v;
    }
    if let Some((_, v)) = get("IRC_USERNAME") {
        config.irc.username = v;
    }
    if let Some((_, v)) = get("IRC_REALNAME") {
        config.irc.realname = v;
    }
    if let Some((_, v)) = get("IRC_HOST") {
        config.irc.host = v;
    }
    if let Some((var, v)) = get("IRC_PORT") {
        config.irc.port = parse_number(&var, &v)?;
    }
    if let Some((var, v)) = get("IRC_TLS") {
        config.irc.tls = parse_bool(&var, &v)?;
    }
    if let Some((_, v)) = get("IRC_ADMIN_NICK") {
        config.irc.admin_nick = non_empty(v);
    }
    if let Some((_, v)) = get("IRC_COMMAND_PREFIX") {
        config.irc.command_prefix = v;
    }
    if let Some((_, v)) = get("IRC_NICKSERV_PASSWORD") {
        config.irc.nickserv_password = non_empty(v).map(Secret::new);
    }
    if let Some((_, v)) = get("DATABASE_URL") {
        config.database.url = v;
    }
    if let Some((var, v)) = get("DATABASE_CONNECT_ATTEMPTS") {
        config.database.connect_attempts = parse_number(&var, &v)?;
    }
    if let Some((var, v)) = get("DATABASE_RETRY_DELAY_SECS") {
        config.database.retry_delay_secs = parse_number(&var, &v)?;
    }
    if let Some((var, v)) = get("RECONCILE_TICK_INTERVAL_SECS") {
        config.reconcile.tick_interval_secs = parse_number(&var, &v)?;
    }
    if let Some((_, v)) = get("CONTROL_SOCKET_PATH") {
        config.control.socket_path = non_empty(v).map(PathBuf::from);
    }
    Ok(())
}

fn non_empty(value: String) -> Option<String> {
    (!value.trim().is_empty()).then_some(value)
}

fn parse_number<T>(var: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| Error::InvalidOverride {
            var: var.to_owned(),
            value: value.to_owned(),
            message: e.to_string(),
        })
}

fn parse_bool(var: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidOverride {
            var: var.to_owned(),
            value: value.to_owned(),
            message: "expected a boolean".into(),
        }),
    }
}
