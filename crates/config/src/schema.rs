//! Config schema types.

use std::{path::PathBuf, time::Duration};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BeholderConfig {
    pub irc: IrcConfig,
    pub database: DatabaseConfig,
    pub reconcile: ReconcileConfig,
    pub control: ControlConfig,
}

/// IRC identity and server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IrcConfig {
    pub nick: String,
    pub username: String,
    pub realname: String,
    pub host: String,
    pub port: u16,
    pub tls: bool,
    /// Nick allowed to manage channels over private message.
    pub admin_nick: Option<String>,
    /// Prefix of channel commands such as `!quote`.
    pub command_prefix: String,
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub nickserv_password: Option<Secret<String>>,
}

impl Default for IrcConfig {
    fn default() -> Self {
        Self {
            nick: "beholder".into(),
            username: "beholder".into(),
            realname: "Beholder IRC bot".into(),
            host: "irc.libera.chat".into(),
            port: 6697,
            tls: true,
            admin_nick: None,
            command_prefix: "!".into(),
            nickserv_password: None,
        }
    }
}

/// Relational store and connection retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite URL, e.g. `sqlite:/var/lib/beholder/beholder.db`.
    pub url: String,
    pub connect_attempts: u32,
    pub retry_delay_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:beholder.db".into(),
            connect_attempts: 12,
            retry_delay_secs: 5,
        }
    }
}

impl DatabaseConfig {
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub tick_interval_secs: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 2,
        }
    }
}

impl ReconcileConfig {
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }
}

/// Cross-process control socket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Unix socket of the bot process. Unset: the bot listens nowhere and
    /// control commands do not signal it.
    pub socket_path: Option<PathBuf>,
}

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config: BeholderConfig = toml::from_str("").unwrap();
        assert_eq!(config.irc.nick, "beholder");
        assert_eq!(config.irc.port, 6697);
        assert_eq!(config.database.connect_attempts, 12);
        assert_eq!(config.database.retry_delay(), Duration::from_secs(5));
        assert_eq!(config.reconcile.tick_interval(), Duration::from_secs(2));
        assert!(config.control.socket_path.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: BeholderConfig = toml::from_str(
            r#"
            [irc]
            nick = "watcher"
            admin_nick = "boss"
            nickserv_password = "hunter2"

            [control]
            socket_path = "/run/beholder.sock"
            "#,
        )
        .unwrap();
        assert_eq!(config.irc.nick, "watcher");
        assert_eq!(config.irc.host, "irc.libera.chat");
        assert_eq!(config.irc.admin_nick.as_deref(), Some("boss"));
        assert_eq!(
            config
                .irc
                .nickserv_password
                .as_ref()
                .map(|s| s.expose_secret().as_str()),
            Some("hunter2")
        );
        assert_eq!(
            config.control.socket_path,
            Some(PathBuf::from("/run/beholder.sock"))
        );
    }

    #[test]
    fn secret_is_redacted_in_debug() {
        let config: BeholderConfig =
            toml::from_str("[irc]\nnickserv_password = \"hunter2\"").unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
