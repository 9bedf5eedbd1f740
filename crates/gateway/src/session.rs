use {
    anyhow::Result,
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    tracing::info,
};

use beholder_channels::ChannelName;

/// Inbound events from the IRC session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Registration completed; a fresh session is in no channels.
    Established,
    /// A private message addressed to the bot.
    PrivateMessage { from: String, text: String },
    /// A message posted in a channel the bot sits in.
    ChannelMessage {
        channel: ChannelName,
        from: String,
        text: String,
    },
}

/// Outbound side effects on the IRC connection.
#[async_trait]
pub trait IrcSession: Send + Sync {
    async fn join(&self, channel: &ChannelName) -> Result<()>;
    async fn part(&self, channel: &ChannelName) -> Result<()>;
    /// Send a message to a nick or channel.
    async fn send_message(&self, target: &str, text: &str) -> Result<()>;
}

/// Who the bot registers as.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    pub nick: String,
    pub username: String,
    pub realname: String,
    pub nickserv_password: Option<Secret<String>>,
}

impl SessionIdentity {
    /// Registration lines sent after connecting, in order.
    #[must_use]
    pub fn registration_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("NICK {}", self.nick),
            format!("USER {} 0 * :{}", self.username, self.realname),
        ];
        if let Some(password) = &self.nickserv_password {
            lines.push(format!(
                "PRIVMSG NickServ :IDENTIFY {}",
                password.expose_secret()
            ));
        }
        lines
    }
}

/// Session that only logs what it would send. Used for dry runs.
#[derive(Debug, Clone)]
pub struct LoggingSession {
    identity: SessionIdentity,
}

impl LoggingSession {
    pub fn new(identity: SessionIdentity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    /// Log the registration lines, with the NickServ password redacted.
    pub fn register(&self) {
        for line in self.identity.registration_lines() {
            let shown = if line.starts_with("PRIVMSG NickServ :IDENTIFY") {
                "PRIVMSG NickServ :IDENTIFY [REDACTED]"
            } else {
                line.as_str()
            };
            info!(nick = %self.identity.nick, line = shown, "register");
        }
    }
}

#[async_trait]
impl IrcSession for LoggingSession {
    async fn join(&self, channel: &ChannelName) -> Result<()> {
        info!(nick = %self.identity.nick, channel = %channel, "JOIN");
        Ok(())
    }

    async fn part(&self, channel: &ChannelName) -> Result<()> {
        info!(nick = %self.identity.nick, channel = %channel, "PART");
        Ok(())
    }

    async fn send_message(&self, target: &str, text: &str) -> Result<()> {
        info!(nick = %self.identity.nick, target, text, "PRIVMSG");
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn identity(password: Option<&str>) -> SessionIdentity {
        SessionIdentity {
            nick: "beholder".into(),
            username: "eye".into(),
            realname: "Beholder IRC bot".into(),
            nickserv_password: password.map(|p| Secret::new(p.to_owned())),
        }
    }

    #[test]
    fn registration_uses_identity() {
        assert_eq!(identity(None).registration_lines(), vec![
            "NICK beholder".to_owned(),
            "USER eye 0 * :Beholder IRC bot".to_owned(),
        ]);
        let lines = identity(Some("hunter2")).registration_lines();
        assert_eq!(lines[2], "PRIVMSG NickServ :IDENTIFY hunter2");
    }

    #[test]
    fn password_is_redacted_in_debug() {
        let session = LoggingSession::new(identity(Some("hunter2")));
        assert!(!format!("{session:?}").contains("hunter2"));
        assert_eq!(session.identity().username, "eye");
    }
}
