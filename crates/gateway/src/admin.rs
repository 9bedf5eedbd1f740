/// Channel operation requested by the bot admin over private message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    Join,
    Leave,
    WatchAdd,
    WatchRemove,
}

impl AdminAction {
    fn from_verb(verb: &str) -> Option<Self> {
        match verb {
            "join" => Some(Self::Join),
            "leave" => Some(Self::Leave),
            "watch+" | "behold+" => Some(Self::WatchAdd),
            "watch-" | "behold-" => Some(Self::WatchRemove),
            _ => None,
        }
    }

    /// Whether the action changes the membership set.
    #[must_use]
    pub fn is_membership(self) -> bool {
        matches!(self, Self::Join | Self::Leave)
    }
}

/// `please <join|leave|watch+|watch-> <channel> now`
///
/// `behold+` and `behold-` are accepted for `watch+` and `watch-`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCommand {
    pub action: AdminAction,
    pub channel: String,
}

impl AdminCommand {
    /// Parse a private message; anything else yields `None`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let rest = text.strip_prefix("please ")?.strip_suffix(" now")?;
        let (verb, channel) = rest.split_once(' ')?;
        if channel.is_empty() || channel.contains(char::is_whitespace) {
            return None;
        }
        Some(Self {
            action: AdminAction::from_verb(verb)?,
            channel: channel.to_owned(),
        })
    }
}
