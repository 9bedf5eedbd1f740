use std::{fmt, str::FromStr};

use {
    beholder_persistence::repair_utf8,
    serde::{Deserialize, Serialize},
};

use crate::error::{Error, Result};

/// Canonical, case-insensitive IRC channel name: lowercase with exactly one
/// leading `#`.
///
/// `"#Foo"`, `"foo"` and `"##FOO"` all normalize to `"#foo"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelName(String);

impl ChannelName {
    /// Normalize raw user or network input.
    ///
    /// Bytes that are not valid UTF-8 are repaired as Windows-1252 first.
    pub fn from_input<R>(input: &R) -> Result<Self>
    where
        R: AsRef<[u8]> + ?Sized,
    {
        let text = repair_utf8(input.as_ref());
        let bare = text.trim_start_matches('#');
        if bare.is_empty() {
            return Err(Error::invalid_channel(&text));
        }
        Ok(Self(format!("#{}", bare.to_lowercase())))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChannelName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ChannelName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_input(s)
    }
}

impl TryFrom<String> for ChannelName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::from_input(&value)
    }
}

impl From<ChannelName> for String {
    fn from(name: ChannelName) -> Self {
        name.0
    }
}
