//! Wikitext templates and edit summaries, keyed by name.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static PLURAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\$plur\|(\d+)\|([^|}]*)\|([^|}]*)\}\}").expect("valid regex")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("message `{0}` not found")]
    Missing(String),
    #[error("messages page is not a JSON object of strings: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default)]
pub struct MessageProvider {
    messages: HashMap<String, String>,
}

impl MessageProvider {
    pub fn new(messages: HashMap<String, String>) -> Self {
        Self { messages }
    }

    pub fn from_json(text: &str) -> Result<Self, MessageError> {
        serde_json::from_str(text)
            .map(Self::new)
            .map_err(|err| MessageError::Invalid(err.to_string()))
    }

    pub fn get(&self, key: &str) -> Result<Message, MessageError> {
        self.messages
            .get(key)
            .map(|text| Message { text: text.clone() })
            .ok_or_else(|| MessageError::Missing(key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// A message with its placeholders partially or fully substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    text: String,
}

impl Message {
    /// Replaces every occurrence of `key` with `value`, literally.
    pub fn param(mut self, key: &str, value: impl AsRef<str>) -> Self {
        self.text = self.text.replace(key, value.as_ref());
        self
    }

    /// Like [`Message::param`] for several pairs; longer keys go first so
    /// `$10` is not clobbered by `$1`.
    pub fn params<K, V>(self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut pairs: Vec<(K, V)> = pairs.into_iter().collect();
        pairs.sort_by_key(|(k, _)| std::cmp::Reverse(k.as_ref().len()));
        pairs
            .into_iter()
            .fold(self, |msg, (k, v)| msg.param(k.as_ref(), v))
    }

    /// Final text with `{{$plur|n|singular|plural}}` resolved.
    pub fn text(&self) -> String {
        PLURAL_RE
            .replace_all(&self.text, |caps: &regex::Captures<'_>| {
                if &caps[1] == "1" {
                    caps[2].to_string()
                } else {
                    caps[3].to_string()
                }
            })
            .into_owned()
    }

    pub fn raw(&self) -> &str {
        &self.text
    }
}

/// `a`, `a e b`, `a, b e c`
pub fn comma_list<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [] => String::new(),
        [one] => one.as_ref().to_string(),
        [init @ .., last] => {
            let head: Vec<&str> = init.iter().map(AsRef::as_ref).collect();
            format!("{} e {}", head.join(", "), last.as_ref())
        }
    }
}
