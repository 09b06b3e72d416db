//! Envelope codec for chat message content.
//!
//! A CHAT message's content packs a display alias, a flair key and the
//! free text as `[alias][flairKey] text`. Brackets inside alias or flair
//! are not escaped.

use std::sync::LazyLock;

use regex::Regex;

/// Flair key used whenever a message carries none.
pub const DEFAULT_FLAIR_KEY: &str = "regular";

static FLAIR_ENVELOPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\[(.*?)\]\[(.*?)\]\s(.*)").expect("valid envelope regex"));

static ALIAS_ENVELOPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\[(.*?)\]\s(.*)").expect("valid envelope regex"));

/// Decoded content of a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub alias: String,
    /// Raw flair key as sent; see [`Flair::from_key`] for display semantics.
    pub flair_key: String,
    pub text: String,
}

impl Envelope {
    pub fn new(
        alias: impl Into<String>,
        flair_key: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            alias: alias.into(),
            flair_key: flair_key.into(),
            text: text.into(),
        }
    }

    /// Pack into `[alias][flairKey] text`.
    pub fn encode(alias: &str, flair_key: &str, text: &str) -> String {
        format!("[{}][{}] {}", alias, flair_key, text)
    }

    /// Unpack message content, falling back to the single-alias form and
    /// finally to the raw content attributed to `fallback_sender`.
    pub fn decode(content: &str, fallback_sender: &str) -> Self {
        if let Some(caps) = FLAIR_ENVELOPE.captures(content) {
            let (alias, flair, text) = (&caps[1], &caps[2], &caps[3]);
            if !alias.is_empty() && !flair.is_empty() && !text.is_empty() {
                return Self::new(alias, flair, text);
            }
        }

        if let Some(caps) = ALIAS_ENVELOPE.captures(content) {
            let (alias, text) = (&caps[1], &caps[2]);
            if !alias.is_empty() && !text.is_empty() {
                return Self::new(alias, DEFAULT_FLAIR_KEY, text);
            }
        }

        Self::new(fallback_sender, DEFAULT_FLAIR_KEY, content)
    }

    pub fn flair(&self) -> Flair {
        Flair::from_key(&self.flair_key)
    }
}

/// Display category attached to a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Flair {
    Lost,
    Found,
    #[default]
    Regular,
}

impl Flair {
    /// Unrecognised keys display as [`Flair::Regular`].
    pub fn from_key(key: &str) -> Self {
        match key {
            "lost" => Flair::Lost,
            "found" => Flair::Found,
            _ => Flair::Regular,
        }
    }

    /// Strict variant for user input.
    pub fn parse_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "lost" => Some(Flair::Lost),
            "found" => Some(Flair::Found),
            "regular" => Some(Flair::Regular),
            _ => None,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Flair::Lost => "lost",
            Flair::Found => "found",
            Flair::Regular => DEFAULT_FLAIR_KEY,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Flair::Lost => "🟡 ASK Lost Item",
            Flair::Found => "🟢 ASK Found Item",
            Flair::Regular => "🔵 Regular User",
        }
    }
}
