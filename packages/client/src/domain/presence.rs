//! Live count of users connected to the global channel.

use std::sync::LazyLock;

use regex::Regex;

// ASCII digits only; `\d` would also match other Unicode digits.
static ONLINE_USERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Online users: ([0-9]+)").expect("valid presence regex"));

/// Presence counter fed by JOIN/LEAVE broadcasts.
///
/// Reset only when a connection is (re)established, so the last count stays
/// visible while disconnected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresenceCounter {
    count: u32,
}

impl PresenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Replace the count with the number following `Online users: `, if any.
    ///
    /// Returns the new count when the content carried one.
    pub fn update_from_content(&mut self, content: &str) -> Option<u32> {
        let count = extract_online_count(content)?;
        self.count = count;
        Some(count)
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }
}

/// First integer following `Online users: ` in `content`.
pub fn extract_online_count(content: &str) -> Option<u32> {
    ONLINE_USERS
        .captures(content)
        .and_then(|caps| caps[1].parse().ok())
}
