//! Subscription bookkeeping and inbound frame routing.

use crate::domain::ChatMessage;

/// Broadcast topic every client subscribes to.
pub const GLOBAL_TOPIC: &str = "/topic/global";
/// Per-user private topic is this prefix followed by the username.
pub const PRIVATE_TOPIC_PREFIX: &str = "/topic/private.";
pub const SEND_GLOBAL_DESTINATION: &str = "/app/chat.sendMessage";
pub const SEND_PRIVATE_DESTINATION: &str = "/app/chat.sendPrivateMessage";

pub fn private_topic(username: &str) -> String {
    format!("{PRIVATE_TOPIC_PREFIX}{username}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Global,
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: String,
    pub destination: String,
    pub channel: Channel,
}

/// A parsed inbound frame and where it belongs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Global(ChatMessage),
    /// `peer` is the other party of the private conversation
    Private { peer: String, message: ChatMessage },
}

/// Tracks the subscriptions of the current connection.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    username: Option<String>,
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active subscriptions with the global topic plus the
    /// private topic of `username`.
    ///
    /// Ids keep increasing across calls so a frame addressed to an old
    /// subscription never matches a new one.
    pub fn bind(&mut self, username: &str) -> Vec<Subscription> {
        let global = self.allocate(GLOBAL_TOPIC.to_string(), Channel::Global);
        let private = self.allocate(private_topic(username), Channel::Private);
        self.username = Some(username.to_string());
        self.subscriptions = vec![global, private];
        self.subscriptions.clone()
    }

    pub fn clear(&mut self) {
        self.username = None;
        self.subscriptions.clear();
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    fn allocate(&mut self, destination: String, channel: Channel) -> Subscription {
        self.next_id += 1;
        Subscription {
            id: format!("sub-{}", self.next_id),
            destination,
            channel,
        }
    }

    /// Which channel a frame belongs to, by subscription id when the broker
    /// sent one, otherwise by destination.
    pub fn channel_for(&self, subscription: Option<&str>, destination: &str) -> Option<Channel> {
        let found = match subscription {
            Some(id) => self.subscriptions.iter().find(|s| s.id == id),
            None => self
                .subscriptions
                .iter()
                .find(|s| s.destination == destination),
        };
        found.map(|s| s.channel)
    }

    /// Parse and route one MESSAGE frame. Unknown subscriptions and
    /// malformed bodies yield `None`.
    pub fn route(
        &self,
        subscription: Option<&str>,
        destination: &str,
        body: &str,
    ) -> Option<InboundFrame> {
        let Some(channel) = self.channel_for(subscription, destination) else {
            tracing::debug!(
                "Dropping frame for unknown subscription {:?} ({})",
                subscription,
                destination
            );
            return None;
        };
        let message = ChatMessage::from_json(body)?;

        match channel {
            Channel::Global => Some(InboundFrame::Global(message)),
            Channel::Private => {
                let me = self.username.as_deref().unwrap_or_default();
                let peer = if message.sender == me {
                    message.recipient.clone().unwrap_or_default()
                } else {
                    message.sender.clone()
                };
                if peer.is_empty() {
                    tracing::debug!("Dropping private frame without a peer");
                    return None;
                }
                Some(InboundFrame::Private { peer, message })
            }
        }
    }
}
