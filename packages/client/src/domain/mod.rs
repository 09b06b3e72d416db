//! Domain layer: pure types, state machine, reducer and the seams the
//! outer layers implement.

pub mod connection;
pub mod conversation;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod message;
pub mod presence;
pub mod repository;
pub mod transport;

pub use connection::{ConnectionEvent, ConnectionState};
pub use conversation::{ConversationKey, ConversationStore};
pub use envelope::{Envelope, Flair};
pub use error::{
    FetchError, FrameError, IdentityError, PublishError, StorageError, TransitionError,
    TransportError,
};
pub use identity::{Role, UserIdentity};
pub use message::{ChatMessage, MessageTimestamp, MessageType};
pub use presence::PresenceCounter;
pub use repository::{AuthGateway, IdentityFetcher, IdentityStorage};
pub use transport::{ConnectRequest, Transport, TransportEvent, TransportHandle};
