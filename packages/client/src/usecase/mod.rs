//! UseCase 層: セッション管理、購読の振り分け、チャットサービスのイベントループ

pub mod auth;
pub mod chat_service;
pub mod error;
pub mod session_store;
pub mod subscription;

pub use auth::AuthUseCase;
pub use chat_service::{ChatCommand, ChatHandle, ChatService, ChatUpdate};
pub use error::ClientError;
pub use session_store::{CURRENT_USER_KEY, SessionEvent, SessionStore};
pub use subscription::{InboundFrame, Subscription, SubscriptionRegistry};
