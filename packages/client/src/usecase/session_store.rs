//! UseCase: ログインユーザーのセッション管理
//!
//! 現在のユーザーを「メモリキャッシュ → 永続ストレージ → リモート取得」の順で解決し、
//! ログイン・ログアウトを `SessionEvent` としてブロードキャストします。
//! Chat Service はこのイベントを購読して接続・切断を行います。

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};

use crate::domain::{IdentityFetcher, IdentityStorage, StorageError, UserIdentity};

/// Storage key of the logged-in user.
pub const CURRENT_USER_KEY: &str = "currentUser";

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Identity change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    UserLogin(UserIdentity),
    UserLogout,
}

/// ログインユーザーを保持するストア
pub struct SessionStore {
    /// 永続ストレージ（`currentUser` キー）
    storage: Arc<dyn IdentityStorage>,
    /// REST `user/details` による取得
    fetcher: Arc<dyn IdentityFetcher>,
    /// メモリキャッシュ
    current: Mutex<Option<UserIdentity>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn IdentityStorage>, fetcher: Arc<dyn IdentityFetcher>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            storage,
            fetcher,
            current: Mutex::new(None),
            events,
        }
    }

    /// ログイン・ログアウトイベントを購読
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// 現在のユーザーを取得
    ///
    /// キャッシュ、永続ストレージ、リモート取得の順に解決します。
    /// 保存値が壊れている場合は削除して「未ログイン」とみなします。
    /// リモート取得の失敗も「未ログイン」として扱います。
    pub async fn get_current_user(&self) -> Option<UserIdentity> {
        let mut current = self.current.lock().await;
        if let Some(user) = current.as_ref() {
            return Some(user.clone());
        }

        match self.storage.get(CURRENT_USER_KEY).await {
            Ok(Some(raw)) => {
                return match serde_json::from_str::<UserIdentity>(&raw) {
                    Ok(user) => {
                        *current = Some(user.clone());
                        Some(user)
                    }
                    Err(e) => {
                        tracing::warn!("Discarding corrupt stored user: {}", e);
                        if let Err(e) = self.storage.remove(CURRENT_USER_KEY).await {
                            tracing::warn!("Failed to remove corrupt stored user: {}", e);
                        }
                        None
                    }
                };
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Failed to read stored user: {}", e),
        }

        match self.fetcher.fetch_current_user().await {
            Ok(user) => {
                if let Err(e) = self.persist(&user).await {
                    tracing::warn!("Failed to persist fetched user: {}", e);
                }
                *current = Some(user.clone());
                Some(user)
            }
            Err(e) => {
                tracing::debug!("No remote session: {}", e);
                None
            }
        }
    }

    /// ユーザーを保存して `UserLogin` を通知
    pub async fn set_current_user(&self, user: UserIdentity) -> Result<(), StorageError> {
        self.persist(&user).await?;
        *self.current.lock().await = Some(user.clone());
        tracing::info!("User {} logged in", user.username);
        self.emit(SessionEvent::UserLogin(user));
        Ok(())
    }

    /// ユーザーを削除して `UserLogout` を通知
    ///
    /// ストレージの削除に失敗してもキャッシュはクリアし、イベントは通知します。
    pub async fn clear_current_user(&self) -> Result<(), StorageError> {
        let removed = self.storage.remove(CURRENT_USER_KEY).await;
        *self.current.lock().await = None;
        tracing::info!("User logged out");
        self.emit(SessionEvent::UserLogout);
        removed
    }

    /// 起動時の復元: ユーザーが解決できれば `UserLogin` を通知
    pub async fn restore(&self) -> Option<UserIdentity> {
        let user = self.get_current_user().await?;
        self.emit(SessionEvent::UserLogin(user.clone()));
        Some(user)
    }

    async fn persist(&self, user: &UserIdentity) -> Result<(), StorageError> {
        let raw = serde_json::to_string(user)?;
        self.storage.set(CURRENT_USER_KEY, &raw).await
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("No session subscribers");
        }
    }
}
