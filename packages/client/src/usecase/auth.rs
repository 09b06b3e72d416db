//! UseCase: ログイン・ログアウト
//!
//! ポータルの REST API で認証し、結果を Session Store に反映します。
//! Session Store が `SessionEvent` を通知するため、接続・切断は Chat Service が行います。

use std::sync::Arc;

use crate::domain::{AuthGateway, IdentityFetcher, UserIdentity};

use super::{error::ClientError, session_store::SessionStore};

pub struct AuthUseCase {
    gateway: Arc<dyn AuthGateway>,
    fetcher: Arc<dyn IdentityFetcher>,
    session: Arc<SessionStore>,
}

impl AuthUseCase {
    pub fn new(
        gateway: Arc<dyn AuthGateway>,
        fetcher: Arc<dyn IdentityFetcher>,
        session: Arc<SessionStore>,
    ) -> Self {
        Self {
            gateway,
            fetcher,
            session,
        }
    }

    /// ログインを実行
    ///
    /// 1. 認証してロールを確認（未知のロールはエラー）
    /// 2. `user/details` でユーザー情報を取得
    /// 3. Session Store に保存（`UserLogin` が通知される）
    pub async fn login(&self, username: &str, password: &str) -> Result<UserIdentity, ClientError> {
        let role = self.gateway.login(username, password).await?;
        tracing::debug!("Portal accepted {} as {}", username, role);

        let user = self.fetcher.fetch_current_user().await?;
        self.session.set_current_user(user.clone()).await?;
        Ok(user)
    }

    /// ログアウトを実行
    ///
    /// サーバー側の失敗は無視し、ローカルのセッションは必ずクリアします。
    pub async fn logout(&self) -> Result<(), ClientError> {
        if let Err(e) = self.gateway.logout().await {
            tracing::warn!("Portal logout failed, clearing local session anyway: {}", e);
        }
        self.session.clear_current_user().await?;
        Ok(())
    }
}
