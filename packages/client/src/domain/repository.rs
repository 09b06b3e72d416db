//! Repository trait 定義
//!
//! セッション管理が必要とする永続化・リモート取得のインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

use async_trait::async_trait;

use super::{FetchError, Role, StorageError, UserIdentity};

/// Client-side persistent key-value storage
///
/// 値は JSON 文字列として保存されます。ログイン中のユーザーは
/// `currentUser` キーに保存されます。
#[async_trait]
pub trait IdentityStorage: Send + Sync {
    /// キーに対応する値を取得
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// キーに値を保存
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// キーを削除
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Remote lookup of the authenticated user (REST `user/details`)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityFetcher: Send + Sync {
    /// 現在のセッションに紐づくユーザーを取得
    async fn fetch_current_user(&self) -> Result<UserIdentity, FetchError>;
}

/// Portal authentication endpoints
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// 認証情報でログインし、割り当てられたロールを返す
    async fn login(&self, username: &str, password: &str) -> Result<Role, FetchError>;

    /// サーバー側のセッションを破棄
    async fn logout(&self) -> Result<(), FetchError>;
}
