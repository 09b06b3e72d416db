//! UseCase 層のエラー定義

use thiserror::Error;

use crate::{
    config::ConfigError,
    domain::{FetchError, StorageError, TransportError},
};

/// Errors surfaced to the CLI
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Login failed: {0}")]
    Login(#[from] FetchError),

    #[error("Failed to store session: {0}")]
    Storage(#[from] StorageError),

    #[error("Transport setup failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Client setup failed: {0}")]
    Setup(String),
}
