//! STOMP 1.2 over WebSocket.
//!
//! ## 構成
//!
//! - `frame`: フレームのエンコード/デコード
//! - `heartbeat`: heart-beat ヘッダーのネゴシエーション
//! - `client`: `Transport` trait の WebSocket 実装（自動再接続付き）

pub mod client;
pub mod frame;
pub mod heartbeat;

pub use client::StompTransport;
pub use frame::{Command, Frame};
