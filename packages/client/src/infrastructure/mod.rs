//! Infrastructure layer: STOMP-over-WebSocket transport, identity storage,
//! the portal REST client and wire DTOs.

pub mod api;
pub mod dto;
pub mod stomp;
pub mod storage;
