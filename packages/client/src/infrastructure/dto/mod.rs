//! Data Transfer Objects (DTOs) for the chat client.
//!
//! DTOs are organized by protocol:
//! - `chat`: STOMP SEND bodies
//! - `http`: portal REST responses

pub mod chat;
pub mod http;
