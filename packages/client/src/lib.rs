//! Real-time chat client for the campus lost-and-found portal.
//!
//! The client keeps one STOMP-over-WebSocket connection per logged-in user,
//! subscribes to the global broadcast channel and the user's private channel,
//! and maintains the in-memory conversation transcripts for a terminal UI.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;
