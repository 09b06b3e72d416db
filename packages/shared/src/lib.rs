//! Utilities shared by the campus chat binaries and tests.

pub mod logger;
pub mod time;
