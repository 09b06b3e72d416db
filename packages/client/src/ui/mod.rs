//! Terminal presentation layer.

pub mod command;
pub mod formatter;
pub mod prompt;
pub mod runner;
pub mod view;

pub use runner::run_client;
