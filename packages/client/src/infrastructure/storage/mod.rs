//! Client-side persistent storage implementations.

pub mod file;
pub mod inmemory;

pub use file::FileStorage;
pub use inmemory::InMemoryStorage;
