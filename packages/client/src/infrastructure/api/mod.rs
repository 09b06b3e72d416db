//! Portal REST API client.

pub mod http;

pub use http::PortalApiClient;
