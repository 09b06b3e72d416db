//! Portal REST response bodies.

use serde::Deserialize;

/// Response of `POST /login`. Only the role is consumed.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub role: Option<String>,
}
