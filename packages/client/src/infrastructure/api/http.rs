//! HTTP client for the portal's authentication endpoints.

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::{
    domain::{AuthGateway, FetchError, IdentityFetcher, Role, UserIdentity},
    infrastructure::dto::http::LoginResponse,
};

/// REST client sharing one cookie jar across calls, so the session cookie
/// set by `login` authenticates `user/details` and `logout`.
#[derive(Debug, Clone)]
pub struct PortalApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl PortalApiClient {
    /// `base_url` is the API root, e.g. `http://localhost:9999/lost-found`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl IdentityFetcher for PortalApiClient {
    async fn fetch_current_user(&self) -> Result<UserIdentity, FetchError> {
        let response = self
            .http
            .get(self.url("user/details"))
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NO_CONTENT => {
                return Err(FetchError::Unauthenticated);
            }
            status if !status.is_success() => {
                return Err(FetchError::Request(format!("user/details returned {}", status)));
            }
            _ => {}
        }

        let text = response
            .text()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;
        if text.trim().is_empty() || text.trim() == "null" {
            return Err(FetchError::Unauthenticated);
        }
        serde_json::from_str(&text).map_err(|e| FetchError::InvalidPayload(e.to_string()))
    }
}

#[async_trait]
impl AuthGateway for PortalApiClient {
    /// `POST /login` with form-encoded credentials. Returns the role the portal assigned.
    async fn login(&self, username: &str, password: &str) -> Result<Role, FetchError> {
        let response = self
            .http
            .post(self.url("login"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(FetchError::Unauthenticated);
        }
        if !response.status().is_success() {
            return Err(FetchError::Request(format!("login returned {}", response.status())));
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| FetchError::InvalidPayload(e.to_string()))?;
        let role = body.role.ok_or(FetchError::Unauthenticated)?;
        role.parse::<Role>()
            .map_err(|e| FetchError::InvalidPayload(e.to_string()))
    }

    /// `POST /logout`.
    async fn logout(&self) -> Result<(), FetchError> {
        let response = self
            .http
            .post(self.url("logout"))
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(FetchError::Request(format!("logout returned {}", response.status())))
        }
    }
}
