//! HTTP client for the remote progress service.
//!
//! Reads are bounded by [`READ_TIMEOUT`], writes by [`WRITE_TIMEOUT`]. A
//! timeout is reported as an ordinary [`ClientError::Http`].

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::{READ_TIMEOUT, WRITE_TIMEOUT};
use crate::models::*;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too many requests, try again in a minute")]
    RateLimited,

    #[error("Server error: {0}")]
    Server(String),

    #[error("Not signed in")]
    NoIdentity,
}

#[derive(Debug, Clone)]
pub struct ProgressClient {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl ProgressClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            client: Client::new(),
        }
    }

    /// A copy of this client that authenticates as `token`.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..self.clone()
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let timeout = if method == Method::GET {
            READ_TIMEOUT
        } else {
            WRITE_TIMEOUT
        };
        let url = format!("{}/api{}", self.base_url, path);
        let mut req = self.client.request(method, &url).timeout(timeout);
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    fn authenticated(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder, ClientError> {
        if self.token.is_none() {
            return Err(ClientError::NoIdentity);
        }
        Ok(self.request(method, path))
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(body)),
            StatusCode::BAD_REQUEST => Err(ClientError::BadRequest(body)),
            StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized(body)),
            StatusCode::CONFLICT => Err(ClientError::Conflict(body)),
            StatusCode::TOO_MANY_REQUESTS => Err(ClientError::RateLimited),
            _ => Err(ClientError::Server(format!("{}: {}", status, body))),
        }
    }

    // ============================================================
    // Catalogue
    // ============================================================

    pub async fn labs(&self) -> Result<Vec<LabInfo>, ClientError> {
        let response = self.request(Method::GET, "/labs").send().await?;
        self.handle_response(response).await
    }

    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, ClientError> {
        let response = self.request(Method::GET, "/leaderboard").send().await?;
        self.handle_response(response).await
    }

    // ============================================================
    // Auth
    // ============================================================

    pub async fn signup(&self, input: &SignupInput) -> Result<AuthResponse, ClientError> {
        let response = self
            .request(Method::POST, "/auth/signup")
            .json(input)
            .send()
            .await?;
        self.handle_response(response).await
    }

    pub async fn login(&self, input: &LoginInput) -> Result<AuthResponse, ClientError> {
        let response = self
            .request(Method::POST, "/auth/login")
            .json(input)
            .send()
            .await?;
        self.handle_response(response).await
    }

    pub async fn me(&self) -> Result<User, ClientError> {
        let response = self.authenticated(Method::GET, "/auth/me")?.send().await?;
        let me: MeResponse = self.handle_response(response).await?;
        Ok(me.user)
    }

    // ============================================================
    // Progress
    // ============================================================

    pub async fn fetch_progress(&self) -> Result<ProgressSnapshot, ClientError> {
        let response = self.authenticated(Method::GET, "/progress")?.send().await?;
        self.handle_response(response).await
    }

    pub async fn record_step(&self, input: RecordStepInput) -> Result<RecordStepResponse, ClientError> {
        let response = self
            .authenticated(Method::POST, "/progress")?
            .json(&input)
            .send()
            .await?;
        self.handle_response(response).await
    }
}
