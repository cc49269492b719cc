//! HTTP client for the authentication endpoint.
//!
//! This module provides the `ApiClient` struct which exchanges credentials
//! for an opaque bearer token. It never touches the session store.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client, StatusCode, Url};
use tracing::debug;

use crate::auth::Credentials;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Path of the login endpoint, relative to the backend base URI
const AUTHENTICATION_PATH: &str = "authentication";

/// Accept header for the login exchange: plain-text token on success,
/// JSON or text on failure.
const AUTH_ACCEPT: &str = "text/plain, application/json";

/// API client for the backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    auth_url: Url,
}

impl ApiClient {
    /// Create a new API client for `base_uri`.
    ///
    /// No request timeout is applied unless `timeout` is given; the transport
    /// default bounds request lifetime otherwise.
    pub fn new(base_uri: &str, timeout: Option<Duration>) -> Result<Self> {
        let auth_url = Self::authentication_url(base_uri)?;

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self { client, auth_url })
    }

    /// Resolve the login endpoint below `base_uri`, keeping any path prefix.
    fn authentication_url(base_uri: &str) -> Result<Url> {
        let mut base = Url::parse(base_uri.trim())
            .with_context(|| format!("Invalid backend URI: {}", base_uri))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(AUTHENTICATION_PATH)
            .with_context(|| format!("Invalid backend URI: {}", base_uri))
    }

    pub fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    /// Exchange credentials for a token.
    ///
    /// Sends exactly one request; there is no retry.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<String, ApiError> {
        debug!(url = %self.auth_url, user = %credentials.identifier, "Sending authentication request");

        let response = self
            .client
            .post(self.auth_url.clone())
            .header(header::ACCEPT, AUTH_ACCEPT)
            .json(credentials)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let body = response.text().await?;
        let token = body.trim();

        if token.is_empty() {
            return Err(ApiError::InvalidResponse(
                "authentication succeeded but no token was returned".to_string(),
            ));
        }

        Ok(token.to_string())
    }

    /// Check if response is successful, returning an error with body if not.
    /// Only `200 OK` counts as success for the login exchange. Any other 2xx
    /// body may hold a token, so it is never echoed.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status == StatusCode::OK {
            Ok(response)
        } else if status.is_success() {
            Err(ApiError::InvalidResponse(format!("unexpected status {}", status)))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }
}
