//! HTTP client implementation

use std::time::Duration;

use openapi_client::models::ErrorResponse;
use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};
use url::Url;

use crate::errors::AgentError;

/// HTTP client for the Web Change Detector API
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AgentError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("wcdagent/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str, query: &[(String, String)]) -> Result<Url, AgentError> {
        let raw = format!("{}{}", self.base_url, path);
        let url = if query.is_empty() {
            Url::parse(&raw)
        } else {
            Url::parse_with_params(&raw, query)
        };
        url.map_err(|e| AgentError::ConfigError(format!("invalid API URL {}: {}", raw, e)))
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        token: Option<&str>,
    ) -> Result<RequestBuilder, AgentError> {
        let url = self.url(path, query)?;
        debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method, url)
            .header(header::ACCEPT, "application/json");
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        Ok(request)
    }

    /// Map a non-success status to an API error carrying the remote message
    async fn read<T: DeserializeOwned>(method: &str, response: Response) -> Result<T, AgentError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("HTTP {} failed: {} - {}", method, status, body);
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.message)
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("Unknown error")
                        .to_string()
                });
            return Err(AgentError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.json().await?;
        Ok(body)
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
        token: &str,
    ) -> Result<T, AgentError> {
        let response = self
            .request(Method::GET, path, query, Some(token))?
            .send()
            .await?;
        Self::read("GET", response).await
    }

    /// Make a POST request
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> Result<T, AgentError> {
        let response = self
            .request(Method::POST, path, &[], Some(token))?
            .json(body)
            .send()
            .await?;
        Self::read("POST", response).await
    }

    /// Make a POST request without credentials
    pub async fn post_anonymous<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, AgentError> {
        let response = self
            .request(Method::POST, path, &[], None)?
            .json(body)
            .send()
            .await?;
        Self::read("POST", response).await
    }

    /// Make a PUT request
    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> Result<T, AgentError> {
        let response = self
            .request(Method::PUT, path, &[], Some(token))?
            .json(body)
            .send()
            .await?;
        Self::read("PUT", response).await
    }
}
