//! HTTP client for the tendcloud daemon

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use tendcloud_api::responses::{HealthResponse, LastPassResponse, TriggerResponse};

use crate::error::{ClientError, Result};

/// HTTP client for communicating with the tendcloud daemon
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: Url,
}

impl HttpClient {
    /// Create a new HTTP client
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new HTTP client with custom `reqwest::Client`
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid.
    pub fn with_client(base_url: impl AsRef<str>, client: Client) -> Result<Self> {
        let base_url = Url::parse(base_url.as_ref())?;
        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(ClientError::Url)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.client.get(self.url(path)?).send().await?;
        decode(response).await
    }

    /// Get daemon health status
    ///
    /// # Errors
    /// Returns an error if the request fails or the daemon returns an error.
    pub async fn health(&self) -> Result<HealthResponse> {
        self.get("/health").await
    }

    /// Get the most recent pass and whether one is running
    ///
    /// # Errors
    /// Returns an error if the request fails or the daemon returns an error.
    pub async fn last_pass(&self) -> Result<LastPassResponse> {
        self.get("/passes/last").await
    }

    /// Ask the daemon to start a pass
    ///
    /// A pass already in flight is not an error: the reply carries
    /// `started: false`.
    ///
    /// # Errors
    /// Returns an error if the request fails or the daemon returns an error.
    pub async fn trigger_pass(&self) -> Result<TriggerResponse> {
        let response = self.client.post(self.url("/passes")?).send().await?;
        if response.status() == StatusCode::CONFLICT {
            debug!("pass already running");
            return Ok(TriggerResponse { started: false });
        }
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, message });
    }

    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
