//! HTTP implementation of the fetcher
//!
//! Performs a GET against the key, treating it as a URL, and decodes the body
//! as JSON.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::Fetcher;
use crate::error::FetchError;

/// Fetcher that GETs each key over HTTP and parses the JSON body
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a new HttpFetcher with default settings
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Create a new HttpFetcher with a custom HTTP client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    /// Fetch and decode the JSON document at `key`
    ///
    /// # Returns
    /// * `Ok(Value)` - The decoded body of a 2xx response
    /// * `Err(FetchError::UnsuccessfulResponse)` - The server answered with any other status
    /// * `Err(FetchError::TransportFailure)` - The request or body decoding failed
    async fn fetch(&self, key: &str) -> Result<Value, FetchError> {
        let response = self.client.get(key).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::UnsuccessfulResponse {
                status: status.as_u16(),
            });
        }

        Ok(response.json::<Value>().await?)
    }
}
