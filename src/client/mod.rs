//! HTTP client for the Device Duel backend
//!
//! [`ApiClient`] is both the HTTP [`ComparisonRequestor`] and the HTTP
//! [`ChatBackend`]. Every failure it reports is a [`DuelError::Transport`]
//! (network, non-2xx status, body read) or a [`DuelError::Validation`]
//! (comparison body of the wrong shape).

use crate::chat::session::{ChatBackend, ChatRequest, FragmentStream};
use crate::comparison::{normalize_device_names, ComparisonRequestor, ComparisonResult};
use crate::config::ClientConfig;
use crate::error::{DuelError, Result};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const COMPARE_PATH: &str = "api/compare";
const CHAT_PATH: &str = "api/chat";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareRequest<'a> {
    device_one: &'a str,
    device_two: &'a str,
}

/// Error body returned by the backend
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Backend API client
///
/// # Examples
///
/// ```no_run
/// use device_duel::client::ApiClient;
/// use device_duel::comparison::ComparisonRequestor;
/// use device_duel::config::ClientConfig;
///
/// # async fn example() -> device_duel::error::Result<()> {
/// let client = ApiClient::new(&ClientConfig::default())?;
/// let result = client.request_comparison("Pixel 9 Pro", "iPhone 16 Pro").await?;
/// println!("Winner: {}", result.winner);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    request_timeout: Duration,
}

impl ApiClient {
    /// Create a client for the backend at `config.base_url`
    ///
    /// # Errors
    ///
    /// Returns [`DuelError::Config`] if the base URL does not parse, or an
    /// error if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut base_url = Url::parse(&config.base_url).map_err(|e| {
            DuelError::Config(format!("invalid client.base_url {}: {}", config.base_url, e))
        })?;
        // Relative joins replace the last segment unless the path ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let request_timeout = Duration::from_secs(config.request_timeout_seconds);
        let http = Client::builder()
            .connect_timeout(request_timeout)
            .user_agent(concat!("device-duel/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DuelError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            request_timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| DuelError::Config(format!("cannot build {} URL: {}", path, e)).into())
    }
}

/// Turn a non-success response into a transport error
async fn status_error(what: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    DuelError::Transport(describe_failure(what, status, &body)).into()
}

fn describe_failure(what: &str, status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(error) => format!("{} failed with {}: {}", what, status, error.message),
        Err(_) => format!("{} failed with {}", what, status),
    }
}

#[async_trait]
impl ComparisonRequestor for ApiClient {
    async fn request_comparison(
        &self,
        device_one: &str,
        device_two: &str,
    ) -> Result<ComparisonResult> {
        let (device_one, device_two) = normalize_device_names(device_one, device_two)?;
        let url = self.endpoint(COMPARE_PATH)?;

        tracing::debug!("Requesting comparison of {} and {} from {}", device_one, device_two, url);

        let response = self
            .http
            .post(url)
            .timeout(self.request_timeout)
            .json(&CompareRequest {
                device_one: &device_one,
                device_two: &device_two,
            })
            .send()
            .await
            .map_err(|e| DuelError::Transport(format!("comparison request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(status_error("comparison request", response).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| DuelError::Transport(format!("failed to read comparison body: {}", e)))?;

        ComparisonResult::from_json(&body)
    }
}

#[async_trait]
impl ChatBackend for ApiClient {
    async fn open_stream(&self, request: ChatRequest) -> Result<FragmentStream> {
        let url = self.endpoint(CHAT_PATH)?;

        tracing::debug!(
            "Opening chat stream at {} with {} context messages",
            url,
            request.history.len()
        );

        let response = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| DuelError::Transport(format!("chat request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(status_error("chat request", response).await);
        }

        let stream = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| {
                anyhow::Error::from(DuelError::Transport(format!(
                    "chat stream interrupted: {}",
                    e
                )))
            })
        });

        Ok(Box::pin(stream))
    }
}
