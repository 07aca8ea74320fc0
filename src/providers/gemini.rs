//! Google Gemini provider implementation
//!
//! Structured comparisons use `models/{model}:generateContent` with a JSON
//! response schema. Follow-up chat uses
//! `models/{model}:streamGenerateContent?alt=sse`, and the full history is
//! resent on every call so the provider holds no conversation state.

use crate::config::GeminiConfig;
use crate::error::{DuelError, Result};
use crate::providers::sse::parse_sse_stream;
use crate::providers::{ChatPrompt, Provider, ProviderRole, TextStream};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Buffered SSE events between the parser task and the consumer
const STREAM_BUFFER: usize = 32;

/// Google Gemini API provider
///
/// # Examples
///
/// ```no_run
/// use device_duel::config::GeminiConfig;
/// use device_duel::providers::{GeminiProvider, Provider};
///
/// # async fn example() -> device_duel::error::Result<()> {
/// let config = GeminiConfig {
///     api_key: Some("my-key".to_string()),
///     ..Default::default()
/// };
/// let provider = GeminiProvider::new(config)?;
/// let json = provider
///     .generate_structured("Compare A and B", &serde_json::json!({"type": "OBJECT"}))
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
    api_key: String,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Request body for generateContent and streamGenerateContent
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![GeminiPart {
                text: Some(text.into()),
            }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: serde_json::Value,
}

/// Response body (and each SSE chunk) from the Gemini API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate
    fn text(&self) -> Result<String> {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
        {
            return Err(DuelError::Provider(format!("Gemini blocked the prompt: {}", reason)).into());
        }

        let Some(candidate) = self.candidates.first() else {
            return Ok(String::new());
        };

        if let Some(reason) = candidate.finish_reason.as_deref() {
            if reason == "SAFETY" || reason == "RECITATION" {
                return Err(
                    DuelError::Provider(format!("Gemini stopped generation: {}", reason)).into(),
                );
            }
        }

        Ok(candidate
            .content
            .iter()
            .flat_map(|content| content.parts.iter())
            .filter_map(|part| part.text.as_deref())
            .collect())
    }
}

/// Decode one SSE `data:` payload into its reply text
fn chunk_text(data: &str) -> Result<String> {
    let chunk: GenerateContentResponse = serde_json::from_str(data)
        .map_err(|e| DuelError::Provider(format!("Failed to parse Gemini stream chunk: {}", e)))?;
    chunk.text()
}

impl GeminiProvider {
    /// Create a new Gemini provider instance
    ///
    /// # Errors
    ///
    /// Returns [`DuelError::MissingCredentials`] when no API key is
    /// configured, or an error if HTTP client initialization fails.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| DuelError::MissingCredentials("gemini".to_string()))?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("device-duel/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DuelError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "Initialized Gemini provider: api_base={}, model={}",
            config.api_base,
            config.model
        );

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.model,
            method
        )
    }

    async fn post(&self, url: &str, body: &GenerateContentRequest) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Gemini request failed: {}", e);
                DuelError::Provider(format!("Gemini request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Gemini returned error {}: {}", status, error_text);
            return Err(DuelError::Provider(format!(
                "Gemini returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        Ok(response)
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate_structured(
        &self,
        prompt: &str,
        schema: &serde_json::Value,
    ) -> Result<String> {
        let request = GenerateContentRequest {
            system_instruction: None,
            contents: vec![GeminiContent::text(Some("user"), prompt)],
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: schema.clone(),
            }),
        };

        tracing::debug!("Sending Gemini structured request ({} chars)", prompt.len());

        let call = async {
            let response = self.post(&self.endpoint("generateContent"), &request).await?;
            let body = response
                .json::<GenerateContentResponse>()
                .await
                .map_err(|e| DuelError::Provider(format!("Failed to parse Gemini response: {}", e)))?;
            Ok::<_, anyhow::Error>(body)
        };
        let response = tokio::time::timeout(Duration::from_secs(self.config.timeout_seconds), call)
            .await
            .map_err(|_| DuelError::Provider("Gemini request timed out".to_string()))??;

        let text = response.text()?;
        let text = text.trim();
        if text.is_empty() {
            return Err(DuelError::Provider("Gemini returned an empty response".to_string()).into());
        }
        Ok(text.to_string())
    }

    async fn stream_chat(&self, prompt: ChatPrompt) -> Result<TextStream> {
        let mut contents: Vec<GeminiContent> = prompt
            .history
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    ProviderRole::User => "user",
                    ProviderRole::Model => "model",
                };
                GeminiContent::text(Some(role), turn.text.clone())
            })
            .collect();
        contents.push(GeminiContent::text(Some("user"), prompt.message));

        let request = GenerateContentRequest {
            system_instruction: Some(GeminiContent::text(None, prompt.system_instruction)),
            contents,
            generation_config: None,
        };

        tracing::debug!(
            "Sending Gemini stream request: {} context turns",
            request.contents.len() - 1
        );

        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));
        let response = self.post(&url, &request).await?;

        let (events_tx, events_rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(parse_sse_stream(response.bytes_stream(), events_tx));

        let text_stream = ReceiverStream::new(events_rx).filter_map(|event| async move {
            match event.and_then(|data| chunk_text(&data)) {
                Ok(text) if text.is_empty() => None,
                other => Some(other),
            }
        });

        Ok(Box::pin(text_stream))
    }
}
