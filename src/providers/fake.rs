//! Deterministic in-process provider
//!
//! [`FakeProvider`] answers without any network access. It is selectable as
//! `provider.type: fake` for offline runs and is the provider behind the
//! backend's integration tests.
//!
//! Comparisons are synthesized from the two quoted device names in the
//! prompt. Chat replies are a fixed list of fragments. Failure modes can be
//! switched on per instance, and every chat prompt is recorded.
//!
//! # Example
//!
//! ```
//! use device_duel::providers::{ChatPrompt, FakeProvider, Provider};
//! use futures::StreamExt;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let provider = FakeProvider::new().with_reply(&["Hello ", "there."]);
//! let prompt = ChatPrompt {
//!     system_instruction: String::new(),
//!     history: Vec::new(),
//!     message: "hi".to_string(),
//! };
//! let fragments: Vec<String> = provider
//!     .stream_chat(prompt)
//!     .await
//!     .unwrap()
//!     .map(|item| item.unwrap())
//!     .collect()
//!     .await;
//! assert_eq!(fragments.concat(), "Hello there.");
//! # }
//! ```

use crate::comparison::{ComparisonResult, DetailedSummary, DeviceComparison, DeviceRating};
use crate::error::{DuelError, Result};
use crate::providers::{ChatPrompt, Provider, TextStream};

use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};

/// Where a fake chat turn fails, if at all
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChatFailure {
    #[default]
    None,
    /// `stream_chat` itself returns an error
    BeforeStream,
    /// The first fragment is delivered, then the stream errors
    MidStream,
}

/// Scripted provider for offline runs and tests
#[derive(Debug, Clone)]
pub struct FakeProvider {
    reply: Vec<String>,
    chat_failure: ChatFailure,
    fail_comparison: bool,
    raw_comparison: Option<String>,
    chat_prompts: Arc<Mutex<Vec<ChatPrompt>>>,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            reply: vec![
                "Based on the comparison, ".to_string(),
                "both devices hold up well here. ".to_string(),
                "Ask about a specific feature for more detail.".to_string(),
            ],
            chat_failure: ChatFailure::None,
            fail_comparison: false,
            raw_comparison: None,
            chat_prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Stream `fragments` as every chat reply
    pub fn with_reply(mut self, fragments: &[&str]) -> Self {
        self.reply = fragments.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_chat_failure(mut self, failure: ChatFailure) -> Self {
        self.chat_failure = failure;
        self
    }

    /// Make every structured generation fail
    pub fn failing_comparison(mut self) -> Self {
        self.fail_comparison = true;
        self
    }

    /// Return `raw` verbatim from structured generation
    pub fn with_raw_comparison(mut self, raw: impl Into<String>) -> Self {
        self.raw_comparison = Some(raw.into());
        self
    }

    /// Chat prompts received so far, oldest first
    pub fn chat_prompts(&self) -> Vec<ChatPrompt> {
        self.chat_prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Pull the first two double-quoted names out of a comparison prompt
fn quoted_names(prompt: &str) -> Option<(String, String)> {
    let mut quoted = prompt.split('"').skip(1).step_by(2);
    let one = quoted.next()?.trim();
    let two = quoted.next()?.trim();
    if one.is_empty() || two.is_empty() {
        return None;
    }
    Some((one.to_string(), two.to_string()))
}

/// Build a well-formed comparison for two names
pub fn canned_comparison(device_one: &str, device_two: &str) -> ComparisonResult {
    let device = |name: &str, base: f64| DeviceComparison {
        name: name.to_string(),
        pros: vec![
            "Bright, sharp display".to_string(),
            "Dependable battery life".to_string(),
            "Fast everyday performance".to_string(),
        ],
        cons: vec![
            "Premium price".to_string(),
            "No charger in the box".to_string(),
            "Heavier than rivals".to_string(),
        ],
        rating: DeviceRating {
            overall: base,
            performance: base,
            camera: base,
            battery: base - 0.5,
            display: base + 0.5,
            value: base - 1.0,
        },
    };

    ComparisonResult {
        detailed_summary: DetailedSummary {
            overview: format!(
                "The {} and {} are closely matched, with small differences in battery and value.",
                device_one, device_two
            ),
            key_differences: vec!["Battery life".to_string(), "Price".to_string()],
            best_for_device_one: format!("Buyers who want the {} ecosystem.", device_one),
            best_for_device_two: format!("Buyers who want the {} ecosystem.", device_two),
        },
        winner: device_one.to_string(),
        winner_reason: "Slightly better value overall.".to_string(),
        device_one: device(device_one, 8.5),
        device_two: device(device_two, 8.0),
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn generate_structured(
        &self,
        prompt: &str,
        _schema: &serde_json::Value,
    ) -> Result<String> {
        if self.fail_comparison {
            return Err(DuelError::Provider("fake provider comparison failure".to_string()).into());
        }
        if let Some(raw) = &self.raw_comparison {
            return Ok(raw.clone());
        }

        let (one, two) = quoted_names(prompt).ok_or_else(|| {
            DuelError::Provider("fake provider could not find two device names".to_string())
        })?;
        tracing::debug!("Fake provider comparing {} and {}", one, two);

        Ok(serde_json::to_string(&canned_comparison(&one, &two))?)
    }

    async fn stream_chat(&self, prompt: ChatPrompt) -> Result<TextStream> {
        self.chat_prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt);

        let mut items: Vec<Result<String>> = self.reply.iter().cloned().map(Ok).collect();
        match self.chat_failure {
            ChatFailure::None => {}
            ChatFailure::BeforeStream => {
                return Err(DuelError::Provider("fake provider chat failure".to_string()).into());
            }
            ChatFailure::MidStream => {
                items.truncate(1);
                items.push(Err(DuelError::Provider(
                    "fake provider dropped the stream".to_string(),
                )
                .into()));
            }
        }

        Ok(Box::pin(futures::stream::iter(items)))
    }
}
