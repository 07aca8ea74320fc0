//! Base provider trait and common types
//!
//! This module defines the Provider trait that every LLM backend must
//! implement, along with the role-tagged turn types used as chat context.
//! A provider exposes exactly two capabilities: schema-constrained
//! structured generation, and a streamed chat reply for a stateless
//! `(context, new message)` pair.

use crate::chat::message::{ChatMessage, Role};
use crate::error::Result;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Role of a turn as the provider understands it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderRole {
    User,
    /// The assistant side of the conversation
    Model,
}

impl From<Role> for ProviderRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => ProviderRole::User,
            Role::Assistant => ProviderRole::Model,
        }
    }
}

/// A single completed turn of provider context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderTurn {
    pub role: ProviderRole,
    pub text: String,
}

impl ProviderTurn {
    pub fn new(role: ProviderRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// Everything a provider needs for one streamed chat reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPrompt {
    pub system_instruction: String,
    pub history: Vec<ProviderTurn>,
    pub message: String,
}

/// Streamed reply text; each item is one non-empty fragment
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// LLM provider trait
///
/// # Examples
///
/// ```no_run
/// use device_duel::providers::{ChatPrompt, Provider, TextStream};
/// use device_duel::error::Result;
/// use async_trait::async_trait;
///
/// struct EchoProvider;
///
/// #[async_trait]
/// impl Provider for EchoProvider {
///     fn name(&self) -> &str {
///         "echo"
///     }
///
///     async fn generate_structured(
///         &self,
///         prompt: &str,
///         _schema: &serde_json::Value,
///     ) -> Result<String> {
///         Ok(prompt.to_string())
///     }
///
///     async fn stream_chat(&self, prompt: ChatPrompt) -> Result<TextStream> {
///         Ok(Box::pin(futures::stream::iter(vec![Ok(prompt.message)])))
///     }
/// }
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Generate a JSON document constrained by `schema`
    ///
    /// # Returns
    ///
    /// Returns the raw JSON text produced by the model. The caller is
    /// responsible for parsing and validating it.
    ///
    /// # Errors
    ///
    /// Returns error if the API call fails or the model returns no text
    async fn generate_structured(
        &self,
        prompt: &str,
        schema: &serde_json::Value,
    ) -> Result<String>;

    /// Start a streamed chat reply
    ///
    /// Errors that occur before the first fragment are returned directly;
    /// later failures arrive as an `Err` item on the stream.
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be sent or is rejected
    async fn stream_chat(&self, prompt: ChatPrompt) -> Result<TextStream>;
}

/// Converts client history into provider context
///
/// The leading assistant greeting is UI-only and is dropped. Entries with no
/// content cannot be sent to the provider and are skipped with a warning.
///
/// # Examples
///
/// ```
/// use device_duel::chat::ChatMessage;
/// use device_duel::providers::{to_provider_history, ProviderRole};
///
/// let history = vec![
///     ChatMessage::assistant("Hi there!"),
///     ChatMessage::user("Which is faster?"),
///     ChatMessage::assistant("The first one."),
/// ];
/// let turns = to_provider_history(&history);
/// assert_eq!(turns.len(), 2);
/// assert_eq!(turns[1].role, ProviderRole::Model);
/// ```
pub fn to_provider_history(history: &[ChatMessage]) -> Vec<ProviderTurn> {
    let skip = match history.first() {
        Some(first) if first.is_assistant() => 1,
        _ => 0,
    };

    history
        .iter()
        .skip(skip)
        .filter_map(|message| {
            if message.content.trim().is_empty() {
                tracing::warn!("Dropping empty {} message from provider history", message.role);
                return None;
            }
            Some(ProviderTurn::new(message.role.into(), message.content.clone()))
        })
        .collect()
}
