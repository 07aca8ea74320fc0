//! Provider module for Device Duel
//!
//! This module contains the LLM provider abstraction and implementations
//! for Google Gemini and an offline fake.

pub mod base;
pub mod fake;
pub mod gemini;
pub mod sse;

pub use base::{to_provider_history, ChatPrompt, Provider, ProviderRole, ProviderTurn, TextStream};
pub use fake::{ChatFailure, FakeProvider};
pub use gemini::GeminiProvider;

use crate::config::ProviderConfig;
use crate::error::{DuelError, Result};
use std::sync::Arc;

/// Create a provider instance based on configuration
///
/// # Errors
///
/// Returns error if the provider type is unknown or initialization fails
/// (for Gemini, a missing API key).
///
/// # Examples
///
/// ```
/// use device_duel::config::ProviderConfig;
/// use device_duel::providers::create_provider;
///
/// let config = ProviderConfig {
///     provider_type: "fake".to_string(),
///     ..Default::default()
/// };
/// let provider = create_provider(&config).unwrap();
/// assert_eq!(provider.name(), "fake");
/// ```
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn Provider>> {
    match config.provider_type.as_str() {
        "gemini" => Ok(Arc::new(GeminiProvider::new(config.gemini.clone())?)),
        "fake" => Ok(Arc::new(FakeProvider::new())),
        other => Err(DuelError::Provider(format!("Unknown provider type: {}", other)).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeminiConfig;

    #[test]
    fn test_create_provider_invalid_type() {
        let config = ProviderConfig {
            provider_type: "invalid".to_string(),
            ..Default::default()
        };
        assert!(create_provider(&config).is_err());
    }

    #[test]
    fn test_create_gemini_requires_key() {
        let config = ProviderConfig::default();
        let err = create_provider(&config).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<DuelError>(),
            Some(DuelError::MissingCredentials(_))
        ));
    }

    #[test]
    fn test_create_gemini_with_key() {
        let config = ProviderConfig {
            provider_type: "gemini".to_string(),
            gemini: GeminiConfig {
                api_key: Some("key".to_string()),
                ..Default::default()
            },
        };
        assert_eq!(create_provider(&config).unwrap().name(), "gemini");
    }
}
