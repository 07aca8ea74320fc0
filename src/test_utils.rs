//! Test utilities for Device Duel
//!
//! Scripted stand-ins for the two network seams (the chat backend and the
//! comparison requestor) plus assertion helpers.

use crate::chat::session::{ChatBackend, ChatRequest, FragmentStream};
use crate::comparison::{normalize_device_names, ComparisonRequestor, ComparisonResult};
use crate::error::{DuelError, Result};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// One scripted item of a fragment stream
#[derive(Debug, Clone)]
pub enum Step {
    Text(String),
    Bytes(Vec<u8>),
    /// Mid-stream transport failure
    Fail(String),
}

impl Step {
    fn into_item(self) -> Result<Bytes> {
        match self {
            Step::Text(text) => Ok(Bytes::from(text)),
            Step::Bytes(bytes) => Ok(Bytes::from(bytes)),
            Step::Fail(message) => Err(DuelError::Transport(message).into()),
        }
    }
}

/// Chat backend that replays the same script for every turn
///
/// Every request is recorded so tests can inspect the context that was sent.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    steps: Vec<Step>,
    open_failure: Option<String>,
    stall: bool,
    gate: Option<Arc<Notify>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedBackend {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    /// Stream that yields `fragments` in order, then ends cleanly
    pub fn fragments(fragments: &[&str]) -> Self {
        Self::new(
            fragments
                .iter()
                .map(|fragment| Step::Text(fragment.to_string()))
                .collect(),
        )
    }

    /// Fail before the stream opens
    pub fn open_failure(message: &str) -> Self {
        Self {
            open_failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Open a stream that never yields
    pub fn stalled() -> Self {
        Self {
            stall: true,
            ..Self::default()
        }
    }

    /// Hold the first fragment back until `gate` is notified
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn open_stream(&self, request: ChatRequest) -> Result<FragmentStream> {
        self.requests.lock().unwrap().push(request);

        if let Some(message) = &self.open_failure {
            return Err(DuelError::Transport(message.clone()).into());
        }
        if self.stall {
            return Ok(Box::pin(futures::stream::pending::<Result<Bytes>>()));
        }

        let gate = self.gate.clone();
        let head = futures::stream::once(async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
        })
        .filter_map(|()| futures::future::ready(None::<Result<Bytes>>));
        let items: Vec<Result<Bytes>> = self.steps.iter().cloned().map(Step::into_item).collect();

        Ok(Box::pin(head.chain(futures::stream::iter(items))))
    }
}

/// Comparison requestor with a swappable canned outcome
#[derive(Debug)]
pub struct FakeRequestor {
    outcome: Mutex<std::result::Result<ComparisonResult, String>>,
    gate: Option<Arc<Notify>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeRequestor {
    pub fn succeeding(result: ComparisonResult) -> Self {
        Self {
            outcome: Mutex::new(Ok(result)),
            gate: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with a transport error carrying `message`
    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Mutex::new(Err(message.to_string())),
            gate: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Hold every call until `gate` is notified
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn set_outcome(&self, outcome: std::result::Result<ComparisonResult, String>) {
        *self.outcome.lock().unwrap() = outcome;
    }

    /// Name pairs that reached the (pretend) network
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ComparisonRequestor for FakeRequestor {
    async fn request_comparison(
        &self,
        device_one: &str,
        device_two: &str,
    ) -> Result<ComparisonResult> {
        let names = normalize_device_names(device_one, device_two)?;
        self.calls.lock().unwrap().push(names);

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let outcome = self.outcome.lock().unwrap().clone();
        outcome.map_err(|message| DuelError::Transport(message).into())
    }
}

/// Assert that an error contains the expected message
///
/// # Panics
///
/// Panics if the result is Ok or if the error doesn't contain the expected message
pub fn assert_error_contains<T>(result: Result<T>, expected: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{}' but got Ok", expected),
        Err(e) => {
            let error_msg = e.to_string();
            assert!(
                error_msg.contains(expected),
                "Error message '{}' does not contain '{}'",
                error_msg,
                expected
            );
        }
    }
}

/// YAML for a config that runs fully offline
pub fn test_config_yaml() -> String {
    r#"
server:
  bind: 127.0.0.1:0
provider:
  type: fake
client:
  base_url: http://127.0.0.1:3000
  request_timeout_seconds: 5
chat:
  stream_idle_timeout_seconds: 5
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::tests::sample;
    use crate::config::Config;

    #[test]
    fn test_assert_error_contains_success() {
        let result: Result<()> = Err(DuelError::Config("test error message".to_string()).into());
        assert_error_contains(result, "test error");
    }

    #[test]
    #[should_panic(expected = "Expected error containing")]
    fn test_assert_error_contains_ok() {
        let result: Result<()> = Ok(());
        assert_error_contains(result, "error");
    }

    #[test]
    #[should_panic(expected = "does not contain")]
    fn test_assert_error_contains_wrong_message() {
        let result: Result<()> = Err(DuelError::Config("different error".to_string()).into());
        assert_error_contains(result, "not present");
    }

    #[test]
    fn test_test_config_yaml() {
        let config: Config = serde_yaml::from_str(&test_config_yaml()).unwrap();
        assert_eq!(config.provider.provider_type, "fake");
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_scripted_backend_records_requests() {
        let backend = ScriptedBackend::fragments(&["a", "b"]);
        let request = ChatRequest {
            history: Vec::new(),
            message: "hi".to_string(),
            device_one_name: "A".to_string(),
            device_two_name: "B".to_string(),
        };

        let stream = backend.open_stream(request.clone()).await.unwrap();
        let chunks: Vec<Bytes> = stream.map(|item| item.unwrap()).collect().await;

        assert_eq!(chunks, vec![Bytes::from("a"), Bytes::from("b")]);
        assert_eq!(backend.requests(), vec![request]);
    }

    #[tokio::test]
    async fn test_fake_requestor_guards_blank_names() {
        let requestor = FakeRequestor::succeeding(sample());
        assert_error_contains(requestor.request_comparison(" ", "B").await, "empty");
        assert!(requestor.calls().is_empty());
    }
}
