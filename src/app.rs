//! Application controller
//!
//! [`DuelApp`] ties the comparison requestor to the chat session and owns
//! the comparison lifecycle: which result is installed, whether a request
//! is outstanding, and the user-visible comparison error. Input gating for
//! the rendering surface is derived from here.

use crate::chat::session::{ChatSession, IgnoreReason, TurnOutcome};
use crate::comparison::{normalize_device_names, ComparisonRequestor, ComparisonResult};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shown when a comparison request fails for any reason
pub const COMPARISON_FAILED_MESSAGE: &str = "Failed to get comparison data. Please try again.";

/// Result of [`DuelApp::compare`]
#[derive(Debug, Clone, PartialEq)]
pub enum CompareOutcome {
    /// The new result is installed and the conversation was reset
    Installed(Arc<ComparisonResult>),
    /// The request failed; prior state is untouched. Carries the cause.
    Failed(String),
    Ignored(IgnoreReason),
}

#[derive(Debug, Default)]
struct ComparisonState {
    comparison: Option<Arc<ComparisonResult>>,
    loading: bool,
    error: Option<String>,
}

/// Comparison lifecycle plus the follow-up chat session
pub struct DuelApp {
    requestor: Arc<dyn ComparisonRequestor>,
    session: Arc<ChatSession>,
    state: Mutex<ComparisonState>,
}

impl DuelApp {
    pub fn new(requestor: Arc<dyn ComparisonRequestor>, session: Arc<ChatSession>) -> Self {
        Self {
            requestor,
            session,
            state: Mutex::new(ComparisonState::default()),
        }
    }

    pub fn session(&self) -> &Arc<ChatSession> {
        &self.session
    }

    /// Currently installed comparison
    pub fn comparison(&self) -> Option<Arc<ComparisonResult>> {
        self.lock().comparison.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    /// User-visible message from the last failed comparison
    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    /// True when neither a comparison request nor a chat turn is in flight
    pub fn input_enabled(&self) -> bool {
        !self.is_loading() && !self.session.is_streaming()
    }

    /// Request a comparison and, on success, install it
    ///
    /// Blank names are rejected before any network call. Nothing happens
    /// while another comparison is loading or a chat turn is streaming.
    /// Both checks and the loading flag are taken under one lock.
    pub async fn compare(&self, device_one: &str, device_two: &str) -> CompareOutcome {
        let Ok((device_one, device_two)) = normalize_device_names(device_one, device_two) else {
            return CompareOutcome::Ignored(IgnoreReason::MissingDeviceName);
        };

        {
            let mut state = self.lock();
            if state.loading {
                return CompareOutcome::Ignored(IgnoreReason::ComparisonPending);
            }
            if self.session.is_streaming() {
                return CompareOutcome::Ignored(IgnoreReason::Busy);
            }
            state.loading = true;
            state.error = None;
        }

        let _loading = LoadingGuard { app: self };
        tracing::info!("Comparing {} and {}", device_one, device_two);

        match self
            .requestor
            .request_comparison(&device_one, &device_two)
            .await
        {
            Ok(result) => {
                let result = Arc::new(result);
                self.lock().comparison = Some(Arc::clone(&result));
                self.session.install(&result);
                CompareOutcome::Installed(result)
            }
            Err(err) => {
                tracing::warn!("Comparison failed: {:#}", err);
                self.lock().error = Some(COMPARISON_FAILED_MESSAGE.to_string());
                CompareOutcome::Failed(err.to_string())
            }
        }
    }

    /// Send a follow-up question about the installed comparison
    ///
    /// The turn is opened under the comparison lock, so a comparison and a
    /// chat turn never both get past their checks.
    pub async fn send(&self, text: &str) -> TurnOutcome {
        let started = {
            let state = self.lock();
            if state.loading {
                return TurnOutcome::Ignored(IgnoreReason::ComparisonPending);
            }
            self.session.start_follow_up(text)
        };

        match started {
            Ok(turn) => turn.run().await,
            Err(reason) => TurnOutcome::Ignored(reason),
        }
    }

    /// Forget the installed comparison and its conversation
    pub fn reset(&self) {
        let mut state = self.lock();
        if state.loading {
            return;
        }
        state.comparison = None;
        state.error = None;
        self.session.clear();
    }

    fn lock(&self) -> MutexGuard<'_, ComparisonState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the loading flag on every exit from `compare`
struct LoadingGuard<'a> {
    app: &'a DuelApp,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.app.lock().loading = false;
    }
}
