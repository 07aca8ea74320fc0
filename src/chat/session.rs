//! Streaming chat session manager
//!
//! A [`ChatSession`] owns the conversation history for one comparison and
//! runs follow-up turns against a [`ChatBackend`]. Each session is either
//! `Idle` or `Streaming`; at most one turn is in flight at a time, which is
//! what makes "replace the last entry" an unambiguous update.
//!
//! # Turn lifecycle
//!
//! 1. Snapshot the completed history as provider context.
//! 2. Append the user message and an empty assistant placeholder together,
//!    then enter `Streaming`.
//! 3. Open the fragment stream (context, new message, both device names).
//! 4. Decode each fragment, append it to the accumulator, and overwrite the
//!    placeholder with the accumulated text.
//! 5. On a clean end of stream the placeholder becomes the final reply.
//! 6. On any failure the placeholder is replaced by the fallback message.
//!    The user message is always kept.
//!
//! The session returns to `Idle` on every exit path, including when the
//! turn future is dropped mid-stream.
//!
//! Observers (the rendering surface) follow the session through
//! [`ChatSession::subscribe`], which yields a fresh [`ChatState`] snapshot
//! after every transition.

use crate::chat::decoder::Utf8StreamDecoder;
use crate::chat::history::{greeting_for, ConversationHistory};
use crate::chat::message::ChatMessage;
use crate::comparison::ComparisonResult;
use crate::config::ChatConfig;
use crate::error::{DuelError, Result};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

/// Lazy, finite, non-restartable sequence of raw response fragments
///
/// `None` from the stream is the end-of-stream signal; an `Err` item is a
/// failure and ends the turn.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Body of a `/api/chat` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Completed turns only; never contains the in-progress placeholder
    pub history: Vec<ChatMessage>,
    pub message: String,
    pub device_one_name: String,
    pub device_two_name: String,
}

/// Source of streamed assistant replies
///
/// The call is stateless: everything the backend needs arrives in the
/// request, so implementations hold no hidden conversation state.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Start a streamed reply for `request`
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be opened (network failure,
    /// non-success status).
    async fn open_stream(&self, request: ChatRequest) -> Result<FragmentStream>;
}

/// State machine position of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No turn in flight; input enabled
    Idle,
    /// One turn in flight; input disabled
    Streaming,
}

/// Snapshot published to observers after every transition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatState {
    pub history: Vec<ChatMessage>,
    pub is_typing: bool,
}

/// Why a follow-up was not sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    EmptyMessage,
    NoComparison,
    /// A turn is already streaming
    Busy,
    /// A comparison request is outstanding
    ComparisonPending,
    /// A comparison was requested with a blank device name
    MissingDeviceName,
}

/// Result of [`ChatSession::send_follow_up`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The stream ended cleanly; carries the full reply
    Completed(String),
    /// The turn failed and the fallback message was shown; carries the cause
    Failed(String),
    /// Nothing happened
    Ignored(IgnoreReason),
}

#[derive(Debug)]
struct Inner {
    history: ConversationHistory,
    phase: SessionPhase,
    devices: Option<(String, String)>,
    /// Bumped on every reset so a stale turn never touches a newer history
    epoch: u64,
}

/// Per-comparison conversation owner
pub struct ChatSession {
    id: Uuid,
    backend: Arc<dyn ChatBackend>,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<ChatState>,
    idle_timeout: Duration,
    fallback_message: String,
}

impl ChatSession {
    /// Create an empty session with no comparison installed
    pub fn new(backend: Arc<dyn ChatBackend>, config: &ChatConfig) -> Self {
        let (state_tx, _) = watch::channel(ChatState::default());
        Self {
            id: Uuid::new_v4(),
            backend,
            inner: Mutex::new(Inner {
                history: ConversationHistory::new(),
                phase: SessionPhase::Idle,
                devices: None,
                epoch: 0,
            }),
            state_tx,
            idle_timeout: config.stream_idle_timeout(),
            fallback_message: config.fallback_message.clone(),
        }
    }

    /// Override the per-fragment timeout
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> SessionPhase {
        self.lock().phase
    }

    pub fn is_streaming(&self) -> bool {
        self.phase() == SessionPhase::Streaming
    }

    pub fn has_comparison(&self) -> bool {
        self.lock().devices.is_some()
    }

    /// Copy of the current history
    pub fn history(&self) -> Vec<ChatMessage> {
        self.lock().history.snapshot()
    }

    pub fn state(&self) -> ChatState {
        self.state_tx.borrow().clone()
    }

    /// Receive a [`ChatState`] after every history or phase change
    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.state_tx.subscribe()
    }

    /// Install a new comparison: reset history and seed the greeting
    pub fn install(&self, result: &ComparisonResult) {
        let mut inner = self.lock();
        inner.epoch += 1;
        inner.devices = Some((
            result.device_one.name.clone(),
            result.device_two.name.clone(),
        ));
        inner.history.reset(greeting_for(result));
        inner.phase = SessionPhase::Idle;
        tracing::info!(
            session = %self.id,
            device_one = %result.device_one.name,
            device_two = %result.device_two.name,
            "Conversation reset for new comparison"
        );
        self.publish(&inner);
    }

    /// Drop the comparison and empty the history
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.epoch += 1;
        inner.devices = None;
        inner.history.clear();
        inner.phase = SessionPhase::Idle;
        self.publish(&inner);
    }

    /// Send a follow-up question and stream the reply into the history
    ///
    /// This is a no-op returning [`TurnOutcome::Ignored`] when `text` is
    /// blank, no comparison is installed, or a turn is already streaming.
    /// Failures never propagate: the turn ends with the fallback message and
    /// the session stays usable.
    pub async fn send_follow_up(&self, text: &str) -> TurnOutcome {
        match self.start_follow_up(text) {
            Ok(turn) => turn.run().await,
            Err(reason) => TurnOutcome::Ignored(reason),
        }
    }

    /// Open a turn without waiting for the reply
    ///
    /// On success the user message and the placeholder are already in the
    /// history and the session is `Streaming`. Dropping the returned turn
    /// without running it settles it with the fallback message.
    ///
    /// # Errors
    ///
    /// Returns the [`IgnoreReason`] when the turn cannot start.
    pub fn start_follow_up(
        &self,
        text: &str,
    ) -> std::result::Result<PendingTurn<'_>, IgnoreReason> {
        let (epoch, request) = self.begin_turn(text.trim()).map_err(|reason| {
            tracing::debug!(session = %self.id, ?reason, "Follow-up ignored");
            reason
        })?;

        Ok(PendingTurn {
            guard: TurnGuard {
                session: self,
                epoch,
                settled: false,
            },
            request,
        })
    }

    fn begin_turn(&self, text: &str) -> std::result::Result<(u64, ChatRequest), IgnoreReason> {
        let mut inner = self.lock();
        if inner.phase == SessionPhase::Streaming {
            return Err(IgnoreReason::Busy);
        }
        if text.is_empty() {
            return Err(IgnoreReason::EmptyMessage);
        }
        let Some((device_one_name, device_two_name)) = inner.devices.clone() else {
            return Err(IgnoreReason::NoComparison);
        };

        let context = inner.history.snapshot();
        inner.history.open_turn(text);
        inner.phase = SessionPhase::Streaming;
        self.publish(&inner);

        tracing::debug!(
            session = %self.id,
            context_len = context.len(),
            "Opening chat turn"
        );

        Ok((
            inner.epoch,
            ChatRequest {
                history: context,
                message: text.to_string(),
                device_one_name,
                device_two_name,
            },
        ))
    }

    async fn stream_reply(&self, epoch: u64, request: ChatRequest) -> Result<String> {
        let mut stream = tokio::time::timeout(self.idle_timeout, self.backend.open_stream(request))
            .await
            .map_err(|_| self.timeout_error())??;

        let mut decoder = Utf8StreamDecoder::new();
        let mut reply = String::new();

        while let Some(chunk) = tokio::time::timeout(self.idle_timeout, stream.next())
            .await
            .map_err(|_| self.timeout_error())?
        {
            let text = decoder.decode(&chunk?)?;
            if text.is_empty() {
                continue;
            }
            reply.push_str(&text);
            tracing::trace!(session = %self.id, bytes = text.len(), "Fragment received");
            self.update_placeholder(epoch, &reply);
        }

        decoder.finish()?;
        Ok(reply)
    }

    fn update_placeholder(&self, epoch: u64, reply: &str) {
        let mut inner = self.lock();
        if inner.epoch != epoch || inner.phase != SessionPhase::Streaming {
            return;
        }
        inner.history.replace_last_content(reply);
        self.publish(&inner);
    }

    fn finish_turn(&self, epoch: u64, result: Result<String>) -> TurnOutcome {
        let mut inner = self.lock();

        if inner.epoch != epoch {
            // The conversation was reset while this turn streamed.
            tracing::debug!(session = %self.id, "Discarding turn from a previous comparison");
            return match result {
                Ok(reply) => TurnOutcome::Completed(reply),
                Err(err) => TurnOutcome::Failed(err.to_string()),
            };
        }

        let outcome = match result {
            Ok(reply) => {
                inner.history.replace_last_content(&reply);
                tracing::info!(session = %self.id, reply_len = reply.len(), "Chat turn completed");
                TurnOutcome::Completed(reply)
            }
            Err(err) => {
                tracing::warn!(session = %self.id, error = %err, "Chat turn failed");
                inner.history.rollback_last(self.fallback_message.clone());
                TurnOutcome::Failed(err.to_string())
            }
        };

        inner.phase = SessionPhase::Idle;
        self.publish(&inner);
        outcome
    }

    fn timeout_error(&self) -> anyhow::Error {
        DuelError::Transport(format!(
            "no chat response within {}ms",
            self.idle_timeout.as_millis()
        ))
        .into()
    }

    fn publish(&self, inner: &Inner) {
        self.state_tx.send_replace(ChatState {
            history: inner.history.snapshot(),
            is_typing: inner.phase == SessionPhase::Streaming,
        });
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("id", &self.id)
            .field("inner", &*self.lock())
            .field("idle_timeout", &self.idle_timeout)
            .finish_non_exhaustive()
    }
}

/// A started follow-up turn, see [`ChatSession::start_follow_up`]
pub struct PendingTurn<'a> {
    guard: TurnGuard<'a>,
    request: ChatRequest,
}

impl PendingTurn<'_> {
    /// Stream the reply and settle the turn
    pub async fn run(self) -> TurnOutcome {
        let Self { guard, request } = self;
        let result = guard.session.stream_reply(guard.epoch, request).await;
        guard.settle(result)
    }
}

impl std::fmt::Debug for PendingTurn<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingTurn")
            .field("epoch", &self.guard.epoch)
            .field("request", &self.request)
            .finish()
    }
}

/// Settles a turn exactly once, even if the turn future is dropped
struct TurnGuard<'a> {
    session: &'a ChatSession,
    epoch: u64,
    settled: bool,
}

impl TurnGuard<'_> {
    fn settle(mut self, result: Result<String>) -> TurnOutcome {
        self.settled = true;
        self.session.finish_turn(self.epoch, result)
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.session.finish_turn(
                self.epoch,
                Err(DuelError::Transport("chat turn cancelled".to_string()).into()),
            );
        }
    }
}
