//! Follow-up chat about an installed comparison
//!
//! - [`message`]: the `{role, content}` entry type
//! - [`history`]: ordered conversation with positional placeholder updates
//! - [`decoder`]: incremental UTF-8 decoding of streamed fragments
//! - [`session`]: the Idle/Streaming turn state machine

pub mod decoder;
pub mod history;
pub mod message;
pub mod session;

pub use decoder::Utf8StreamDecoder;
pub use history::{greeting_for, ConversationHistory};
pub use message::{ChatMessage, Role};
pub use session::{
    ChatBackend, ChatRequest, ChatSession, ChatState, FragmentStream, IgnoreReason, PendingTurn,
    SessionPhase, TurnOutcome,
};

/// Assistant message shown in place of a reply when a turn fails
pub const FALLBACK_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";
