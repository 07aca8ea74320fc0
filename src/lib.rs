//! Device Duel - instant tech comparisons with follow-up chat
//!
//! This library provides both halves of Device Duel: the backend that asks
//! an LLM provider for a structured comparison of two devices and streams
//! follow-up answers, and the client side that requests comparisons and
//! manages the streaming follow-up conversation.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `comparison`: The comparison document and the requestor seam
//! - `chat`: Conversation history and the streaming chat session manager
//! - `client`: HTTP implementations of the requestor and chat backend
//! - `app`: Comparison lifecycle and input gating
//! - `render`: Terminal rendering of comparisons and conversations
//! - `server`: axum backend exposing `/api/compare` and `/api/chat`
//! - `providers`: LLM provider abstraction (Gemini, fake)
//! - `prompts`: Comparison prompt, response schema, chat instruction
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use device_duel::{ApiClient, ChatSession, Config, DuelApp};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let client = Arc::new(ApiClient::new(&config.client)?);
//!     let session = Arc::new(ChatSession::new(client.clone(), &config.chat));
//!     let app = DuelApp::new(client, session);
//!
//!     app.compare("Pixel 9 Pro", "iPhone 16 Pro").await;
//!     app.send("Which has the better camera?").await;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod chat;
pub mod cli;
pub mod client;
pub mod commands;
pub mod comparison;
pub mod config;
pub mod error;
pub mod prompts;
pub mod providers;
pub mod render;
pub mod server;

// Re-export commonly used types
pub use app::{CompareOutcome, DuelApp};
pub use chat::{ChatMessage, ChatSession, ChatState, Role, TurnOutcome};
pub use client::ApiClient;
pub use comparison::{ComparisonRequestor, ComparisonResult};
pub use config::Config;
pub use error::{DuelError, Result};

#[cfg(test)]
pub mod test_utils;
