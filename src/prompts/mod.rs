//! Provider prompts
//!
//! This module provides the comparison prompt with its response schema and
//! the system instruction that grounds follow-up chat.

pub mod chat_prompt;
pub mod comparison_prompt;

pub use chat_prompt::generate_chat_instruction;
pub use comparison_prompt::{comparison_schema, generate_comparison_prompt};
