//! Command handlers for Device Duel
//!
//! This module contains the handlers behind each CLI subcommand:
//! `serve` runs the backend and `compare` runs the interactive terminal
//! client against it.

pub mod compare;
pub mod serve;

pub use compare::run_compare;
pub use serve::run_serve;
