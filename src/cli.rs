//! Command-line interface definition for Device Duel
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for running the backend and the terminal client.

use clap::{Parser, Subcommand};

/// Device Duel - instant tech comparisons with follow-up chat
///
/// Run the comparison backend, or open an interactive session that
/// compares two devices and answers follow-up questions about them.
#[derive(Parser, Debug, Clone)]
#[command(name = "duel")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Device Duel
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the comparison and chat backend
    Serve {
        /// Address to bind, e.g. 127.0.0.1:3000
        #[arg(short, long)]
        bind: Option<String>,

        /// Override the provider from config (gemini, fake)
        #[arg(short, long)]
        provider: Option<String>,
    },

    /// Compare two devices and chat about the result
    Compare {
        /// Backend base URL, e.g. http://127.0.0.1:3000
        #[arg(short, long)]
        server: Option<String>,

        /// First device name (prompted for when omitted)
        device_one: Option<String>,

        /// Second device name (prompted for when omitted)
        device_two: Option<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            json_logs: false,
            command: Commands::Serve {
                bind: None,
                provider: None,
            },
        }
    }
}
