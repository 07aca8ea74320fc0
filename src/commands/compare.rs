//! Interactive terminal client
//!
//! Prompts for two device names, prints the comparison, then answers
//! follow-up questions with the reply rendered as it streams in.
//!
//! Special inputs:
//! - `/new` starts over with two new device names
//! - `/quit` exits

use crate::app::{CompareOutcome, DuelApp};
use crate::chat::{ChatSession, IgnoreReason, TurnOutcome};
use crate::client::ApiClient;
use crate::config::Config;
use crate::error::Result;
use crate::render::{format_comparison, ConversationRenderer, TerminalPrinter};

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::Stdout;
use std::sync::Arc;

/// A line typed at the follow-up prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Quit,
    NewComparison,
    Empty,
    Question(String),
}

impl Input {
    /// Classify a raw input line
    ///
    /// # Examples
    ///
    /// ```
    /// use device_duel::commands::compare::Input;
    ///
    /// assert_eq!(Input::parse(" /quit "), Input::Quit);
    /// assert_eq!(Input::parse("battery?"), Input::Question("battery?".to_string()));
    /// ```
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "" => Self::Empty,
            "/quit" | "/exit" => Self::Quit,
            "/new" => Self::NewComparison,
            text => Self::Question(text.to_string()),
        }
    }
}

struct Terminal {
    renderer: ConversationRenderer,
    printer: TerminalPrinter<Stdout>,
}

impl Terminal {
    fn new() -> Self {
        Self {
            renderer: ConversationRenderer::new(),
            printer: TerminalPrinter::new(std::io::stdout()).without_user_echo(),
        }
    }

    fn sync(&mut self, session: &ChatSession) -> Result<()> {
        let ops = self.renderer.diff(&session.state());
        self.printer.apply(&ops)?;
        Ok(())
    }

    fn reset(&mut self) {
        self.renderer.reset();
    }
}

/// Run the interactive comparison client
///
/// Names given on the command line are used for the first comparison;
/// missing ones are prompted for.
///
/// # Errors
///
/// Returns error if the HTTP client or the line editor cannot be created.
/// Request failures are reported inline and never end the session.
pub async fn run_compare(
    config: Config,
    device_one: Option<String>,
    device_two: Option<String>,
) -> Result<()> {
    let client = Arc::new(ApiClient::new(&config.client)?);
    let session = Arc::new(ChatSession::new(client.clone(), &config.chat));
    let app = DuelApp::new(client.clone(), session);
    tracing::debug!(session_id = %app.session().id(), "Chat session created");

    let mut rl = DefaultEditor::new()?;
    let mut terminal = Terminal::new();
    let mut pending = (device_one, device_two);

    print_banner(client.base_url().as_str());

    loop {
        if app.comparison().is_none() {
            let Some(one) = take_or_prompt(&mut rl, pending.0.take(), "First device: ")? else {
                break;
            };
            let Some(two) = take_or_prompt(&mut rl, pending.1.take(), "Second device: ")? else {
                break;
            };
            compare(&app, &mut terminal, &one, &two).await?;
            continue;
        }

        let Some(line) = read_line(&mut rl, &format!("{} ", ">".cyan().bold()))? else {
            break;
        };

        match Input::parse(&line) {
            Input::Empty => continue,
            Input::Quit => break,
            Input::NewComparison => {
                app.reset();
                terminal.reset();
                println!();
            }
            Input::Question(text) => follow_up(&app, &mut terminal, &text).await?,
        }
    }

    println!("Goodbye!");
    Ok(())
}

async fn compare(app: &DuelApp, terminal: &mut Terminal, one: &str, two: &str) -> Result<()> {
    println!("{}", format!("Comparing {} and {}...", one.trim(), two.trim()).dimmed());

    match app.compare(one, two).await {
        CompareOutcome::Installed(result) => {
            println!("{}", format_comparison(&result));
            terminal.sync(app.session())?;
        }
        CompareOutcome::Failed(cause) => {
            tracing::debug!("Comparison failed: {}", cause);
            if let Some(message) = app.error() {
                eprintln!("{}\n", message.red());
            }
        }
        CompareOutcome::Ignored(IgnoreReason::MissingDeviceName) => {
            eprintln!("{}\n", "Please enter both device names.".yellow());
        }
        CompareOutcome::Ignored(reason) => {
            tracing::debug!("Comparison ignored: {:?}", reason);
        }
    }
    Ok(())
}

/// Send one question and render the session while the reply streams
async fn follow_up(app: &DuelApp, terminal: &mut Terminal, text: &str) -> Result<()> {
    let session = app.session();
    let mut states = session.subscribe();
    let send = app.send(text);
    tokio::pin!(send);

    let outcome = loop {
        tokio::select! {
            outcome = &mut send => break outcome,
            changed = states.changed() => {
                if changed.is_err() {
                    break (&mut send).await;
                }
                let state = states.borrow_and_update().clone();
                let ops = terminal.renderer.diff(&state);
                terminal.printer.apply(&ops)?;
            }
        }
    };
    terminal.sync(session)?;

    match outcome {
        TurnOutcome::Completed(reply) => {
            tracing::debug!("Reply complete ({} chars)", reply.chars().count());
        }
        TurnOutcome::Failed(cause) => tracing::debug!("Turn failed: {}", cause),
        TurnOutcome::Ignored(reason) => tracing::debug!("Question ignored: {:?}", reason),
    }
    println!();
    Ok(())
}

fn take_or_prompt(
    rl: &mut DefaultEditor,
    given: Option<String>,
    prompt: &str,
) -> Result<Option<String>> {
    match given {
        Some(name) => Ok(Some(name)),
        None => read_line(rl, prompt),
    }
}

/// Read one line; `None` on Ctrl-C or Ctrl-D
fn read_line(rl: &mut DefaultEditor, prompt: &str) -> Result<Option<String>> {
    match rl.readline(prompt) {
        Ok(line) => {
            if !line.trim().is_empty() {
                let _ = rl.add_history_entry(line.as_str());
            }
            Ok(Some(line))
        }
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
        Err(e) => {
            tracing::error!("Readline error: {:?}", e);
            Err(e.into())
        }
    }
}

fn print_banner(server: &str) {
    println!("{}", "Device Duel".bold());
    println!("Backend: {}", server.dimmed());
    println!(
        "{}",
        "Type a question after the comparison. /new compares two other devices, /quit exits."
            .dimmed()
    );
    println!();
}
