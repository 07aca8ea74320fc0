//! Terminal rendering of a comparison and its follow-up conversation
//!
//! [`ConversationRenderer`] has no state of its own beyond what it already
//! printed. Each [`ChatState`] published by the session is diffed against
//! that record into a list of [`RenderOp`]s, which a [`TerminalPrinter`]
//! writes out. States may be skipped or coalesced by the watch channel; the
//! diff always converges on the latest one.

use crate::chat::{ChatMessage, ChatState, Role};
use crate::comparison::{ComparisonResult, DeviceComparison, Winner};

use colored::Colorize;
use std::io::Write;

/// One terminal update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOp {
    /// The history no longer extends what was printed; start over
    Reset,
    /// A complete message
    Message(ChatMessage),
    /// Open a message that is still being streamed
    Begin(Role),
    /// Waiting for the first fragment of the open message
    Typing,
    /// Text appended to the open message
    Append(String),
    /// The open message was rewritten (rolled back to the fallback)
    Replace(String),
    /// Close the open message
    End,
}

/// Diffs session states against what has been rendered so far
#[derive(Debug, Default)]
pub struct ConversationRenderer {
    rendered: Vec<ChatMessage>,
    open: bool,
    typing_shown: bool,
}

impl ConversationRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the operations that bring the terminal up to `state`
    ///
    /// # Examples
    ///
    /// ```
    /// use device_duel::chat::{ChatMessage, ChatState};
    /// use device_duel::render::{ConversationRenderer, RenderOp};
    ///
    /// let mut renderer = ConversationRenderer::new();
    /// let state = ChatState {
    ///     history: vec![ChatMessage::assistant("Hi there!")],
    ///     is_typing: false,
    /// };
    /// assert_eq!(
    ///     renderer.diff(&state),
    ///     vec![RenderOp::Message(ChatMessage::assistant("Hi there!"))]
    /// );
    /// assert!(renderer.diff(&state).is_empty());
    /// ```
    pub fn diff(&mut self, state: &ChatState) -> Vec<RenderOp> {
        let mut ops = Vec::new();

        if !self.is_prefix_of(&state.history) {
            ops.push(RenderOp::Reset);
            self.rendered.clear();
            self.open = false;
            self.typing_shown = false;
        }

        if self.open {
            let index = self.rendered.len() - 1;
            let streaming = state.is_typing && index + 1 == state.history.len();
            self.update_open(&state.history[index].content, streaming, &mut ops);
        }

        let start = self.rendered.len();
        for (index, message) in state.history.iter().enumerate().skip(start) {
            let streaming =
                state.is_typing && message.is_assistant() && index + 1 == state.history.len();
            if streaming {
                ops.push(RenderOp::Begin(message.role));
                self.rendered.push(ChatMessage {
                    role: message.role,
                    content: String::new(),
                });
                self.open = true;
                self.update_open(&message.content, true, &mut ops);
            } else {
                ops.push(RenderOp::Message(message.clone()));
                self.rendered.push(message.clone());
            }
        }

        ops
    }

    /// Forget everything rendered so far
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn is_prefix_of(&self, history: &[ChatMessage]) -> bool {
        if self.rendered.len() > history.len() {
            return false;
        }
        let settled = if self.open {
            self.rendered.len() - 1
        } else {
            self.rendered.len()
        };
        if self.rendered[..settled] != history[..settled] {
            return false;
        }
        !self.open || self.rendered[settled].role == history[settled].role
    }

    fn update_open(&mut self, content: &str, streaming: bool, ops: &mut Vec<RenderOp>) {
        let Some(last) = self.rendered.last_mut() else {
            return;
        };

        if content != last.content {
            match content.strip_prefix(last.content.as_str()) {
                Some(suffix) => ops.push(RenderOp::Append(suffix.to_string())),
                None => ops.push(RenderOp::Replace(content.to_string())),
            }
            last.content = content.to_string();
            self.typing_shown = false;
        } else if streaming && content.is_empty() && !self.typing_shown {
            ops.push(RenderOp::Typing);
            self.typing_shown = true;
        }

        if !streaming {
            ops.push(RenderOp::End);
            self.open = false;
            self.typing_shown = false;
        }
    }
}

const TYPING_INDICATOR: &str = "typing...";

/// Writes [`RenderOp`]s to a terminal
pub struct TerminalPrinter<W: Write> {
    out: W,
    echo_user: bool,
    open_role: Option<Role>,
    typing: bool,
}

impl<W: Write> TerminalPrinter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            echo_user: true,
            open_role: None,
            typing: false,
        }
    }

    /// Skip user messages, e.g. when the line editor already echoed them
    pub fn without_user_echo(mut self) -> Self {
        self.echo_user = false;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn apply(&mut self, ops: &[RenderOp]) -> std::io::Result<()> {
        for op in ops {
            match op {
                RenderOp::Reset => {
                    self.open_role = None;
                    self.typing = false;
                    writeln!(self.out)?;
                }
                RenderOp::Message(message) => {
                    if message.role == Role::User && !self.echo_user {
                        continue;
                    }
                    writeln!(self.out, "{}{}", label(message.role), message.content)?;
                }
                RenderOp::Begin(role) => {
                    self.open_role = Some(*role);
                    write!(self.out, "{}", label(*role))?;
                }
                RenderOp::Typing => {
                    self.typing = true;
                    write!(self.out, "{}", TYPING_INDICATOR.dimmed())?;
                }
                RenderOp::Append(text) => {
                    self.clear_typing()?;
                    write!(self.out, "{}", text)?;
                }
                RenderOp::Replace(text) => {
                    self.clear_typing()?;
                    // The partial text may have wrapped; leave it and start a fresh line.
                    let role = self.open_role.unwrap_or(Role::Assistant);
                    write!(self.out, "\n{}{}", label(role), text.yellow())?;
                }
                RenderOp::End => {
                    self.clear_typing()?;
                    self.open_role = None;
                    writeln!(self.out)?;
                }
            }
        }
        self.out.flush()
    }

    fn clear_typing(&mut self) -> std::io::Result<()> {
        if self.typing {
            self.typing = false;
            let width = TYPING_INDICATOR.len();
            write!(
                self.out,
                "{}{}{}",
                "\x08".repeat(width),
                " ".repeat(width),
                "\x08".repeat(width)
            )?;
        }
        Ok(())
    }
}

fn label(role: Role) -> String {
    match role {
        Role::User => format!("{} ", "You:".cyan().bold()),
        Role::Assistant => format!("{} ", "Assistant:".green().bold()),
    }
}

/// Human-readable rendering of a comparison document
pub fn format_comparison(result: &ComparisonResult) -> String {
    let (one, two) = result.device_names();
    let mut out = String::new();

    out.push_str(&format!("\n{} vs {}\n\n", one.bold(), two.bold()));

    let winner = match result.winner_designation() {
        Winner::DeviceOne => one.to_string(),
        Winner::DeviceTwo => two.to_string(),
        Winner::Tie => "It's a tie".to_string(),
        Winner::Unrecognized(text) => text,
    };
    out.push_str(&format!(
        "{} {}\n  {}\n\n",
        "Winner:".bold(),
        winner.green().bold(),
        result.winner_reason
    ));

    let summary = &result.detailed_summary;
    out.push_str(&format!("{}\n  {}\n\n", "Overview".bold(), summary.overview));
    if !summary.key_differences.is_empty() {
        out.push_str(&format!("{}\n", "Key differences".bold()));
        for difference in &summary.key_differences {
            out.push_str(&format!("  - {}\n", difference));
        }
        out.push('\n');
    }
    out.push_str(&format!("{}\n", "Best for".bold()));
    out.push_str(&format!("  {}: {}\n", one, summary.best_for_device_one));
    out.push_str(&format!("  {}: {}\n", two, summary.best_for_device_two));

    for device in [&result.device_one, &result.device_two] {
        out.push('\n');
        out.push_str(&format_device(device));
    }

    out
}

fn format_device(device: &DeviceComparison) -> String {
    let mut out = format!("{}\n", device.name.bold().underline());
    for pro in &device.pros {
        out.push_str(&format!("  {} {}\n", "+".green(), pro));
    }
    for con in &device.cons {
        out.push_str(&format!("  {} {}\n", "-".red(), con));
    }
    let ratings: Vec<String> = device
        .rating
        .labeled()
        .iter()
        .map(|(label, score)| format!("{} {:.1}", label, score))
        .collect();
    out.push_str(&format!("  {}\n", ratings.join(" | ").dimmed()));
    out
}
