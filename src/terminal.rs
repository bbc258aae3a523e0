//! Terminal boundary for the client
//!
//! The session only needs two things from the terminal: somewhere to show
//! the chat log and a blocking source of input lines. Layout and colour
//! stay outside the crate.

use std::io::Write;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::chat_log::{ChatLine, ChatLog};
use crate::error::AppError;

/// Input prompt
pub const PROMPT: &str = "> ";

/// Renders the chat log after every change
///
/// Called once per pushed line, so a display that only draws the newest
/// line still sees every line.
pub trait ChatDisplay: Send + Sync + 'static {
    /// Redraw from the current log
    fn refresh(&self, log: &ChatLog);
}

/// Blocking source of user input lines
///
/// Sources are built and dropped on the session's input thread, so they
/// need not be `Send`.
pub trait InputSource {
    /// Block until one line is available
    ///
    /// Returns None once the input device is closed.
    fn read_line(&mut self) -> Result<Option<String>, AppError>;
}

/// Prints the newest log line to stdout and redisplays the prompt
#[derive(Debug, Default)]
pub struct TerminalDisplay;

impl ChatDisplay for TerminalDisplay {
    fn refresh(&self, log: &ChatLog) {
        let Some(line) = log.newest() else {
            return;
        };
        let text = match ChatLine::parse(line) {
            ChatLine::Notice(text) | ChatLine::Plain(text) => text.to_string(),
            ChatLine::Message { author, text } => format!("{}:{}", author, text),
        };
        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "\r{}\n{}", text, PROMPT);
        let _ = stdout.flush();
    }
}

/// Line editor on the controlling terminal
///
/// Holds the terminal for as long as it lives.
pub struct TerminalInput {
    editor: DefaultEditor,
}

impl TerminalInput {
    /// Acquire the terminal
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }

    /// Ask a single question, e.g. the user's name
    pub fn prompt(&mut self, prompt: &str) -> Result<Option<String>, AppError> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(Some(line)),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl InputSource for TerminalInput {
    fn read_line(&mut self) -> Result<Option<String>, AppError> {
        let line = self.prompt(PROMPT)?;
        if let Some(line) = &line {
            if !line.trim().is_empty() {
                let _ = self.editor.add_history_entry(line.as_str());
            }
        }
        Ok(line)
    }
}
