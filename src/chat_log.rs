//! Client chat log
//!
//! The log is what the display renders: newest line first, bounded by the
//! number of lines that fit on screen.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::message::{LOCAL_NOTICE_MARKER, QUIT_COMMAND};

/// Chat log shared between the inbound loop and whoever renders it
pub type SharedChatLog = Arc<Mutex<ChatLog>>;

/// Bounded, most-recent-first sequence of chat lines
#[derive(Debug, Clone)]
pub struct ChatLog {
    lines: VecDeque<String>,
    capacity: usize,
}

impl ChatLog {
    /// Create an empty log holding at most `capacity` lines
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Create a log already wrapped for sharing
    pub fn shared(capacity: usize) -> SharedChatLog {
        Arc::new(Mutex::new(Self::new(capacity)))
    }

    /// Insert a line as the newest entry, evicting the oldest beyond capacity
    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push_front(line.into());
        self.lines.truncate(self.capacity);
    }

    /// Insert a local-only notice
    pub fn push_notice(&mut self, text: &str) {
        self.push(format!("{}{}", LOCAL_NOTICE_MARKER, text));
    }

    /// Newest line, if any
    pub fn newest(&self) -> Option<&str> {
        self.lines.front().map(String::as_str)
    }

    /// Iterate lines newest first
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Number of lines held
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Maximum number of lines held
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Notices posted, oldest first, when the server goes away without a
/// disconnect frame
pub fn disconnect_notices() -> [String; 2] {
    [
        "You have been disconnected from the server...".to_string(),
        format!("Enter '{}' to quit.", QUIT_COMMAND),
    ]
}

/// A stored chat line, classified for rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatLine<'a> {
    /// Local notice with the marker stripped
    Notice(&'a str),
    /// `author: text` message (user or server authored)
    Message { author: &'a str, text: &'a str },
    /// Anything without an author prefix
    Plain(&'a str),
}

impl<'a> ChatLine<'a> {
    /// Classify a stored line
    pub fn parse(line: &'a str) -> Self {
        if let Some(notice) = line.strip_prefix(LOCAL_NOTICE_MARKER) {
            return ChatLine::Notice(notice);
        }
        match line.split_once(':') {
            Some((author, text)) => ChatLine::Message { author, text },
            None => ChatLine::Plain(line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_is_newest_first() {
        let mut log = ChatLog::new(5);
        log.push("one");
        log.push("two");

        assert_eq!(log.newest(), Some("two"));
        assert_eq!(log.iter().collect::<Vec<_>>(), vec!["two", "one"]);
    }

    #[test]
    fn test_oldest_evicted_beyond_capacity() {
        let mut log = ChatLog::new(2);
        log.push("one");
        log.push("two");
        log.push("three");

        assert_eq!(log.len(), 2);
        assert_eq!(log.iter().collect::<Vec<_>>(), vec!["three", "two"]);
    }

    #[test]
    fn test_disconnect_notices() {
        let mut log = ChatLog::new(10);
        log.push("Ann: hi");
        for notice in disconnect_notices() {
            log.push_notice(&notice);
        }

        assert_eq!(
            log.iter().collect::<Vec<_>>(),
            vec![
                "~!~Enter '/q' to quit.",
                "~!~You have been disconnected from the server...",
                "Ann: hi",
            ]
        );
    }

    #[test]
    fn test_zero_capacity_holds_one_line() {
        let mut log = ChatLog::new(0);
        log.push("a");
        log.push("b");
        assert_eq!(log.capacity(), 1);
        assert_eq!(log.iter().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_parse_lines() {
        assert_eq!(
            ChatLine::parse("~!~Enter '/q' to quit."),
            ChatLine::Notice("Enter '/q' to quit.")
        );
        assert_eq!(
            ChatLine::parse("Ann: see 10:30"),
            ChatLine::Message {
                author: "Ann",
                text: " see 10:30"
            }
        );
        assert_eq!(ChatLine::parse("no author"), ChatLine::Plain("no author"));
    }
}
