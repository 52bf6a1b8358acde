use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::{Message, Sender};

/// Title of a thread nobody has written in yet
pub const DEFAULT_TITLE: &str = "New Study Session";
/// Title used when the first user message has nothing printable left
pub const FALLBACK_TITLE: &str = "New Chat";
pub const DEFAULT_PREVIEW: &str = "Ready to help you excel!";
pub const EMPTY_PREVIEW: &str = "New session";
pub const TITLE_BUDGET: usize = 30;
pub const PREVIEW_BUDGET: usize = 40;
pub const ELLIPSIS: &str = "...";

/// One conversation session with its display metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_preview")]
    pub preview: String,
    #[serde(alias = "date", default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Thread {
    /// Fresh thread holding a single assistant greeting
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            id: generate_thread_id(),
            title: DEFAULT_TITLE.to_string(),
            preview: DEFAULT_PREVIEW.to_string(),
            last_updated: Utc::now(),
            messages: vec![Message::assistant(greeting)],
        }
    }

    /// Append a message and refresh the derived metadata.
    ///
    /// The title is only rewritten while it still holds the default
    /// placeholder, so a thread is named after its first user message.
    pub fn push(&mut self, message: Message) {
        let from_user = message.is_user();
        self.messages.push(message);
        self.preview = derive_preview(&self.messages);
        self.last_updated = Utc::now();

        if from_user && self.title == DEFAULT_TITLE {
            self.title = derive_title(&self.messages);
        }
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn has_user_messages(&self) -> bool {
        self.messages.iter().any(Message::is_user)
    }
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

fn default_preview() -> String {
    DEFAULT_PREVIEW.to_string()
}

/// Creation-time derived id; the suffix keeps ids unique within one millisecond
fn generate_thread_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("chat-{}-{}", Utc::now().timestamp_millis(), &suffix[..8])
}

/// Split `text` after `budget` characters, reporting whether anything was cut
fn split_at_budget(text: &str, budget: usize) -> (&str, bool) {
    match text.char_indices().nth(budget) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}

/// Truncate to `budget` characters, marking the cut with an ellipsis
pub fn ellipsize(text: &str, budget: usize) -> String {
    match split_at_budget(text, budget) {
        (head, true) => format!("{head}{ELLIPSIS}"),
        (head, false) => head.to_string(),
    }
}

/// Title from the first user message: at most [`TITLE_BUDGET`] characters,
/// punctuation stripped, whitespace collapsed, ellipsis when cut.
pub fn derive_title(messages: &[Message]) -> String {
    let Some(first) = messages.iter().find(|m| m.sender == Sender::User) else {
        return FALLBACK_TITLE.to_string();
    };

    let (head, truncated) = split_at_budget(first.text.trim(), TITLE_BUDGET);
    let cleaned: String = head
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    if cleaned.is_empty() {
        FALLBACK_TITLE.to_string()
    } else if truncated {
        format!("{cleaned}{ELLIPSIS}")
    } else {
        cleaned
    }
}

/// Preview from the latest user message, else the latest message of any kind
pub fn derive_preview(messages: &[Message]) -> String {
    messages
        .iter()
        .rev()
        .find(|m| m.is_user())
        .or_else(|| messages.last())
        .map(|m| ellipsize(&m.text, PREVIEW_BUDGET))
        .unwrap_or_else(|| EMPTY_PREVIEW.to_string())
}
