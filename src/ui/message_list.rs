//! Chat messages and the ordered message list.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::markdown::{escape_html, render_markdown};

/// Marker appended to a message while its text is still streaming.
pub const CURSOR: char = '▌';

/// Stable handle for a message in a [`MessageList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u64);

impl MessageId {
    /// Numeric value, as shown in the terminal front-end.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    /// Rebuild an id from the number shown to the user.
    #[must_use]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Role of the message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person typing.
    User,
    /// The coach model.
    Assistant,
    /// Client or server notices (login prompt, ...).
    System,
    /// Inline failure notice.
    Error,
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        match s {
            "user" => Self::User,
            "assistant" => Self::Assistant,
            "error" => Self::Error,
            _ => Self::System,
        }
    }
}

/// Lifecycle of a message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageState {
    /// Text is still arriving; shown with [`CURSOR`].
    Streaming,
    /// Text is final; `html` is the rendered body.
    Finalized {
        /// Rendered HTML.
        html: String,
    },
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Handle in the owning list.
    pub id: MessageId,
    /// Author.
    pub role: Role,
    /// Raw text (Markdown for assistant messages), never including the cursor.
    pub content: String,
    /// Whether quick replies should follow this message.
    pub quick_replies: bool,
    /// Streaming or finalized.
    pub state: MessageState,
}

impl Message {
    /// Whether the message is still receiving text.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        matches!(self.state, MessageState::Streaming)
    }

    /// Text as it should be displayed right now.
    #[must_use]
    pub fn display_text(&self) -> String {
        if self.is_streaming() {
            format!("{}{CURSOR}", self.content)
        } else {
            self.content.clone()
        }
    }

    /// Rendered HTML once finalized.
    #[must_use]
    pub fn html(&self) -> Option<&str> {
        match &self.state {
            MessageState::Finalized { html } => Some(html),
            MessageState::Streaming => None,
        }
    }
}

fn render(role: Role, content: &str) -> String {
    match role {
        Role::Assistant | Role::System => render_markdown(content),
        Role::User | Role::Error => format!("<p>{}</p>", escape_html(content)),
    }
}

/// Ordered list of messages, oldest first.
#[derive(Debug, Clone, Default)]
pub struct MessageList {
    messages: Vec<Message>,
    next_id: u64,
}

impl MessageList {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> MessageId {
        self.next_id += 1;
        MessageId(self.next_id)
    }

    /// Append a finalized message.
    pub fn push(&mut self, role: Role, content: impl Into<String>, quick_replies: bool) -> MessageId {
        let content = content.into();
        let id = self.allocate();
        let html = render(role, &content);
        self.messages.push(Message {
            id,
            role,
            content,
            quick_replies,
            state: MessageState::Finalized { html },
        });
        id
    }

    /// Append an empty assistant message in the streaming state.
    pub fn push_streaming(&mut self) -> MessageId {
        let id = self.allocate();
        self.messages.push(Message {
            id,
            role: Role::Assistant,
            content: String::new(),
            quick_replies: false,
            state: MessageState::Streaming,
        });
        id
    }

    /// Replace the text of a streaming message.
    ///
    /// Returns `false` if the message is gone or already finalized.
    pub fn update_streaming(&mut self, id: MessageId, text: &str) -> bool {
        match self.get_mut(id) {
            Some(msg) if msg.is_streaming() => {
                msg.content.clear();
                msg.content.push_str(text);
                true
            }
            _ => false,
        }
    }

    /// Freeze a streaming message with its final text.
    ///
    /// Returns `false` if the message is gone or already finalized.
    pub fn finalize(&mut self, id: MessageId, text: &str, quick_replies: bool) -> bool {
        match self.get_mut(id) {
            Some(msg) if msg.is_streaming() => {
                msg.content = text.to_string();
                msg.quick_replies = quick_replies;
                msg.state = MessageState::Finalized {
                    html: render(msg.role, text),
                };
                true
            }
            _ => false,
        }
    }

    /// Remove a message.
    pub fn remove(&mut self, id: MessageId) -> Option<Message> {
        let pos = self.messages.iter().position(|m| m.id == id)?;
        Some(self.messages.remove(pos))
    }

    /// Remove every message. Ids keep increasing.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Look up a message.
    #[must_use]
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// Iterate oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// The most recent message.
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if there are no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
