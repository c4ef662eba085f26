//! Chat surface state.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::api::SessionSummary;

use super::actions::{MoreMenu, Reaction};
use super::message_list::{Message, MessageId, MessageList, Role};

/// Toast severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    /// Operation succeeded.
    Success,
    /// Neutral notice.
    Info,
    /// Recoverable problem.
    Warning,
    /// Operation failed.
    Error,
}

/// A transient notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    /// Severity.
    pub kind: ToastKind,
    /// Text shown to the user.
    pub text: String,
    /// How long the toast stays visible.
    pub duration: Duration,
}

impl Toast {
    /// Build a toast with the default duration for its kind.
    pub fn new(kind: ToastKind, text: impl Into<String>) -> Self {
        let duration = match kind {
            ToastKind::Success | ToastKind::Info => Duration::from_secs(2),
            ToastKind::Warning | ToastKind::Error => Duration::from_secs(3),
        };
        Self {
            kind,
            text: text.into(),
            duration,
        }
    }

    /// Success toast.
    pub fn success(text: impl Into<String>) -> Self {
        Self::new(ToastKind::Success, text)
    }

    /// Info toast.
    pub fn info(text: impl Into<String>) -> Self {
        Self::new(ToastKind::Info, text)
    }

    /// Warning toast.
    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(ToastKind::Warning, text)
    }

    /// Error toast.
    pub fn error(text: impl Into<String>) -> Self {
        Self::new(ToastKind::Error, text)
    }
}

/// Change notifications for a renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// A message was appended.
    MessageAppended(Message),
    /// A streaming message received more text (full text so far, no cursor).
    MessageStreaming {
        /// Message being streamed.
        id: MessageId,
        /// Accumulated text.
        content: String,
    },
    /// A streaming message was finalized.
    MessageFinalized(Message),
    /// A message was removed.
    MessageRemoved(MessageId),
    /// All messages were removed.
    MessagesCleared,
    /// The input field changed.
    InputChanged(String),
    /// The send control was enabled or disabled.
    SendEnabled(bool),
    /// A toast was raised.
    Toast(Toast),
    /// The credit display changed.
    CreditsChanged(i64),
    /// The conversation history list was refreshed.
    HistoryChanged(Vec<SessionSummary>),
    /// The user must log in; carries the prompt text.
    LoginPrompt(String),
    /// Quick replies are offered after `anchor`.
    QuickRepliesShown {
        /// Message the replies follow.
        anchor: MessageId,
        /// Phrases in display order.
        replies: Vec<String>,
    },
    /// The quick-reply control was removed.
    QuickRepliesHidden,
    /// Action controls were attached to an assistant message.
    ActionsAttached(MessageId),
    /// Like/dislike state of a message changed.
    ReactionChanged {
        /// Message whose state changed.
        id: MessageId,
        /// New state.
        reaction: Reaction,
    },
    /// The more-actions menu opened.
    MenuOpened(MoreMenu),
    /// The more-actions menu closed.
    MenuClosed,
    /// The selected model changed.
    ModelChanged(String),
}

/// Everything the chat surface shows.
///
/// Mutators keep the state consistent and forward a [`ViewEvent`] to the
/// subscriber, if any.
#[derive(Debug)]
pub struct ChatView {
    messages: MessageList,
    input: String,
    send_enabled: bool,
    model: String,
    credits: Option<i64>,
    history: Vec<SessionSummary>,
    toasts: Vec<Toast>,
    login_prompt: Option<String>,
    quick_replies: Option<MessageId>,
    actions: HashSet<MessageId>,
    reactions: HashMap<MessageId, Reaction>,
    menu: Option<MoreMenu>,
    events: Option<mpsc::UnboundedSender<ViewEvent>>,
}

impl ChatView {
    /// Create an empty surface with `model` selected.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            messages: MessageList::new(),
            input: String::new(),
            send_enabled: true,
            model: model.into(),
            credits: None,
            history: Vec::new(),
            toasts: Vec::new(),
            login_prompt: None,
            quick_replies: None,
            actions: HashSet::new(),
            reactions: HashMap::new(),
            menu: None,
            events: None,
        }
    }

    /// Receive every future change. Replaces any previous subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ViewEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    fn emit(&mut self, event: ViewEvent) {
        let closed = match &self.events {
            Some(tx) => tx.send(event).is_err(),
            None => false,
        };
        if closed {
            self.events = None;
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Messages
    // ─────────────────────────────────────────────────────────────────────

    /// The message list.
    #[must_use]
    pub fn messages(&self) -> &MessageList {
        &self.messages
    }

    /// Append a finalized message.
    pub fn push_message(
        &mut self,
        role: Role,
        content: impl Into<String>,
        quick_replies: bool,
    ) -> MessageId {
        let id = self.messages.push(role, content, quick_replies);
        self.emit_appended(id);
        id
    }

    /// Append an empty streaming assistant message.
    pub fn push_placeholder(&mut self) -> MessageId {
        let id = self.messages.push_streaming();
        self.emit_appended(id);
        id
    }

    fn emit_appended(&mut self, id: MessageId) {
        if let Some(msg) = self.messages.get(id).cloned() {
            self.emit(ViewEvent::MessageAppended(msg));
        }
    }

    /// Show `text` (plus cursor) in a streaming message.
    pub fn stream_into(&mut self, id: MessageId, text: &str) -> bool {
        let updated = self.messages.update_streaming(id, text);
        if updated {
            self.emit(ViewEvent::MessageStreaming {
                id,
                content: text.to_string(),
            });
        }
        updated
    }

    /// Finalize a streaming message as rendered Markdown.
    pub fn finalize(&mut self, id: MessageId, text: &str, quick_replies: bool) -> bool {
        let done = self.messages.finalize(id, text, quick_replies);
        if let Some(msg) = self.messages.get(id).filter(|_| done).cloned() {
            self.emit(ViewEvent::MessageFinalized(msg));
        }
        done
    }

    /// Remove a message and any controls attached to it.
    pub fn remove_message(&mut self, id: MessageId) -> Option<Message> {
        let removed = self.messages.remove(id)?;
        self.actions.remove(&id);
        self.reactions.remove(&id);
        if self.quick_replies == Some(id) {
            self.hide_quick_replies();
        }
        if self.menu.is_some_and(|m| m.anchor == id) {
            self.close_menu();
        }
        self.emit(ViewEvent::MessageRemoved(id));
        Some(removed)
    }

    /// Remove every message.
    pub fn clear_messages(&mut self) {
        self.messages.clear();
        self.actions.clear();
        self.reactions.clear();
        self.quick_replies = None;
        self.menu = None;
        self.emit(ViewEvent::MessagesCleared);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Input
    // ─────────────────────────────────────────────────────────────────────

    /// Current input text.
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Replace the input text.
    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
        let text = self.input.clone();
        self.emit(ViewEvent::InputChanged(text));
    }

    /// Empty the input field.
    pub fn clear_input(&mut self) {
        self.set_input(String::new());
    }

    /// Whether the send control is enabled.
    #[must_use]
    pub fn send_enabled(&self) -> bool {
        self.send_enabled
    }

    /// Enable or disable the send control.
    pub fn set_send_enabled(&mut self, enabled: bool) {
        self.send_enabled = enabled;
        self.emit(ViewEvent::SendEnabled(enabled));
    }

    /// Selected model identifier.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Select a model.
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
        let model = self.model.clone();
        self.emit(ViewEvent::ModelChanged(model));
    }

    // ─────────────────────────────────────────────────────────────────────
    // Notifications and account
    // ─────────────────────────────────────────────────────────────────────

    /// Raise a toast.
    pub fn toast(&mut self, toast: Toast) {
        self.toasts.push(toast.clone());
        self.emit(ViewEvent::Toast(toast));
    }

    /// Every toast raised so far, oldest first.
    #[must_use]
    pub fn toasts(&self) -> &[Toast] {
        &self.toasts
    }

    /// The most recent toast.
    #[must_use]
    pub fn last_toast(&self) -> Option<&Toast> {
        self.toasts.last()
    }

    /// Credit balance, once known.
    #[must_use]
    pub fn credits(&self) -> Option<i64> {
        self.credits
    }

    /// Update the credit display.
    pub fn set_credits(&mut self, credits: i64) {
        self.credits = Some(credits);
        self.emit(ViewEvent::CreditsChanged(credits));
    }

    /// Conversation history, most recent first.
    #[must_use]
    pub fn history(&self) -> &[SessionSummary] {
        &self.history
    }

    /// Replace the conversation history.
    pub fn set_history(&mut self, history: Vec<SessionSummary>) {
        self.history = history;
        let history = self.history.clone();
        self.emit(ViewEvent::HistoryChanged(history));
    }

    /// Login prompt currently shown.
    #[must_use]
    pub fn login_prompt(&self) -> Option<&str> {
        self.login_prompt.as_deref()
    }

    /// Ask the user to log in: a system message plus the prompt state.
    pub fn show_login_prompt(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.push_message(Role::System, text.clone(), false);
        self.login_prompt = Some(text.clone());
        self.emit(ViewEvent::LoginPrompt(text));
    }

    /// Drop the login prompt after a successful login.
    pub fn dismiss_login_prompt(&mut self) {
        self.login_prompt = None;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Controls
    // ─────────────────────────────────────────────────────────────────────

    /// Message the quick replies currently follow.
    #[must_use]
    pub fn quick_replies(&self) -> Option<MessageId> {
        self.quick_replies
    }

    /// Offer `replies` after `anchor`, replacing any earlier offer.
    pub fn show_quick_replies(&mut self, anchor: MessageId, replies: &[&str]) {
        self.quick_replies = Some(anchor);
        self.emit(ViewEvent::QuickRepliesShown {
            anchor,
            replies: replies.iter().map(ToString::to_string).collect(),
        });
    }

    /// Remove the quick-reply control.
    pub fn hide_quick_replies(&mut self) {
        if self.quick_replies.take().is_some() {
            self.emit(ViewEvent::QuickRepliesHidden);
        }
    }

    /// Whether action controls are attached to `id`.
    #[must_use]
    pub fn has_actions(&self, id: MessageId) -> bool {
        self.actions.contains(&id)
    }

    /// Attach action controls. Only assistant messages take them.
    pub fn attach_actions(&mut self, id: MessageId) -> bool {
        let is_assistant = self
            .messages
            .get(id)
            .is_some_and(|m| m.role == Role::Assistant && !m.is_streaming());
        if is_assistant && self.actions.insert(id) {
            self.emit(ViewEvent::ActionsAttached(id));
        }
        is_assistant
    }

    /// Like/dislike state of `id`.
    #[must_use]
    pub fn reaction(&self, id: MessageId) -> Reaction {
        self.reactions.get(&id).copied().unwrap_or_default()
    }

    /// Apply `f` to the reaction state of `id` and return the new state.
    pub fn update_reaction(&mut self, id: MessageId, f: impl FnOnce(&mut Reaction)) -> Reaction {
        let entry = self.reactions.entry(id).or_default();
        f(entry);
        let reaction = *entry;
        self.emit(ViewEvent::ReactionChanged { id, reaction });
        reaction
    }

    /// The open more-actions menu.
    #[must_use]
    pub fn menu(&self) -> Option<&MoreMenu> {
        self.menu.as_ref()
    }

    /// Open the more-actions menu, replacing any open one.
    pub fn open_menu(&mut self, menu: MoreMenu) {
        self.menu = Some(menu);
        self.emit(ViewEvent::MenuOpened(menu));
    }

    /// Close the more-actions menu.
    pub fn close_menu(&mut self) {
        if self.menu.take().is_some() {
            self.emit(ViewEvent::MenuClosed);
        }
    }
}
