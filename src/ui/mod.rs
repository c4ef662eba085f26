//! Chat surface model.
//!
//! The terminal front-end (and the tests) drive the same view model a browser
//! page would: an ordered message list, an input field, a send control,
//! toasts, quick replies and per-message action controls.
//!
//! # Structure
//!
//! - [`view`]: [`ChatView`] state and the [`ViewEvent`] change feed
//! - [`message_list`]: messages and their streaming/finalized lifecycle
//! - [`actions`]: [`ChatCommand`], quick replies, the more-actions menu
//! - [`markdown`]: Markdown rendering and the table-copy helper
//! - [`clipboard`]: clipboard sinks

pub mod actions;
pub mod clipboard;
pub mod markdown;
pub mod message_list;
pub mod view;

pub use actions::{ChatCommand, MoreMenu, Point, QUICK_REPLIES, Reaction, Rect};
pub use clipboard::{Clipboard, MemoryClipboard, Osc52Clipboard};
pub use message_list::{CURSOR, Message, MessageId, MessageList, MessageState, Role};
pub use view::{ChatView, Toast, ToastKind, ViewEvent};
