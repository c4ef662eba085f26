//! Failure classification for the send path.
//!
//! Every error raised while sending maps to one recovery: rebuild the
//! session, ask for a login (keeping the draft), or hand the text back for
//! a retry. None of them leave the surface unusable.

use crate::error::Error;
use crate::ui::Toast;

/// Shown when the backend no longer knows the session.
pub const SESSION_EXPIRED_TOAST: &str = "会话已过期，正在重建...";
/// Login prompt used when the server sends none.
pub const DEFAULT_LOGIN_PROMPT: &str = "请先登录后再使用";
/// Shown for client-side timeouts.
pub const ABORTED_TOAST: &str = "请求超时，请检查网络后重试";
/// Shown after a stored session was resumed.
pub const RESUMED_TOAST: &str = "已恢复之前的对话";
/// Shown when a history entry belongs to a different module.
pub const OTHER_MODULE_TOAST: &str = "该对话属于其他模块，请切换模块后再打开";
/// Shown when a pending draft was put back into the input.
pub const DRAFT_RESTORED_TOAST: &str = "已恢复您登录前未发送的消息";

/// What the controller does after a failed send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    /// Drop the session, create a new one, put the text back.
    Reinitialize,
    /// Cache the text as a pending draft and show the login prompt.
    PromptLogin {
        /// Prompt text.
        message: String,
    },
    /// Put the text back and tell the user why the send failed.
    Retry {
        /// Notification to raise.
        toast: Toast,
    },
}

/// Decide how to recover from `err`.
#[must_use]
pub fn classify(err: &Error) -> Recovery {
    match err {
        Error::SessionExpired => Recovery::Reinitialize,
        Error::LoginRequired { message } => Recovery::PromptLogin {
            message: if message.trim().is_empty() {
                DEFAULT_LOGIN_PROMPT.to_string()
            } else {
                message.clone()
            },
        },
        Error::CreditsExhausted { message } => Recovery::Retry {
            toast: Toast::error(message.clone()),
        },
        e if e.is_abort() => Recovery::Retry {
            toast: Toast::error(ABORTED_TOAST),
        },
        e => Recovery::Retry {
            toast: Toast::error(format!("发送失败：{}", e.user_message())),
        },
    }
}
