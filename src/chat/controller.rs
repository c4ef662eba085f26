//! Session lifecycle and streaming send path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;

use crate::api::{ChatBackend, ChatStreamRequest, Redeemed, ResumedSession, UserInfo};
use crate::error::{Error, Result};
use crate::session::{PendingDraftStore, SessionStore};
use crate::storage::KeyValueStore;
use crate::stream::StreamEvent;
use crate::ui::markdown::tables_as_tsv;
use crate::ui::{
    ChatCommand, ChatView, Clipboard, MemoryClipboard, MessageId, MoreMenu, QUICK_REPLIES, Role,
    Toast,
};

use super::recovery::{self, Recovery};

/// Exports shorter than this (in characters) are rejected before saving.
pub const MIN_EXPORT_CHARS: usize = 50;

/// Result of [`ChatController::initialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// A stored session was resumed and its history replayed.
    Resumed {
        /// Active session id.
        session_id: String,
    },
    /// A new session was created.
    Created {
        /// Active session id.
        session_id: String,
    },
    /// No session could be established; an inline error is shown.
    Failed,
}

/// Result of [`ChatController::send_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The reply streamed and was finalized.
    Completed {
        /// The finalized assistant message.
        reply: MessageId,
    },
    /// Blank text; nothing was sent.
    Ignored,
    /// Another send is in flight.
    Busy,
    /// There was no session; initialization ran instead of the send.
    Reinitialized,
    /// The session had expired and was rebuilt; the text is back in the input.
    SessionExpired,
    /// A login is required; the text is cached as a pending draft.
    LoginRequired,
    /// The send failed; the text is back in the input.
    Failed,
}

/// Drives one module's chat: session resume/create, streaming sends,
/// recovery and message actions.
///
/// All UI state lives in the owned [`ChatView`]; handlers reach it through
/// [`view`](Self::view) and feed user actions in through
/// [`dispatch`](Self::dispatch).
pub struct ChatController {
    backend: Arc<dyn ChatBackend>,
    sessions: SessionStore,
    drafts: PendingDraftStore,
    clipboard: Arc<dyn Clipboard>,
    view: ChatView,
    module: String,
    session_id: Option<String>,
    busy: bool,
    export_dir: PathBuf,
}

impl std::fmt::Debug for ChatController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatController")
            .field("module", &self.module)
            .field("session_id", &self.session_id)
            .field("busy", &self.busy)
            .finish()
    }
}

impl ChatController {
    /// Create a controller for `module` with `model` selected.
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        storage: Arc<dyn KeyValueStore>,
        module: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let module = module.into();
        Self {
            backend,
            sessions: SessionStore::new(Arc::clone(&storage), module.clone()),
            drafts: PendingDraftStore::new(storage),
            clipboard: Arc::new(MemoryClipboard::new()),
            view: ChatView::new(model),
            module,
            session_id: None,
            busy: false,
            export_dir: PathBuf::from("."),
        }
    }

    /// Use `clipboard` for copy actions.
    #[must_use]
    pub fn with_clipboard(mut self, clipboard: Arc<dyn Clipboard>) -> Self {
        self.clipboard = clipboard;
        self
    }

    /// Override the local session freshness window.
    #[must_use]
    pub fn with_session_ttl_days(mut self, days: u32) -> Self {
        self.sessions = self.sessions.with_ttl_days(days);
        self
    }

    /// Directory exported documents are written to.
    #[must_use]
    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = dir.into();
        self
    }

    /// The chat surface.
    #[must_use]
    pub fn view(&self) -> &ChatView {
        &self.view
    }

    /// The chat surface, for input handlers.
    pub fn view_mut(&mut self) -> &mut ChatView {
        &mut self.view
    }

    /// The backend this controller talks to.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn ChatBackend> {
        &self.backend
    }

    /// Module this controller serves.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Active session id.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Whether a send is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Resume the stored session, or create a new one.
    pub async fn initialize(&mut self) -> InitOutcome {
        let stored = self.sessions.restore().unwrap_or_else(|e| {
            tracing::warn!(module = %self.module, error = %e, "Could not read stored session");
            None
        });

        if let Some(stored_id) = stored {
            match self.backend.resume_session(&stored_id).await {
                Ok(resumed) => {
                    let session_id = self.adopt(resumed);
                    return InitOutcome::Resumed { session_id };
                }
                Err(e) => {
                    tracing::warn!(
                        name: "session.resume.failed",
                        module = %self.module,
                        session_id = %stored_id,
                        error = %e,
                        "Resume failed, creating a new session"
                    );
                    self.forget_session();
                }
            }
        }

        self.create_session().await
    }

    /// Resume a session picked from the history list.
    pub async fn open_session(&mut self, session_id: &str) -> Result<()> {
        match self.backend.resume_session(session_id).await {
            Ok(resumed) => {
                if let Some(module) = resumed.module.as_deref() {
                    if module != self.module {
                        tracing::warn!(
                            name: "session.open.rejected",
                            module = %self.module,
                            session_module = %module,
                            session_id = %session_id,
                            "Session belongs to another module"
                        );
                        self.view.toast(Toast::warning(recovery::OTHER_MODULE_TOAST));
                        return Err(Error::InvalidInput(format!(
                            "session {session_id} belongs to module {module}"
                        )));
                    }
                }
                self.adopt(resumed);
                Ok(())
            }
            Err(e) => {
                self.view
                    .toast(Toast::error(format!("无法打开该对话：{}", e.user_message())));
                Err(e)
            }
        }
    }

    /// Forget the current session and start a fresh one.
    pub async fn new_session(&mut self) -> InitOutcome {
        self.forget_session();
        self.view.clear_messages();
        self.create_session().await
    }

    async fn create_session(&mut self) -> InitOutcome {
        match self.backend.create_session(&self.module).await {
            Ok(new) => {
                self.remember_session(&new.session_id);
                let welcome = self
                    .view
                    .push_message(Role::Assistant, new.welcome_message, true);
                self.view.attach_actions(welcome);
                self.view.show_quick_replies(welcome, &QUICK_REPLIES);
                self.restore_pending_draft();

                tracing::info!(
                    name: "session.created",
                    module = %self.module,
                    session_id = %new.session_id,
                    "Session created"
                );
                InitOutcome::Created {
                    session_id: new.session_id,
                }
            }
            Err(e) => {
                tracing::error!(
                    name: "session.create.failed",
                    module = %self.module,
                    error = %e,
                    "Session creation failed"
                );
                self.view.push_message(
                    Role::Error,
                    format!("创建会话失败：{}", e.user_message()),
                    false,
                );
                InitOutcome::Failed
            }
        }
    }

    /// Switch to a resumed session and replay its history.
    fn adopt(&mut self, resumed: ResumedSession) -> String {
        let session_id = resumed.session_id;
        self.remember_session(&session_id);

        self.view.clear_messages();
        for message in resumed.messages {
            let role = Role::from(message.role.as_str());
            let id = self.view.push_message(role, message.content, false);
            if role == Role::Assistant {
                self.view.attach_actions(id);
            }
        }
        self.view.toast(Toast::success(recovery::RESUMED_TOAST));
        self.restore_pending_draft();

        tracing::info!(
            name: "session.resumed",
            module = %self.module,
            session_id = %session_id,
            messages = self.view.messages().len(),
            "Session resumed"
        );
        session_id
    }

    fn remember_session(&mut self, session_id: &str) {
        if let Err(e) = self.sessions.save(session_id) {
            tracing::warn!(module = %self.module, error = %e, "Could not store session id");
        }
        self.session_id = Some(session_id.to_string());
    }

    fn forget_session(&mut self) {
        if let Err(e) = self.sessions.clear() {
            tracing::warn!(module = %self.module, error = %e, "Could not clear stored session");
        }
        self.session_id = None;
    }

    fn restore_pending_draft(&mut self) {
        match self.drafts.take_for(&self.module) {
            Ok(Some(text)) => {
                tracing::info!(name: "draft.restored", module = %self.module, "Pending draft restored");
                self.view.set_input(text);
                self.view.toast(Toast::info(recovery::DRAFT_RESTORED_TOAST));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(module = %self.module, error = %e, "Could not read pending draft");
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Sending
    // ─────────────────────────────────────────────────────────────────────

    /// Send whatever is in the input field.
    pub async fn submit(&mut self) -> SendOutcome {
        let text = self.view.input().to_string();
        self.send_message(&text).await
    }

    /// Send `text` and stream the reply into a new assistant message.
    ///
    /// The send control is disabled for the duration and always re-enabled.
    /// On failure the user message and placeholder are removed and `text`
    /// is put back into the input.
    pub async fn send_message(&mut self, text: &str) -> SendOutcome {
        if self.busy {
            return SendOutcome::Busy;
        }

        let text = text.trim().to_string();
        if text.is_empty() {
            self.view.set_send_enabled(true);
            return SendOutcome::Ignored;
        }

        let Some(session_id) = self.session_id.clone() else {
            tracing::warn!(module = %self.module, "No active session, re-initializing");
            self.initialize().await;
            self.view.set_input(text);
            return SendOutcome::Reinitialized;
        };

        self.busy = true;
        self.view.set_send_enabled(false);
        self.view.hide_quick_replies();
        self.view.close_menu();

        let user_message = self.view.push_message(Role::User, text.clone(), false);
        let placeholder = self.view.push_placeholder();
        let request = ChatStreamRequest {
            session_id,
            message: text.clone(),
            model: self.view.model().to_string(),
        };

        let outcome = match self.stream_reply(request, placeholder).await {
            Ok(()) => {
                self.view.attach_actions(placeholder);
                self.view.show_quick_replies(placeholder, &QUICK_REPLIES);
                SendOutcome::Completed { reply: placeholder }
            }
            Err(e) => self.recover(e, &text, user_message, placeholder).await,
        };

        self.busy = false;
        self.view.set_send_enabled(true);
        outcome
    }

    async fn stream_reply(&mut self, request: ChatStreamRequest, placeholder: MessageId) -> Result<()> {
        let mut events = self.backend.stream_chat(request).await?;
        self.view.clear_input();

        let mut reply = String::new();
        let mut fragments = 0usize;
        while let Some(event) = events.next().await {
            match event? {
                StreamEvent::Content(text) => {
                    reply.push_str(&text);
                    fragments += 1;
                    self.view.stream_into(placeholder, &reply);
                }
                StreamEvent::Error(message) => return Err(Error::Server(message)),
                StreamEvent::Done {
                    remaining_credits, ..
                } => {
                    if let Some(credits) = remaining_credits {
                        self.view.set_credits(credits);
                    }
                    self.refresh_history().await;
                }
            }
        }

        self.view.finalize(placeholder, &reply, true);
        tracing::info!(
            name: "stream.finished",
            module = %self.module,
            fragments,
            chars = reply.chars().count(),
            "Reply finalized"
        );
        Ok(())
    }

    async fn recover(
        &mut self,
        err: Error,
        text: &str,
        user_message: MessageId,
        placeholder: MessageId,
    ) -> SendOutcome {
        self.view.remove_message(placeholder);
        self.view.remove_message(user_message);

        match recovery::classify(&err) {
            Recovery::Reinitialize => {
                tracing::warn!(name: "session.expired", module = %self.module, "Session expired, rebuilding");
                self.view.toast(Toast::warning(recovery::SESSION_EXPIRED_TOAST));
                self.forget_session();
                self.initialize().await;
                self.view.set_input(text);
                SendOutcome::SessionExpired
            }
            Recovery::PromptLogin { message } => {
                tracing::info!(name: "auth.login_required", module = %self.module, "Login required, caching draft");
                if let Err(e) = self.drafts.save(&self.module, text) {
                    tracing::warn!(module = %self.module, error = %e, "Could not cache pending draft");
                }
                self.view.set_input(text);
                self.view.show_login_prompt(message);
                SendOutcome::LoginRequired
            }
            Recovery::Retry { toast } => {
                tracing::warn!(
                    name: "stream.failed",
                    module = %self.module,
                    aborted = err.is_abort(),
                    error = %err,
                    "Send failed"
                );
                self.view.set_input(text);
                self.view.toast(toast);
                SendOutcome::Failed
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────

    /// Handle a user action.
    pub async fn dispatch(&mut self, command: ChatCommand) -> Result<()> {
        match command {
            ChatCommand::Like(id) => {
                self.action_target(id)?;
                let reaction = self.view.update_reaction(id, |r| r.liked = !r.liked);
                if reaction.liked {
                    self.view.toast(Toast::success("感谢您的反馈"));
                }
            }
            ChatCommand::Dislike(id) => {
                self.action_target(id)?;
                let reaction = self.view.update_reaction(id, |r| r.disliked = !r.disliked);
                if reaction.disliked {
                    self.view.toast(Toast::info("我们会继续改进"));
                }
            }
            ChatCommand::Copy(id) => {
                let text = self.action_target(id)?;
                self.clipboard.write_text(&text)?;
                self.view.toast(Toast::success("已复制到剪贴板"));
            }
            ChatCommand::Regenerate(id) => {
                self.action_target(id)?;
                self.view.toast(Toast::info("重新生成功能开发中"));
            }
            ChatCommand::Export(id) => {
                self.action_target(id)?;
                self.view.close_menu();
                self.view.toast(Toast::info("导出功能开发中"));
            }
            ChatCommand::More {
                id,
                trigger,
                viewport,
            } => {
                self.action_target(id)?;
                self.view.open_menu(MoreMenu::open(id, trigger, viewport));
            }
            ChatCommand::Click(point) => {
                if self.view.menu().is_some_and(|m| m.dismisses(point)) {
                    self.view.close_menu();
                }
            }
            ChatCommand::CopyTable { id, index } => {
                let text = self.action_target(id)?;
                match tables_as_tsv(&text).into_iter().nth(index) {
                    Some(table) => {
                        self.clipboard.write_text(&table)?;
                        self.view.toast(Toast::success("表格已复制"));
                    }
                    None => self.view.toast(Toast::warning("未找到表格")),
                }
            }
            ChatCommand::QuickReply(phrase) => {
                self.view.hide_quick_replies();
                self.send_message(&phrase).await;
            }
            ChatCommand::NewSession => {
                self.new_session().await;
            }
            ChatCommand::ExportDocument => {
                self.export_document().await?;
            }
        }
        Ok(())
    }

    /// Raw text of an assistant message that carries action controls.
    fn action_target(&self, id: MessageId) -> Result<String> {
        if !self.view.has_actions(id) {
            return Err(Error::ActionUnavailable(id.get()));
        }
        self.view
            .messages()
            .get(id)
            .map(|m| m.content.clone())
            .ok_or(Error::ActionUnavailable(id.get()))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Account, history, export
    // ─────────────────────────────────────────────────────────────────────

    /// Select the model used for the next send.
    pub fn select_model(&mut self, model: impl Into<String>) {
        self.view.set_model(model);
    }

    /// Reload the conversation history. Failures (e.g. logged out) only log.
    pub async fn refresh_history(&mut self) {
        match self.backend.list_sessions().await {
            Ok(sessions) => self.view.set_history(sessions),
            Err(e) => tracing::debug!(error = %e, "History refresh skipped"),
        }
    }

    /// Reload the credit balance.
    pub async fn refresh_credits(&mut self) -> Result<i64> {
        let credits = self.backend.credits().await?;
        self.view.set_credits(credits);
        Ok(credits)
    }

    /// Redeem a credit code.
    pub async fn redeem(&mut self, code: &str) -> Result<Redeemed> {
        let code = code.trim();
        if code.is_empty() {
            self.view.toast(Toast::error("请输入兑换码"));
            return Err(Error::InvalidInput("请输入兑换码".into()));
        }

        match self.backend.redeem(code).await {
            Ok(redeemed) => {
                if let Some(balance) = redeemed.new_balance {
                    self.view.set_credits(balance);
                }
                self.view.toast(Toast::success(format!(
                    "兑换成功，获得 {} 积分",
                    redeemed.credits_added
                )));
                Ok(redeemed)
            }
            Err(e) => {
                self.view
                    .toast(Toast::error(format!("兑换失败：{}", e.user_message())));
                Err(e)
            }
        }
    }

    /// Log in and re-initialize, which restores a cached draft.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<UserInfo> {
        match self.backend.login(username, password).await {
            Ok(user) => {
                tracing::info!(name: "auth.login", user_id = %user.user_id, "Logged in");
                self.view.dismiss_login_prompt();
                self.view.toast(Toast::success("登录成功"));
                self.initialize().await;
                if let Err(e) = self.refresh_credits().await {
                    tracing::debug!(error = %e, "Credit refresh after login failed");
                }
                Ok(user)
            }
            Err(e) => {
                self.view
                    .toast(Toast::error(format!("登录失败：{}", e.user_message())));
                Err(e)
            }
        }
    }

    /// Log out.
    pub async fn logout(&mut self) -> Result<()> {
        self.backend.logout().await?;
        self.view.toast(Toast::success("已登出"));
        Ok(())
    }

    /// Export the conversation as Markdown into the export directory.
    pub async fn export_document(&mut self) -> Result<PathBuf> {
        let Some(session_id) = self.session_id.clone() else {
            self.view.toast(Toast::error("当前没有可导出的对话"));
            return Err(Error::InvalidInput("no active session".into()));
        };

        let document = match self.backend.export_document(&session_id).await {
            Ok(document) => document,
            Err(e) => {
                self.view
                    .toast(Toast::error(format!("导出失败：{}", e.user_message())));
                return Err(e);
            }
        };

        let len = document.chars().count();
        if len < MIN_EXPORT_CHARS {
            self.view
                .toast(Toast::warning("对话内容不足，请多聊几轮后再导出"));
            return Err(Error::InsufficientContent { len });
        }

        let path = export_path(&self.export_dir, &self.module, &session_id);
        tokio::fs::create_dir_all(&self.export_dir).await?;
        tokio::fs::write(&path, document).await?;

        tracing::info!(name: "export.saved", path = %path.display(), chars = len, "Document exported");
        self.view
            .toast(Toast::success(format!("文档已导出：{}", path.display())));
        Ok(path)
    }
}

fn export_path(dir: &Path, module: &str, session_id: &str) -> PathBuf {
    dir.join(format!(
        "{}-{}.md",
        file_safe(module),
        file_safe(session_id)
    ))
}

fn file_safe(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
