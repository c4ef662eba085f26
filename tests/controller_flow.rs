use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use coach_chat::api::{
    ChatBackend, ChatStreamRequest, EventStream, HistoryMessage, ModelInfo, ModuleInfo, NewSession,
    Redeemed, ResumedSession, SessionSummary, UserInfo,
};
use coach_chat::chat::recovery::{
    ABORTED_TOAST, DRAFT_RESTORED_TOAST, OTHER_MODULE_TOAST, RESUMED_TOAST,
    SESSION_EXPIRED_TOAST,
};
use coach_chat::chat::{ChatController, InitOutcome, SendOutcome};
use coach_chat::session::{MS_PER_DAY, PendingDraftStore, SessionStore, now_millis};
use coach_chat::storage::{KeyValueStore, MemoryStore};
use coach_chat::stream::StreamEvent;
use coach_chat::ui::{
    ChatCommand, MemoryClipboard, MessageId, Point, QUICK_REPLIES, Rect, Role, ToastKind,
};
use coach_chat::{Error, Result};

type StreamScript = Result<Vec<Result<StreamEvent>>>;

/// Backend double: sessions are numbered `s1`, `s2`, ...; each send pops
/// the next scripted stream.
#[derive(Default)]
struct ScriptedBackend {
    next_session: Mutex<u32>,
    create_error: Mutex<Option<String>>,
    known: Mutex<HashMap<String, Vec<HistoryMessage>>>,
    modules: Mutex<HashMap<String, String>>,
    streams: Mutex<VecDeque<StreamScript>>,
    document: Mutex<String>,
    resumed: Mutex<Vec<String>>,
    sent: Mutex<Vec<ChatStreamRequest>>,
    history_calls: Mutex<u32>,
    redeemed: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn know(&self, id: &str, history: &[(&str, &str)]) {
        let messages = history
            .iter()
            .map(|(role, content)| HistoryMessage {
                role: (*role).to_string(),
                content: (*content).to_string(),
            })
            .collect();
        self.known.lock().unwrap().insert(id.to_string(), messages);
    }

    fn know_in(&self, module: &str, id: &str, history: &[(&str, &str)]) {
        self.know(id, history);
        self.modules
            .lock()
            .unwrap()
            .insert(id.to_string(), module.to_string());
    }

    fn push_stream(&self, script: StreamScript) {
        self.streams.lock().unwrap().push_back(script);
    }

    fn reply(&self, fragments: &[&str], remaining_credits: Option<i64>) {
        let mut events: Vec<Result<StreamEvent>> = fragments
            .iter()
            .map(|f| Ok(StreamEvent::Content((*f).to_string())))
            .collect();
        events.push(Ok(StreamEvent::Done {
            remaining_credits,
            credits_used: Some(1),
        }));
        self.push_stream(Ok(events));
    }

    fn sent(&self) -> Vec<ChatStreamRequest> {
        self.sent.lock().unwrap().clone()
    }

    fn resumed(&self) -> Vec<String> {
        self.resumed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn create_session(&self, _module: &str) -> Result<NewSession> {
        if let Some(error) = self.create_error.lock().unwrap().clone() {
            return Err(Error::Api {
                status: 200,
                message: error,
            });
        }
        let mut next = self.next_session.lock().unwrap();
        *next += 1;
        let session_id = format!("s{next}");
        self.known
            .lock()
            .unwrap()
            .insert(session_id.clone(), Vec::new());
        Ok(NewSession {
            session_id,
            welcome_message: "欢迎来到 **KPI** 训练".into(),
        })
    }

    async fn resume_session(&self, session_id: &str) -> Result<ResumedSession> {
        self.resumed.lock().unwrap().push(session_id.to_string());
        match self.known.lock().unwrap().get(session_id) {
            Some(messages) => Ok(ResumedSession {
                session_id: session_id.to_string(),
                module: Some(
                    self.modules
                        .lock()
                        .unwrap()
                        .get(session_id)
                        .cloned()
                        .unwrap_or_else(|| "kpi".into()),
                ),
                messages: messages.clone(),
            }),
            None => Err(Error::SessionExpired),
        }
    }

    async fn stream_chat(&self, request: ChatStreamRequest) -> Result<EventStream> {
        self.sent.lock().unwrap().push(request);
        let script = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()));
        let events = script?;
        Ok(Box::pin(futures::stream::iter(events)))
    }

    async fn export_document(&self, _session_id: &str) -> Result<String> {
        Ok(self.document.lock().unwrap().clone())
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        *self.history_calls.lock().unwrap() += 1;
        Ok(vec![SessionSummary {
            id: "s1".into(),
            module: Some("kpi".into()),
            status: Some("active".into()),
            created_at: None,
            updated_at: None,
            preview: Some("Hi there".into()),
        }])
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(Vec::new())
    }

    async fn list_modules(&self) -> Result<Vec<ModuleInfo>> {
        Ok(Vec::new())
    }

    async fn credits(&self) -> Result<i64> {
        Ok(100)
    }

    async fn redeem(&self, code: &str) -> Result<Redeemed> {
        self.redeemed.lock().unwrap().push(code.to_string());
        Ok(Redeemed {
            message: Some("兑换成功".into()),
            credits_added: 50,
            new_balance: Some(150),
        })
    }

    async fn login(&self, username: &str, _password: &str) -> Result<UserInfo> {
        Ok(UserInfo {
            user_id: "u1".into(),
            username: Some(username.to_string()),
        })
    }

    async fn logout(&self) -> Result<()> {
        Ok(())
    }
}

fn controller(
    backend: &Arc<ScriptedBackend>,
    storage: &MemoryStore,
    module: &str,
) -> ChatController {
    let backend: Arc<dyn ChatBackend> = Arc::clone(backend) as Arc<dyn ChatBackend>;
    let storage: Arc<dyn KeyValueStore> = Arc::new(storage.clone());
    ChatController::new(backend, storage, module, "flash")
}

fn stored_session(storage: &MemoryStore, module: &str) -> Option<String> {
    storage.get(&format!("chat_session_{module}")).unwrap()
}

fn has_toast(controller: &ChatController, text: &str) -> bool {
    controller
        .view()
        .toasts()
        .iter()
        .any(|t| t.text.contains(text))
}

fn user_texts(controller: &ChatController) -> Vec<String> {
    controller
        .view()
        .messages()
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| m.content.clone())
        .collect()
}

async fn ready(backend: &Arc<ScriptedBackend>, storage: &MemoryStore) -> ChatController {
    let mut chat = controller(backend, storage, "kpi");
    assert_eq!(
        chat.initialize().await,
        InitOutcome::Created {
            session_id: "s1".into()
        }
    );
    chat
}

// ─────────────────────────────────────────────────────────────────────────────
// Streaming
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_streamed_fragments_concatenate_into_reply() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    let mut chat = ready(&backend, &storage).await;

    backend.reply(&["Hi", " there"], Some(42));
    let outcome = chat.send_message("  Hello coach  ").await;

    let SendOutcome::Completed { reply } = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    let message = chat.view().messages().get(reply).unwrap();
    assert_eq!(message.role, Role::Assistant);
    assert_eq!(message.content, "Hi there");
    assert!(!message.is_streaming());
    assert_eq!(message.html(), Some("<p>Hi there</p>\n"));

    assert_eq!(chat.view().credits(), Some(42));
    assert_eq!(*backend.history_calls.lock().unwrap(), 1);
    assert_eq!(chat.view().history().len(), 1);

    let sent = backend.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].session_id, "s1");
    assert_eq!(sent[0].message, "Hello coach");
    assert_eq!(sent[0].model, "flash");

    assert_eq!(chat.view().input(), "");
    assert!(chat.view().send_enabled());
    assert!(!chat.is_busy());
    assert!(chat.view().has_actions(reply));
    assert_eq!(chat.view().quick_replies(), Some(reply));
}

#[tokio::test]
async fn test_markdown_is_rendered_only_after_finalization() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    let mut chat = ready(&backend, &storage).await;
    let mut events = chat.view_mut().subscribe();

    backend.reply(&["**bo", "ld**"], None);
    chat.send_message("format please").await;

    let mut streamed = Vec::new();
    let mut finalized = None;
    while let Ok(event) = events.try_recv() {
        match event {
            coach_chat::ui::ViewEvent::MessageStreaming { content, .. } => streamed.push(content),
            coach_chat::ui::ViewEvent::MessageFinalized(m) => finalized = Some(m),
            _ => {}
        }
    }
    assert_eq!(streamed, vec!["**bo".to_string(), "**bold**".to_string()]);
    let finalized = finalized.unwrap();
    assert_eq!(finalized.html(), Some("<p><strong>bold</strong></p>\n"));
    assert_eq!(chat.view().credits(), None);
}

#[tokio::test]
async fn test_blank_message_is_ignored() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    let mut chat = ready(&backend, &storage).await;
    chat.view_mut().set_send_enabled(false);

    assert_eq!(chat.send_message("   \n\t").await, SendOutcome::Ignored);
    assert!(backend.sent().is_empty());
    assert!(chat.view().send_enabled());
    assert!(user_texts(&chat).is_empty());
}

#[tokio::test]
async fn test_send_without_session_initializes_instead() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    let mut chat = controller(&backend, &storage, "kpi");

    assert_eq!(chat.send_message("hello").await, SendOutcome::Reinitialized);
    assert!(backend.sent().is_empty());
    assert_eq!(chat.session_id(), Some("s1"));
    assert_eq!(chat.view().input(), "hello");
}

#[tokio::test]
async fn test_reply_ending_in_cursor_glyph_is_kept_whole() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    let mut chat = ready(&backend, &storage).await;

    backend.reply(&["进度条：", "▌▌"], None);
    let SendOutcome::Completed { reply } = chat.send_message("q").await else {
        panic!("send failed");
    };
    assert_eq!(chat.view().messages().get(reply).unwrap().content, "进度条：▌▌");
}

#[tokio::test]
async fn test_submit_sends_the_input_field() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    let mut chat = ready(&backend, &storage).await;

    backend.reply(&["ok"], None);
    chat.view_mut().set_input("from the input");
    assert!(matches!(
        chat.submit().await,
        SendOutcome::Completed { .. }
    ));
    assert_eq!(backend.sent()[0].message, "from the input");
    assert_eq!(chat.view().input(), "");
}

#[tokio::test]
async fn test_selected_model_is_sent() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    let mut chat = ready(&backend, &storage).await;

    chat.select_model("pro");
    backend.reply(&["ok"], None);
    chat.send_message("hi").await;
    assert_eq!(backend.sent()[0].model, "pro");
}

// ─────────────────────────────────────────────────────────────────────────────
// Session lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_new_session_shows_welcome_with_quick_replies() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    let chat = ready(&backend, &storage).await;

    let welcome = chat.view().messages().last().unwrap();
    assert_eq!(welcome.role, Role::Assistant);
    assert!(welcome.quick_replies);
    assert_eq!(chat.view().quick_replies(), Some(welcome.id));
    assert_eq!(stored_session(&storage, "kpi").as_deref(), Some("s1"));
}

#[tokio::test]
async fn test_stored_session_is_resumed_with_history() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    backend.know("abc", &[("user", "你好"), ("assistant", "你好，我是教练")]);
    SessionStore::new(Arc::new(storage.clone()), "kpi")
        .save("abc")
        .unwrap();

    let mut chat = controller(&backend, &storage, "kpi");
    assert_eq!(
        chat.initialize().await,
        InitOutcome::Resumed {
            session_id: "abc".into()
        }
    );

    let messages: Vec<_> = chat.view().messages().iter().cloned().collect();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].content, "你好，我是教练");
    assert!(chat.view().has_actions(messages[1].id));
    assert!(has_toast(&chat, RESUMED_TOAST));
}

#[tokio::test]
async fn test_stale_session_is_never_resumed() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    backend.know("old", &[]);
    SessionStore::new(Arc::new(storage.clone()), "kpi")
        .save_at("old", now_millis() - 8 * MS_PER_DAY)
        .unwrap();

    let mut chat = controller(&backend, &storage, "kpi");
    assert_eq!(
        chat.initialize().await,
        InitOutcome::Created {
            session_id: "s1".into()
        }
    );
    assert!(backend.resumed().is_empty());
    assert_eq!(stored_session(&storage, "kpi").as_deref(), Some("s1"));
}

#[tokio::test]
async fn test_failed_resume_creates_new_session() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    SessionStore::new(Arc::new(storage.clone()), "kpi")
        .save("gone")
        .unwrap();

    let mut chat = controller(&backend, &storage, "kpi");
    assert_eq!(
        chat.initialize().await,
        InitOutcome::Created {
            session_id: "s1".into()
        }
    );
    assert_eq!(backend.resumed(), vec!["gone".to_string()]);
    assert_eq!(stored_session(&storage, "kpi").as_deref(), Some("s1"));
}

#[tokio::test]
async fn test_create_failure_shows_inline_error() {
    let backend = ScriptedBackend::new();
    *backend.create_error.lock().unwrap() = Some("服务繁忙".into());
    let storage = MemoryStore::new();

    let mut chat = controller(&backend, &storage, "kpi");
    assert_eq!(chat.initialize().await, InitOutcome::Failed);

    let last = chat.view().messages().last().unwrap();
    assert_eq!(last.role, Role::Error);
    assert_eq!(last.content, "创建会话失败：服务繁忙");
    assert!(chat.session_id().is_none());
    assert!(stored_session(&storage, "kpi").is_none());
}

#[tokio::test]
async fn test_new_session_command_replaces_session() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    let mut chat = ready(&backend, &storage).await;

    chat.dispatch(ChatCommand::NewSession).await.unwrap();
    assert_eq!(chat.session_id(), Some("s2"));
    assert_eq!(chat.view().messages().len(), 1);
    assert_eq!(stored_session(&storage, "kpi").as_deref(), Some("s2"));
}

#[tokio::test]
async fn test_open_session_from_history() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    let mut chat = ready(&backend, &storage).await;
    backend.know("older", &[("assistant", "上次的内容")]);

    chat.open_session("older").await.unwrap();
    assert_eq!(chat.session_id(), Some("older"));
    assert_eq!(chat.view().messages().len(), 1);
    assert_eq!(stored_session(&storage, "kpi").as_deref(), Some("older"));

    assert!(chat.open_session("missing").await.is_err());
    assert_eq!(chat.session_id(), Some("older"));
}

#[tokio::test]
async fn test_session_from_other_module_is_not_opened() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    let mut chat = ready(&backend, &storage).await;
    backend.know_in("okr", "okr-7", &[("assistant", "OKR 拆解")]);

    let result = chat.open_session("okr-7").await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert!(has_toast(&chat, OTHER_MODULE_TOAST));
    assert_eq!(chat.session_id(), Some("s1"));
    assert_eq!(stored_session(&storage, "kpi").as_deref(), Some("s1"));
    assert!(
        !chat
            .view()
            .messages()
            .iter()
            .any(|m| m.content == "OKR 拆解")
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Recovery
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_expired_session_rebuilds_and_restores_text() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    let mut chat = ready(&backend, &storage).await;

    backend.push_stream(Err(Error::SessionExpired));
    let outcome = chat.send_message("where was I").await;

    assert_eq!(outcome, SendOutcome::SessionExpired);
    assert!(has_toast(&chat, SESSION_EXPIRED_TOAST));
    assert_eq!(chat.session_id(), Some("s2"));
    assert_eq!(stored_session(&storage, "kpi").as_deref(), Some("s2"));
    assert_eq!(chat.view().input(), "where was I");
    assert!(user_texts(&chat).is_empty());
    assert!(chat.view().send_enabled());
}

#[tokio::test]
async fn test_login_required_caches_draft_for_module() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    let mut chat = ready(&backend, &storage).await;

    backend.push_stream(Err(Error::LoginRequired {
        message: "请先登录".into(),
    }));
    let outcome = chat.send_message("keep me").await;

    assert_eq!(outcome, SendOutcome::LoginRequired);
    assert_eq!(chat.view().login_prompt(), Some("请先登录"));
    assert_eq!(chat.session_id(), Some("s1"));
    assert_eq!(chat.view().input(), "keep me");
    assert!(user_texts(&chat).is_empty());

    let draft = PendingDraftStore::new(Arc::new(storage.clone()))
        .peek()
        .unwrap()
        .unwrap();
    assert_eq!(draft.module, "kpi");
    assert_eq!(draft.text, "keep me");

    // Next initialization of the same module restores and consumes it.
    let mut again = controller(&backend, &storage, "kpi");
    assert_eq!(
        again.initialize().await,
        InitOutcome::Resumed {
            session_id: "s1".into()
        }
    );
    assert_eq!(again.view().input(), "keep me");
    assert!(has_toast(&again, DRAFT_RESTORED_TOAST));
    assert!(
        PendingDraftStore::new(Arc::new(storage.clone()))
            .peek()
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_draft_is_not_restored_for_other_module() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    let drafts = PendingDraftStore::new(Arc::new(storage.clone()));
    drafts.save("kpi", "for kpi only").unwrap();

    let mut other = controller(&backend, &storage, "ads");
    assert!(matches!(
        other.initialize().await,
        InitOutcome::Created { .. }
    ));
    assert_eq!(other.view().input(), "");
    assert!(!has_toast(&other, DRAFT_RESTORED_TOAST));
    assert_eq!(drafts.peek().unwrap().unwrap().module, "kpi");
}

#[tokio::test]
async fn test_login_restores_draft() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    let mut chat = ready(&backend, &storage).await;

    backend.push_stream(Err(Error::LoginRequired {
        message: String::new(),
    }));
    chat.send_message("after login").await;
    assert_eq!(chat.view().login_prompt(), Some("请先登录后再使用"));
    chat.view_mut().clear_input();

    chat.login("coach", "secret").await.unwrap();
    assert!(chat.view().login_prompt().is_none());
    assert_eq!(chat.view().input(), "after login");
    assert_eq!(chat.view().credits(), Some(100));
}

#[tokio::test]
async fn test_abort_has_distinct_toast() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    let mut chat = ready(&backend, &storage).await;

    backend.push_stream(Err(Error::Aborted));
    assert_eq!(chat.send_message("slow").await, SendOutcome::Failed);
    let abort_toast = chat.view().last_toast().unwrap().clone();
    assert_eq!(abort_toast.text, ABORTED_TOAST);

    backend.push_stream(Err(Error::Api {
        status: 500,
        message: "内部错误".into(),
    }));
    assert_eq!(chat.send_message("slow").await, SendOutcome::Failed);
    let generic = chat.view().last_toast().unwrap();
    assert_eq!(generic.text, "发送失败：内部错误");
    assert_ne!(generic.text, abort_toast.text);
    assert_eq!(chat.view().input(), "slow");
}

#[tokio::test]
async fn test_error_event_removes_partial_reply() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    let mut chat = ready(&backend, &storage).await;
    let before = chat.view().messages().len();

    backend.push_stream(Ok(vec![
        Ok(StreamEvent::Content("partial".into())),
        Ok(StreamEvent::Error("模型超载".into())),
        Ok(StreamEvent::Content("ignored".into())),
    ]));
    assert_eq!(chat.send_message("try").await, SendOutcome::Failed);

    assert_eq!(chat.view().messages().len(), before);
    assert!(
        chat.view()
            .messages()
            .iter()
            .all(|m| !m.content.contains("partial"))
    );
    assert_eq!(chat.view().input(), "try");
    assert!(has_toast(&chat, "模型超载"));
    assert!(chat.view().send_enabled());
    assert_eq!(chat.session_id(), Some("s1"));
}

#[tokio::test]
async fn test_transport_error_mid_stream_restores_input() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    let mut chat = ready(&backend, &storage).await;

    backend.push_stream(Ok(vec![
        Ok(StreamEvent::Content("half".into())),
        Err(Error::Aborted),
    ]));
    assert_eq!(chat.send_message("again").await, SendOutcome::Failed);
    assert_eq!(chat.view().input(), "again");
    assert_eq!(chat.view().last_toast().unwrap().text, ABORTED_TOAST);
}

#[tokio::test]
async fn test_credits_exhausted_surfaces_server_text() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    let mut chat = ready(&backend, &storage).await;

    backend.push_stream(Err(Error::CreditsExhausted {
        message: "积分不足，请兑换".into(),
    }));
    assert_eq!(chat.send_message("more").await, SendOutcome::Failed);
    let toast = chat.view().last_toast().unwrap();
    assert_eq!(toast.kind, ToastKind::Error);
    assert_eq!(toast.text, "积分不足，请兑换");
    assert_eq!(chat.view().input(), "more");
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

async fn with_reply(text: &str) -> (Arc<ScriptedBackend>, MemoryStore, ChatController, MessageId) {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    let mut chat = ready(&backend, &storage).await;
    backend.reply(&[text], None);
    let SendOutcome::Completed { reply } = chat.send_message("question").await else {
        panic!("send failed");
    };
    (backend, storage, chat, reply)
}

#[tokio::test]
async fn test_quick_reply_sends_phrase() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    let mut chat = ready(&backend, &storage).await;

    backend.reply(&["继续讲"], None);
    chat.dispatch(ChatCommand::QuickReply(QUICK_REPLIES[0].into()))
        .await
        .unwrap();

    assert_eq!(backend.sent()[0].message, QUICK_REPLIES[0]);
    assert_eq!(user_texts(&chat), vec![QUICK_REPLIES[0].to_string()]);
    let last = chat.view().messages().last().unwrap().id;
    assert_eq!(chat.view().quick_replies(), Some(last));
}

#[tokio::test]
async fn test_copy_writes_raw_text() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    let clipboard = MemoryClipboard::new();
    backend.reply(&["**raw** text"], None);

    let mut chat = controller(&backend, &storage, "kpi")
        .with_clipboard(Arc::new(clipboard.clone()));
    chat.initialize().await;
    let SendOutcome::Completed { reply } = chat.send_message("q").await else {
        panic!("send failed");
    };

    chat.dispatch(ChatCommand::Copy(reply)).await.unwrap();
    assert_eq!(clipboard.contents().as_deref(), Some("**raw** text"));
    assert_eq!(chat.view().last_toast().unwrap().kind, ToastKind::Success);
}

#[tokio::test]
async fn test_copy_table_as_tsv() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    let clipboard = MemoryClipboard::new();
    let mut chat = controller(&backend, &storage, "kpi")
        .with_clipboard(Arc::new(clipboard.clone()));
    chat.initialize().await;

    backend.reply(&["| 指标 | 值 |\n|---|---|\n| GMV | 100 |\n"], None);
    let SendOutcome::Completed { reply } = chat.send_message("表格").await else {
        panic!("send failed");
    };

    chat.dispatch(ChatCommand::CopyTable { id: reply, index: 0 })
        .await
        .unwrap();
    assert_eq!(clipboard.contents().as_deref(), Some("指标\t值\nGMV\t100"));

    chat.dispatch(ChatCommand::CopyTable { id: reply, index: 1 })
        .await
        .unwrap();
    assert_eq!(chat.view().last_toast().unwrap().kind, ToastKind::Warning);
}

#[tokio::test]
async fn test_reactions_toggle() {
    let (_backend, _storage, mut chat, reply) = with_reply("answer").await;

    chat.dispatch(ChatCommand::Like(reply)).await.unwrap();
    assert!(chat.view().reaction(reply).liked);
    chat.dispatch(ChatCommand::Like(reply)).await.unwrap();
    assert!(!chat.view().reaction(reply).liked);

    chat.dispatch(ChatCommand::Dislike(reply)).await.unwrap();
    assert!(chat.view().reaction(reply).disliked);
}

#[tokio::test]
async fn test_actions_only_on_assistant_messages() {
    let (_backend, _storage, mut chat, _reply) = with_reply("answer").await;
    let user = chat
        .view()
        .messages()
        .iter()
        .find(|m| m.role == Role::User)
        .unwrap()
        .id;

    let err = chat.dispatch(ChatCommand::Copy(user)).await.unwrap_err();
    assert!(matches!(err, Error::ActionUnavailable(_)));
    let err = chat.dispatch(ChatCommand::Like(user)).await.unwrap_err();
    assert!(matches!(err, Error::ActionUnavailable(_)));
}

#[tokio::test]
async fn test_stub_actions_announce_development() {
    let (_backend, _storage, mut chat, reply) = with_reply("answer").await;

    chat.dispatch(ChatCommand::Regenerate(reply)).await.unwrap();
    assert!(chat.view().last_toast().unwrap().text.contains("开发中"));
    chat.dispatch(ChatCommand::Export(reply)).await.unwrap();
    assert!(chat.view().last_toast().unwrap().text.contains("开发中"));
}

#[tokio::test]
async fn test_more_menu_dismissed_by_outside_click() {
    let (_backend, _storage, mut chat, reply) = with_reply("answer").await;
    let viewport = Rect::new(0.0, 0.0, 800.0, 600.0);
    let trigger = Rect::new(600.0, 100.0, 24.0, 24.0);

    chat.dispatch(ChatCommand::More {
        id: reply,
        trigger,
        viewport,
    })
    .await
    .unwrap();
    let menu = *chat.view().menu().unwrap();
    assert_eq!(menu.anchor, reply);

    let inside = Point {
        x: menu.bounds.x + 1.0,
        y: menu.bounds.y + 1.0,
    };
    chat.dispatch(ChatCommand::Click(inside)).await.unwrap();
    assert!(chat.view().menu().is_some());

    chat.dispatch(ChatCommand::Click(Point { x: 10.0, y: 10.0 }))
        .await
        .unwrap();
    assert!(chat.view().menu().is_none());
}

// ─────────────────────────────────────────────────────────────────────────────
// Account and export
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_short_export_is_rejected() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    let dir = tempfile::tempdir().unwrap();
    *backend.document.lock().unwrap() = "# 太短".into();

    let mut chat = controller(&backend, &storage, "kpi").with_export_dir(dir.path());
    chat.initialize().await;

    let err = chat.export_document().await.unwrap_err();
    assert!(matches!(err, Error::InsufficientContent { len: 4 }));
    assert_eq!(chat.view().last_toast().unwrap().kind, ToastKind::Warning);
    assert!(!dir.path().join("kpi-s1.md").exists());
}

#[tokio::test]
async fn test_export_writes_markdown_file() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    let dir = tempfile::tempdir().unwrap();
    let document = format!("# KPI 训练记录\n\n{}", "内容".repeat(30));
    *backend.document.lock().unwrap() = document.clone();

    let mut chat = controller(&backend, &storage, "kpi").with_export_dir(dir.path());
    chat.initialize().await;

    chat.dispatch(ChatCommand::ExportDocument).await.unwrap();
    let written = std::fs::read_to_string(dir.path().join("kpi-s1.md")).unwrap();
    assert_eq!(written, document);
}

#[tokio::test]
async fn test_export_without_session_fails() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    let mut chat = controller(&backend, &storage, "kpi");

    assert!(matches!(
        chat.export_document().await,
        Err(Error::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_redeem_updates_credits() {
    let backend = ScriptedBackend::new();
    let storage = MemoryStore::new();
    let mut chat = ready(&backend, &storage).await;

    assert!(matches!(
        chat.redeem("   ").await,
        Err(Error::InvalidInput(_))
    ));
    assert!(backend.redeemed.lock().unwrap().is_empty());

    let redeemed = chat.redeem(" CODE-1 ").await.unwrap();
    assert_eq!(redeemed.credits_added, 50);
    assert_eq!(*backend.redeemed.lock().unwrap(), vec!["CODE-1".to_string()]);
    assert_eq!(chat.view().credits(), Some(150));
}
