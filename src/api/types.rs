//! Wire types for the chat backend.
//!
//! Every JSON endpoint wraps its payload in `{success, error?, ...}`; the
//! payload structs below describe the fields next to that envelope.

use serde::{Deserialize, Serialize};

// =============================================================================
// Envelope
// =============================================================================

/// Common response envelope: `success` + `error` + endpoint fields.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    /// Whether the call succeeded.
    #[serde(default)]
    pub success: bool,
    /// Server-supplied failure reason.
    #[serde(default)]
    pub error: Option<String>,
    /// Endpoint-specific fields.
    #[serde(flatten)]
    pub data: T,
}

/// Body of a non-2xx response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    /// Server-supplied failure reason.
    #[serde(default)]
    pub error: Option<String>,
    /// Set when the user has to log in first.
    #[serde(default)]
    pub need_login: bool,
    /// Set when the account cannot pay for another reply.
    #[serde(default)]
    pub credits_exhausted: bool,
}

// =============================================================================
// Session API Types
// =============================================================================

/// `POST /api/session/new` request.
#[derive(Debug, Clone, Serialize)]
pub struct NewSessionRequest {
    /// Module the session is bound to.
    pub module: String,
}

/// A freshly created session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewSession {
    /// Backend session id.
    pub session_id: String,
    /// Greeting to show as the first assistant message.
    #[serde(default)]
    pub welcome_message: String,
}

/// A message replayed from the backend history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    /// `user`, `assistant`, `system`, ...
    pub role: String,
    /// Message text (Markdown for assistant messages).
    pub content: String,
}

/// A resumed session with its history.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResumedSession {
    /// Session id the backend wants the client to use from now on.
    pub session_id: String,
    /// Module the session belongs to.
    #[serde(default)]
    pub module: Option<String>,
    /// Conversation so far, oldest first.
    #[serde(default)]
    pub messages: Vec<HistoryMessage>,
}

/// One row of the user's conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session id.
    pub id: String,
    /// Module the session belongs to.
    #[serde(default)]
    pub module: Option<String>,
    /// Session status (`active`, `completed`, ...).
    #[serde(default)]
    pub status: Option<String>,
    /// Creation timestamp as sent by the server.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Last update timestamp as sent by the server.
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Start of the first user message.
    #[serde(default)]
    pub preview: Option<String>,
}

/// `GET /api/sessions` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionList {
    /// Most recent first.
    #[serde(default)]
    pub sessions: Vec<SessionSummary>,
}

// =============================================================================
// Chat API Types
// =============================================================================

/// `POST /api/chat/stream` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatStreamRequest {
    /// Session the message belongs to.
    pub session_id: String,
    /// The user's message.
    pub message: String,
    /// Model identifier (`flash`, `pro`, ...).
    pub model: String,
}

/// `POST /api/export/{id}` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportPayload {
    /// Markdown document.
    #[serde(default)]
    pub document: Option<String>,
}

// =============================================================================
// Catalogue Types
// =============================================================================

/// A selectable model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Short identifier sent with chat requests.
    pub id: String,
    /// Display name.
    pub name: String,
    /// One-line description.
    #[serde(default)]
    pub description: Option<String>,
}

/// `GET /api/models` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelCatalog {
    /// Models keyed by identifier.
    #[serde(default)]
    pub models: std::collections::BTreeMap<String, ModelInfo>,
}

/// A chat module (course topic).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Module identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Emoji icon.
    #[serde(default)]
    pub icon: Option<String>,
    /// Accent colour.
    #[serde(default)]
    pub color: Option<String>,
    /// One-line description.
    #[serde(default)]
    pub description: Option<String>,
}

/// `GET /api/modules` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleCatalog {
    /// Available modules.
    #[serde(default)]
    pub modules: Vec<ModuleInfo>,
}

// =============================================================================
// Account Types
// =============================================================================

/// `GET /api/credits` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreditBalance {
    /// Current balance.
    #[serde(default)]
    pub credits: i64,
}

/// `POST /api/redeem` request.
#[derive(Debug, Clone, Serialize)]
pub struct RedeemRequest {
    /// Redeem code as typed by the user.
    pub code: String,
}

/// Result of redeeming a code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Redeemed {
    /// Confirmation text.
    #[serde(default)]
    pub message: Option<String>,
    /// Credits granted by the code.
    #[serde(default)]
    pub credits_added: i64,
    /// Balance after redemption.
    #[serde(default)]
    pub new_balance: Option<i64>,
}

/// `POST /api/auth/login` request.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    /// Account name.
    pub username: String,
    /// Password.
    pub password: String,
}

/// The logged-in user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserInfo {
    /// Backend user id.
    #[serde(default)]
    pub user_id: String,
    /// Display name.
    #[serde(default)]
    pub username: Option<String>,
}

/// `POST /api/auth/login` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginPayload {
    /// User details.
    #[serde(default)]
    pub data: Option<UserInfo>,
}
