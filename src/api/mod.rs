//! Backend API seam.
//!
//! The controller only talks to the backend through [`ChatBackend`], so the
//! session/streaming logic can be exercised against a scripted backend in
//! tests and against [`HttpBackend`] in the real client.
//!
//! # Endpoints
//!
//! - `POST /api/session/new`, `POST /api/session/{id}/resume`
//! - `POST /api/chat/stream` (line-oriented event stream)
//! - `POST /api/export/{id}`
//! - `GET /api/sessions`, `GET /api/models`, `GET /api/modules`
//! - `GET /api/credits`, `POST /api/redeem`
//! - `POST /api/auth/login`, `POST /api/auth/logout`

pub mod http;
pub mod types;

pub use http::HttpBackend;
pub use types::*;

use std::pin::Pin;

use futures::Stream;

use crate::error::Result;
use crate::stream::StreamEvent;

/// Lazy sequence of events for one streamed reply.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Operations the chat client needs from the backend.
///
/// Failures come back as [`crate::Error`] variants; the streaming call maps
/// its HTTP status to the recovery classes (`SessionExpired`,
/// `LoginRequired`, `CreditsExhausted`) before any event is read.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Create a session bound to `module`.
    async fn create_session(&self, module: &str) -> Result<NewSession>;

    /// Resume an existing session and fetch its history.
    async fn resume_session(&self, session_id: &str) -> Result<ResumedSession>;

    /// Send a message and open the reply stream.
    async fn stream_chat(&self, request: ChatStreamRequest) -> Result<EventStream>;

    /// Render the session as a Markdown document.
    async fn export_document(&self, session_id: &str) -> Result<String>;

    /// The current user's recent sessions.
    async fn list_sessions(&self) -> Result<Vec<SessionSummary>>;

    /// Selectable models, ordered by identifier.
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;

    /// Available chat modules.
    async fn list_modules(&self) -> Result<Vec<ModuleInfo>>;

    /// Current credit balance.
    async fn credits(&self) -> Result<i64>;

    /// Redeem a credit code.
    async fn redeem(&self, code: &str) -> Result<Redeemed>;

    /// Log in; the session cookie is kept for later calls.
    async fn login(&self, username: &str, password: &str) -> Result<UserInfo>;

    /// Log out.
    async fn logout(&self) -> Result<()>;
}
