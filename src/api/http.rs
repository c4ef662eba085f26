//! HTTP implementation of [`ChatBackend`].

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{Error, Result};
use crate::stream::{MalformedLineHook, SseDecoder, decode_stream};

use super::{
    ApiErrorBody, ChatBackend, ChatStreamRequest, CreditBalance, Envelope, EventStream,
    ExportPayload, LoginPayload, LoginRequest, ModelCatalog, ModelInfo, ModuleCatalog, ModuleInfo,
    NewSession, NewSessionRequest, RedeemRequest, Redeemed, ResumedSession, SessionList,
    SessionSummary, UserInfo,
};

/// HTTP client for the chat backend.
///
/// Cookies are kept between calls, so a successful [`login`] authorises the
/// following session and streaming requests.
///
/// # Example
///
/// ```rust,no_run
/// use coach_chat::api::{ChatBackend, HttpBackend};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = HttpBackend::new("http://127.0.0.1:5009")?;
/// let session = backend.create_session("kpi").await?;
/// println!("{}", session.welcome_message);
/// # Ok(())
/// # }
/// ```
///
/// [`login`]: ChatBackend::login
#[derive(Clone)]
pub struct HttpBackend {
    base_url: Url,
    http: reqwest::Client,
    stream_timeout: Option<Duration>,
    on_malformed: Option<MalformedLineHook>,
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.base_url.as_str())
            .field("stream_timeout", &self.stream_timeout)
            .finish()
    }
}

impl HttpBackend {
    /// Create a backend client for `base_url` (e.g. `http://127.0.0.1:5009`).
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        Self::with_client(base_url, http)
    }

    /// Create a backend client with a custom reqwest client.
    pub fn with_client(base_url: impl AsRef<str>, http: reqwest::Client) -> Result<Self> {
        let base_url = Url::parse(base_url.as_ref())?;
        Ok(Self {
            base_url,
            http,
            stream_timeout: None,
            on_malformed: None,
        })
    }

    /// Bound the whole streaming request (headers and body) by `timeout`.
    /// `None` leaves cancellation to the transport.
    #[must_use]
    pub fn with_stream_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stream_timeout = timeout;
        self
    }

    /// Observe stream lines that fail to decode.
    #[must_use]
    pub fn with_malformed_hook(mut self, hook: MalformedLineHook) -> Self {
        self.on_malformed = Some(hook);
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Url {
        self.base_url
            .join(path)
            .unwrap_or_else(|_| self.base_url.clone())
    }

    fn decoder(&self) -> SseDecoder {
        match &self.on_malformed {
            Some(hook) => SseDecoder::new().with_hook(std::sync::Arc::clone(hook)),
            None => SseDecoder::new(),
        }
    }

    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            return Err(Self::error_from(response).await);
        }

        let envelope: Envelope<serde_json::Value> = response.json().await?;
        if envelope.success {
            Ok(serde_json::from_value(envelope.data)?)
        } else {
            Err(Error::Api {
                status: status.as_u16(),
                message: envelope.error.unwrap_or_else(|| "Unknown error".into()),
            })
        }
    }

    /// Map a non-2xx response to the matching error class.
    async fn error_from(response: reqwest::Response) -> Error {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let (body, message) = match serde_json::from_str::<ApiErrorBody>(&text) {
            Ok(mut body) => {
                let message = body.error.take().unwrap_or_default();
                (body, message)
            }
            Err(_) => (ApiErrorBody::default(), text.trim().to_string()),
        };

        if status == StatusCode::NOT_FOUND {
            Error::SessionExpired
        } else if body.need_login || status == StatusCode::UNAUTHORIZED {
            // Blank message falls back to the default login prompt.
            Error::LoginRequired { message }
        } else if body.credits_exhausted || status == StatusCode::PAYMENT_REQUIRED {
            Error::CreditsExhausted { message }
        } else {
            Error::Api {
                status: status.as_u16(),
                message: if message.is_empty() {
                    "Unknown error".into()
                } else {
                    message
                },
            }
        }
    }
}

#[async_trait::async_trait]
impl ChatBackend for HttpBackend {
    async fn create_session(&self, module: &str) -> Result<NewSession> {
        let req = NewSessionRequest {
            module: module.to_string(),
        };
        let response = self
            .http
            .post(self.url("/api/session/new"))
            .json(&req)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn resume_session(&self, session_id: &str) -> Result<ResumedSession> {
        let response = self
            .http
            .post(self.url(&format!("/api/session/{session_id}/resume")))
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn stream_chat(&self, request: ChatStreamRequest) -> Result<EventStream> {
        let mut rb = self.http.post(self.url("/api/chat/stream")).json(&request);
        if let Some(timeout) = self.stream_timeout {
            rb = rb.timeout(timeout);
        }

        let response = rb.send().await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        tracing::debug!(
            name: "stream.opened",
            session_id = %request.session_id,
            model = %request.model,
            "Chat stream opened"
        );

        Ok(Box::pin(decode_stream(
            response.bytes_stream(),
            self.decoder(),
        )))
    }

    async fn export_document(&self, session_id: &str) -> Result<String> {
        let response = self
            .http
            .post(self.url(&format!("/api/export/{session_id}")))
            .send()
            .await?;
        let payload: ExportPayload = Self::handle_response(response).await?;
        Ok(payload.document.unwrap_or_default())
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let response = self.http.get(self.url("/api/sessions")).send().await?;
        let list: SessionList = Self::handle_response(response).await?;
        Ok(list.sessions)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response = self.http.get(self.url("/api/models")).send().await?;
        let catalog: ModelCatalog = Self::handle_response(response).await?;
        Ok(catalog.models.into_values().collect())
    }

    async fn list_modules(&self) -> Result<Vec<ModuleInfo>> {
        let response = self.http.get(self.url("/api/modules")).send().await?;
        let catalog: ModuleCatalog = Self::handle_response(response).await?;
        Ok(catalog.modules)
    }

    async fn credits(&self) -> Result<i64> {
        let response = self.http.get(self.url("/api/credits")).send().await?;
        let balance: CreditBalance = Self::handle_response(response).await?;
        Ok(balance.credits)
    }

    async fn redeem(&self, code: &str) -> Result<Redeemed> {
        let req = RedeemRequest {
            code: code.to_string(),
        };
        let response = self
            .http
            .post(self.url("/api/redeem"))
            .json(&req)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn login(&self, username: &str, password: &str) -> Result<UserInfo> {
        let req = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response = self
            .http
            .post(self.url("/api/auth/login"))
            .json(&req)
            .send()
            .await?;
        let payload: LoginPayload = Self::handle_response(response).await?;
        Ok(payload.data.unwrap_or_default())
    }

    async fn logout(&self) -> Result<()> {
        let response = self.http.post(self.url("/api/auth/logout")).send().await?;
        let _: serde_json::Value = Self::handle_response(response).await?;
        Ok(())
    }
}
