//! Per-module session slot with a freshness window.

use std::sync::Arc;

use chrono::Utc;

use crate::error::Result;
use crate::storage::KeyValueStore;

/// Default freshness window for a stored session (7 days).
pub const DEFAULT_SESSION_TTL_DAYS: u32 = 7;

/// Milliseconds in one day.
pub const MS_PER_DAY: i64 = 86_400_000;

/// Current wall-clock time in epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Session id storage for one chat module.
///
/// The id and its save time live under `chat_session_{module}` and
/// `chat_session_time_{module}`. A slot whose age reaches the TTL is
/// treated as absent and removed as a side effect of [`restore`].
///
/// [`restore`]: SessionStore::restore
#[derive(Debug, Clone)]
pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
    module: String,
    ttl_days: u32,
}

impl SessionStore {
    /// Create a store for `module` with the default 7-day window.
    pub fn new(storage: Arc<dyn KeyValueStore>, module: impl Into<String>) -> Self {
        Self {
            storage,
            module: module.into(),
            ttl_days: DEFAULT_SESSION_TTL_DAYS,
        }
    }

    /// Override the freshness window.
    #[must_use]
    pub fn with_ttl_days(mut self, days: u32) -> Self {
        self.ttl_days = days;
        self
    }

    /// The module this store is keyed by.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Freshness window in days.
    #[must_use]
    pub fn ttl_days(&self) -> u32 {
        self.ttl_days
    }

    fn id_key(&self) -> String {
        format!("chat_session_{}", self.module)
    }

    fn time_key(&self) -> String {
        format!("chat_session_time_{}", self.module)
    }

    /// Persist `id` stamped with the current time.
    pub fn save(&self, id: &str) -> Result<()> {
        self.save_at(id, now_millis())
    }

    /// Persist `id` stamped with `now_ms`.
    pub fn save_at(&self, id: &str, now_ms: i64) -> Result<()> {
        self.storage.set(&self.id_key(), id)?;
        self.storage.set(&self.time_key(), &now_ms.to_string())?;
        Ok(())
    }

    /// Return the stored id if it is still fresh.
    pub fn restore(&self) -> Result<Option<String>> {
        self.restore_at(now_millis())
    }

    /// Return the stored id if it is still fresh at `now_ms`.
    ///
    /// Expired or unreadable slots are cleared before returning `None`.
    pub fn restore_at(&self, now_ms: i64) -> Result<Option<String>> {
        let Some(id) = self.storage.get(&self.id_key())?.filter(|s| !s.is_empty()) else {
            return Ok(None);
        };

        let saved = self
            .storage
            .get(&self.time_key())?
            .and_then(|t| t.trim().parse::<i64>().ok());

        let fresh = saved.is_some_and(|saved| {
            now_ms.saturating_sub(saved) < i64::from(self.ttl_days) * MS_PER_DAY
        });

        if fresh {
            Ok(Some(id))
        } else {
            tracing::info!(
                name: "session.local.expired",
                module = %self.module,
                session_id = %id,
                "Stored session expired, clearing"
            );
            self.clear()?;
            Ok(None)
        }
    }

    /// Remove both keys of this module's slot.
    pub fn clear(&self) -> Result<()> {
        self.storage.remove(&self.id_key())?;
        self.storage.remove(&self.time_key())?;
        Ok(())
    }
}
