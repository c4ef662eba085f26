//! Client-side session persistence.
//!
//! Each chat module owns one session slot in local storage. A slot holds the
//! backend session id and the time it was last saved; slots older than the
//! freshness window are discarded on restore. Next to the slots sits a single
//! pending-draft slot that carries unsent text across a login interruption.
//!
//! # Architecture
//!
//! - [`SessionStore`]: per-module session id + timestamp with expiry
//! - [`PendingDraftStore`]: the module-tagged draft slot
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use coach_chat::session::SessionStore;
//! use coach_chat::storage::MemoryStore;
//!
//! let store = SessionStore::new(Arc::new(MemoryStore::new()), "kpi");
//! store.save("abc123").unwrap();
//! assert_eq!(store.restore().unwrap().as_deref(), Some("abc123"));
//!
//! store.clear().unwrap();
//! assert!(store.restore().unwrap().is_none());
//! ```

mod draft;
mod store;

pub use draft::{PendingDraft, PendingDraftStore};
pub use store::{DEFAULT_SESSION_TTL_DAYS, MS_PER_DAY, SessionStore, now_millis};
