//! Pending-draft slot.

use std::sync::Arc;

use crate::error::Result;
use crate::storage::KeyValueStore;

const MESSAGE_KEY: &str = "pending_message";
const MODULE_KEY: &str = "pending_module";

/// Unsent text waiting for the next initialization of its module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDraft {
    /// Module that owns the draft.
    pub module: String,
    /// The unsent text.
    pub text: String,
}

/// Single, module-tagged slot for text cached across a login interruption.
#[derive(Debug, Clone)]
pub struct PendingDraftStore {
    storage: Arc<dyn KeyValueStore>,
}

impl PendingDraftStore {
    /// Create a draft store over `storage`.
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Cache `text` for `module`, replacing any previous draft.
    ///
    /// Returns `false` (and stores nothing) when `text` is blank.
    pub fn save(&self, module: &str, text: &str) -> Result<bool> {
        if text.trim().is_empty() {
            return Ok(false);
        }
        self.storage.set(MESSAGE_KEY, text)?;
        self.storage.set(MODULE_KEY, module)?;
        Ok(true)
    }

    /// The current draft, if any, without consuming it.
    pub fn peek(&self) -> Result<Option<PendingDraft>> {
        let text = self.storage.get(MESSAGE_KEY)?;
        let module = self.storage.get(MODULE_KEY)?;
        Ok(match (text, module) {
            (Some(text), Some(module)) => Some(PendingDraft { module, text }),
            _ => None,
        })
    }

    /// Consume the draft if it belongs to `module`.
    ///
    /// A draft owned by another module stays where it is.
    pub fn take_for(&self, module: &str) -> Result<Option<String>> {
        match self.peek()? {
            Some(draft) if draft.module == module => {
                self.clear()?;
                Ok(Some(draft.text))
            }
            _ => Ok(None),
        }
    }

    /// Drop the draft.
    pub fn clear(&self) -> Result<()> {
        self.storage.remove(MESSAGE_KEY)?;
        self.storage.remove(MODULE_KEY)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn drafts() -> PendingDraftStore {
        PendingDraftStore::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_draft_is_consumed_once() {
        let drafts = drafts();
        assert!(drafts.save("kpi", "帮我设计KPI").unwrap());

        assert_eq!(drafts.take_for("kpi").unwrap().as_deref(), Some("帮我设计KPI"));
        assert!(drafts.take_for("kpi").unwrap().is_none());
    }

    #[test]
    fn test_draft_for_other_module_is_not_restored() {
        let drafts = drafts();
        drafts.save("A", "text for A").unwrap();

        assert!(drafts.take_for("B").unwrap().is_none());
        // Still there for its owner.
        assert_eq!(drafts.take_for("A").unwrap().as_deref(), Some("text for A"));
    }

    #[test]
    fn test_blank_draft_is_ignored() {
        let drafts = drafts();
        assert!(!drafts.save("kpi", "   ").unwrap());
        assert!(drafts.peek().unwrap().is_none());
    }

    #[test]
    fn test_newer_draft_replaces_older() {
        let drafts = drafts();
        drafts.save("A", "first").unwrap();
        drafts.save("B", "second").unwrap();
        assert_eq!(
            drafts.peek().unwrap(),
            Some(PendingDraft {
                module: "B".into(),
                text: "second".into()
            })
        );
    }
}
