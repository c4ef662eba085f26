//! Clipboard sinks.

use std::io::Write;
use std::sync::{Arc, Mutex};

use base64::Engine;

use crate::error::Result;

/// Somewhere copied text goes.
pub trait Clipboard: Send + Sync + std::fmt::Debug {
    /// Replace the clipboard contents with `text`.
    fn write_text(&self, text: &str) -> Result<()>;
}

/// Clipboard held in memory; clones share contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    contents: Arc<Mutex<Option<String>>>,
}

impl MemoryClipboard {
    /// Create an empty clipboard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last copied text.
    #[must_use]
    pub fn contents(&self) -> Option<String> {
        self.contents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl Clipboard for MemoryClipboard {
    fn write_text(&self, text: &str) -> Result<()> {
        *self
            .contents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(text.to_string());
        Ok(())
    }
}

/// Terminal clipboard using the OSC 52 escape sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct Osc52Clipboard;

/// Encode `text` as an OSC 52 "set clipboard" sequence.
#[must_use]
pub fn osc52_sequence(text: &str) -> String {
    let payload = base64::engine::general_purpose::STANDARD.encode(text);
    format!("\x1b]52;c;{payload}\x07")
}

impl Clipboard for Osc52Clipboard {
    fn write_text(&self, text: &str) -> Result<()> {
        let mut out = std::io::stdout().lock();
        out.write_all(osc52_sequence(text).as_bytes())?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_clipboard() {
        let clip = MemoryClipboard::new();
        assert!(clip.contents().is_none());
        clip.write_text("复制").unwrap();
        assert_eq!(clip.contents().as_deref(), Some("复制"));
    }

    #[test]
    fn test_osc52_sequence() {
        assert_eq!(osc52_sequence("hi"), "\x1b]52;c;aGk=\x07");
    }
}
