//! Message actions, quick replies and the more-actions menu.

use super::message_list::MessageId;

/// Canned follow-ups offered after an assistant message, in display order.
pub const QUICK_REPLIES: [&str; 4] = [
    "请继续",
    "能举个具体的例子吗？",
    "帮我总结一下要点",
    "下一步我该怎么做？",
];

/// Everything the user can trigger from the chat surface.
///
/// All UI handlers funnel through [`ChatController::dispatch`] with one of
/// these instead of wiring a closure per button.
///
/// [`ChatController::dispatch`]: crate::chat::ChatController::dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Toggle the like state of an assistant message.
    Like(MessageId),
    /// Toggle the dislike state of an assistant message.
    Dislike(MessageId),
    /// Copy the raw text of a message to the clipboard.
    Copy(MessageId),
    /// Ask for a new answer (not available yet).
    Regenerate(MessageId),
    /// Per-message export (not available yet).
    Export(MessageId),
    /// Open the more-actions menu next to its trigger.
    More {
        /// Message the menu belongs to.
        id: MessageId,
        /// Bounds of the trigger button.
        trigger: Rect,
        /// Visible area the menu must stay inside.
        viewport: Rect,
    },
    /// A click anywhere on the surface; closes the menu when outside it.
    Click(Point),
    /// Copy the `index`-th table of a message as tab-separated text.
    CopyTable {
        /// Message holding the table.
        id: MessageId,
        /// Zero-based table index.
        index: usize,
    },
    /// Send one of the quick-reply phrases.
    QuickReply(String),
    /// Drop the current session and start a new one.
    NewSession,
    /// Export the whole conversation as a Markdown document.
    ExportDocument,
}

/// A point in surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Horizontal offset.
    pub x: f32,
    /// Vertical offset.
    pub y: f32,
}

/// An axis-aligned rectangle in surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

impl Rect {
    /// Build a rectangle from its top-left corner and size.
    #[must_use]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge.
    #[must_use]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Bottom edge.
    #[must_use]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Whether `p` lies inside (edges included).
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }
}

/// Menu size used for placement.
pub const MENU_WIDTH: f32 = 160.0;
/// Menu size used for placement.
pub const MENU_HEIGHT: f32 = 96.0;
const MENU_GAP: f32 = 4.0;

/// The open more-actions menu.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoreMenu {
    /// Message the menu acts on.
    pub anchor: MessageId,
    /// Trigger bounds at the time the menu opened.
    pub trigger: Rect,
    /// Where the menu is drawn.
    pub bounds: Rect,
}

impl MoreMenu {
    /// Place the menu under its trigger, right-aligned with it.
    ///
    /// Flips above the trigger when there is no room below and is clamped
    /// horizontally to the viewport.
    #[must_use]
    pub fn open(anchor: MessageId, trigger: Rect, viewport: Rect) -> Self {
        let max_x = (viewport.right() - MENU_WIDTH).max(viewport.x);
        let x = (trigger.right() - MENU_WIDTH).clamp(viewport.x, max_x);

        let below = trigger.bottom() + MENU_GAP;
        let y = if below + MENU_HEIGHT > viewport.bottom() {
            (trigger.y - MENU_GAP - MENU_HEIGHT).max(viewport.y)
        } else {
            below
        };

        Self {
            anchor,
            trigger,
            bounds: Rect::new(x, y, MENU_WIDTH, MENU_HEIGHT),
        }
    }

    /// Whether a click at `p` should close the menu.
    #[must_use]
    pub fn dismisses(&self, p: Point) -> bool {
        !self.bounds.contains(p) && !self.trigger.contains(p)
    }
}

/// Like/dislike state of one assistant message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reaction {
    /// "Like" is active.
    pub liked: bool,
    /// "Dislike" is active.
    pub disliked: bool,
}
