//! Chat controller.
//!
//! [`ChatController`] ties the pieces together: it resumes or creates the
//! module's session, streams replies into the [`ChatView`](crate::ui::ChatView),
//! and recovers from failures without losing what the user typed.
//!
//! # Send lifecycle
//!
//! 1. Blank text is ignored; a missing session triggers initialization.
//! 2. The user message and a streaming placeholder are appended, the send
//!    control is disabled.
//! 3. Content deltas accumulate into the placeholder; `done` updates credits
//!    and refreshes the history list.
//! 4. The placeholder is finalized as Markdown with actions and quick replies.
//! 5. On failure both messages are removed and [`recovery::classify`] picks
//!    the recovery path.

mod controller;
pub mod recovery;

pub use controller::{ChatController, InitOutcome, MIN_EXPORT_CHARS, SendOutcome};
pub use recovery::Recovery;
