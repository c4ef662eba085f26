//! Coach Chat
//!
//! Streaming chat client for the e-commerce training coach. Sessions are
//! resumed from local storage for up to a week, replies stream in over
//! server-sent events, and unsent text survives expired sessions, failed
//! sends and login interruptions.
//!
//! # Architecture
//!
//! - **Backend seam**: [`api::ChatBackend`] with a reqwest implementation
//! - **Streaming**: line-buffered SSE decoder producing typed events
//! - **Persistence**: `localStorage`-style key/value store for session slots
//!   and the pending draft
//! - **UI**: an inspectable view model that emits change events to a renderer
//!
//! # Modules
//!
//! - [`api`]: backend trait, wire types and the HTTP client
//! - [`chat`]: session lifecycle, send path and recovery
//! - [`config`]: CLI flags and layered configuration
//! - [`session`]: per-module session slot and pending draft
//! - [`storage`]: key/value stores
//! - [`stream`]: stream events and the SSE decoder
//! - [`ui`]: messages, view model, actions, Markdown and clipboard

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::assigning_clones)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::default_trait_access)]
#![allow(clippy::unused_async)]

pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod session;
pub mod storage;
pub mod stream;
pub mod ui;

pub use error::{Error, Result};
