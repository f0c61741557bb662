//! Concord Sync - optimistic cache synchronization for guided sessions.
//!
//! This crate keeps a local, speculative view of session state consistent
//! with a server that two independent parties mutate concurrently, and
//! drives the merged, classified message timeline the presentation layer
//! renders.
//!
//! # Overview
//!
//! ## Optimistic mutations
//!
//! [`coordinator::apply_mutation`] implements the cache-first write
//! protocol: claim the touched entries, snapshot them, apply a speculative
//! value synchronously, dispatch to the server, then either reconcile the
//! authoritative response or restore every snapshotted entry verbatim.
//! Consumers reading the cache see the change before any server
//! acknowledgment; a failure reverts them to the exact pre-mutation state.
//!
//! ## The facade
//!
//! [`SessionSync`] composes the cache, the timeline merge, the reveal
//! classifier and the scroll anchor controller into the single read/write
//! surface presentation code consumes. All per-session trackers live in the
//! facade's session views: created on [`SessionSync::open_session`], dropped
//! on [`SessionSync::close_session`], so nothing leaks across sessions.
//!
//! # Example
//!
//! ```rust,ignore
//! use concord_sync::{MutationIntent, SessionSync};
//!
//! let mut sync = SessionSync::new(source);
//! sync.open_session(session_id.clone());
//!
//! // First page: everything is history, nothing animates.
//! let view = sync.refresh_timeline(&session_id).await?;
//!
//! // Optimistic send: the queued message is visible immediately.
//! sync.apply(MutationIntent::SendMessage {
//!     session: session_id.clone(),
//!     id: local_id,
//!     content: "I hear you".into(),
//! })
//! .await?;
//! ```

pub mod cache;
pub mod coordinator;
mod error;
mod facade;
mod intent;
mod models;
pub mod source;

pub use cache::{CacheEntry, CacheKey, CacheSnapshot, CacheStore, CacheValue};
pub use error::{Error, Result};
pub use facade::{ClassifiedItem, SessionSync, SyncConfig, TimelineView};
pub use intent::MutationIntent;
pub use models::{Invitation, Party, PartyId, Session, SessionId};
pub use source::{DataSource, Endpoint, MutationResponse, SourceError};
