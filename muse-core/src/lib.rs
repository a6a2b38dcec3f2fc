//! Knowledge engine for an AI writing companion.
//!
//! This crate provides:
//! - A per-book story bible: entities, relationships, and a work backlog
//! - AI-powered extraction and session synthesis using Claude
//! - An unresolved-entity detector that seeds the backlog
//! - Priority scoring and next-item selection for the conversation loop
//! - Book snapshots for save/load
//!
//! # Quick Start
//!
//! ```ignore
//! use muse_core::{Book, Muse, MemoryBible, Session};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bible = Arc::new(MemoryBible::new());
//!     let muse = Muse::from_env(bible.clone())?;
//!
//!     let book = bible.create_book(Book::new("The Tide House")).await?;
//!     let session = bible
//!         .add_session(Session::new(book.id, "We talked about Maria, a midwife in Lisbon."))
//!         .await?;
//!
//!     muse.synthesize_session(book.id, session.id).await?;
//!     muse.seed_backlog(book.id, Some(session.id)).await?;
//!
//!     if let Some(item) = muse.next_item(book.id).await? {
//!         println!("next up: {}", item.content);
//!     }
//!     Ok(())
//! }
//! ```

pub mod book;
pub mod id;
pub mod muse;
pub mod persist;
pub mod testing;

// Primary public API
pub use book::{Book, Session, WorkspaceFile, WorkspaceFolder};
pub use id::{BacklogItemId, BookId, EntityId, FileId, RelationshipId, SessionId};
pub use muse::story_bible::{
    BacklogItem, BacklogKind, BacklogStatus, Entity, EntityKind, EntityPatch, MemoryBible,
    Relationship, StoreError, StoryBible,
};
pub use muse::{EntityNetwork, Muse, MuseConfig, MuseError};
pub use persist::{SavedBook, SnapshotError, SnapshotInfo, SnapshotMetadata};
pub use testing::{BibleHarness, MockMuse};
