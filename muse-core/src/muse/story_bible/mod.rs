//! The story bible: the per-book knowledge graph and follow-up backlog.
//!
//! Tracks entities (people, places, themes, events), directed relationships
//! between them, and a prioritized backlog of follow-up items, all owned by
//! a single book.

pub mod backlog;
pub mod entity;
pub mod relationship;
pub mod score;
pub mod store;

pub use backlog::{BacklogItem, BacklogKind, BacklogStatus, MAX_PRIORITY, MIN_PRIORITY};
pub use entity::{normalize_name, Entity, EntityKind};
pub use relationship::Relationship;
pub use score::{age_bonus, effective_score, finish_bonus, score_breakdown, ScoreBreakdown, ScoreContext};
pub use store::{increment_mention_count, EntityPatch, MemoryBible, StoreError, StoryBible};
