//! Backlog items: follow-up work for future conversation.
//!
//! Backlog items record what the companion should ask about next. They are
//! created by session synthesis or by the unresolved detector, and only their
//! status ever changes after creation. Content, priority, and kind are fixed.

use crate::id::{BacklogItemId, BookId, EntityId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lowest allowed base priority.
pub const MIN_PRIORITY: i32 = 1;

/// Highest allowed base priority.
pub const MAX_PRIORITY: i32 = 5;

/// Kinds of backlog items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BacklogKind {
    /// An open question to resolve.
    Question,
    /// A factual inconsistency between recorded material.
    Contradiction,
    /// A part of the story that exists but lacks depth.
    ThinSpot,
    /// A thread that has never been pursued.
    Unexplored,
    /// Existing material worth revisiting.
    Review,
    /// A speculative idea.
    Idea,
}

impl BacklogKind {
    /// Parse a kind from synthesis output. Returns `None` for unknown kinds,
    /// which callers drop rather than reject.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "question" => Some(BacklogKind::Question),
            "contradiction" => Some(BacklogKind::Contradiction),
            "thin_spot" => Some(BacklogKind::ThinSpot),
            "unexplored" => Some(BacklogKind::Unexplored),
            "review" => Some(BacklogKind::Review),
            "idea" => Some(BacklogKind::Idea),
            _ => None,
        }
    }

    /// Get the wire name for this kind.
    pub fn name(&self) -> &'static str {
        match self {
            BacklogKind::Question => "question",
            BacklogKind::Contradiction => "contradiction",
            BacklogKind::ThinSpot => "thin_spot",
            BacklogKind::Unexplored => "unexplored",
            BacklogKind::Review => "review",
            BacklogKind::Idea => "idea",
        }
    }

    /// Fixed scoring weight for this kind.
    ///
    /// Contradictions compound if left unresolved, so they rank highest.
    /// Questions are neutral. Ideas and unexplored threads are optional
    /// rather than blocking, so they rank below neutral.
    pub fn weight(&self) -> i32 {
        match self {
            BacklogKind::Contradiction => 2,
            BacklogKind::ThinSpot => 1,
            BacklogKind::Question => 0,
            BacklogKind::Review => 0,
            BacklogKind::Idea => -1,
            BacklogKind::Unexplored => -1,
        }
    }
}

/// The status of a backlog item.
///
/// Transitions are one-way terminal: open items move to addressed or
/// dismissed and never return to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BacklogStatus {
    /// Waiting to be surfaced in conversation.
    Open,
    /// Taken up in conversation.
    Addressed,
    /// Deliberately set aside.
    Dismissed,
}

impl BacklogStatus {
    /// Check if this item is still open.
    pub fn is_open(&self) -> bool {
        matches!(self, BacklogStatus::Open)
    }

    /// Check if this item has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        !self.is_open()
    }
}

/// A follow-up unit of work for future conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacklogItem {
    /// Unique identifier.
    pub id: BacklogItemId,
    /// The book this item belongs to.
    pub book_id: BookId,
    /// What kind of follow-up this is.
    pub kind: BacklogKind,
    /// Free-text content describing the follow-up.
    pub content: String,
    /// Base priority in [1, 5]. Immutable after creation.
    pub priority: i32,
    /// The session whose synthesis produced this item, if any.
    pub source_session: Option<SessionId>,
    /// The entity this item is about, if any. Feeds the finish bonus.
    pub source_entity: Option<EntityId>,
    /// Current status.
    pub status: BacklogStatus,
    /// When this item was created.
    pub created_at: DateTime<Utc>,
    /// When this item reached a terminal state.
    pub addressed_at: Option<DateTime<Utc>>,
}

impl BacklogItem {
    /// Create a new open backlog item with the default (floor) priority.
    pub fn new(book_id: BookId, kind: BacklogKind, content: impl Into<String>) -> Self {
        Self {
            id: BacklogItemId::new(),
            book_id,
            kind,
            content: content.into(),
            priority: MIN_PRIORITY,
            source_session: None,
            source_entity: None,
            status: BacklogStatus::Open,
            created_at: Utc::now(),
            addressed_at: None,
        }
    }

    /// Set the base priority, clamped to [1, 5].
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority.clamp(MIN_PRIORITY, MAX_PRIORITY);
        self
    }

    /// Record the session that produced this item.
    pub fn with_source_session(mut self, session: SessionId) -> Self {
        self.source_session = Some(session);
        self
    }

    /// Record the entity this item is about.
    pub fn with_source_entity(mut self, entity: EntityId) -> Self {
        self.source_entity = Some(entity);
        self
    }

    /// Mark this item as addressed. No-op if already terminal: the original
    /// terminal state and timestamp are kept.
    pub fn address(&mut self) {
        if self.status.is_open() {
            self.status = BacklogStatus::Addressed;
            self.addressed_at = Some(Utc::now());
        }
    }

    /// Mark this item as dismissed. No-op if already terminal.
    pub fn dismiss(&mut self) {
        if self.status.is_open() {
            self.status = BacklogStatus::Dismissed;
            self.addressed_at = Some(Utc::now());
        }
    }
}
