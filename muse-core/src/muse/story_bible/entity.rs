//! Entity types for the story bible.

use crate::id::{BookId, EntityId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kinds of entities tracked in the story bible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A character or real person in the book's material.
    Person,
    /// A geographic location or setting.
    Place,
    /// A recurring theme or motif.
    Theme,
    /// A significant event.
    Event,
}

impl EntityKind {
    /// Parse a kind from extraction output. Returns `None` for unknown kinds,
    /// which callers skip rather than reject.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "person" => Some(EntityKind::Person),
            "place" => Some(EntityKind::Place),
            "theme" => Some(EntityKind::Theme),
            "event" => Some(EntityKind::Event),
            _ => None,
        }
    }

    /// Get the display name for this entity kind.
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Person => "person",
            EntityKind::Place => "place",
            EntityKind::Theme => "theme",
            EntityKind::Event => "event",
        }
    }
}

/// Normalize an entity name for deduplication: trim, collapse internal
/// whitespace, lowercase. Two mentions that normalize to the same key
/// resolve to the same entity.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// An entity tracked in the story bible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier.
    pub id: EntityId,
    /// The book this entity belongs to.
    pub book_id: BookId,
    /// What kind of entity this is.
    pub kind: EntityKind,
    /// Canonical display name (original casing preserved).
    pub name: String,
    /// Free-text description. Empty means the entity is undescribed.
    pub description: String,
    /// Arbitrary key-value attributes accumulated from extraction.
    pub attributes: Map<String, Value>,
    /// Approximate count of mentions across sessions (at least 1).
    pub mention_count: u32,
    /// The session in which this entity was first recorded, if known.
    pub first_session: Option<SessionId>,
    /// When this entity was created.
    pub created_at: DateTime<Utc>,
    /// When this entity was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    /// Create a new entity with a single mention.
    pub fn new(book_id: BookId, kind: EntityKind, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(),
            book_id,
            kind,
            name: name.into(),
            description: String::new(),
            attributes: Map::new(),
            mention_count: 1,
            first_session: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the attribute bag.
    pub fn with_attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Record the session this entity was first seen in.
    pub fn with_first_session(mut self, session: SessionId) -> Self {
        self.first_session = Some(session);
        self
    }

    /// Check whether the entity has a non-blank description.
    pub fn has_description(&self) -> bool {
        !self.description.trim().is_empty()
    }

    /// The normalized dedup key for this entity's name.
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }

    /// Check if a name matches this entity (case/whitespace-insensitive).
    pub fn matches_name(&self, query: &str) -> bool {
        self.normalized_name() == normalize_name(query)
    }
}
