//! Relationships between entities.

use crate::id::{BookId, EntityId, RelationshipId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A directed, typed edge between two entities of the same book.
///
/// Edges are never required to be symmetric, and duplicates with the same
/// endpoints and label may coexist. Queries for "edges touching entity X"
/// must check both directions via [`Relationship::involves`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    /// Unique identifier.
    pub id: RelationshipId,
    /// The book both endpoints belong to.
    pub book_id: BookId,
    /// The source entity.
    pub from_entity: EntityId,
    /// The target entity.
    pub to_entity: EntityId,
    /// Free-text relationship label (e.g. "mother of", "haunts").
    pub relation: String,
    /// Optional description or context.
    pub description: String,
    /// When this relationship was recorded.
    pub created_at: DateTime<Utc>,
}

impl Relationship {
    /// Create a new relationship.
    pub fn new(
        book_id: BookId,
        from_entity: EntityId,
        to_entity: EntityId,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            id: RelationshipId::new(),
            book_id,
            from_entity,
            to_entity,
            relation: relation.into(),
            description: String::new(),
            created_at: Utc::now(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Check if this relationship involves a specific entity as either endpoint.
    pub fn involves(&self, entity_id: EntityId) -> bool {
        self.from_entity == entity_id || self.to_entity == entity_id
    }

    /// Get the other entity in the relationship.
    pub fn other(&self, entity_id: EntityId) -> Option<EntityId> {
        if self.from_entity == entity_id {
            Some(self.to_entity)
        } else if self.to_entity == entity_id {
            Some(self.from_entity)
        } else {
            None
        }
    }
}
