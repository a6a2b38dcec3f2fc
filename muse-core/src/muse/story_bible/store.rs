//! The story bible store: persistence contract and in-memory reference.
//!
//! [`StoryBible`] is the engine's only contract with persistence: CRUD by id
//! plus equality filtering and two O(1) aggregates (`session_count`,
//! `has_drafts`). Every method is a suspension point; the engine performs no
//! I/O of its own beyond these calls, and no operation spans more than one
//! store call transactionally.
//!
//! [`MemoryBible`] is the reference implementation backing tests and local
//! use. Its listing contract, which a SQL-backed implementation must match:
//! rows are kept in insertion order; `get_entities` sorts by mention count
//! descending (stable, so insertion order breaks ties); `get_backlog_items`
//! sorts by base priority descending (stable, same tie-break).

use super::backlog::{BacklogItem, BacklogKind, BacklogStatus};
use super::entity::{Entity, EntityKind};
use super::relationship::Relationship;
use crate::book::{Book, Session, WorkspaceFile, WorkspaceFolder};
use crate::id::{BacklogItemId, BookId, EntityId, SessionId};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors from story bible persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend failure: {0}")]
    Backend(String),

    #[error("unknown book: {0}")]
    UnknownBook(BookId),

    #[error("unknown entity: {0}")]
    UnknownEntity(EntityId),

    #[error("unknown session: {0}")]
    UnknownSession(SessionId),

    #[error("unknown backlog item: {0}")]
    UnknownItem(BacklogItemId),

    #[error("relationship endpoints belong to different books: {from} -> {to}")]
    CrossBookRelationship { from: EntityId, to: EntityId },
}

/// A partial update to an entity. Unset fields are left untouched;
/// `attributes` are merged key-by-key into the existing bag.
#[derive(Debug, Clone, Default)]
pub struct EntityPatch {
    pub name: Option<String>,
    pub kind: Option<EntityKind>,
    pub description: Option<String>,
    pub attributes: Option<Map<String, Value>>,
    pub mention_count: Option<u32>,
}

impl EntityPatch {
    /// Create an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_kind(mut self, kind: EntityKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.attributes = Some(attributes);
        self
    }

    pub fn with_mention_count(mut self, mention_count: u32) -> Self {
        self.mention_count = Some(mention_count);
        self
    }

    /// Check whether the patch changes anything.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.kind.is_none()
            && self.description.is_none()
            && self.attributes.is_none()
            && self.mention_count.is_none()
    }
}

/// The persistence contract for one or more books' story bibles.
#[async_trait]
pub trait StoryBible: Send + Sync {
    // Books and sessions

    /// Register a new book.
    async fn create_book(&self, book: Book) -> Result<Book, StoreError>;

    /// Fetch a book by id.
    async fn get_book(&self, id: BookId) -> Result<Option<Book>, StoreError>;

    /// Record a session for a book.
    async fn add_session(&self, session: Session) -> Result<Session, StoreError>;

    /// Fetch a session by id.
    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, StoreError>;

    /// List a book's sessions in insertion order.
    async fn get_sessions(&self, book: BookId) -> Result<Vec<Session>, StoreError>;

    /// Store a synthesized summary on a session.
    async fn set_session_summary(
        &self,
        id: SessionId,
        summary: String,
    ) -> Result<Session, StoreError>;

    /// Total sessions recorded for a book. O(1) aggregate.
    async fn session_count(&self, book: BookId) -> Result<u32, StoreError>;

    // Workspace files

    /// File a workspace document.
    async fn add_workspace_file(&self, file: WorkspaceFile) -> Result<WorkspaceFile, StoreError>;

    /// List a book's workspace files in insertion order.
    async fn get_workspace_files(&self, book: BookId) -> Result<Vec<WorkspaceFile>, StoreError>;

    /// Whether any file exists in the book's drafts folder. O(1) aggregate.
    async fn has_drafts(&self, book: BookId) -> Result<bool, StoreError>;

    // Entities and relationships

    /// Insert a new entity. Always creates a row; callers check for an
    /// existing entity with the same normalized name first.
    async fn add_entity(&self, entity: Entity) -> Result<Entity, StoreError>;

    /// Fetch an entity by id.
    async fn get_entity(&self, id: EntityId) -> Result<Option<Entity>, StoreError>;

    /// List a book's entities, optionally filtered by kind, ordered by
    /// mention count descending with ties broken by insertion order. The
    /// most-mentioned entities surface first for context assembly.
    async fn get_entities(
        &self,
        book: BookId,
        kind: Option<EntityKind>,
    ) -> Result<Vec<Entity>, StoreError>;

    /// Apply a partial update to an entity.
    async fn update_entity(&self, id: EntityId, patch: EntityPatch) -> Result<Entity, StoreError>;

    /// Insert a relationship. Both endpoints must exist and belong to the
    /// relationship's book. No uniqueness is enforced; duplicate edges may
    /// coexist.
    async fn add_relationship(
        &self,
        relationship: Relationship,
    ) -> Result<Relationship, StoreError>;

    /// List a book's relationships in insertion order. With `entity` given,
    /// returns the union of edges where the entity is source or target.
    async fn get_relationships(
        &self,
        book: BookId,
        entity: Option<EntityId>,
    ) -> Result<Vec<Relationship>, StoreError>;

    // Backlog

    /// Insert a backlog item.
    async fn add_backlog_item(&self, item: BacklogItem) -> Result<BacklogItem, StoreError>;

    /// Fetch a backlog item by id.
    async fn get_backlog_item(&self, id: BacklogItemId)
        -> Result<Option<BacklogItem>, StoreError>;

    /// List a book's backlog items, optionally filtered by status and kind,
    /// ordered by base priority descending with ties broken by insertion
    /// order. Note this is base priority, not effective score; callers that
    /// need the true ranking apply the scorer explicitly.
    async fn get_backlog_items(
        &self,
        book: BookId,
        status: Option<BacklogStatus>,
        kind: Option<BacklogKind>,
    ) -> Result<Vec<BacklogItem>, StoreError>;

    /// Mark an item addressed, stamping `addressed_at`. No-op returning the
    /// current state if the item is already terminal.
    async fn address_item(&self, id: BacklogItemId) -> Result<BacklogItem, StoreError>;

    /// Mark an item dismissed, stamping `addressed_at`. No-op returning the
    /// current state if the item is already terminal.
    async fn dismiss_item(&self, id: BacklogItemId) -> Result<BacklogItem, StoreError>;
}

/// Increment an entity's mention count.
///
/// This is a read-then-write increment, not an atomic one: two concurrent
/// mentions of the same entity can race and lose an increment (last write
/// wins on a stale read). The counter is advisory, used only for sort
/// ordering, so the lost-update window is accepted. A SQL-backed store may
/// harden this with an atomic `UPDATE ... SET count = count + 1`; never with
/// application-level locking, which cannot coordinate across processes.
pub async fn increment_mention_count(
    bible: &dyn StoryBible,
    id: EntityId,
) -> Result<Entity, StoreError> {
    let entity = bible
        .get_entity(id)
        .await?
        .ok_or(StoreError::UnknownEntity(id))?;
    bible
        .update_entity(
            id,
            EntityPatch::new().with_mention_count(entity.mention_count + 1),
        )
        .await
}

#[derive(Debug, Default)]
struct Tables {
    books: Vec<Book>,
    sessions: Vec<Session>,
    files: Vec<WorkspaceFile>,
    entities: Vec<Entity>,
    relationships: Vec<Relationship>,
    backlog: Vec<BacklogItem>,
}

impl Tables {
    fn require_book(&self, id: BookId) -> Result<(), StoreError> {
        if self.books.iter().any(|b| b.id == id) {
            Ok(())
        } else {
            Err(StoreError::UnknownBook(id))
        }
    }
}

/// In-memory reference implementation of [`StoryBible`].
///
/// Insertion-ordered `Vec` tables behind an async `RwLock`. See the module
/// docs for the listing contract.
#[derive(Debug, Default)]
pub struct MemoryBible {
    inner: tokio::sync::RwLock<Tables>,
}

impl MemoryBible {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoryBible for MemoryBible {
    async fn create_book(&self, book: Book) -> Result<Book, StoreError> {
        let mut tables = self.inner.write().await;
        tables.books.push(book.clone());
        Ok(book)
    }

    async fn get_book(&self, id: BookId) -> Result<Option<Book>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables.books.iter().find(|b| b.id == id).cloned())
    }

    async fn add_session(&self, session: Session) -> Result<Session, StoreError> {
        let mut tables = self.inner.write().await;
        tables.require_book(session.book_id)?;
        tables.sessions.push(session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables.sessions.iter().find(|s| s.id == id).cloned())
    }

    async fn get_sessions(&self, book: BookId) -> Result<Vec<Session>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables
            .sessions
            .iter()
            .filter(|s| s.book_id == book)
            .cloned()
            .collect())
    }

    async fn set_session_summary(
        &self,
        id: SessionId,
        summary: String,
    ) -> Result<Session, StoreError> {
        let mut tables = self.inner.write().await;
        let session = tables
            .sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::UnknownSession(id))?;
        session.summary = Some(summary);
        Ok(session.clone())
    }

    async fn session_count(&self, book: BookId) -> Result<u32, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables.sessions.iter().filter(|s| s.book_id == book).count() as u32)
    }

    async fn add_workspace_file(&self, file: WorkspaceFile) -> Result<WorkspaceFile, StoreError> {
        let mut tables = self.inner.write().await;
        tables.require_book(file.book_id)?;
        tables.files.push(file.clone());
        Ok(file)
    }

    async fn get_workspace_files(&self, book: BookId) -> Result<Vec<WorkspaceFile>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables
            .files
            .iter()
            .filter(|f| f.book_id == book)
            .cloned()
            .collect())
    }

    async fn has_drafts(&self, book: BookId) -> Result<bool, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables
            .files
            .iter()
            .any(|f| f.book_id == book && f.folder == WorkspaceFolder::Drafts))
    }

    async fn add_entity(&self, entity: Entity) -> Result<Entity, StoreError> {
        let mut tables = self.inner.write().await;
        tables.require_book(entity.book_id)?;
        tables.entities.push(entity.clone());
        Ok(entity)
    }

    async fn get_entity(&self, id: EntityId) -> Result<Option<Entity>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables.entities.iter().find(|e| e.id == id).cloned())
    }

    async fn get_entities(
        &self,
        book: BookId,
        kind: Option<EntityKind>,
    ) -> Result<Vec<Entity>, StoreError> {
        let tables = self.inner.read().await;
        let mut entities: Vec<Entity> = tables
            .entities
            .iter()
            .filter(|e| e.book_id == book && kind.is_none_or(|k| e.kind == k))
            .cloned()
            .collect();
        // Stable sort: insertion order breaks mention-count ties.
        entities.sort_by(|a, b| b.mention_count.cmp(&a.mention_count));
        Ok(entities)
    }

    async fn update_entity(&self, id: EntityId, patch: EntityPatch) -> Result<Entity, StoreError> {
        let mut tables = self.inner.write().await;
        let entity = tables
            .entities
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(StoreError::UnknownEntity(id))?;

        if let Some(name) = patch.name {
            entity.name = name;
        }
        if let Some(kind) = patch.kind {
            entity.kind = kind;
        }
        if let Some(description) = patch.description {
            entity.description = description;
        }
        if let Some(attributes) = patch.attributes {
            for (key, value) in attributes {
                entity.attributes.insert(key, value);
            }
        }
        if let Some(mention_count) = patch.mention_count {
            entity.mention_count = mention_count;
        }
        entity.updated_at = Utc::now();
        Ok(entity.clone())
    }

    async fn add_relationship(
        &self,
        relationship: Relationship,
    ) -> Result<Relationship, StoreError> {
        let mut tables = self.inner.write().await;
        tables.require_book(relationship.book_id)?;

        for endpoint in [relationship.from_entity, relationship.to_entity] {
            let entity = tables
                .entities
                .iter()
                .find(|e| e.id == endpoint)
                .ok_or(StoreError::UnknownEntity(endpoint))?;
            if entity.book_id != relationship.book_id {
                return Err(StoreError::CrossBookRelationship {
                    from: relationship.from_entity,
                    to: relationship.to_entity,
                });
            }
        }

        tables.relationships.push(relationship.clone());
        Ok(relationship)
    }

    async fn get_relationships(
        &self,
        book: BookId,
        entity: Option<EntityId>,
    ) -> Result<Vec<Relationship>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables
            .relationships
            .iter()
            .filter(|r| r.book_id == book && entity.is_none_or(|id| r.involves(id)))
            .cloned()
            .collect())
    }

    async fn add_backlog_item(&self, item: BacklogItem) -> Result<BacklogItem, StoreError> {
        let mut tables = self.inner.write().await;
        tables.require_book(item.book_id)?;
        tables.backlog.push(item.clone());
        Ok(item)
    }

    async fn get_backlog_item(
        &self,
        id: BacklogItemId,
    ) -> Result<Option<BacklogItem>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables.backlog.iter().find(|i| i.id == id).cloned())
    }

    async fn get_backlog_items(
        &self,
        book: BookId,
        status: Option<BacklogStatus>,
        kind: Option<BacklogKind>,
    ) -> Result<Vec<BacklogItem>, StoreError> {
        let tables = self.inner.read().await;
        let mut items: Vec<BacklogItem> = tables
            .backlog
            .iter()
            .filter(|i| {
                i.book_id == book
                    && status.is_none_or(|s| i.status == s)
                    && kind.is_none_or(|k| i.kind == k)
            })
            .cloned()
            .collect();
        // Stable sort: insertion order breaks priority ties.
        items.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(items)
    }

    async fn address_item(&self, id: BacklogItemId) -> Result<BacklogItem, StoreError> {
        let mut tables = self.inner.write().await;
        let item = tables
            .backlog
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(StoreError::UnknownItem(id))?;
        item.address();
        Ok(item.clone())
    }

    async fn dismiss_item(&self, id: BacklogItemId) -> Result<BacklogItem, StoreError> {
        let mut tables = self.inner.write().await;
        let item = tables
            .backlog
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(StoreError::UnknownItem(id))?;
        item.dismiss();
        Ok(item.clone())
    }
}
